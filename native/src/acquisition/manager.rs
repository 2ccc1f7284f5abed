use crate::api::types::{AcquisitionStatus, ComponentState};
use crate::config::BackendConfig;
use crate::telemetry::{BackendError, BackendKind, FailureKind, RawSample, TelemetryBackend};
use log::{debug, info, warn};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManagerState {
    Idle,
    Active,
    Unavailable,
    TornDown,
}

/// Owns the selected backend for the whole session.
pub struct AcquisitionManager {
    config: BackendConfig,
    backend: Option<TelemetryBackend>,
    state: ManagerState,
    init_status: Option<Result<BackendKind, (FailureKind, String)>>,
    polls_ok: u64,
    polls_failed: u64,
}

impl AcquisitionManager {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            backend: None,
            state: ManagerState::Idle,
            init_status: None,
            polls_ok: 0,
            polls_failed: 0,
        }
    }

    /// Use a specific backend instead of the configured selection.
    pub fn with_backend(config: BackendConfig, backend: TelemetryBackend) -> Self {
        let mut manager = Self::new(config);
        manager.backend = Some(backend);
        manager
    }

    /// Select and connect one backend. Lip tracking is never available.
    pub fn initialize(&mut self, want_eye: bool, want_lip: bool) -> (bool, bool) {
        if want_lip {
            debug!("[INIT] Lip tracking requested but not supported by this sensor");
        }

        if self.state == ManagerState::Active {
            return (true, false);
        }

        if !want_eye || self.state == ManagerState::TornDown {
            return (false, false);
        }

        let step_start = Instant::now();
        let mut backend = self
            .backend
            .take()
            .unwrap_or_else(|| TelemetryBackend::select(&self.config));
        let kind = backend.kind();
        info!("[INIT] Connecting eye tracking through {}", kind.as_str());

        match backend.connect() {
            Ok(()) => {
                info!(
                    "[INIT] Eye tracking connected through {} in {:?}",
                    kind.as_str(),
                    step_start.elapsed()
                );
                self.backend = Some(backend);
                self.state = ManagerState::Active;
                self.init_status = Some(Ok(kind));
                (true, false)
            }
            Err(e) => {
                self.report_init_failure(kind, &e);
                backend.shutdown();
                self.state = ManagerState::Unavailable;
                self.init_status = Some(Err((e.kind(), e.to_string())));
                (false, false)
            }
        }
    }

    fn report_init_failure(&self, kind: BackendKind, error: &BackendError) {
        match error.kind() {
            FailureKind::DeviceAbsent => {
                info!("[INIT] {} - eye tracking disabled", error);
            }
            FailureKind::PermissionDenied => {
                warn!("[INIT] {}", error);
            }
            _ => {
                warn!(
                    "[INIT] {} backend failed to initialize: {}",
                    kind.as_str(),
                    error
                );
                crate::logging::log_critical_error("Eye tracking initialization", &error.to_string());
            }
        }
    }

    /// Poll the active backend. Returns the sample to normalize, or `None`
    /// when no backend is active.
    ///
    /// A failed poll keeps the previous sample.
    pub fn update(&mut self) -> Option<&RawSample> {
        if self.state != ManagerState::Active {
            return None;
        }

        let backend = self.backend.as_mut()?;
        match backend.poll() {
            Ok(()) => self.polls_ok += 1,
            Err(e) => {
                self.polls_failed += 1;
                if self.polls_failed == 1 || self.polls_failed % 1000 == 0 {
                    debug!("[POLL] {} ({} failed polls)", e, self.polls_failed);
                }
            }
        }

        Some(backend.latest())
    }

    pub fn latest(&self) -> Option<&RawSample> {
        self.backend.as_ref().map(|b| b.latest())
    }

    pub fn is_active(&self) -> bool {
        self.state == ManagerState::Active
    }

    pub fn backend_kind(&self) -> Option<BackendKind> {
        self.backend.as_ref().map(|b| b.kind())
    }

    /// Shut the backend down. Later calls are ignored.
    pub fn teardown(&mut self) {
        if self.state == ManagerState::TornDown {
            debug!("[CLEANUP] Acquisition already torn down");
            return;
        }

        if let Some(mut backend) = self.backend.take() {
            backend.shutdown();
            info!("[CLEANUP] {} backend shut down", backend.kind().as_str());
        }
        self.state = ManagerState::TornDown;
    }

    pub fn status(&self) -> AcquisitionStatus {
        let backend = match &self.init_status {
            Some(Ok(_)) => ComponentState::ok(),
            Some(Err((kind, message))) => ComponentState::failed(*kind, message.clone()),
            None => ComponentState::not_initialized(),
        };

        let kind = match &self.init_status {
            Some(Ok(kind)) => Some(*kind),
            _ => self.backend_kind(),
        };

        AcquisitionStatus {
            backend_kind: kind,
            backend,
            active: self.is_active(),
            polls_ok: self.polls_ok,
            polls_failed: self.polls_failed,
        }
    }
}

impl Drop for AcquisitionManager {
    fn drop(&mut self) {
        self.teardown();
    }
}
