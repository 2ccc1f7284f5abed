use crate::acquisition::AcquisitionManager;
use crate::api::types::ModuleStatus;
use crate::config::ModuleConfig;
use crate::normalization::{EyeTrackingData, NormalizationPipeline};
use crate::polling::{LoopCounters, UpdateTask, UpdateTaskHandle};
use crate::session::{lock_session, new_shared_output, SharedSession, SharedTrackingData, TrackingSession};
use crate::telemetry::TelemetryBackend;
use log::{debug, info, warn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const MODULE_NAME: &str = "Varjo Eye Tracking";

/// How long teardown waits for the polling loop before giving up on it.
const LOOP_EXIT_TIMEOUT: Duration = Duration::from_secs(1);

const POLL_THREAD_NAME: &str = "eye-tracking-poll";

/// Contract between a face-tracking host and a tracking module.
pub trait TrackingModule {
    fn name(&self) -> &str;

    /// Connect to the sensor. Returns `(eye_ok, lip_ok)`.
    fn initialize(&mut self, want_eye: bool, want_lip: bool) -> (bool, bool);

    /// Periodic loop for the host to run. Cancelled by [`TrackingModule::teardown`].
    fn update_task(&mut self) -> UpdateTask;

    /// One poll → normalize → publish step. No-op when eye tracking is unavailable.
    fn update(&mut self);

    fn teardown(&mut self);

    fn supports_eye(&self) -> bool;

    fn supports_lip(&self) -> bool {
        false
    }
}

pub struct VarjoTrackingModule {
    session: SharedSession,
    output: SharedTrackingData,
    counters: Arc<LoopCounters>,
    poll_interval: Duration,
    task: Option<UpdateTaskHandle>,
    worker: Option<JoinHandle<()>>,
    supports_eye: bool,
    torn_down: bool,
}

impl VarjoTrackingModule {
    pub fn new(config: ModuleConfig) -> Self {
        let acquisition = AcquisitionManager::new(config.backend.clone());
        Self::from_parts(&config, acquisition)
    }

    /// Build a module around a specific backend instead of the configured one.
    pub fn with_backend(config: ModuleConfig, backend: TelemetryBackend) -> Self {
        let acquisition = AcquisitionManager::with_backend(config.backend.clone(), backend);
        Self::from_parts(&config, acquisition)
    }

    fn from_parts(config: &ModuleConfig, acquisition: AcquisitionManager) -> Self {
        let output = new_shared_output();
        let pipeline = NormalizationPipeline::new(config.normalization);
        let session = TrackingSession::new(acquisition, pipeline, Arc::clone(&output));

        Self {
            session: session.into_shared(),
            output,
            counters: Arc::new(LoopCounters::new()),
            poll_interval: config.poll_interval(),
            task: None,
            worker: None,
            supports_eye: false,
            torn_down: false,
        }
    }

    /// Handle to the published output, for readers on other threads.
    pub fn output(&self) -> SharedTrackingData {
        Arc::clone(&self.output)
    }

    /// Most recently published output.
    pub fn latest(&self) -> EyeTrackingData {
        **self.output.load()
    }

    /// Run the update task on an owned thread.
    pub fn start_polling(&mut self) -> std::io::Result<()> {
        if !self.supports_eye {
            debug!("[POLL] Eye tracking unavailable - polling not started");
            return Ok(());
        }

        let task = self.update_task();
        let worker = thread::Builder::new()
            .name(POLL_THREAD_NAME.to_string())
            .spawn(move || task.run())?;
        self.worker = Some(worker);
        info!("[POLL] Polling every {:?}", self.poll_interval);
        Ok(())
    }

    pub fn status(&self) -> ModuleStatus {
        ModuleStatus {
            name: MODULE_NAME.to_string(),
            version: crate::get_version(),
            supports_eye: self.supports_eye,
            supports_lip: self.supports_lip(),
            acquisition: lock_session(&self.session).acquisition.status(),
            polling: self.counters.snapshot(),
        }
    }

    /// Cancel the current loop and wait for it to finish.
    fn stop_loop(&mut self) {
        let Some(handle) = self.task.take() else {
            return;
        };

        let exited = handle.cancel_and_wait(LOOP_EXIT_TIMEOUT);
        if !exited {
            warn!(
                "[CLEANUP] Update loop did not exit within {:?}",
                LOOP_EXIT_TIMEOUT
            );
        }

        if let Some(worker) = self.worker.take() {
            if exited {
                if worker.join().is_err() {
                    warn!("[CLEANUP] Polling thread panicked");
                }
            } else {
                // Detach; the thread exits on its own after the current tick.
                drop(worker);
            }
        }
    }
}

impl TrackingModule for VarjoTrackingModule {
    fn name(&self) -> &str {
        MODULE_NAME
    }

    fn initialize(&mut self, want_eye: bool, want_lip: bool) -> (bool, bool) {
        if self.torn_down {
            warn!("[INIT] Module already torn down");
            return (false, false);
        }

        let (eye_ok, lip_ok) = lock_session(&self.session)
            .acquisition
            .initialize(want_eye, want_lip);
        self.supports_eye = eye_ok;

        if eye_ok {
            info!("[INIT] {} ready", MODULE_NAME);
        }
        (eye_ok, lip_ok)
    }

    fn update_task(&mut self) -> UpdateTask {
        self.stop_loop();

        let (task, handle) = UpdateTask::new(
            Arc::clone(&self.session),
            self.poll_interval,
            Arc::clone(&self.counters),
        );
        self.task = Some(handle);
        task
    }

    fn update(&mut self) {
        if !self.supports_eye {
            return;
        }
        lock_session(&self.session).tick();
    }

    fn teardown(&mut self) {
        if self.torn_down {
            debug!("[CLEANUP] Module already torn down");
            return;
        }

        info!("[CLEANUP] Shutting down eye tracking...");
        self.stop_loop();
        lock_session(&self.session).acquisition.teardown();

        self.supports_eye = false;
        self.torn_down = true;
        info!("[CLEANUP] Eye tracking shut down");
    }

    fn supports_eye(&self) -> bool {
        self.supports_eye
    }
}

impl Drop for VarjoTrackingModule {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::InitStatus;
    use crate::config::{BackendConfig, BackendPreference};
    use crate::telemetry::{EyeConfidence, EyeMeasurements, RawSample, SimulatedSession};
    use std::path::PathBuf;

    fn offline_config() -> ModuleConfig {
        ModuleConfig {
            poll_interval_ms: 1,
            backend: BackendConfig {
                backend: BackendPreference::Companion,
                module_dir: Some(PathBuf::from("/nonexistent/varjo-eye-module-test")),
                device_probe_path: PathBuf::from("/nonexistent/varjo/InfoService"),
                connect_retry_delay_ms: 0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn squinting_sample() -> RawSample {
        RawSample {
            left_status: EyeConfidence::Tracked,
            right_status: EyeConfidence::Tracked,
            combined_status: EyeConfidence::Tracked,
            frame_number: 42,
            measurements: Some(EyeMeasurements {
                left_openness: 0.05,
                right_openness: 0.05,
                left_pupil_diameter_mm: 4.0,
                right_pupil_diameter_mm: 4.0,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_connect_failure_leaves_update_noop() {
        let mut module = VarjoTrackingModule::new(offline_config());
        assert_eq!(module.initialize(true, true), (false, false));
        assert!(!module.supports_eye());
        assert!(!module.supports_lip());

        module.update();
        module.update();
        assert_eq!(module.latest(), EyeTrackingData::default());

        let status = module.status();
        assert_eq!(status.acquisition.backend.status, InitStatus::Failed);
        assert!(!status.supports_eye);
    }

    #[test]
    fn test_simulated_update_publishes() {
        let backend = TelemetryBackend::Simulated(SimulatedSession::scripted([squinting_sample()]));
        let mut module = VarjoTrackingModule::with_backend(offline_config(), backend);
        assert_eq!(module.initialize(true, false), (true, false));
        assert_eq!(module.name(), MODULE_NAME);

        module.update();
        let data = module.latest();
        assert_eq!(data.frame_number, 42);
        assert_eq!(data.left.openness, 0.0);
        assert!(data.left.squeeze > 0.6);
        assert_eq!(data.combined.dilation, 0.5);
        assert_eq!(data.combined.pupil_diameter_normalized, 0.4);
    }

    #[test]
    fn test_double_teardown_is_ignored() {
        let backend = TelemetryBackend::Simulated(SimulatedSession::synthetic());
        let mut module = VarjoTrackingModule::with_backend(offline_config(), backend);
        module.initialize(true, false);

        module.teardown();
        module.teardown();
        assert!(!module.supports_eye());
        assert_eq!(module.initialize(true, false), (false, false));
    }

    #[test]
    fn test_owned_polling_thread() {
        let backend = TelemetryBackend::Simulated(SimulatedSession::synthetic());
        let mut module = VarjoTrackingModule::with_backend(offline_config(), backend);
        module.initialize(true, false);
        module.start_polling().expect("spawn polling thread");

        thread::sleep(Duration::from_millis(50));
        assert!(module.latest().frame_number > 0);
        assert!(module.status().polling.frames > 0);

        module.teardown();
        assert!(!module.status().polling.running);
        assert!(!module.status().acquisition.active);
    }

    #[test]
    fn test_host_driven_update_task() {
        let backend = TelemetryBackend::Simulated(SimulatedSession::synthetic());
        let mut module = VarjoTrackingModule::with_backend(offline_config(), backend);
        module.initialize(true, false);

        let task = module.update_task();
        let host_thread = thread::spawn(move || task.run());
        thread::sleep(Duration::from_millis(30));

        module.teardown();
        host_thread.join().expect("host thread should finish after teardown");
        assert!(module.latest().frame_number > 0);
    }

    #[test]
    fn test_start_polling_without_eye_does_nothing() {
        let mut module = VarjoTrackingModule::new(offline_config());
        module.initialize(true, false);
        module.start_polling().expect("no thread needed");
        assert!(!module.status().polling.running);
    }
}
