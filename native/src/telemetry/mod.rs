pub mod companion;
pub mod ffi;
pub mod native_session;
mod platform;
pub mod simulated;
pub mod types;

pub use companion::CompanionSession;
pub use native_session::NativeSession;
pub use simulated::SimulatedSession;
pub use types::{EyeConfidence, EyeMeasurements, GazeRay, RawSample, Vector3};

use crate::config::{BackendConfig, BackendPreference};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Varjo headset isn't detected")]
    DeviceAbsent,
    #[error("Shared memory '{name}' did not appear after {attempts} attempts")]
    ConnectionTimeout { name: String, attempts: u32 },
    #[error("Gaze tracking is not allowed! Please enable it in Varjo Base")]
    PermissionDenied,
    #[error("Poll failed: {0}")]
    PollFailed(String),
    #[error("Vendor library not found at {0:?}")]
    LibraryMissing(PathBuf),
    #[error("Vendor library error: {0}")]
    LibraryLoad(String),
    #[error("Failed to launch companion {path:?}: {source}")]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Eye tracking backends are not supported on this platform")]
    Unsupported,
    #[error("Backend not connected")]
    NotConnected,
}

/// Coarse classification used for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    DeviceAbsent,
    ConnectionTimeout,
    PermissionDenied,
    TransientPollFailure,
    FatalInitFailure,
}

impl BackendError {
    pub fn kind(&self) -> FailureKind {
        match self {
            BackendError::DeviceAbsent => FailureKind::DeviceAbsent,
            BackendError::ConnectionTimeout { .. } => FailureKind::ConnectionTimeout,
            BackendError::PermissionDenied => FailureKind::PermissionDenied,
            BackendError::PollFailed(_) | BackendError::NotConnected => {
                FailureKind::TransientPollFailure
            }
            BackendError::LibraryMissing(_)
            | BackendError::LibraryLoad(_)
            | BackendError::Launch { .. }
            | BackendError::Io(_)
            | BackendError::Unsupported => FailureKind::FatalInitFailure,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Native,
    Companion,
    Simulated,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Native => "native DLL",
            Self::Companion => "companion app",
            Self::Simulated => "simulated",
        }
    }
}

/// One telemetry source. Callers only use connect / poll / latest / shutdown.
pub enum TelemetryBackend {
    Native(NativeSession),
    Companion(CompanionSession),
    Simulated(SimulatedSession),
}

impl TelemetryBackend {
    /// Pick a variant for the configured preference.
    pub fn select(config: &BackendConfig) -> Self {
        match config.backend {
            BackendPreference::Native => Self::Native(NativeSession::new(config.clone())),
            BackendPreference::Companion => Self::Companion(CompanionSession::new(config.clone())),
            BackendPreference::Simulated => Self::Simulated(SimulatedSession::synthetic()),
            BackendPreference::Auto => {
                if NativeSession::library_available(config) {
                    Self::Native(NativeSession::new(config.clone()))
                } else {
                    Self::Companion(CompanionSession::new(config.clone()))
                }
            }
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Native(_) => BackendKind::Native,
            Self::Companion(_) => BackendKind::Companion,
            Self::Simulated(_) => BackendKind::Simulated,
        }
    }

    pub fn connect(&mut self) -> Result<(), BackendError> {
        match self {
            Self::Native(b) => b.connect(),
            Self::Companion(b) => b.connect(),
            Self::Simulated(b) => b.connect(),
        }
    }

    pub fn is_connected(&self) -> bool {
        match self {
            Self::Native(b) => b.is_connected(),
            Self::Companion(b) => b.is_connected(),
            Self::Simulated(b) => b.is_connected(),
        }
    }

    pub fn poll(&mut self) -> Result<(), BackendError> {
        match self {
            Self::Native(b) => b.poll(),
            Self::Companion(b) => b.poll(),
            Self::Simulated(b) => b.poll(),
        }
    }

    pub fn latest(&self) -> &RawSample {
        match self {
            Self::Native(b) => b.latest(),
            Self::Companion(b) => b.latest(),
            Self::Simulated(b) => b.latest(),
        }
    }

    pub fn shutdown(&mut self) {
        match self {
            Self::Native(b) => b.shutdown(),
            Self::Companion(b) => b.shutdown(),
            Self::Simulated(b) => b.shutdown(),
        }
    }
}
