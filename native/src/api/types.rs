use crate::telemetry::{BackendKind, FailureKind};
use serde::{Deserialize, Serialize};

/// Aggregate module status returned to the host or the monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleStatus {
    pub name: String,
    pub version: String,
    pub supports_eye: bool,
    pub supports_lip: bool,
    pub acquisition: AcquisitionStatus,
    pub polling: LoopMetrics,
}

/// Backend selection and poll counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_kind: Option<BackendKind>,
    pub backend: ComponentState,
    pub active: bool,
    pub polls_ok: u64,
    pub polls_failed: u64,
}

/// Detailed component initialization state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentState {
    pub status: InitStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InitStatus {
    Ok,
    Failed,
    NotInitialized,
}

impl ComponentState {
    pub fn ok() -> Self {
        Self {
            status: InitStatus::Ok,
            failure: None,
            error: None,
        }
    }

    pub fn failed(failure: FailureKind, error: String) -> Self {
        Self {
            status: InitStatus::Failed,
            failure: Some(failure),
            error: Some(error),
        }
    }

    pub fn not_initialized() -> Self {
        Self {
            status: InitStatus::NotInitialized,
            failure: None,
            error: None,
        }
    }
}

/// Polling loop performance counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoopMetrics {
    pub running: bool,
    pub frames: u64,
    pub average_frame_ms: f64,
    pub max_frame_ms: f64,
    pub frames_over_budget: u64,
}
