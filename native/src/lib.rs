pub mod acquisition;
pub mod api;
pub mod config;
pub mod logging;
pub mod module;
pub mod normalization;
pub mod polling;
pub mod session;
pub mod telemetry;

pub use acquisition::AcquisitionManager;
pub use config::{BackendConfig, BackendPreference, ModuleConfig, NormalizationConfig};
pub use module::{TrackingModule, VarjoTrackingModule, MODULE_NAME};
pub use normalization::{CombinedOutput, EyeOutput, EyeTrackingData, NormalizationPipeline, Vector2};
pub use polling::{UpdateTask, UpdateTaskHandle};
pub use telemetry::{BackendError, BackendKind, FailureKind, RawSample, TelemetryBackend};

pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
