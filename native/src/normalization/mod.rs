pub mod calibration;
pub mod openness;
pub mod output;
pub mod pipeline;

pub use calibration::{fused_pupil_diameter, PupilCalibration, PupilRange, NEUTRAL_DILATION};
pub use openness::{decompose_openness, update_eye, EyelidChannels};
pub use output::{CombinedOutput, EyeOutput, EyeTrackingData, Vector2};
pub use pipeline::NormalizationPipeline;
