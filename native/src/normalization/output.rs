use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

impl Vector2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Normalized channels for one eye.
///
/// `squeeze` and `widen` come from the same raw scalar and are never both
/// non-zero after an update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyeOutput {
    pub look: Vector2,
    pub openness: f32,
    pub squeeze: f32,
    pub widen: f32,
}

impl Default for EyeOutput {
    fn default() -> Self {
        Self {
            look: Vector2::default(),
            openness: 1.0,
            squeeze: 0.0,
            widen: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombinedOutput {
    pub eye: EyeOutput,
    /// Session-relative pupil size in [0,1]; 0.5 until calibration has a range.
    pub dilation: f32,
    pub pupil_diameter_normalized: f32,
}

impl Default for CombinedOutput {
    fn default() -> Self {
        Self {
            eye: EyeOutput::default(),
            dilation: 0.5,
            pupil_diameter_normalized: 0.0,
        }
    }
}

/// Output record handed to the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EyeTrackingData {
    pub left: EyeOutput,
    pub right: EyeOutput,
    pub combined: CombinedOutput,
    /// Frame number of the sample these values were derived from.
    pub frame_number: i64,
}
