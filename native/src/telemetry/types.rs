//! Backend-independent telemetry snapshot types.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Gaze ray in headset space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GazeRay {
    pub origin: Vector3,
    pub forward: Vector3,
}

impl GazeRay {
    pub const fn looking(forward: Vector3) -> Self {
        Self {
            origin: Vector3::new(0.0, 0.0, 0.0),
            forward,
        }
    }
}

/// Per-eye tracking confidence, ordered by increasing trust.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EyeConfidence {
    #[default]
    Invalid = 0,
    Visible = 1,
    Compensated = 2,
    Tracked = 3,
}

impl EyeConfidence {
    /// Decode a vendor per-eye status. Unknown values are treated as untracked.
    pub fn from_eye_status(raw: i64) -> Self {
        match raw {
            1 => Self::Visible,
            2 => Self::Compensated,
            3 => Self::Tracked,
            _ => Self::Invalid,
        }
    }

    /// Decode the vendor's combined gaze status (Invalid / Adjust / Valid).
    pub fn from_gaze_status(raw: i64) -> Self {
        match raw {
            1 => Self::Visible,
            2 => Self::Tracked,
            _ => Self::Invalid,
        }
    }

    /// Whether a sample with this status may drive derived metrics.
    #[inline]
    pub fn is_trusted(self) -> bool {
        self >= Self::Compensated
    }
}

/// Eyelid and pupil measurements reported next to the gaze data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EyeMeasurements {
    pub left_openness: f32,
    pub right_openness: f32,
    pub left_pupil_diameter_mm: f32,
    pub right_pupil_diameter_mm: f32,
    pub left_iris_diameter_mm: f32,
    pub right_iris_diameter_mm: f32,
    pub left_pupil_iris_ratio: f32,
    pub right_pupil_iris_ratio: f32,
    pub inter_pupillary_distance_mm: f32,
}

/// One telemetry snapshot. Replaced wholesale on every successful poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub left_ray: GazeRay,
    pub right_ray: GazeRay,
    pub left_status: EyeConfidence,
    pub right_status: EyeConfidence,
    pub combined_ray: GazeRay,
    pub combined_status: EyeConfidence,
    pub focus_distance: f64,
    pub stability: f64,
    pub frame_number: i64,
    pub capture_time: i64,
    pub measurements: Option<EyeMeasurements>,
}
