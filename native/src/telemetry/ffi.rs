//! C layouts shared with the vendor library and the companion process.
//!
//! Field order and sizes are load-bearing: both sides agree on them by
//! convention only, there is no version header. Status fields stay as raw
//! `i64` so that unexpected values from foreign memory never form an invalid
//! Rust enum.

use super::types::{EyeConfidence, EyeMeasurements, GazeRay, RawSample, Vector3};

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct VarjoVector {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct VarjoRay {
    pub origin: VarjoVector,
    pub forward: VarjoVector,
}

/// Mirror of `varjo_Gaze`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct VarjoGaze {
    pub left_eye: VarjoRay,
    pub right_eye: VarjoRay,
    pub gaze: VarjoRay,
    pub focus_distance: f64,
    pub stability: f64,
    pub capture_time: i64,
    pub left_status: i64,
    pub right_status: i64,
    pub status: i64,
    pub frame_number: i64,
    /// Normalized [0..1] pupil size.
    pub left_pupil_size: f64,
    pub right_pupil_size: f64,
}

/// Mirror of `varjo_EyeMeasurements`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct VarjoEyeMeasurements {
    pub frame_number: i64,
    pub capture_time: i64,
    pub inter_pupillary_distance_in_mm: f32,
    pub left_pupil_iris_diameter_ratio: f32,
    pub right_pupil_iris_diameter_ratio: f32,
    pub left_pupil_diameter_in_mm: f32,
    pub right_pupil_diameter_in_mm: f32,
    pub left_iris_diameter_in_mm: f32,
    pub right_iris_diameter_in_mm: f32,
    pub left_eye_openness: f32,
    pub right_eye_openness: f32,
}

/// Region published by the companion process.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct CompanionRegion {
    /// Set by the module to ask the companion to exit.
    pub shutdown: u8,
    pub calibrated: u8,
    pub gaze: VarjoGaze,
    pub measurements: VarjoEyeMeasurements,
}

impl From<VarjoVector> for Vector3 {
    fn from(v: VarjoVector) -> Self {
        Vector3::new(v.x, v.y, v.z)
    }
}

impl From<VarjoRay> for GazeRay {
    fn from(ray: VarjoRay) -> Self {
        GazeRay {
            origin: ray.origin.into(),
            forward: ray.forward.into(),
        }
    }
}

impl From<&VarjoEyeMeasurements> for EyeMeasurements {
    fn from(m: &VarjoEyeMeasurements) -> Self {
        EyeMeasurements {
            left_openness: m.left_eye_openness,
            right_openness: m.right_eye_openness,
            left_pupil_diameter_mm: m.left_pupil_diameter_in_mm,
            right_pupil_diameter_mm: m.right_pupil_diameter_in_mm,
            left_iris_diameter_mm: m.left_iris_diameter_in_mm,
            right_iris_diameter_mm: m.right_iris_diameter_in_mm,
            left_pupil_iris_ratio: m.left_pupil_iris_diameter_ratio,
            right_pupil_iris_ratio: m.right_pupil_iris_diameter_ratio,
            inter_pupillary_distance_mm: m.inter_pupillary_distance_in_mm,
        }
    }
}

/// Build a sample from one gaze/measurements pair.
pub fn to_raw_sample(gaze: &VarjoGaze, measurements: &VarjoEyeMeasurements) -> RawSample {
    RawSample {
        left_ray: gaze.left_eye.into(),
        right_ray: gaze.right_eye.into(),
        left_status: EyeConfidence::from_eye_status(gaze.left_status),
        right_status: EyeConfidence::from_eye_status(gaze.right_status),
        combined_ray: gaze.gaze.into(),
        combined_status: EyeConfidence::from_gaze_status(gaze.status),
        focus_distance: gaze.focus_distance,
        stability: gaze.stability,
        frame_number: gaze.frame_number,
        capture_time: gaze.capture_time,
        measurements: Some(measurements.into()),
    }
}
