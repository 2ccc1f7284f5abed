//! Online min/max calibration for pupil dilation.
//!
//! There is no absolute pupil range that holds across users, so the observed
//! range is bootstrapped per session and only ever widens. Dilation is
//! relative to that range.

use crate::telemetry::{EyeConfidence, EyeMeasurements};
use serde::{Deserialize, Serialize};

/// Dilation reported before the range holds two distinct values.
pub const NEUTRAL_DILATION: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PupilRange {
    pub min: f32,
    pub max: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PupilCalibration {
    range: Option<PupilRange>,
    last_dilation: f32,
}

impl Default for PupilCalibration {
    fn default() -> Self {
        Self::new()
    }
}

impl PupilCalibration {
    pub fn new() -> Self {
        Self {
            range: None,
            last_dilation: NEUTRAL_DILATION,
        }
    }

    pub fn range(&self) -> Option<PupilRange> {
        self.range
    }

    pub fn last_dilation(&self) -> f32 {
        self.last_dilation
    }

    /// Feed one pupil diameter (mm) and return the current dilation.
    ///
    /// Non-positive or non-finite values leave the range alone and return the
    /// previous dilation.
    pub fn update(&mut self, pupil_mm: f32) -> f32 {
        if !(pupil_mm.is_finite() && pupil_mm > 0.0) {
            return self.last_dilation;
        }

        let range = match self.range.as_mut() {
            Some(range) => {
                range.min = range.min.min(pupil_mm);
                range.max = range.max.max(pupil_mm);
                *range
            }
            None => {
                let range = PupilRange {
                    min: pupil_mm,
                    max: pupil_mm,
                };
                self.range = Some(range);
                range
            }
        };

        self.last_dilation = if range.max > range.min {
            ((pupil_mm - range.min) / (range.max - range.min)).clamp(0.0, 1.0)
        } else {
            NEUTRAL_DILATION
        };

        self.last_dilation
    }
}

/// Fuse both eyes' pupil diameters, ignoring eyes below Compensated.
///
/// Returns 0 when neither eye qualifies, which calibration treats as "skip".
pub fn fused_pupil_diameter(
    measurements: &EyeMeasurements,
    left: EyeConfidence,
    right: EyeConfidence,
) -> f32 {
    match (left.is_trusted(), right.is_trusted()) {
        (true, true) => {
            (measurements.left_pupil_diameter_mm + measurements.right_pupil_diameter_mm) / 2.0
        }
        (true, false) => measurements.left_pupil_diameter_mm,
        (false, true) => measurements.right_pupil_diameter_mm,
        (false, false) => 0.0,
    }
}
