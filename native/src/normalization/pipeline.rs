use super::calibration::{fused_pupil_diameter, PupilCalibration};
use super::openness::update_eye;
use super::output::EyeTrackingData;
use crate::config::NormalizationConfig;
use crate::telemetry::RawSample;

/// Turns raw samples into bounded output channels.
///
/// Owns the session's pupil calibration, so one pipeline must be used for
/// the whole tracking session.
#[derive(Debug, Clone)]
pub struct NormalizationPipeline {
    config: NormalizationConfig,
    calibration: PupilCalibration,
}

impl Default for NormalizationPipeline {
    fn default() -> Self {
        Self::new(NormalizationConfig::default())
    }
}

impl NormalizationPipeline {
    pub fn new(config: NormalizationConfig) -> Self {
        Self {
            config: config.validated(),
            calibration: PupilCalibration::new(),
        }
    }

    pub fn config(&self) -> &NormalizationConfig {
        &self.config
    }

    pub fn calibration(&self) -> &PupilCalibration {
        &self.calibration
    }

    /// Write one sample's derived channels into `output`.
    pub fn update(&mut self, sample: &RawSample, output: &mut EyeTrackingData) {
        let measurements = sample.measurements.as_ref();

        update_eye(
            &mut output.left,
            &sample.left_ray,
            measurements.map(|m| m.left_openness),
            sample.left_status,
            &self.config,
        );
        update_eye(
            &mut output.right,
            &sample.right_ray,
            measurements.map(|m| m.right_openness),
            sample.right_status,
            &self.config,
        );

        // Combined openness uses the raw mean, not the decomposed per-eye values.
        update_eye(
            &mut output.combined.eye,
            &sample.combined_ray,
            measurements.map(|m| (m.left_openness + m.right_openness) / 2.0),
            sample.combined_status,
            &self.config,
        );

        if let Some(m) = measurements {
            let pupil_mm = fused_pupil_diameter(m, sample.left_status, sample.right_status);
            output.combined.dilation = self.calibration.update(pupil_mm);

            if pupil_mm > 0.0 {
                output.combined.pupil_diameter_normalized =
                    (pupil_mm / self.config.pupil_scale_mm).min(1.0);
            }
        }

        output.frame_number = sample.frame_number;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{EyeConfidence, EyeMeasurements, GazeRay, Vector3};

    fn sample(openness: f32, pupil_mm: f32, status: EyeConfidence) -> RawSample {
        let ray = GazeRay::looking(Vector3::new(0.1, 0.2, 1.0));
        RawSample {
            left_ray: ray,
            right_ray: ray,
            left_status: status,
            right_status: status,
            combined_ray: ray,
            combined_status: status,
            frame_number: 1,
            measurements: Some(EyeMeasurements {
                left_openness: openness,
                right_openness: openness,
                left_pupil_diameter_mm: pupil_mm,
                right_pupil_diameter_mm: pupil_mm,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn assert_bounded(out: &EyeTrackingData) {
        for eye in [&out.left, &out.right, &out.combined.eye] {
            for v in [eye.openness, eye.squeeze, eye.widen] {
                assert!((0.0..=1.0).contains(&v));
            }
            assert!(eye.squeeze == 0.0 || eye.widen == 0.0);
        }
        assert!((0.0..=1.0).contains(&out.combined.dilation));
        assert!((0.0..=1.0).contains(&out.combined.pupil_diameter_normalized));
    }

    #[test]
    fn test_same_sample_twice_is_idempotent() {
        let mut pipeline = NormalizationPipeline::default();
        let mut out = EyeTrackingData::default();
        let s = sample(0.5, 4.0, EyeConfidence::Tracked);

        pipeline.update(&s, &mut out);
        let first = out;
        pipeline.update(&s, &mut out);
        assert_eq!(out, first);
        assert_eq!(out.combined.dilation, 0.5);
    }

    #[test]
    fn test_closing_eye_end_to_end() {
        let mut pipeline = NormalizationPipeline::default();
        let mut out = EyeTrackingData::default();
        pipeline.update(&sample(0.05, 4.0, EyeConfidence::Tracked), &mut out);

        for eye in [&out.left, &out.right, &out.combined.eye] {
            assert_eq!(eye.openness, 0.0);
            assert_eq!(eye.widen, 0.0);
            assert!((eye.squeeze - 0.6667).abs() < 0.001);
        }
        assert_bounded(&out);
    }

    #[test]
    fn test_wide_eye_end_to_end() {
        let mut pipeline = NormalizationPipeline::default();
        let mut out = EyeTrackingData::default();
        pipeline.update(&sample(0.95, 4.0, EyeConfidence::Tracked), &mut out);

        assert_eq!(out.left.openness, 1.0);
        assert_eq!(out.left.squeeze, 0.0);
        assert!((out.left.widen - 0.5).abs() < 1e-5);
        assert_bounded(&out);
    }

    #[test]
    fn test_dilation_follows_calibration() {
        let mut pipeline = NormalizationPipeline::default();
        let mut out = EyeTrackingData::default();

        pipeline.update(&sample(0.5, 4.0, EyeConfidence::Tracked), &mut out);
        assert_eq!(out.combined.dilation, 0.5);
        pipeline.update(&sample(0.5, 2.0, EyeConfidence::Tracked), &mut out);
        assert_eq!(out.combined.dilation, 0.0);
        pipeline.update(&sample(0.5, 3.0, EyeConfidence::Tracked), &mut out);
        assert_eq!(out.combined.dilation, 0.5);
        assert_eq!(out.combined.pupil_diameter_normalized, 0.3);
    }

    #[test]
    fn test_untracked_eyes_do_not_touch_calibration() {
        let mut pipeline = NormalizationPipeline::default();
        let mut out = EyeTrackingData::default();
        pipeline.update(&sample(0.5, 4.0, EyeConfidence::Tracked), &mut out);
        pipeline.update(&sample(0.5, 6.0, EyeConfidence::Tracked), &mut out);
        let held = out.combined;

        pipeline.update(&sample(0.5, 0.5, EyeConfidence::Visible), &mut out);
        assert_eq!(out.combined.dilation, held.dilation);
        assert_eq!(
            out.combined.pupil_diameter_normalized,
            held.pupil_diameter_normalized
        );
        let range = pipeline.calibration().range().expect("range");
        assert_eq!(range.min, 4.0);
    }

    #[test]
    fn test_closed_eye_does_not_pull_pupil() {
        let mut pipeline = NormalizationPipeline::default();
        let mut out = EyeTrackingData::default();
        let mut s = sample(0.5, 4.0, EyeConfidence::Tracked);
        s.right_status = EyeConfidence::Invalid;
        if let Some(m) = s.measurements.as_mut() {
            m.right_pupil_diameter_mm = 0.0;
        }

        pipeline.update(&s, &mut out);
        assert_eq!(out.combined.pupil_diameter_normalized, 0.4);
    }

    #[test]
    fn test_large_pupil_is_clamped() {
        let mut pipeline = NormalizationPipeline::default();
        let mut out = EyeTrackingData::default();
        pipeline.update(&sample(0.5, 14.0, EyeConfidence::Tracked), &mut out);
        assert_eq!(out.combined.pupil_diameter_normalized, 1.0);
    }

    #[test]
    fn test_missing_measurements_keep_eyelids() {
        let mut pipeline = NormalizationPipeline::default();
        let mut out = EyeTrackingData::default();
        pipeline.update(&sample(0.3, 4.0, EyeConfidence::Tracked), &mut out);
        let before = out;

        let mut s = sample(0.9, 4.0, EyeConfidence::Tracked);
        s.measurements = None;
        s.frame_number = 2;
        pipeline.update(&s, &mut out);

        assert_eq!(out.left.openness, before.left.openness);
        assert_eq!(out.combined.dilation, before.combined.dilation);
        assert_eq!(out.frame_number, 2);
    }

    #[test]
    fn test_stale_hold_on_invalid_status() {
        let mut pipeline = NormalizationPipeline::default();
        let mut out = EyeTrackingData::default();
        pipeline.update(&sample(0.7, 4.0, EyeConfidence::Tracked), &mut out);
        let before = out;

        pipeline.update(&sample(0.05, 4.0, EyeConfidence::Invalid), &mut out);
        assert_eq!(out.left.openness, before.left.openness);
        assert_eq!(out.left.squeeze, before.left.squeeze);
        assert_eq!(out.left.widen, before.left.widen);
        assert_eq!(out.combined.eye.openness, before.combined.eye.openness);
        assert_eq!(out.left.look, before.left.look);
    }
}
