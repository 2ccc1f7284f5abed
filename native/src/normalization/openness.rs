use super::output::{EyeOutput, Vector2};
use crate::config::NormalizationConfig;
use crate::telemetry::{EyeConfidence, GazeRay};

/// Eyelid channels decomposed from one raw openness scalar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyelidChannels {
    pub openness: f32,
    pub squeeze: f32,
    pub widen: f32,
}

/// Split a raw openness value into squeeze / openness / widen bands.
///
/// Expects thresholds satisfying `0 < squeeze < widen < 1`.
#[inline]
pub fn decompose_openness(raw: f32, thresholds: &NormalizationConfig) -> EyelidChannels {
    let raw = raw.clamp(0.0, 1.0);
    let squeeze_at = thresholds.squeeze_threshold;
    let widen_at = thresholds.widen_threshold;

    if raw <= squeeze_at {
        EyelidChannels {
            openness: 0.0,
            squeeze: (1.0 - raw / squeeze_at).clamp(0.0, 1.0),
            widen: 0.0,
        }
    } else if raw >= widen_at {
        EyelidChannels {
            openness: 1.0,
            squeeze: 0.0,
            widen: ((raw - widen_at) / (1.0 - widen_at)).clamp(0.0, 1.0),
        }
    } else {
        EyelidChannels {
            openness: ((raw - squeeze_at) / (widen_at - squeeze_at)).clamp(0.0, 1.0),
            squeeze: 0.0,
            widen: 0.0,
        }
    }
}

/// Update one eye in place.
///
/// The look vector only follows rays with at least Compensated confidence.
/// For an Invalid eye, a new openness that jumps further than
/// `max_untracked_openness_delta` from the current one is dropped and the
/// previous openness/squeeze/widen stay as they were.
pub fn update_eye(
    output: &mut EyeOutput,
    ray: &GazeRay,
    raw_openness: Option<f32>,
    status: EyeConfidence,
    thresholds: &NormalizationConfig,
) {
    if status.is_trusted() {
        output.look = Vector2::new(ray.forward.x as f32, ray.forward.y as f32);
    }

    let raw = match raw_openness {
        Some(raw) if !raw.is_nan() => raw,
        _ => return,
    };

    let channels = decompose_openness(raw, thresholds);

    if status == EyeConfidence::Invalid
        && (channels.openness - output.openness).abs() > thresholds.max_untracked_openness_delta
    {
        return;
    }

    output.openness = channels.openness;
    output.squeeze = channels.squeeze;
    output.widen = channels.widen;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::Vector3;

    fn defaults() -> NormalizationConfig {
        NormalizationConfig::default()
    }

    #[test]
    fn test_squeeze_band() {
        let t = defaults();
        let mut previous = f32::INFINITY;
        for k in 0..=15 {
            let raw = t.squeeze_threshold * (k as f32 / 15.0);
            let ch = decompose_openness(raw, &t);
            assert_eq!(ch.openness, 0.0);
            assert_eq!(ch.widen, 0.0);
            assert!((0.0..=1.0).contains(&ch.squeeze));
            assert!(ch.squeeze < previous);
            previous = ch.squeeze;
        }
        assert_eq!(decompose_openness(0.0, &t).squeeze, 1.0);
    }

    #[test]
    fn test_widen_band() {
        let t = defaults();
        let mut previous = -1.0;
        for k in 0..=10 {
            let raw = t.widen_threshold + (1.0 - t.widen_threshold) * (k as f32 / 10.0);
            let ch = decompose_openness(raw, &t);
            assert_eq!(ch.openness, 1.0);
            assert_eq!(ch.squeeze, 0.0);
            assert!((0.0..=1.0).contains(&ch.widen));
            assert!(ch.widen > previous);
            previous = ch.widen;
        }
        assert!((decompose_openness(1.0, &t).widen - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_middle_band_is_linear() {
        let t = defaults();
        let mut previous = -1.0;
        for i in 16..90 {
            let raw = i as f32 * 0.01;
            let ch = decompose_openness(raw, &t);
            assert_eq!(ch.squeeze, 0.0);
            assert_eq!(ch.widen, 0.0);
            assert!(ch.openness > previous);
            let expected = (raw - 0.15) / (0.90 - 0.15);
            assert!((ch.openness - expected).abs() < 1e-6);
            previous = ch.openness;
        }
    }

    #[test]
    fn test_closing_eye_scenario() {
        let ch = decompose_openness(0.05, &defaults());
        assert_eq!(ch.openness, 0.0);
        assert_eq!(ch.widen, 0.0);
        assert!((ch.squeeze - (1.0 - 0.05 / 0.15)).abs() < 1e-6);
        assert!((ch.squeeze - 0.667).abs() < 0.001);
    }

    #[test]
    fn test_wide_eye_scenario() {
        let ch = decompose_openness(0.95, &defaults());
        assert_eq!(ch.openness, 1.0);
        assert_eq!(ch.squeeze, 0.0);
        assert!((ch.widen - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_out_of_range_raw_is_clamped() {
        let t = defaults();
        assert_eq!(decompose_openness(-0.5, &t), decompose_openness(0.0, &t));
        assert_eq!(decompose_openness(1.7, &t), decompose_openness(1.0, &t));
    }

    #[test]
    fn test_look_requires_compensated() {
        let t = defaults();
        let ray = GazeRay::looking(Vector3::new(0.3, -0.2, 1.0));
        let mut out = EyeOutput::default();

        update_eye(&mut out, &ray, Some(0.5), EyeConfidence::Visible, &t);
        assert_eq!(out.look, Vector2::default());

        update_eye(&mut out, &ray, Some(0.5), EyeConfidence::Compensated, &t);
        assert_eq!(out.look, Vector2::new(0.3, -0.2));
    }

    #[test]
    fn test_invalid_eye_holds_on_large_jump() {
        let t = defaults();
        let ray = GazeRay::default();
        let mut out = EyeOutput::default();
        update_eye(&mut out, &ray, Some(0.6), EyeConfidence::Tracked, &t);
        let before = out;

        // Drop to fully closed while untracked: a tracking-loss artifact.
        update_eye(&mut out, &ray, Some(0.0), EyeConfidence::Invalid, &t);
        assert_eq!(out.openness, before.openness);
        assert_eq!(out.squeeze, before.squeeze);
        assert_eq!(out.widen, before.widen);
    }

    #[test]
    fn test_invalid_eye_accepts_small_change() {
        let t = defaults();
        let ray = GazeRay::default();
        let mut out = EyeOutput::default();
        update_eye(&mut out, &ray, Some(0.6), EyeConfidence::Tracked, &t);

        update_eye(&mut out, &ray, Some(0.63), EyeConfidence::Invalid, &t);
        let expected = (0.63 - 0.15) / (0.90 - 0.15);
        assert!((out.openness - expected).abs() < 1e-6);
    }

    #[test]
    fn test_tracked_eye_allows_fast_blink() {
        let t = defaults();
        let ray = GazeRay::default();
        let mut out = EyeOutput::default();
        update_eye(&mut out, &ray, Some(0.8), EyeConfidence::Tracked, &t);
        update_eye(&mut out, &ray, Some(0.0), EyeConfidence::Tracked, &t);
        assert_eq!(out.openness, 0.0);
        assert_eq!(out.squeeze, 1.0);
    }

    #[test]
    fn test_missing_or_nan_openness_keeps_channels() {
        let t = defaults();
        let ray = GazeRay::default();
        let mut out = EyeOutput::default();
        update_eye(&mut out, &ray, Some(0.4), EyeConfidence::Tracked, &t);
        let before = out;

        update_eye(&mut out, &ray, None, EyeConfidence::Tracked, &t);
        assert_eq!(out, before);
        update_eye(&mut out, &ray, Some(f32::NAN), EyeConfidence::Tracked, &t);
        assert_eq!(out, before);
    }

    #[test]
    fn test_squeeze_and_widen_exclusive() {
        let t = defaults();
        for i in 0..=100 {
            let ch = decompose_openness(i as f32 * 0.01, &t);
            assert!(ch.squeeze == 0.0 || ch.widen == 0.0);
        }
    }
}
