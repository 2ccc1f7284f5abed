//! Hardware-free telemetry source for diagnostics and tests.

use super::types::{EyeConfidence, EyeMeasurements, GazeRay, RawSample, Vector3};
use super::BackendError;
use std::collections::VecDeque;

/// Period of the synthetic blink cycle, in polls.
const BLINK_PERIOD: i64 = 400;
const BLINK_LENGTH: i64 = 12;

enum Source {
    /// Replays samples in order, then keeps returning the last one.
    Script(VecDeque<Result<RawSample, String>>),
    Synthetic,
}

pub struct SimulatedSession {
    source: Source,
    connected: bool,
    frame: i64,
    latest: RawSample,
}

impl SimulatedSession {
    /// Slow saccades with a periodic blink.
    pub fn synthetic() -> Self {
        Self::with_source(Source::Synthetic)
    }

    pub fn scripted(samples: impl IntoIterator<Item = RawSample>) -> Self {
        Self::with_source(Source::Script(samples.into_iter().map(Ok).collect()))
    }

    /// A script whose `Err` entries fail the corresponding poll.
    pub fn scripted_with_failures(
        steps: impl IntoIterator<Item = Result<RawSample, String>>,
    ) -> Self {
        Self::with_source(Source::Script(steps.into_iter().collect()))
    }

    fn with_source(source: Source) -> Self {
        Self {
            source,
            connected: false,
            frame: 0,
            latest: RawSample::default(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn connect(&mut self) -> Result<(), BackendError> {
        self.connected = true;
        Ok(())
    }

    pub fn poll(&mut self) -> Result<(), BackendError> {
        if !self.connected {
            return Err(BackendError::NotConnected);
        }

        self.frame += 1;
        match &mut self.source {
            Source::Script(steps) => {
                // Keep the final step so a long run holds the last sample.
                let step = if steps.len() > 1 {
                    steps.pop_front()
                } else {
                    steps.front().cloned()
                };

                match step {
                    Some(Ok(sample)) => self.latest = sample,
                    Some(Err(message)) => return Err(BackendError::PollFailed(message)),
                    None => {}
                }
            }
            Source::Synthetic => self.latest = synthetic_sample(self.frame),
        }
        Ok(())
    }

    pub fn latest(&self) -> &RawSample {
        &self.latest
    }

    pub fn shutdown(&mut self) {
        self.connected = false;
    }
}

fn synthetic_sample(frame: i64) -> RawSample {
    let t = frame as f64 * 0.01;
    let forward = Vector3::new(0.3 * (t * 0.7).sin(), 0.15 * (t * 1.3).sin(), 1.0);
    let ray = GazeRay::looking(forward);

    let phase = frame % BLINK_PERIOD;
    let openness = if phase < BLINK_LENGTH {
        let half = BLINK_LENGTH as f32 / 2.0;
        ((phase as f32 - half).abs() / half) * 0.8
    } else {
        0.8
    };
    let pupil = 3.5 + 1.0 * (t * 0.05).sin() as f32;

    RawSample {
        left_ray: ray,
        right_ray: ray,
        left_status: EyeConfidence::Tracked,
        right_status: EyeConfidence::Tracked,
        combined_ray: ray,
        combined_status: EyeConfidence::Tracked,
        focus_distance: 1.0,
        stability: 1.0,
        frame_number: frame,
        capture_time: frame * 10_000_000,
        measurements: Some(EyeMeasurements {
            left_openness: openness,
            right_openness: openness,
            left_pupil_diameter_mm: pupil,
            right_pupil_diameter_mm: pupil,
            left_iris_diameter_mm: 11.5,
            right_iris_diameter_mm: 11.5,
            left_pupil_iris_ratio: pupil / 11.5,
            right_pupil_iris_ratio: pupil / 11.5,
            inter_pupillary_distance_mm: 63.0,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_holds_last_sample() {
        let first = RawSample {
            frame_number: 1,
            ..Default::default()
        };
        let second = RawSample {
            frame_number: 2,
            ..Default::default()
        };
        let mut session = SimulatedSession::scripted([first, second]);
        session.connect().expect("simulated connect");

        session.poll().expect("poll");
        assert_eq!(session.latest().frame_number, 1);
        session.poll().expect("poll");
        assert_eq!(session.latest().frame_number, 2);
        session.poll().expect("poll");
        assert_eq!(session.latest().frame_number, 2);
    }

    #[test]
    fn test_failed_step_keeps_previous_sample() {
        let good = RawSample {
            frame_number: 5,
            ..Default::default()
        };
        let mut session =
            SimulatedSession::scripted_with_failures([Ok(good), Err("dropout".to_string()), Ok(good)]);
        session.connect().expect("simulated connect");

        session.poll().expect("poll");
        assert!(matches!(session.poll(), Err(BackendError::PollFailed(_))));
        assert_eq!(session.latest().frame_number, 5);
    }

    #[test]
    fn test_poll_requires_connect() {
        let mut session = SimulatedSession::synthetic();
        assert!(matches!(session.poll(), Err(BackendError::NotConnected)));
        session.connect().expect("simulated connect");
        assert!(session.poll().is_ok());
    }

    #[test]
    fn test_synthetic_values_in_range() {
        for frame in 0..BLINK_PERIOD * 2 {
            let sample = synthetic_sample(frame);
            let m = sample.measurements.expect("measurements");
            assert!((0.0..=1.0).contains(&m.left_openness));
            assert!(m.left_pupil_diameter_mm > 0.0);
        }
    }
}
