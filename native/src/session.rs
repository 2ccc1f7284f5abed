use crate::acquisition::AcquisitionManager;
use crate::normalization::{EyeTrackingData, NormalizationPipeline};
use arc_swap::ArcSwap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Latest published output. The polling task is the only writer; readers may
/// see a value one frame old.
pub type SharedTrackingData = Arc<ArcSwap<EyeTrackingData>>;

pub type SharedSession = Arc<Mutex<TrackingSession>>;

pub fn new_shared_output() -> SharedTrackingData {
    Arc::new(ArcSwap::from_pointee(EyeTrackingData::default()))
}

/// Acquisition and normalization state for one tracking session.
pub struct TrackingSession {
    pub acquisition: AcquisitionManager,
    pub pipeline: NormalizationPipeline,
    working: EyeTrackingData,
    output: SharedTrackingData,
}

impl TrackingSession {
    pub fn new(
        acquisition: AcquisitionManager,
        pipeline: NormalizationPipeline,
        output: SharedTrackingData,
    ) -> Self {
        Self {
            acquisition,
            pipeline,
            working: EyeTrackingData::default(),
            output,
        }
    }

    pub fn into_shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    /// Poll once and publish the normalized result.
    ///
    /// Returns false without touching the output when no backend is active.
    pub fn tick(&mut self) -> bool {
        match self.acquisition.update() {
            Some(sample) => {
                self.pipeline.update(sample, &mut self.working);
                self.output.store(Arc::new(self.working));
                true
            }
            None => false,
        }
    }

    pub fn working(&self) -> &EyeTrackingData {
        &self.working
    }
}

/// Lock the session even if a previous holder panicked.
pub fn lock_session(session: &Mutex<TrackingSession>) -> MutexGuard<'_, TrackingSession> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}
