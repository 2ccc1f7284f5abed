//! Mirror of the gaze structure published by the companion process.

use super::ffi::{self, CompanionRegion};
use super::platform::MappedRegion;
use super::types::RawSample;
use super::BackendError;
use crate::config::BackendConfig;
use log::{debug, error, info, warn};
use std::io;
use std::process::{Child, Command};
use std::ptr::{addr_of, addr_of_mut};
use std::thread;
use std::time::Duration;

/// Copies attempted before accepting a copy taken during a concurrent write.
const MAX_CONSISTENT_READ_ATTEMPTS: u32 = 3;

/// Retry `open` until it succeeds, fails for a reason other than `NotFound`,
/// or the attempt budget runs out. Sleeps `delay` after every missed attempt,
/// so the default budget waits 5 x 500 ms before giving up.
pub fn open_with_retry<T, F>(
    name: &str,
    attempts: u32,
    delay: Duration,
    mut open: F,
) -> Result<T, BackendError>
where
    F: FnMut() -> io::Result<T>,
{
    let attempts = attempts.max(1);

    for attempt in 1..=attempts {
        match open() {
            Ok(value) => return Ok(value),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(
                    "[COMPANION] {} mapped file doesn't exist yet (attempt {}/{})",
                    name, attempt, attempts
                );
            }
            Err(e) => {
                error!("[COMPANION] Could not open the mapped file: {}", e);
                return Err(BackendError::Io(e));
            }
        }

        thread::sleep(delay);
    }

    Err(BackendError::ConnectionTimeout {
        name: name.to_string(),
        attempts,
    })
}

/// Copy the region, re-reading while the frame number changes underneath the copy.
///
/// The companion writes without any lock, so this narrows but cannot close
/// the torn-read window.
///
/// # Safety
/// `ptr` must point to a readable `CompanionRegion`.
pub unsafe fn read_region(ptr: *const CompanionRegion) -> CompanionRegion {
    let mut copy = std::ptr::read_volatile(ptr);

    for _ in 1..MAX_CONSISTENT_READ_ATTEMPTS {
        let frame_after = addr_of!((*ptr).gaze.frame_number).read_volatile();
        if frame_after == copy.gaze.frame_number {
            break;
        }
        copy = std::ptr::read_volatile(ptr);
    }

    copy
}

type RegionOpener = Box<dyn FnMut(&str) -> io::Result<MappedRegion> + Send>;

pub struct CompanionSession {
    config: BackendConfig,
    open_region: RegionOpener,
    region: Option<MappedRegion>,
    process: Option<Child>,
    latest: RawSample,
    reported_calibration: bool,
}

impl CompanionSession {
    pub fn new(config: BackendConfig) -> Self {
        Self::with_region_opener(config, MappedRegion::open)
    }

    /// Use `open` instead of the OS mapping lookup when connecting.
    pub(crate) fn with_region_opener<F>(config: BackendConfig, open: F) -> Self
    where
        F: FnMut(&str) -> io::Result<MappedRegion> + Send + 'static,
    {
        Self {
            config,
            open_region: Box::new(open),
            region: None,
            process: None,
            latest: RawSample::default(),
            reported_calibration: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.region.is_some()
    }

    pub fn connect(&mut self) -> Result<(), BackendError> {
        if !self.config.device_present() {
            return Err(BackendError::DeviceAbsent);
        }

        if !self.config.require_running_companion {
            self.launch_companion()?;
        }

        let name = self.config.shared_memory_name.clone();
        let open_region = &mut self.open_region;
        let result = open_with_retry(
            &name,
            self.config.connect_attempts,
            self.config.connect_retry_delay(),
            || open_region(&name),
        );

        match result {
            Ok(region) => {
                info!("[COMPANION] Opened shared memory {}", name);
                self.region = Some(region);
                Ok(())
            }
            Err(e) => {
                self.stop_companion();
                Err(e)
            }
        }
    }

    fn launch_companion(&mut self) -> Result<(), BackendError> {
        let module_dir = self.config.module_dir();
        let path = self.config.companion_path();

        let child = Command::new(&path)
            .current_dir(&module_dir)
            .spawn()
            .map_err(|source| BackendError::Launch {
                path: path.clone(),
                source,
            })?;

        info!("[COMPANION] Launched {:?} (pid {})", path, child.id());
        self.process = Some(child);
        Ok(())
    }

    /// Copy the whole region into the latest sample.
    pub fn poll(&mut self) -> Result<(), BackendError> {
        let region = self.region.as_ref().ok_or(BackendError::NotConnected)?;
        let ptr = region.as_ptr();
        if ptr.is_null() {
            return Err(BackendError::NotConnected);
        }

        let data = unsafe { read_region(ptr) };

        if !self.reported_calibration {
            self.reported_calibration = true;
            if data.calibrated == 0 {
                warn!("[COMPANION] Companion reports gaze is not calibrated");
            }
        }

        self.latest = ffi::to_raw_sample(&data.gaze, &data.measurements);
        Ok(())
    }

    pub fn latest(&self) -> &RawSample {
        &self.latest
    }

    fn stop_companion(&mut self) {
        if let Some(mut child) = self.process.take() {
            if let Err(e) = child.kill() {
                debug!("[COMPANION] Companion already exited: {}", e);
            }
            let _ = child.wait();
            info!("[COMPANION] Companion process stopped");
        }
    }

    /// Ask the companion to exit, then kill it and release the mapping.
    pub fn shutdown(&mut self) {
        if let Some(region) = self.region.as_ref() {
            let ptr = region.as_ptr();
            if !ptr.is_null() {
                unsafe { addr_of_mut!((*ptr).shutdown).write_volatile(1) };
            }
        }

        self.stop_companion();

        if self.region.take().is_some() {
            info!("[COMPANION] Shared memory released");
        }
    }
}

impl Drop for CompanionSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::path::PathBuf;

    #[test]
    fn test_retry_exhausts_budget() {
        let calls = Cell::new(0);
        let result: Result<(), BackendError> =
            open_with_retry("VarjoEyeTracking", 5, Duration::ZERO, || {
                calls.set(calls.get() + 1);
                Err(io::Error::from(io::ErrorKind::NotFound))
            });

        assert_eq!(calls.get(), 5);
        assert!(matches!(
            result,
            Err(BackendError::ConnectionTimeout { attempts: 5, .. })
        ));
    }

    #[test]
    fn test_retry_waits_after_every_miss() {
        let started = std::time::Instant::now();
        let result: Result<(), BackendError> =
            open_with_retry("VarjoEyeTracking", 3, Duration::from_millis(5), || {
                Err(io::Error::from(io::ErrorKind::NotFound))
            });

        assert!(result.is_err());
        assert!(started.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn test_retry_succeeds_late() {
        let calls = Cell::new(0);
        let result = open_with_retry("VarjoEyeTracking", 5, Duration::ZERO, || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(io::Error::from(io::ErrorKind::NotFound))
            } else {
                Ok(calls.get())
            }
        });

        assert_eq!(result.expect("third attempt should open"), 3);
    }

    #[test]
    fn test_retry_stops_on_other_errors() {
        let calls = Cell::new(0);
        let result: Result<(), BackendError> =
            open_with_retry("VarjoEyeTracking", 5, Duration::ZERO, || {
                calls.set(calls.get() + 1);
                Err(io::Error::from(io::ErrorKind::PermissionDenied))
            });

        assert_eq!(calls.get(), 1);
        assert!(matches!(result, Err(BackendError::Io(_))));
    }

    #[test]
    fn test_read_region_copies_fields() {
        let mut region = Box::new(CompanionRegion::default());
        region.calibrated = 1;
        region.gaze.frame_number = 12;
        region.gaze.left_status = 3;
        region.measurements.left_eye_openness = 0.6;

        let copy = unsafe { read_region(&*region) };
        assert_eq!(copy.calibrated, 1);
        assert_eq!(copy.gaze.frame_number, 12);
        assert_eq!(copy.measurements.left_eye_openness, 0.6);
    }

    #[test]
    fn test_connect_without_device() {
        let config = BackendConfig {
            device_probe_path: PathBuf::from("/nonexistent/varjo/InfoService"),
            ..Default::default()
        };
        let mut session = CompanionSession::new(config);
        assert!(matches!(session.connect(), Err(BackendError::DeviceAbsent)));
        assert!(!session.is_connected());
        assert!(matches!(session.poll(), Err(BackendError::NotConnected)));
    }
}
