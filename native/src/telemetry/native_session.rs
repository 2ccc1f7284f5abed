//! In-process session against the vendor's native library.

use super::ffi::{self, VarjoEyeMeasurements, VarjoGaze};
use super::platform::VendorLibrary;
use super::types::RawSample;
use super::BackendError;
use crate::config::BackendConfig;
use log::{debug, info, warn};
use std::ffi::c_void;

type VarjoBool = i32;
type SessionInitFn = unsafe extern "C" fn() -> *mut c_void;
type SessionShutDownFn = unsafe extern "C" fn(*mut c_void);
type SessionFn = unsafe extern "C" fn(*mut c_void);
type SessionQueryFn = unsafe extern "C" fn(*mut c_void) -> VarjoBool;
type GetGazeDataFn =
    unsafe extern "C" fn(*mut c_void, *mut VarjoGaze, *mut VarjoEyeMeasurements) -> VarjoBool;

/// Entry points resolved from the vendor library.
struct VarjoApi {
    session_init: SessionInitFn,
    session_shutdown: SessionShutDownFn,
    gaze_init: SessionFn,
    sync_properties: SessionFn,
    is_gaze_allowed: SessionQueryFn,
    is_gaze_calibrated: SessionQueryFn,
    get_gaze_data: GetGazeDataFn,
    // Keeps the function pointers above valid.
    _library: VendorLibrary,
}

impl VarjoApi {
    fn resolve(library: VendorLibrary) -> Result<Self, BackendError> {
        unsafe {
            Ok(Self {
                session_init: std::mem::transmute::<*const c_void, SessionInitFn>(
                    library.symbol("varjo_SessionInit")?,
                ),
                session_shutdown: std::mem::transmute::<*const c_void, SessionShutDownFn>(
                    library.symbol("varjo_SessionShutDown")?,
                ),
                gaze_init: std::mem::transmute::<*const c_void, SessionFn>(
                    library.symbol("varjo_GazeInit")?,
                ),
                sync_properties: std::mem::transmute::<*const c_void, SessionFn>(
                    library.symbol("varjo_SyncProperties")?,
                ),
                is_gaze_allowed: std::mem::transmute::<*const c_void, SessionQueryFn>(
                    library.symbol("varjo_IsGazeAllowed")?,
                ),
                is_gaze_calibrated: std::mem::transmute::<*const c_void, SessionQueryFn>(
                    library.symbol("varjo_IsGazeCalibrated")?,
                ),
                get_gaze_data: std::mem::transmute::<*const c_void, GetGazeDataFn>(
                    library.symbol("varjo_GetGazeData")?,
                ),
                _library: library,
            })
        }
    }
}

pub struct NativeSession {
    config: BackendConfig,
    api: Option<VarjoApi>,
    session: *mut c_void,
    latest: RawSample,
    consecutive_failures: u64,
}

// The session handle is only touched from whichever thread owns the backend.
unsafe impl Send for NativeSession {}

impl NativeSession {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            api: None,
            session: std::ptr::null_mut(),
            latest: RawSample::default(),
            consecutive_failures: 0,
        }
    }

    /// Whether the vendor library exists in the module directory.
    pub fn library_available(config: &BackendConfig) -> bool {
        config.library_path().is_file()
    }

    pub fn is_connected(&self) -> bool {
        self.api.is_some() && !self.session.is_null()
    }

    pub fn connect(&mut self) -> Result<(), BackendError> {
        let path = self.config.library_path();
        if !path.is_file() {
            return Err(BackendError::LibraryMissing(path));
        }

        if !self.config.device_present() {
            return Err(BackendError::DeviceAbsent);
        }

        let library = VendorLibrary::load(&path)?;
        info!("[NATIVE] Loaded library {:?}", path);
        let api = VarjoApi::resolve(library)?;

        let session = unsafe { (api.session_init)() };
        if session.is_null() {
            return Err(BackendError::DeviceAbsent);
        }

        if unsafe { (api.is_gaze_allowed)(session) } == 0 {
            unsafe { (api.session_shutdown)(session) };
            return Err(BackendError::PermissionDenied);
        }

        unsafe {
            (api.gaze_init)(session);
            (api.sync_properties)(session);
        }

        if unsafe { (api.is_gaze_calibrated)(session) } == 0 {
            warn!("[NATIVE] Gaze is not calibrated - run calibration in Varjo Base for accurate data");
        }

        self.session = session;
        self.api = Some(api);
        self.consecutive_failures = 0;
        Ok(())
    }

    /// One blocking read. On failure the previous sample stays untouched.
    pub fn poll(&mut self) -> Result<(), BackendError> {
        let api = match self.api.as_ref() {
            Some(api) if !self.session.is_null() => api,
            _ => return Err(BackendError::NotConnected),
        };

        let mut gaze = VarjoGaze::default();
        let mut measurements = VarjoEyeMeasurements::default();
        let has_data = unsafe { (api.get_gaze_data)(self.session, &mut gaze, &mut measurements) };

        if has_data == 0 {
            self.consecutive_failures += 1;
            if self.consecutive_failures == 1 {
                warn!("[NATIVE] Error while getting gaze data");
            }
            return Err(BackendError::PollFailed(
                "varjo_GetGazeData returned no data".to_string(),
            ));
        }

        if self.consecutive_failures > 0 {
            debug!(
                "[NATIVE] Gaze data recovered after {} failed polls",
                self.consecutive_failures
            );
            self.consecutive_failures = 0;
        }

        self.latest = ffi::to_raw_sample(&gaze, &measurements);
        Ok(())
    }

    pub fn latest(&self) -> &RawSample {
        &self.latest
    }

    pub fn shutdown(&mut self) {
        if let Some(api) = self.api.take() {
            if !self.session.is_null() {
                unsafe { (api.session_shutdown)(self.session) };
            }
            self.session = std::ptr::null_mut();
            info!("[NATIVE] Session shut down");
        }
    }
}

impl Drop for NativeSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
