use crate::telemetry::ffi::CompanionRegion;
use crate::telemetry::BackendError;
use std::ffi::c_void;
use std::io;
use std::path::Path;

/// Placeholder for targets without the vendor runtime.
pub struct VendorLibrary {
    _private: (),
}

impl VendorLibrary {
    pub fn load(_path: &Path) -> Result<Self, BackendError> {
        Err(BackendError::Unsupported)
    }

    pub fn symbol(&self, _name: &str) -> Result<*const c_void, BackendError> {
        Err(BackendError::Unsupported)
    }
}

pub struct MappedRegion {
    _private: (),
}

impl MappedRegion {
    pub fn open(name: &str) -> io::Result<Self> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("named shared memory '{}' is only available on Windows", name),
        ))
    }

    pub fn as_ptr(&self) -> *mut CompanionRegion {
        std::ptr::null_mut()
    }
}
