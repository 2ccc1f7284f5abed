use crate::telemetry::ffi::CompanionRegion;
use crate::telemetry::BackendError;
use std::ffi::{c_void, CString, OsStr};
use std::io;
use std::iter::once;
use std::os::windows::ffi::OsStrExt;
use std::path::Path;
use windows::core::{PCSTR, PCWSTR};
use windows::Win32::Foundation::{CloseHandle, FreeLibrary, HANDLE, HMODULE};
use windows::Win32::System::LibraryLoader::{GetProcAddress, LoadLibraryW};
use windows::Win32::System::Memory::{
    MapViewOfFile, OpenFileMappingW, UnmapViewOfFile, FILE_MAP_ALL_ACCESS,
    MEMORY_MAPPED_VIEW_ADDRESS,
};

fn to_wide(value: &OsStr) -> Vec<u16> {
    value.encode_wide().chain(once(0)).collect()
}

/// Keep the Win32 code from the error itself so `NotFound` survives the conversion.
fn to_io_error(error: windows::core::Error) -> io::Error {
    let code = error.code().0 as u32;
    // HRESULT_FROM_WIN32 puts Win32 codes under facility 7.
    if code & 0xFFFF_0000 == 0x8007_0000 {
        io::Error::from_raw_os_error((code & 0xFFFF) as i32)
    } else {
        io::Error::new(io::ErrorKind::Other, error.message())
    }
}

/// A loaded vendor DLL. Unloaded on drop.
pub struct VendorLibrary {
    module: HMODULE,
}

impl VendorLibrary {
    pub fn load(path: &Path) -> Result<Self, BackendError> {
        let wide = to_wide(path.as_os_str());
        let module = unsafe { LoadLibraryW(PCWSTR(wide.as_ptr())) }.map_err(|e| {
            BackendError::LibraryLoad(format!("Unable to load library {:?}: {}", path, e))
        })?;

        Ok(Self { module })
    }

    /// Resolve an exported symbol.
    pub fn symbol(&self, name: &str) -> Result<*const c_void, BackendError> {
        let cname = CString::new(name)
            .map_err(|_| BackendError::LibraryLoad(format!("Invalid symbol name {}", name)))?;

        let proc = unsafe { GetProcAddress(self.module, PCSTR(cname.as_ptr() as *const u8)) };

        match proc {
            Some(f) => Ok(f as *const c_void),
            None => Err(BackendError::LibraryLoad(format!(
                "Missing export {}: {}",
                name,
                io::Error::last_os_error()
            ))),
        }
    }
}

impl Drop for VendorLibrary {
    fn drop(&mut self) {
        let _ = unsafe { FreeLibrary(self.module) };
    }
}

// The module handle is process-wide and only used from the polling thread.
unsafe impl Send for VendorLibrary {}

/// Read/write view of the companion's named mapping.
pub struct MappedRegion {
    mapping: HANDLE,
    view: MEMORY_MAPPED_VIEW_ADDRESS,
}

impl MappedRegion {
    /// Open an existing mapping. A missing mapping surfaces as `ErrorKind::NotFound`.
    pub fn open(name: &str) -> io::Result<Self> {
        let wide = to_wide(OsStr::new(name));

        let mapping = unsafe { OpenFileMappingW(FILE_MAP_ALL_ACCESS.0, false, PCWSTR(wide.as_ptr())) }
            .map_err(to_io_error)?;

        let view = unsafe {
            MapViewOfFile(
                mapping,
                FILE_MAP_ALL_ACCESS,
                0,
                0,
                std::mem::size_of::<CompanionRegion>(),
            )
        };

        if view.Value.is_null() {
            let err = io::Error::last_os_error();
            let _ = unsafe { CloseHandle(mapping) };
            return Err(err);
        }

        Ok(Self { mapping, view })
    }

    pub fn as_ptr(&self) -> *mut CompanionRegion {
        self.view.Value as *mut CompanionRegion
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        unsafe {
            let _ = UnmapViewOfFile(self.view);
            let _ = CloseHandle(self.mapping);
        }
    }
}

unsafe impl Send for MappedRegion {}
