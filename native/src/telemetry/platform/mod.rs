// OS bindings for library loading and named shared memory.
// Only Windows has a vendor runtime; other targets build a fallback that
// reports `Unsupported` so the pipeline still compiles and tests everywhere.

#[cfg(windows)]
mod win32;
#[cfg(windows)]
pub use win32::{MappedRegion, VendorLibrary};

#[cfg(not(windows))]
mod fallback;
#[cfg(not(windows))]
pub use fallback::{MappedRegion, VendorLibrary};
