//! Safe wrappers over native runtime switches.
//!
//! Each wrapper converts Rust `bool` to the encoding its entry point
//! expects: `cveSetUseOptimized`/`cveUseOptimized` take one byte,
//! `cveSetBreakOnError` takes a 4-byte int.

use cvlink_ffi_common::{Bool32, Bool8};

use crate::error::Result;
use crate::native::CvExtern;
use crate::runtime;

/// Enable or disable optimized (SIMD) code paths in the native library.
pub fn set_use_optimized(on: bool) -> Result<()> {
    set_use_optimized_on(runtime::native()?.as_ref(), on);
    Ok(())
}

/// Whether optimized code paths are enabled.
pub fn use_optimized() -> Result<bool> {
    Ok(use_optimized_on(runtime::native()?.as_ref()))
}

/// Make native errors break into the debugger. Returns the previous value.
pub fn set_break_on_error(flag: bool) -> Result<bool> {
    Ok(set_break_on_error_on(runtime::native()?.as_ref(), flag))
}

pub fn set_use_optimized_on(api: &dyn CvExtern, on: bool) {
    api.set_use_optimized(Bool8::from(on));
}

pub fn use_optimized_on(api: &dyn CvExtern) -> bool {
    api.use_optimized().into()
}

pub fn set_break_on_error_on(api: &dyn CvExtern, flag: bool) -> bool {
    api.set_break_on_error(Bool32::from(flag)).into()
}
