//! Background segmentation algorithms.
//!
//! Each algorithm is a native object; the Rust value owns it and frees it
//! on drop.

mod mog;

pub use mog::{BackgroundSubtractorMog, MogParams};

use cvlink_ffi_common::RawHandle;

use crate::handle::NativeObject;

/// A native background subtractor.
///
/// The auxiliary handles are for passing to other native entry points that
/// take the generic algorithm or subtractor interface. They become null
/// once the object is released.
pub trait BackgroundSubtractor: NativeObject {
    fn algorithm_ptr(&self) -> RawHandle;

    fn background_subtractor_ptr(&self) -> RawHandle;
}
