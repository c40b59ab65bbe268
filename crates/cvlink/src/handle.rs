//! Ownership of opaque native handles.

use cvlink_ffi_common::RawHandle;

/// A native handle owned by exactly one Rust value.
///
/// The handle can be taken out once for release; afterwards the slot holds
/// the null tombstone, so releasing twice is a no-op.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct OwnedHandle {
    raw: RawHandle,
}

impl OwnedHandle {
    pub fn new(raw: RawHandle) -> Self {
        Self { raw }
    }

    /// The handle, or null once released.
    pub fn get(&self) -> RawHandle {
        self.raw
    }

    pub fn is_released(&self) -> bool {
        self.raw.is_null()
    }

    /// Take the handle for release, leaving the tombstone behind.
    ///
    /// Returns `None` if the handle is null or was already taken.
    pub fn take(&mut self) -> Option<RawHandle> {
        if self.raw.is_null() {
            return None;
        }
        Some(std::mem::take(&mut self.raw))
    }
}

/// A value wrapping a native object.
pub trait NativeObject {
    /// Primary handle of the object, null once released.
    fn ptr(&self) -> RawHandle;

    /// Free the native object. Safe to call more than once.
    fn release(&mut self);
}
