//! Marshaling primitives shared by the cvlink native bindings.
//!
//! This crate holds the few value types that cross the C boundary
//! unchanged, so every binding crate agrees on their width and layout.
//!
//! # Handles
//!
//! Native objects are referenced through [`RawHandle`], an address-sized
//! token the Rust side never dereferences. The null handle is the tombstone
//! for "no object".
//!
//! # Booleans
//!
//! The native library is not consistent about how it passes booleans:
//! - [`Bool8`] is a single byte (C++ `bool`)
//! - [`Bool32`] is a 4-byte integer (C `int` used as a flag)
//!
//! Each entry point documents which one it takes. Never pass one where the
//! other is expected.

use std::ffi::{c_void, CString, NulError};
use std::fmt;

/// Opaque, address-sized reference to native state.
///
/// The value is only ever forwarded back to the native library.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(*mut c_void);

// Handles are tokens; any synchronization is the native object's concern.
unsafe impl Send for RawHandle {}
unsafe impl Sync for RawHandle {}

impl RawHandle {
    /// The tombstone handle.
    pub const NULL: RawHandle = RawHandle(std::ptr::null_mut());

    /// Wrap a raw pointer returned by the native side.
    #[inline]
    pub const fn from_ptr(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.0.is_null()
    }

    #[inline]
    pub const fn as_ptr(self) -> *mut c_void {
        self.0
    }

    /// Address of the handle, for diagnostics only.
    #[inline]
    pub fn addr(self) -> usize {
        self.0 as usize
    }
}

impl Default for RawHandle {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Debug for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawHandle({:#x})", self.addr())
    }
}

/// Single-byte boolean (C++ `bool`).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bool8(pub u8);

impl Bool8 {
    pub const TRUE: Bool8 = Bool8(1);
    pub const FALSE: Bool8 = Bool8(0);
}

impl From<bool> for Bool8 {
    #[inline]
    fn from(value: bool) -> Self {
        Bool8(value as u8)
    }
}

impl From<Bool8> for bool {
    #[inline]
    fn from(value: Bool8) -> Self {
        value.0 != 0
    }
}

/// 4-byte boolean (C `int` flag).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bool32(pub i32);

impl Bool32 {
    pub const TRUE: Bool32 = Bool32(1);
    pub const FALSE: Bool32 = Bool32(0);
}

impl From<bool> for Bool32 {
    #[inline]
    fn from(value: bool) -> Self {
        Bool32(value as i32)
    }
}

impl From<Bool32> for bool {
    #[inline]
    fn from(value: Bool32) -> Self {
        value.0 != 0
    }
}

/// Build a null-terminated symbol name for dynamic lookup.
///
/// Fails if the name contains an interior null byte.
#[inline]
pub fn c_symbol(name: &str) -> Result<CString, NulError> {
    CString::new(name)
}
