//! Element depth codes and their Rust element types.

use std::mem::size_of;

use serde::Serialize;

use crate::error::{Error, Result};

/// Number of bits used by the depth code inside a matrix type.
const DEPTH_SHIFT: i32 = 3;
const DEPTH_MASK: i32 = (1 << DEPTH_SHIFT) - 1;

/// Element depth of a native matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(i32)]
pub enum DepthType {
    Cv8U = 0,
    Cv8S = 1,
    Cv16U = 2,
    Cv16S = 3,
    Cv32S = 4,
    Cv32F = 5,
    Cv64F = 6,
}

impl DepthType {
    /// Parse a native depth code.
    pub fn from_code(code: i32) -> Result<Self> {
        Ok(match code {
            0 => DepthType::Cv8U,
            1 => DepthType::Cv8S,
            2 => DepthType::Cv16U,
            3 => DepthType::Cv16S,
            4 => DepthType::Cv32S,
            5 => DepthType::Cv32F,
            6 => DepthType::Cv64F,
            other => {
                return Err(Error::Config(format!(
                    "unable to convert code {other} to depth type"
                )))
            }
        })
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    /// Size in bytes of one element of this depth.
    pub fn element_size(self) -> usize {
        match self {
            DepthType::Cv8U | DepthType::Cv8S => 1,
            DepthType::Cv16U | DepthType::Cv16S => 2,
            DepthType::Cv32S | DepthType::Cv32F => 4,
            DepthType::Cv64F => 8,
        }
    }

    /// Depth of a matrix type code built by [`make_type`].
    pub fn of_type(mat_type: i32) -> Result<Self> {
        Self::from_code(mat_type & DEPTH_MASK)
    }
}

/// Rust types usable as native matrix elements.
pub trait Element: Copy + 'static {
    const DEPTH: DepthType;
}

macro_rules! impl_element {
    ($($ty:ty => $depth:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DEPTH: DepthType = DepthType::$depth;
            }
        )*
    };
}

impl_element! {
    u8 => Cv8U,
    i8 => Cv8S,
    u16 => Cv16U,
    i16 => Cv16S,
    i32 => Cv32S,
    f32 => Cv32F,
    f64 => Cv64F,
}

/// Depth code for the element type `T`.
pub fn depth_of<T: Element>() -> DepthType {
    debug_assert_eq!(size_of::<T>(), T::DEPTH.element_size());
    T::DEPTH
}

/// Combine a depth and a channel count into a matrix type code.
pub fn make_type(depth: DepthType, channels: i32) -> i32 {
    (depth.code() & DEPTH_MASK) + ((channels - 1) << DEPTH_SHIFT)
}

/// Number of channels encoded in a matrix type code.
pub fn channels_of_type(mat_type: i32) -> i32 {
    ((mat_type >> DEPTH_SHIFT) & 0x1ff) + 1
}
