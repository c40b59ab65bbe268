//! Foreign call surface of the `cvextern` module.
//!
//! Every entry point uses the C calling convention. Handles travel as
//! [`RawHandle`]; numeric parameters map to fixed-width C types. Booleans
//! are NOT uniform: check [`ENTRY_POINTS`] for the encoding each entry point
//! expects.

use std::ffi::c_int;
use std::fmt;
use std::path::{Path, PathBuf};

use cvlink_ffi_common::{c_symbol, Bool32, Bool8, RawHandle};
use libloading::Library;
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::layout::StructSizes;
use crate::tracing::prefix;

/// Exported symbol names.
pub mod symbols {
    pub const GET_STRUCT_SIZES: &str = "cveGetCvStructSizes";
    pub const MOG_CREATE: &str = "CvBackgroundSubtractorMOGCreate";
    pub const MOG_RELEASE: &str = "CvBackgroundSubtractorMOGRelease";
    pub const SET_USE_OPTIMIZED: &str = "cveSetUseOptimized";
    pub const USE_OPTIMIZED: &str = "cveUseOptimized";
    pub const SET_BREAK_ON_ERROR: &str = "cveSetBreakOnError";
}

/// How an entry point encodes booleans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolEncoding {
    /// No boolean parameters or return value
    None,
    /// [`Bool8`]: one byte
    Byte,
    /// [`Bool32`]: four bytes
    Wide,
}

impl BoolEncoding {
    /// Width in bytes, zero when the entry point has no booleans.
    pub const fn width(self) -> usize {
        match self {
            BoolEncoding::None => 0,
            BoolEncoding::Byte => std::mem::size_of::<Bool8>(),
            BoolEncoding::Wide => std::mem::size_of::<Bool32>(),
        }
    }
}

/// Entry points and their boolean encoding.
pub const ENTRY_POINTS: &[(&str, BoolEncoding)] = &[
    (symbols::GET_STRUCT_SIZES, BoolEncoding::None),
    (symbols::MOG_CREATE, BoolEncoding::None),
    (symbols::MOG_RELEASE, BoolEncoding::None),
    (symbols::SET_USE_OPTIMIZED, BoolEncoding::Byte),
    (symbols::USE_OPTIMIZED, BoolEncoding::Byte),
    (symbols::SET_BREAK_ON_ERROR, BoolEncoding::Wide),
];

/// Look up the boolean encoding of an entry point.
pub fn bool_encoding(symbol: &str) -> Option<BoolEncoding> {
    ENTRY_POINTS
        .iter()
        .find(|(name, _)| *name == symbol)
        .map(|&(_, encoding)| encoding)
}

/// Where the entry points are resolved from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum ExternLocation {
    /// A module file; a bare file name goes through the system search path
    File(PathBuf),
    /// Symbols linked into the running executable
    Process,
}

impl fmt::Display for ExternLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternLocation::File(path) => write!(f, "{}", path.display()),
            ExternLocation::Process => f.write_str("<process>"),
        }
    }
}

/// Handles produced by the MOG factory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MogHandles {
    /// Primary handle, passed back to the release call
    pub ptr: RawHandle,
    /// Background subtractor interface
    pub subtractor: RawHandle,
    /// Generic algorithm interface
    pub algorithm: RawHandle,
}

/// The native entry points used by this crate.
///
/// Implemented over a loaded module by [`DynamicCvExtern`]; tests supply
/// their own implementation.
pub trait CvExtern: Send + Sync {
    /// Fill in the native struct sizes.
    fn struct_sizes(&self) -> StructSizes;

    /// Create a Gaussian mixture background subtractor.
    ///
    /// A null `ptr` in the result means the native side failed.
    fn mog_create(
        &self,
        history: i32,
        n_mixtures: i32,
        background_ratio: f64,
        noise_sigma: f64,
    ) -> MogHandles;

    /// Release a subtractor created by [`CvExtern::mog_create`].
    ///
    /// The native side nulls `ptr`.
    ///
    /// # Safety
    /// `ptr` must come from `mog_create` on this surface and not have been
    /// released already.
    unsafe fn mog_release(&self, ptr: &mut RawHandle);

    fn set_use_optimized(&self, on: Bool8);

    fn use_optimized(&self) -> Bool8;

    /// Returns the previous setting.
    fn set_break_on_error(&self, flag: Bool32) -> Bool32;
}

type GetStructSizesFn = unsafe extern "C" fn(*mut StructSizes);
type MogCreateFn =
    unsafe extern "C" fn(c_int, c_int, f64, f64, *mut RawHandle, *mut RawHandle) -> RawHandle;
type MogReleaseFn = unsafe extern "C" fn(*mut RawHandle);
type SetUseOptimizedFn = unsafe extern "C" fn(Bool8);
type UseOptimizedFn = unsafe extern "C" fn() -> Bool8;
type SetBreakOnErrorFn = unsafe extern "C" fn(Bool32) -> Bool32;

/// [`CvExtern`] over a dynamically loaded `cvextern` module.
pub struct DynamicCvExtern {
    path: PathBuf,
    get_struct_sizes: GetStructSizesFn,
    mog_create: MogCreateFn,
    mog_release: MogReleaseFn,
    set_use_optimized: SetUseOptimizedFn,
    use_optimized: UseOptimizedFn,
    set_break_on_error: SetBreakOnErrorFn,
    // Keeps the function pointers above valid; must be dropped last.
    _library: Library,
}

impl DynamicCvExtern {
    /// Open the module at `path` and resolve every entry point.
    ///
    /// `path` may be a bare file name, in which case the system search path
    /// is used.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        // SAFETY: see `DynamicLoader::load`.
        let library = unsafe { Library::new(path) }.map_err(|source| Error::Library {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_library(library, path.to_path_buf())
    }

    /// Resolve the entry points from the running executable.
    pub fn open_process() -> Result<Self> {
        #[cfg(unix)]
        let library = Library::from(libloading::os::unix::Library::this());
        #[cfg(windows)]
        let library = Library::from(libloading::os::windows::Library::this().map_err(
            |source| Error::Library {
                path: PathBuf::new(),
                source,
            },
        )?);
        Self::from_library(library, PathBuf::new())
    }

    /// Open whatever `location` names.
    pub fn open_location(location: &ExternLocation) -> Result<Self> {
        match location {
            ExternLocation::File(path) => Self::open(path),
            ExternLocation::Process => Self::open_process(),
        }
    }

    fn from_library(library: Library, path: PathBuf) -> Result<Self> {
        // SAFETY: each symbol is declared with its native signature, and the
        // pointers never outlive `library`, which is stored alongside them.
        unsafe {
            let get_struct_sizes = resolve::<GetStructSizesFn>(&library, symbols::GET_STRUCT_SIZES)?;
            let mog_create = resolve::<MogCreateFn>(&library, symbols::MOG_CREATE)?;
            let mog_release = resolve::<MogReleaseFn>(&library, symbols::MOG_RELEASE)?;
            let set_use_optimized =
                resolve::<SetUseOptimizedFn>(&library, symbols::SET_USE_OPTIMIZED)?;
            let use_optimized = resolve::<UseOptimizedFn>(&library, symbols::USE_OPTIMIZED)?;
            let set_break_on_error =
                resolve::<SetBreakOnErrorFn>(&library, symbols::SET_BREAK_ON_ERROR)?;

            debug!("{} Resolved native entry points from {}", prefix::LOAD, path.display());

            Ok(Self {
                path,
                get_struct_sizes,
                mog_create,
                mog_release,
                set_use_optimized,
                use_optimized,
                set_break_on_error,
                _library: library,
            })
        }
    }

    /// Path the module was opened from; empty for the process image.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

unsafe fn resolve<T: Copy>(library: &Library, symbol: &'static str) -> Result<T> {
    let name = c_symbol(symbol).map_err(|e| Error::Config(e.to_string()))?;
    let sym = unsafe { library.get::<T>(name.as_bytes_with_nul()) }
        .map_err(|source| Error::Symbol { symbol, source })?;
    Ok(*sym)
}

impl CvExtern for DynamicCvExtern {
    fn struct_sizes(&self) -> StructSizes {
        let mut sizes = StructSizes::default();
        unsafe { (self.get_struct_sizes)(&mut sizes) };
        sizes
    }

    fn mog_create(
        &self,
        history: i32,
        n_mixtures: i32,
        background_ratio: f64,
        noise_sigma: f64,
    ) -> MogHandles {
        let mut handles = MogHandles::default();
        handles.ptr = unsafe {
            (self.mog_create)(
                history,
                n_mixtures,
                background_ratio,
                noise_sigma,
                &mut handles.subtractor,
                &mut handles.algorithm,
            )
        };
        handles
    }

    unsafe fn mog_release(&self, ptr: &mut RawHandle) {
        unsafe { (self.mog_release)(ptr) };
    }

    fn set_use_optimized(&self, on: Bool8) {
        unsafe { (self.set_use_optimized)(on) };
    }

    fn use_optimized(&self) -> Bool8 {
        unsafe { (self.use_optimized)() }
    }

    fn set_break_on_error(&self, flag: Bool32) -> Bool32 {
        unsafe { (self.set_break_on_error)(flag) }
    }
}

impl std::fmt::Debug for DynamicCvExtern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicCvExtern")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
