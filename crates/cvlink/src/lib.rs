//! # cvlink
//!
//! Rust bindings to the `cvextern` computer-vision library.
//!
//! This crate does not implement vision algorithms; it makes the native
//! library usable safely:
//! - **runtime**: one-time resolution, loading and ABI validation
//! - **platform** / **module_name** / **search** / **loader**: how native
//!   modules are named, found and loaded on each platform
//! - **layout**: `#[repr(C)]` mirrors and the struct size sanity check
//! - **native**: the foreign entry points
//! - **bgsegm**: owned wrappers around native background subtractors
//! - **depth**: element depth codes for native matrices
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cvlink::bgsegm::{BackgroundSubtractorMog, MogParams};
//!
//! let status = cvlink::runtime::init(cvlink::LoaderConfig::default());
//! if !status.library_loaded() {
//!     eprintln!("{:?}", status.load_report());
//! }
//! let mog = BackgroundSubtractorMog::new(MogParams::default())?;
//! ```

pub mod bgsegm;
pub mod config;
pub mod depth;
pub mod error;
pub mod handle;
pub mod invoke;
pub mod layout;
pub mod loader;
pub mod module_name;
pub mod native;
pub mod platform;
pub mod runtime;
pub mod search;
pub mod tracing;

// Re-export commonly used items at crate root
pub use config::LoaderConfig;
pub use cvlink_ffi_common::{Bool32, Bool8, RawHandle};
pub use error::{Error, Result};
pub use handle::{NativeObject, OwnedHandle};
pub use loader::{load_unmanaged_modules, LoadReport, ModuleOutcome};
pub use module_name::resolve_module_file_name;
pub use native::ExternLocation;
pub use platform::{LoadStrategy, Os, Platform};
pub use runtime::RuntimeStatus;
