//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::ffi::c_void;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cvlink::layout::StructSizes;
use cvlink::loader::LibraryLoader;
use cvlink::native::{CvExtern, MogHandles};
use cvlink::{Bool32, Bool8, RawHandle};
use parking_lot::{Mutex, MutexGuard};

static CWD_TEST_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// Serialize tests that observe or change the working directory.
pub fn cwd_guard() -> MutexGuard<'static, ()> {
    CWD_TEST_LOCK.lock()
}

/// Create empty files standing in for native modules.
pub fn touch(dir: &Path, names: &[&str]) {
    fs::create_dir_all(dir).unwrap();
    for name in names {
        fs::write(dir.join(name), b"").unwrap();
    }
}

pub fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Loader that records what it was asked to load.
#[derive(Clone, Default)]
pub struct FakeLoader {
    /// File names that fail to load
    pub fail: Vec<String>,
    /// Paths passed to `load`, in order
    pub loaded: Arc<Mutex<Vec<PathBuf>>>,
    /// Working directory observed during each `load`
    pub cwd_seen: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeLoader {
    pub fn failing(names: &[&str]) -> Self {
        Self {
            fail: names.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.loaded.lock().len()
    }
}

impl LibraryLoader for FakeLoader {
    fn load(&mut self, path: &Path) -> Result<(), String> {
        self.loaded.lock().push(path.to_path_buf());
        if let Ok(cwd) = std::env::current_dir() {
            self.cwd_seen.lock().push(cwd);
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if self.fail.contains(&name) {
            Err(format!("{name}: invalid ELF header"))
        } else {
            Ok(())
        }
    }
}

/// Entry point surface with controllable struct sizes.
pub struct FakeExtern {
    pub sizes: StructSizes,
    pub creates: AtomicUsize,
    pub releases: AtomicUsize,
}

impl FakeExtern {
    pub fn matching() -> Self {
        Self::with_sizes(StructSizes::local())
    }

    pub fn with_sizes(sizes: StructSizes) -> Self {
        Self {
            sizes,
            creates: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
        }
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl CvExtern for FakeExtern {
    fn struct_sizes(&self) -> StructSizes {
        self.sizes
    }

    fn mog_create(&self, _: i32, _: i32, _: f64, _: f64) -> MogHandles {
        let n = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        MogHandles {
            ptr: RawHandle::from_ptr((0x1000 * n) as *mut c_void),
            subtractor: RawHandle::from_ptr((0x1000 * n + 8) as *mut c_void),
            algorithm: RawHandle::from_ptr((0x1000 * n + 16) as *mut c_void),
        }
    }

    unsafe fn mog_release(&self, ptr: &mut RawHandle) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        *ptr = RawHandle::NULL;
    }

    fn set_use_optimized(&self, _on: Bool8) {}

    fn use_optimized(&self) -> Bool8 {
        Bool8::TRUE
    }

    fn set_break_on_error(&self, _flag: Bool32) -> Bool32 {
        Bool32::FALSE
    }
}
