//! Loading native modules into the process.
//!
//! Every requested module is attempted even after a failure; the overall
//! result is the logical AND of the individual outcomes. While loading, the
//! working directory points at the module directory so that dependent
//! modules resolve from there, and it is restored on every exit path.

use std::path::{Path, PathBuf};

use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use tracing::{debug, warn};

use crate::module_name::{adjust_for_pointer_width, module_file_names};
use crate::platform::Platform;
use crate::search::{determine_search_directory, SearchContext};
use crate::tracing::prefix;

/// Serializes working directory changes across concurrent loads.
static WORKING_DIR_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// Something that can map a native module into the process.
pub trait LibraryLoader {
    /// Load the module at `path`. The error is a human-readable reason.
    fn load(&mut self, path: &Path) -> Result<(), String>;
}

/// Loader backed by the system dynamic linker.
///
/// Loaded modules stay mapped for as long as the loader lives.
#[derive(Debug, Default)]
pub struct DynamicLoader {
    libraries: Vec<libloading::Library>,
}

impl DynamicLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of modules currently held open.
    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }
}

impl LibraryLoader for DynamicLoader {
    fn load(&mut self, path: &Path) -> Result<(), String> {
        // SAFETY: module initializers run on load; the native library is
        // trusted to be the one the binding was built against.
        let library = unsafe { libloading::Library::new(path) }.map_err(|e| e.to_string())?;
        self.libraries.push(library);
        Ok(())
    }
}

/// Changes the working directory and restores it on drop.
pub struct WorkingDirGuard {
    previous: Option<PathBuf>,
    _lock: MutexGuard<'static, ()>,
}

impl WorkingDirGuard {
    /// Enter `dir`.
    ///
    /// If the current directory cannot be read or `dir` cannot be entered,
    /// the guard is inert and the working directory is left as it was.
    pub fn enter(dir: &Path) -> Self {
        let lock = WORKING_DIR_LOCK.lock();
        let previous = match std::env::current_dir() {
            Ok(cwd) => match std::env::set_current_dir(dir) {
                Ok(()) => Some(cwd),
                Err(e) => {
                    warn!(
                        "{} Cannot enter {}: {}; loading from {}",
                        prefix::LOAD,
                        dir.display(),
                        e,
                        cwd.display()
                    );
                    None
                }
            },
            Err(e) => {
                warn!("{} Cannot read working directory: {}", prefix::LOAD, e);
                None
            }
        };
        Self {
            previous,
            _lock: lock,
        }
    }

    /// True if the working directory was changed.
    pub fn is_active(&self) -> bool {
        self.previous.is_some()
    }
}

impl Drop for WorkingDirGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            if let Err(e) = std::env::set_current_dir(&previous) {
                warn!(
                    "{} Failed to restore working directory {}: {}",
                    prefix::LOAD,
                    previous.display(),
                    e
                );
            }
        }
    }
}

/// Result of loading a single module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ModuleOutcome {
    Loaded,
    Missing,
    LoadFailed(String),
}

impl ModuleOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, ModuleOutcome::Loaded)
    }
}

/// One module attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleReport {
    /// File name as requested
    pub name: String,
    /// Full path that was tried
    pub path: PathBuf,
    pub outcome: ModuleOutcome,
}

/// Outcome of a whole load pass.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct LoadReport {
    /// Directory modules were loaded from, as given; `None` if resolution
    /// failed or the system linker path was used
    pub search_dir: Option<PathBuf>,
    pub modules: Vec<ModuleReport>,
    /// Resolution failure message, if any
    pub error: Option<String>,
}

impl LoadReport {
    /// True only if every module loaded from a resolved directory or the
    /// system linker path.
    pub fn success(&self) -> bool {
        self.error.is_none()
            && (self.search_dir.is_some() || !self.modules.is_empty())
            && self.modules.iter().all(|m| m.outcome.is_loaded())
    }

    /// Modules that did not load.
    pub fn failures(&self) -> impl Iterator<Item = &ModuleReport> {
        self.modules.iter().filter(|m| !m.outcome.is_loaded())
    }
}

/// Load `modules` (file names) from `dir`.
///
/// Each name has the 32-bit legacy suffix rule applied before the path is
/// built. A missing file is recorded without trying to load it. The report
/// keeps `dir` as given; module paths are absolute.
pub fn load_modules<L: LibraryLoader + ?Sized, S: AsRef<str>>(
    loader: &mut L,
    modules: &[S],
    dir: &Path,
    platform: &Platform,
) -> LoadReport {
    let requested = dir.to_path_buf();
    // Paths must not depend on the working directory we are about to change.
    let dir = absolutize(dir);
    let dir = dir.as_path();
    let _cwd = WorkingDirGuard::enter(dir);
    debug!("{} Loading native modules from {}", prefix::LOAD, dir.display());

    let mut reports = Vec::with_capacity(modules.len());
    for module in modules {
        let name = adjust_for_pointer_width(module.as_ref(), platform);
        let path = dir.join(&name);

        let outcome = if !path.exists() {
            warn!("{} File {} does not exist", prefix::LOAD, path.display());
            ModuleOutcome::Missing
        } else {
            match loader.load(&path) {
                Ok(()) => {
                    debug!("{} Loaded {}", prefix::LOAD, path.display());
                    ModuleOutcome::Loaded
                }
                Err(reason) => {
                    warn!(
                        "{} File {} cannot be loaded: {}",
                        prefix::LOAD,
                        path.display(),
                        reason
                    );
                    ModuleOutcome::LoadFailed(reason)
                }
            }
        };

        reports.push(ModuleReport {
            name: module.as_ref().to_string(),
            path,
            outcome,
        });
    }

    LoadReport {
        search_dir: Some(requested),
        modules: reports,
        error: None,
    }
}

/// Load `modules` (file names) through the system linker search path.
///
/// No directory is resolved and the working directory is left alone; the
/// linker decides where each file comes from.
pub fn load_from_system_path<L: LibraryLoader + ?Sized, S: AsRef<str>>(
    loader: &mut L,
    modules: &[S],
    platform: &Platform,
) -> LoadReport {
    let mut reports = Vec::with_capacity(modules.len());
    for module in modules {
        let path = PathBuf::from(adjust_for_pointer_width(module.as_ref(), platform));
        debug!("{} Trying to load {}", prefix::LOAD, path.display());
        let outcome = match loader.load(&path) {
            Ok(()) => ModuleOutcome::Loaded,
            Err(reason) => {
                warn!("{} Failed to load {}: {}", prefix::LOAD, path.display(), reason);
                ModuleOutcome::LoadFailed(reason)
            }
        };
        reports.push(ModuleReport {
            name: module.as_ref().to_string(),
            path,
            outcome,
        });
    }

    LoadReport {
        search_dir: None,
        modules: reports,
        error: None,
    }
}

pub(crate) fn absolutize(dir: &Path) -> PathBuf {
    if dir.is_absolute() {
        return dir.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(dir))
        .unwrap_or_else(|_| dir.to_path_buf())
}

/// Resolve the module directory, then load every module from it.
///
/// An override is recorded in the report exactly as passed. When no
/// directory can be resolved the report carries the error and no load is
/// attempted.
pub fn resolve_and_load<L: LibraryLoader + ?Sized, S: AsRef<str>>(
    loader: &mut L,
    modules: &[S],
    override_dir: Option<&Path>,
    ctx: &SearchContext,
) -> LoadReport {
    match determine_search_directory(override_dir, ctx) {
        Ok(dir) => load_modules(loader, modules, &dir, &ctx.platform),
        Err(e) => {
            warn!("{} {}", prefix::LOAD, e);
            LoadReport {
                search_dir: None,
                modules: Vec::new(),
                error: Some(e.to_string()),
            }
        }
    }
}

/// Load logical modules for the running process into `loader`.
///
/// Names are mapped to platform file names first. Returns true only if
/// every module loaded.
pub fn load_unmanaged_modules<S: AsRef<str>>(
    loader: &mut DynamicLoader,
    load_directory: Option<&Path>,
    modules: &[S],
) -> bool {
    let ctx = match SearchContext::current() {
        Ok(ctx) => ctx,
        Err(e) => {
            warn!("{} {}", prefix::LOAD, e);
            return false;
        }
    };
    let files = module_file_names(modules, ctx.platform.os);
    resolve_and_load(loader, &files, load_directory, &ctx).success()
}
