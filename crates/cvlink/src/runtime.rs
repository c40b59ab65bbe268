//! Process-wide, one-time native library initialization.
//!
//! The first call to [`init`] or [`status`] resolves the module directory,
//! loads every module, opens the entry points and checks struct layouts.
//! The outcome is cached for the life of the process; nothing is retried.
//!
//! If loading fails, the layout check is skipped. If either fails,
//! [`native`] refuses to hand out the entry points.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::LoaderConfig;
use crate::error::{Error, Result};
use crate::layout::{self, LayoutReport};
use crate::loader::{
    absolutize, load_from_system_path, resolve_and_load, DynamicLoader, LibraryLoader, LoadReport,
};
use crate::module_name::{adjust_for_pointer_width, module_file_names, resolve_module_file_name};
use crate::native::{CvExtern, DynamicCvExtern, ExternLocation};
use crate::platform::{LoadStrategy, Platform};
use crate::search::SearchContext;
use crate::tracing::prefix;

static RUNTIME: OnceLock<RuntimeStatus> = OnceLock::new();

/// Opens the entry points at a location.
pub type ExternOpener = dyn Fn(&ExternLocation) -> Result<Arc<dyn CvExtern>>;

/// Outcome of native library initialization.
pub struct RuntimeStatus {
    platform: Option<Platform>,
    strategy: Option<LoadStrategy>,
    report: LoadReport,
    extern_location: Option<ExternLocation>,
    extern_error: Option<String>,
    api: Option<Arc<dyn CvExtern>>,
    layout: Option<LayoutReport>,
    // Loaded modules stay mapped while the status lives.
    _loader: Box<dyn LibraryLoader + Send + Sync>,
}

struct NoLoader;

impl LibraryLoader for NoLoader {
    fn load(&mut self, _path: &Path) -> std::result::Result<(), String> {
        Err("loading disabled".to_string())
    }
}

impl RuntimeStatus {
    /// Initialize for the running process with the system loader.
    pub fn initialize(config: LoaderConfig) -> Self {
        let ctx = match SearchContext::current() {
            Ok(ctx) => ctx,
            Err(e) => return Self::failed(e),
        };
        Self::initialize_with(
            config,
            &ctx,
            Box::new(DynamicLoader::new()),
            &|location: &ExternLocation| {
                Ok(Arc::new(DynamicCvExtern::open_location(location)?) as Arc<dyn CvExtern>)
            },
        )
    }

    /// Initialize with an explicit environment, loader and extern opener.
    pub fn initialize_with(
        config: LoaderConfig,
        ctx: &SearchContext,
        mut loader: Box<dyn LibraryLoader + Send + Sync>,
        open_extern: &ExternOpener,
    ) -> Self {
        let platform = ctx.platform;
        let strategy = platform.profile().strategy;
        let files = module_file_names(&config.modules, platform.os);
        let extern_file = adjust_for_pointer_width(
            &resolve_module_file_name(&config.extern_module, platform.os),
            &platform,
        );
        let load_directory = config.load_directory.as_deref();

        let (report, extern_location) = match (strategy, load_directory) {
            (LoadStrategy::Directory, _) | (LoadStrategy::SystemLibraries, Some(_)) => {
                let report = resolve_and_load(loader.as_mut(), &files, load_directory, ctx);
                let location = report
                    .search_dir
                    .as_deref()
                    .map(|dir| ExternLocation::File(absolutize(dir).join(&extern_file)));
                (report, location)
            }
            (LoadStrategy::SystemLibraries, None) => {
                let report = load_from_system_path(loader.as_mut(), &files, &platform);
                (report, Some(ExternLocation::File(PathBuf::from(&extern_file))))
            }
            (LoadStrategy::OnDemand, _) => {
                info!("{} Skipping explicit module preload on {:?}", prefix::LOAD, platform.os);
                let path = match load_directory {
                    Some(dir) => dir.join(&extern_file),
                    None => PathBuf::from(&extern_file),
                };
                let report = LoadReport {
                    search_dir: config.load_directory.clone(),
                    modules: Vec::new(),
                    error: None,
                };
                (report, Some(ExternLocation::File(path)))
            }
            (LoadStrategy::Static, _) => {
                info!("{} Native library is linked into the executable", prefix::LOAD);
                (LoadReport::default(), Some(ExternLocation::Process))
            }
        };

        let mut status = Self {
            platform: Some(platform),
            strategy: Some(strategy),
            report,
            extern_location,
            extern_error: None,
            api: None,
            layout: None,
            _loader: loader,
        };

        if !status.modules_loaded() {
            warn!("{} Native modules failed to load; skipping layout check", prefix::LOAD);
            return status;
        }

        let Some(location) = status.extern_location.clone() else {
            return status;
        };
        match open_extern(&location) {
            Ok(api) => {
                if config.validate_layout {
                    let report = layout::validate(&api.struct_sizes());
                    if !report.is_sane() {
                        error!(
                            "{} Struct layout mismatch; native interop disabled",
                            prefix::ABI
                        );
                    }
                    status.layout = Some(report);
                }
                status.api = Some(api);
            }
            Err(e) => {
                warn!("{} {}", prefix::LOAD, e);
                status.extern_error = Some(e.to_string());
            }
        }

        status
    }

    /// Status for an initialization that could not start.
    pub fn failed(err: Error) -> Self {
        warn!("{} Native initialization failed: {}", prefix::LOAD, err);
        Self {
            platform: None,
            strategy: None,
            report: LoadReport {
                search_dir: None,
                modules: Vec::new(),
                error: Some(err.to_string()),
            },
            extern_location: None,
            extern_error: None,
            api: None,
            layout: None,
            _loader: Box::new(NoLoader),
        }
    }

    fn modules_loaded(&self) -> bool {
        match self.strategy {
            Some(LoadStrategy::Directory | LoadStrategy::SystemLibraries) => self.report.success(),
            Some(LoadStrategy::OnDemand) => self.report.error.is_none(),
            Some(LoadStrategy::Static) => true,
            None => false,
        }
    }

    /// True if every module loaded and the entry points were resolved.
    pub fn library_loaded(&self) -> bool {
        self.modules_loaded() && self.api.is_some()
    }

    /// Result of the struct size check; `None` when it did not run.
    pub fn sanity_check(&self) -> Option<bool> {
        self.layout.as_ref().map(LayoutReport::is_sane)
    }

    pub fn load_report(&self) -> &LoadReport {
        &self.report
    }

    pub fn layout_report(&self) -> Option<&LayoutReport> {
        self.layout.as_ref()
    }

    /// The entry points, if initialization fully succeeded.
    pub fn native(&self) -> Result<Arc<dyn CvExtern>> {
        let api = match (&self.api, self.modules_loaded()) {
            (Some(api), true) => api,
            _ => return Err(Error::NotLoaded),
        };
        if let Some(layout) = &self.layout {
            if !layout.is_sane() {
                return Err(Error::AbiMismatch(layout.mismatch_names()));
            }
        }
        Ok(Arc::clone(api))
    }

    /// Serializable snapshot for diagnostics.
    pub fn summary(&self) -> StatusSummary<'_> {
        StatusSummary {
            platform: self.platform,
            strategy: self.strategy,
            load: &self.report,
            extern_location: self.extern_location.as_ref(),
            extern_error: self.extern_error.as_deref(),
            layout: self.layout.as_ref(),
            library_loaded: self.library_loaded(),
            sanity_check: self.sanity_check(),
        }
    }
}

/// Diagnostics view of a [`RuntimeStatus`].
#[derive(Debug, Serialize)]
pub struct StatusSummary<'a> {
    pub platform: Option<Platform>,
    pub strategy: Option<LoadStrategy>,
    pub load: &'a LoadReport,
    pub extern_location: Option<&'a ExternLocation>,
    pub extern_error: Option<&'a str>,
    pub layout: Option<&'a LayoutReport>,
    pub library_loaded: bool,
    pub sanity_check: Option<bool>,
}

/// Initialize once with `config`.
///
/// Later calls return the first result; their config is ignored.
pub fn init(config: LoaderConfig) -> &'static RuntimeStatus {
    let mut fresh = false;
    let status = RUNTIME.get_or_init(|| {
        fresh = true;
        RuntimeStatus::initialize(config)
    });
    if !fresh {
        warn!("{} Native runtime already initialized; config ignored", prefix::LOAD);
    }
    status
}

/// The cached status, initializing from the environment on first use.
pub fn status() -> &'static RuntimeStatus {
    RUNTIME.get_or_init(|| match LoaderConfig::from_env() {
        Ok(config) => RuntimeStatus::initialize(config),
        Err(e) => RuntimeStatus::failed(e),
    })
}

/// True if the native library was loaded for this process.
pub fn library_loaded() -> bool {
    status().library_loaded()
}

/// Struct size check result for this process.
pub fn sanity_check() -> Option<bool> {
    status().sanity_check()
}

/// Entry points for this process.
pub fn native() -> Result<Arc<dyn CvExtern>> {
    status().native()
}
