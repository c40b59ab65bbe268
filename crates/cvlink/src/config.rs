//! Loader configuration.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::module_name::{default_modules, EXTERN_MODULE};
use crate::platform::Platform;

/// Overrides the module search directory.
pub const ENV_LOAD_DIR: &str = "CVLINK_LOAD_DIR";
/// Comma-separated logical module names to load.
pub const ENV_MODULES: &str = "CVLINK_MODULES";
/// Set to `1` or `true` to skip the struct size check.
pub const ENV_SKIP_LAYOUT_CHECK: &str = "CVLINK_SKIP_LAYOUT_CHECK";

/// Inputs to native library initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Explicit search directory, used verbatim when set
    pub load_directory: Option<PathBuf>,
    /// Logical module names, loaded in order
    pub modules: Vec<String>,
    /// Logical name of the module exporting the entry points
    pub extern_module: String,
    /// Run the struct size check after loading
    pub validate_layout: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            load_directory: None,
            modules: default_modules(Platform::current().os),
            extern_module: EXTERN_MODULE.to_string(),
            validate_layout: true,
        }
    }
}

impl LoaderConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (environment-shaped).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup(ENV_LOAD_DIR).filter(|d| !d.trim().is_empty()) {
            config.load_directory = Some(PathBuf::from(dir));
        }

        if let Some(list) = lookup(ENV_MODULES) {
            config.modules = list.split(',').map(|m| m.trim().to_string()).collect();
        }

        if let Some(flag) = lookup(ENV_SKIP_LAYOUT_CHECK) {
            config.validate_layout = !matches!(flag.trim(), "1" | "true" | "TRUE" | "yes");
        }

        config.validated()
    }

    pub fn with_load_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.load_directory = Some(dir.into());
        self
    }

    pub fn with_modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modules = modules.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_validate_layout(mut self, validate: bool) -> Self {
        self.validate_layout = validate;
        self
    }

    /// Drop empty module names and reject an empty list.
    pub fn validated(mut self) -> Result<Self> {
        self.modules.retain(|m| !m.trim().is_empty());
        if self.modules.is_empty() {
            return Err(Error::Config("module list is empty".to_string()));
        }
        if self.extern_module.trim().is_empty() {
            return Err(Error::Config("extern module name is empty".to_string()));
        }
        Ok(self)
    }
}
