//! Search directory resolution for native modules.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::platform::{join_subfolder, Platform};
use crate::tracing::prefix;

/// Environment inputs for resolving the module directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchContext {
    /// Directory containing the running executable
    pub exe_dir: PathBuf,
    pub platform: Platform,
}

impl SearchContext {
    pub fn new(exe_dir: impl Into<PathBuf>, platform: Platform) -> Self {
        Self {
            exe_dir: exe_dir.into(),
            platform,
        }
    }

    /// Context for the running process.
    pub fn current() -> Result<Self> {
        let exe = std::env::current_exe()?;
        let exe_dir = exe
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::Config(format!("executable {} has no parent", exe.display())))?;
        Ok(Self::new(exe_dir, Platform::current()))
    }

    /// Executable directory joined with the platform subfolder.
    pub fn default_directory(&self) -> PathBuf {
        join_subfolder(self.exe_dir.clone(), self.platform.profile().subfolder)
    }

    /// Every directory considered, in order: default first, then fallbacks.
    ///
    /// Duplicates are removed, keeping the first occurrence.
    pub fn candidate_directories(&self) -> Vec<PathBuf> {
        let profile = self.platform.profile();
        let mut candidates = vec![self.default_directory()];
        for layout in profile.fallbacks {
            if let Some(dir) = layout.apply(&self.exe_dir, profile.subfolder) {
                if !candidates.contains(&dir) {
                    candidates.push(dir);
                }
            }
        }
        candidates
    }
}

/// Pick the directory native modules are loaded from.
///
/// An explicit `override_dir` is returned verbatim, whether or not it
/// exists. Otherwise the first existing candidate wins; if none exists the
/// error lists every path tried.
pub fn determine_search_directory(
    override_dir: Option<&Path>,
    ctx: &SearchContext,
) -> Result<PathBuf> {
    if let Some(dir) = override_dir {
        debug!("{} Using explicit module directory {}", prefix::LOAD, dir.display());
        return Ok(dir.to_path_buf());
    }

    let candidates = ctx.candidate_directories();
    for dir in &candidates {
        if dir.is_dir() {
            info!("{} Loading native modules from {}", prefix::LOAD, dir.display());
            return Ok(dir.clone());
        }
        debug!("{} Candidate {} does not exist", prefix::LOAD, dir.display());
    }

    Err(Error::NoSearchDirectory { tried: candidates })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Arch, Os, PointerWidth};
    use std::collections::HashSet;
    use std::fs;
    use tempfile::TempDir;

    fn linux() -> Platform {
        Platform::new(Os::Linux, Arch::X86_64, PointerWidth::Bits64)
    }

    fn windows_x64() -> Platform {
        Platform::new(Os::Windows, Arch::X86_64, PointerWidth::Bits64)
    }

    #[test]
    fn test_override_used_verbatim_even_if_missing() {
        let ctx = SearchContext::new("/nonexistent/bin", linux());
        let dir = determine_search_directory(Some(Path::new("/no/such/dir")), &ctx).unwrap();
        assert_eq!(dir, PathBuf::from("/no/such/dir"));
    }

    #[test]
    fn test_default_directory_includes_subfolder_on_windows() {
        let ctx = SearchContext::new("/opt/app", windows_x64());
        assert_eq!(ctx.default_directory(), PathBuf::from("/opt/app/x64"));
    }

    #[test]
    fn test_existing_default_directory_wins() {
        let tmp = TempDir::new().unwrap();
        let ctx = SearchContext::new(tmp.path(), linux());
        let dir = determine_search_directory(None, &ctx).unwrap();
        assert_eq!(dir, tmp.path());
    }

    #[test]
    fn test_falls_back_to_plugins_layout() {
        let tmp = TempDir::new().unwrap();
        let bin = tmp.path().join("app").join("bin");
        fs::create_dir_all(&bin).unwrap();
        fs::create_dir_all(tmp.path().join("app").join("Plugins")).unwrap();

        // Default x64 subfolder is missing, so fallbacks are consulted.
        let ctx = SearchContext::new(&bin, windows_x64());
        let dir = determine_search_directory(None, &ctx).unwrap();
        assert!(dir.ends_with("Plugins"), "got {}", dir.display());
        assert!(dir.is_dir());
    }

    #[test]
    fn test_fallback_order_prefers_lib_over_plugins() {
        let tmp = TempDir::new().unwrap();
        let bin = tmp.path().join("bin");
        fs::create_dir_all(&bin).unwrap();
        fs::create_dir_all(tmp.path().join("lib").join("x64")).unwrap();
        fs::create_dir_all(tmp.path().join("Plugins")).unwrap();

        let ctx = SearchContext::new(&bin, windows_x64());
        let dir = determine_search_directory(None, &ctx).unwrap();
        assert!(dir.ends_with("lib/x64"), "got {}", dir.display());
    }

    #[test]
    fn test_no_candidate_exists_fails() {
        let ctx = SearchContext::new("/nonexistent/cvlink/app/bin", windows_x64());
        let err = determine_search_directory(None, &ctx).unwrap_err();
        match err {
            Error::NoSearchDirectory { tried } => {
                assert_eq!(tried[0], PathBuf::from("/nonexistent/cvlink/app/bin/x64"));
                assert!(tried.len() > 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_candidates_are_unique() {
        // A real directory makes the resolved executable directory equal the
        // default one.
        let tmp = TempDir::new().unwrap();
        let ctx = SearchContext::new(tmp.path().canonicalize().unwrap(), linux());
        let candidates = ctx.candidate_directories();
        let unique: HashSet<&PathBuf> = candidates.iter().collect();
        assert_eq!(candidates.len(), unique.len());
    }
}
