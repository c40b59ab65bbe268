//! Module loading tests: aggregation, working directory discipline and
//! search directory resolution.

mod common;

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use common::{canonical, cwd_guard, touch, FakeLoader};
use cvlink::loader::{
    load_from_system_path, load_modules, resolve_and_load, DynamicLoader, LibraryLoader,
    ModuleOutcome,
};
use cvlink::platform::{Arch, Os, Platform, PointerWidth};
use cvlink::search::SearchContext;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn linux() -> Platform {
    Platform::new(Os::Linux, Arch::X86_64, PointerWidth::Bits64)
}

fn windows(width: PointerWidth) -> Platform {
    let arch = match width {
        PointerWidth::Bits64 => Arch::X86_64,
        PointerWidth::Bits32 => Arch::X86,
    };
    Platform::new(Os::Windows, arch, width)
}

#[test]
fn test_all_modules_loadable() {
    let _lock = cwd_guard();
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), &["libopencv_core.so", "libcvextern.so"]);
    let before = std::env::current_dir().unwrap();

    let mut loader = FakeLoader::default();
    let report = load_modules(
        &mut loader,
        &["libopencv_core.so", "libcvextern.so"],
        tmp.path(),
        &linux(),
    );

    assert!(report.success());
    assert_eq!(loader.calls(), 2);
    assert_eq!(std::env::current_dir().unwrap(), before);
}

#[test]
fn test_working_directory_is_module_directory_during_load() {
    let _lock = cwd_guard();
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), &["libcvextern.so"]);

    let mut loader = FakeLoader::default();
    load_modules(&mut loader, &["libcvextern.so"], tmp.path(), &linux());

    let seen = loader.cwd_seen.lock().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(canonical(&seen[0]), canonical(tmp.path()));
}

#[test]
fn test_missing_module_fails_but_others_attempted() {
    let _lock = cwd_guard();
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), &["liba.so", "libc.so"]);
    let before = std::env::current_dir().unwrap();

    let mut loader = FakeLoader::default();
    let report = load_modules(&mut loader, &["liba.so", "libb.so", "libc.so"], tmp.path(), &linux());

    assert!(!report.success());
    assert_eq!(loader.calls(), 2, "missing file must not reach the loader");
    let outcomes: Vec<_> = report.modules.iter().map(|m| m.outcome.clone()).collect();
    assert_eq!(
        outcomes,
        vec![ModuleOutcome::Loaded, ModuleOutcome::Missing, ModuleOutcome::Loaded]
    );
    assert_eq!(std::env::current_dir().unwrap(), before);
}

#[test]
fn test_load_failure_is_aggregated() {
    let _lock = cwd_guard();
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), &["liba.so", "libb.so", "libc.so"]);

    let mut loader = FakeLoader::failing(&["liba.so"]);
    let report = load_modules(&mut loader, &["liba.so", "libb.so", "libc.so"], tmp.path(), &linux());

    assert!(!report.success());
    assert_eq!(loader.calls(), 3);
    assert!(matches!(report.modules[0].outcome, ModuleOutcome::LoadFailed(_)));
    assert_eq!(report.failures().count(), 1);
}

#[test]
fn test_working_directory_restored_after_load_failure() {
    let _lock = cwd_guard();
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), &["libbroken.so"]);
    let before = std::env::current_dir().unwrap();

    let mut loader = FakeLoader::failing(&["libbroken.so"]);
    let report = load_modules(&mut loader, &["libbroken.so"], tmp.path(), &linux());

    assert!(!report.success());
    assert_eq!(std::env::current_dir().unwrap(), before);
}

struct PanickingLoader;

impl LibraryLoader for PanickingLoader {
    fn load(&mut self, _path: &Path) -> Result<(), String> {
        panic!("native initializer crashed");
    }
}

#[test]
fn test_working_directory_restored_after_panic() {
    let _lock = cwd_guard();
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), &["libcvextern.so"]);
    let before = std::env::current_dir().unwrap();

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut loader = PanickingLoader;
        load_modules(&mut loader, &["libcvextern.so"], tmp.path(), &linux())
    }));

    assert!(result.is_err());
    assert_eq!(std::env::current_dir().unwrap(), before);
}

#[test]
fn test_dynamic_loader_rejects_non_library() {
    let _lock = cwd_guard();
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("libfake.so"), b"not a shared object").unwrap();
    let before = std::env::current_dir().unwrap();

    let mut loader = DynamicLoader::new();
    let report = load_modules(&mut loader, &["libfake.so"], tmp.path(), &linux());

    assert!(!report.success());
    assert!(matches!(report.modules[0].outcome, ModuleOutcome::LoadFailed(_)));
    assert!(loader.is_empty());
    assert_eq!(std::env::current_dir().unwrap(), before);
}

#[test]
fn test_legacy_suffix_stripped_for_32bit() {
    let _lock = cwd_guard();
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), &["opencv_videoio_ffmpeg.dll"]);

    let mut loader = FakeLoader::default();
    let report = load_modules(
        &mut loader,
        &["opencv_videoio_ffmpeg_64.dll"],
        tmp.path(),
        &windows(PointerWidth::Bits32),
    );

    assert!(report.success());
    let loaded = loader.loaded.lock().clone();
    assert!(loaded[0].ends_with("opencv_videoio_ffmpeg.dll"));
}

#[test]
fn test_legacy_suffix_kept_for_64bit() {
    let _lock = cwd_guard();
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), &["opencv_videoio_ffmpeg.dll"]);

    let mut loader = FakeLoader::default();
    let report = load_modules(
        &mut loader,
        &["opencv_videoio_ffmpeg_64.dll"],
        tmp.path(),
        &windows(PointerWidth::Bits64),
    );

    assert!(!report.success());
    assert_eq!(report.modules[0].outcome, ModuleOutcome::Missing);
    assert_eq!(loader.calls(), 0);
}

#[test]
fn test_no_search_directory_means_no_load_attempt() {
    let _lock = cwd_guard();
    let before = std::env::current_dir().unwrap();
    let ctx = SearchContext::new("/nonexistent/cvlink/bin", windows(PointerWidth::Bits64));

    let mut loader = FakeLoader::default();
    let report = resolve_and_load(&mut loader, &["cvextern.dll"], None, &ctx);

    assert!(!report.success());
    assert_eq!(report.search_dir, None);
    assert!(report.modules.is_empty());
    assert!(report.error.is_some());
    assert_eq!(loader.calls(), 0);
    assert_eq!(std::env::current_dir().unwrap(), before);
}

#[test]
fn test_override_directory_used_verbatim() {
    let _lock = cwd_guard();
    let before = std::env::current_dir().unwrap();
    let ctx = SearchContext::new("/nonexistent/cvlink/bin", linux());
    let override_dir = PathBuf::from("/nonexistent/override");

    let mut loader = FakeLoader::default();
    let report = resolve_and_load(&mut loader, &["libcvextern.so"], Some(&override_dir), &ctx);

    assert_eq!(report.search_dir, Some(override_dir.clone()));
    assert_eq!(report.modules[0].path, override_dir.join("libcvextern.so"));
    assert_eq!(report.modules[0].outcome, ModuleOutcome::Missing);
    assert_eq!(std::env::current_dir().unwrap(), before);
}

#[test]
fn test_default_directory_resolved_from_executable_location() {
    let _lock = cwd_guard();
    let tmp = TempDir::new().unwrap();
    let bin = tmp.path().join("bin");
    touch(&bin.join("x64"), &["cvextern.dll"]);

    let ctx = SearchContext::new(&bin, windows(PointerWidth::Bits64));
    let mut loader = FakeLoader::default();
    let report = resolve_and_load(&mut loader, &["cvextern.dll"], None, &ctx);

    assert!(report.success());
    assert_eq!(report.search_dir, Some(bin.join("x64")));
}

#[test]
fn test_load_unmanaged_modules_with_empty_directory() {
    let _lock = cwd_guard();
    let tmp = TempDir::new().unwrap();
    let before = std::env::current_dir().unwrap();

    let mut loader = DynamicLoader::new();
    let ok = cvlink::load_unmanaged_modules(&mut loader, Some(tmp.path()), &["cvextern"]);

    assert!(!ok);
    assert_eq!(std::env::current_dir().unwrap(), before);
}

/// Restores the working directory when dropped.
struct RestoreCwd(PathBuf);

impl Drop for RestoreCwd {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.0);
    }
}

#[test]
fn test_relative_override_recorded_as_given() {
    let _lock = cwd_guard();
    let tmp = TempDir::new().unwrap();
    touch(&tmp.path().join("native"), &["libcvextern.so"]);
    let _restore = RestoreCwd(std::env::current_dir().unwrap());
    std::env::set_current_dir(tmp.path()).unwrap();

    let ctx = SearchContext::new("/nonexistent/cvlink/bin", linux());
    let mut loader = FakeLoader::default();
    let report = resolve_and_load(&mut loader, &["libcvextern.so"], Some(Path::new("native")), &ctx);

    assert!(report.success());
    assert_eq!(report.search_dir, Some(PathBuf::from("native")));
    assert!(report.modules[0].path.is_absolute());
    assert_eq!(
        canonical(&report.modules[0].path),
        canonical(&tmp.path().join("native").join("libcvextern.so"))
    );
}

#[test]
fn test_system_path_loading_uses_bare_names_and_keeps_cwd() {
    let _lock = cwd_guard();
    let before = std::env::current_dir().unwrap();
    let android = Platform::new(Os::Android, Arch::Arm, PointerWidth::Bits32);

    let mut loader = FakeLoader::failing(&["libopencv_core.so"]);
    let report = load_from_system_path(
        &mut loader,
        &["libopencv_videoio_ffmpeg_64.so", "libopencv_core.so", "libcvextern.so"],
        &android,
    );

    assert!(!report.success());
    assert_eq!(report.search_dir, None);
    assert_eq!(
        *loader.loaded.lock(),
        vec![
            PathBuf::from("libopencv_videoio_ffmpeg.so"),
            PathBuf::from("libopencv_core.so"),
            PathBuf::from("libcvextern.so"),
        ]
    );
    assert_eq!(report.failures().count(), 1);
    assert!(loader.cwd_seen.lock().iter().all(|cwd| *cwd == before));
}
