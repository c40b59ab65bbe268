//! Process-wide runtime initialization.
//!
//! Kept in its own test binary so the cached status starts empty. Everything
//! runs in one test because the cache is shared by the whole process.

use std::path::PathBuf;

use cvlink::{runtime, Error, LoaderConfig};
use pretty_assertions::assert_eq;

#[test]
fn test_first_initialization_is_cached_for_the_process() {
    let first_dir = PathBuf::from("/nonexistent/cvlink/global/first");
    let first = runtime::init(LoaderConfig::default().with_load_directory(&first_dir));

    let second = runtime::init(
        LoaderConfig::default()
            .with_load_directory("/nonexistent/cvlink/global/second")
            .with_validate_layout(false),
    );

    assert!(std::ptr::eq(first, second));
    assert!(std::ptr::eq(first, runtime::status()));
    assert_eq!(second.load_report().search_dir, Some(first_dir));

    assert!(!runtime::library_loaded());
    assert_eq!(runtime::sanity_check(), None);
    assert!(matches!(runtime::native(), Err(Error::NotLoaded)));
    assert!(matches!(
        cvlink::invoke::use_optimized(),
        Err(Error::NotLoaded)
    ));
}
