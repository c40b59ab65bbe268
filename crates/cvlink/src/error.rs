//! Error types for native library binding.

use std::path::PathBuf;

use thiserror::Error;

/// Common error type for cvlink operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// None of the candidate directories for native modules exist
    #[error("no suitable directory found to load native modules (tried {})", display_paths(.tried))]
    NoSearchDirectory { tried: Vec<PathBuf> },

    /// A native module could not be opened
    #[error("cannot load native module {}: {source}", .path.display())]
    Library {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    /// A native entry point is missing from the loaded module
    #[error("native entry point {symbol} not found: {source}")]
    Symbol {
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },

    /// Native modules were not loaded during initialization
    #[error("native library is not loaded")]
    NotLoaded,

    /// Local struct mirrors disagree with the loaded native library
    #[error("struct layout mismatch with native library: {}", .0.join(", "))]
    AbiMismatch(Vec<String>),

    /// A native factory call returned no object
    #[error("native construction failed: {0}")]
    Construction(String),
}

/// Result type alias using cvlink Error.
pub type Result<T> = std::result::Result<T, Error>;

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "nothing".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
