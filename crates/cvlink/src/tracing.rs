//! Logging setup with cvlink segment prefixes.
//!
//! The library itself only emits `tracing` events; applications decide
//! whether and how to install a subscriber.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing with cvlink defaults.
///
/// Sets up tracing-subscriber with:
/// - Environment filter (RUST_LOG)
/// - Compact format on stderr
pub fn init() {
    init_with_filter("info");
}

/// Initialize tracing with a custom default filter.
///
/// Does nothing if a global subscriber is already installed.
pub fn init_with_filter(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}

/// Segment prefixes for log lines.
pub mod prefix {
    /// Module resolution and loading
    pub const LOAD: &str = "⇲";
    /// Struct layout validation
    pub const ABI: &str = "≡";
    /// Native object lifetime
    pub const HANDLE: &str = "◇";
}
