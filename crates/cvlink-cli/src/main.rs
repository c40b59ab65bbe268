//! cvlink probe - native library diagnostics
//!
//! Resolves and loads the cvextern modules the same way the library does,
//! runs the struct size check and prints the outcome.
//!
//! Usage:
//!     cvlink-probe
//!     cvlink-probe --dir /opt/cvextern/lib --module opencv_world --module cvextern
//!     cvlink-probe --json

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use cvlink::bgsegm::{BackgroundSubtractorMog, MogParams};
use cvlink::loader::ModuleOutcome;
use cvlink::{LoaderConfig, NativeObject, RuntimeStatus};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "cvlink-probe")]
#[command(about = "Load the cvextern native library and report the outcome")]
#[command(version)]
struct Args {
    /// Directory to load native modules from (skips directory resolution)
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Logical module name to load, in order (repeatable)
    #[arg(short, long = "module")]
    modules: Vec<String>,

    /// Logical name of the module exporting the entry points
    #[arg(long)]
    extern_module: Option<String>,

    /// Skip the struct size check
    #[arg(long)]
    no_layout_check: bool,

    /// Create and release a MOG background subtractor after loading
    #[arg(long)]
    create_mog: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Log level (debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Args {
    fn config(&self) -> Result<LoaderConfig, cvlink::Error> {
        let mut config = LoaderConfig::from_env()?;
        if let Some(dir) = &self.dir {
            config = config.with_load_directory(dir);
        }
        if !self.modules.is_empty() {
            config = config.with_modules(self.modules.iter().cloned());
        }
        if let Some(name) = &self.extern_module {
            config.extern_module = name.clone();
        }
        if self.no_layout_check {
            config = config.with_validate_layout(false);
        }
        config.validated()
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    // RUST_LOG takes precedence over --log-level.
    let log_level = match args.log_level.as_str() {
        "debug" | "info" | "warn" | "error" => args.log_level.as_str(),
        _ => "warn",
    };
    cvlink::tracing::init_with_filter(log_level);

    let config = match args.config() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::from(2);
        }
    };
    info!("Probing native modules {:?}", config.modules);

    let status = RuntimeStatus::initialize(config);

    if args.json {
        match serde_json::to_string_pretty(&status.summary()) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                error!("Failed to serialize report: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_report(&status);
    }

    if !status.library_loaded() || status.sanity_check() == Some(false) {
        return ExitCode::FAILURE;
    }

    if args.create_mog {
        if let Err(e) = create_mog(&status) {
            error!("MOG background subtractor: {}", e);
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}

fn create_mog(status: &RuntimeStatus) -> cvlink::Result<()> {
    let mut mog = BackgroundSubtractorMog::with_api(status.native()?, MogParams::default())?;
    info!("Created {:?}", mog);
    mog.release();
    println!("MOG background subtractor: created and released");
    Ok(())
}

fn print_report(status: &RuntimeStatus) {
    let report = status.load_report();
    match &report.search_dir {
        Some(dir) => println!("Search directory: {}", dir.display()),
        None => println!("Search directory: <none>"),
    }
    if let Some(err) = &report.error {
        println!("  {err}");
    }

    for module in &report.modules {
        let outcome = match &module.outcome {
            ModuleOutcome::Loaded => "loaded".to_string(),
            ModuleOutcome::Missing => "missing".to_string(),
            ModuleOutcome::LoadFailed(reason) => format!("failed ({reason})"),
        };
        println!("  {:<40} {}", module.name, outcome);
    }

    if let Some(layout) = status.layout_report() {
        for check in layout.mismatches() {
            println!(
                "  {:<16} native {} bytes, local {} bytes",
                check.name, check.native, check.local
            );
        }
    }

    println!("Library loaded: {}", status.library_loaded());
    match status.sanity_check() {
        Some(sane) => println!("Struct sizes match: {sane}"),
        None => println!("Struct sizes match: not checked"),
    }
}
