//! Logging setup for the snapdoc CLI.
//!
//! The library crates only emit `tracing` events; this module installs the
//! subscriber that prints them. Logs go to stderr so `--json` output on
//! stdout stays machine-readable.
//!
//! ```rust,no_run
//! use snapdoc_cli::logger::init_logger;
//!
//! init_logger(false, false, false);
//! tracing::info!("healing");
//! ```

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const SNAPDOC_TARGETS: &[&str] = &[
    "snapdoc_graph",
    "snapdoc_bundler",
    "snapdoc_doctor",
    "snapdoc_runtime",
    "snapdoc_cli",
    "snapdoc",
];

fn directives(level: &str) -> String {
    SNAPDOC_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Filter for the given verbosity flags.
///
/// 1. `verbose`: debug for snapdoc crates
/// 2. `quiet`: errors only
/// 3. `RUST_LOG`, when set
/// 4. info for snapdoc crates
pub fn log_filter(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(directives("debug"))
    } else if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives("info")))
    }
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    init_logger_with_filter(log_filter(verbose, quiet), no_color);
}

/// Install the global subscriber with an explicit filter.
pub fn init_logger_with_filter(filter: EnvFilter, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
