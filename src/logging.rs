//! Logging infrastructure.
//!
//! Structured logging via the `log` facade with an `env_logger` backend.
//! Log levels are determined by (in priority order):
//!
//! 1. `RUST_LOG` environment variable (if set)
//! 2. CLI flags: `--quiet` (errors only) or `-v`/`-vv`
//! 3. Default: info level

use env_logger::Builder;
use log::LevelFilter;
use std::env;

/// Initialize the logging subsystem from CLI verbosity flags.
///
/// Call once at process start, before any logging calls.
///
/// # Panics
///
/// Panics if called more than once; `env_logger` can only be installed
/// once per process.
pub fn init_logging(verbose: u8, quiet: bool) {
    let mut builder = Builder::new();

    if env::var("RUST_LOG").is_ok() {
        builder.parse_default_env();
    } else {
        builder.filter_level(determine_level(verbose, quiet));
    }

    builder.init();
}

/// Map CLI flags to a level filter.
fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}
