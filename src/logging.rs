//! Logging setup for programs embedding the pipe
//!
//! The library itself only emits `tracing` events; installing a subscriber is
//! left to the host. These helpers install the usual `fmt` subscriber with a
//! verbosity-driven filter. `RUST_LOG` overrides the verbosity when set.

use tracing::debug;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter directive for a verbosity level.
pub fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn env_filter(verbose: u8) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_filter(verbose)))
}

/// Install the global subscriber, failing if one is already set.
pub fn try_init_logging(verbose: u8) -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_target(verbose >= 2) // module targets for -vv and above
        .with_thread_ids(verbose >= 3)
        .with_line_number(verbose >= 3)
        .finish()
        .try_init()?;

    debug!("linepipe logging initialized at verbosity {}", verbose);
    Ok(())
}

/// Install the global subscriber; a no-op if one is already installed.
pub fn init_logging(verbose: u8) {
    let _ = try_init_logging(verbose);
}
