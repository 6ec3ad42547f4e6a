//! Best-effort status reporting.
//!
//! Diagnostics must never interfere with the work they describe: every call
//! here is non-throwing by construction, with internal failures dropped at
//! this boundary rather than by the caller.

use std::io::Write;

/// Install the tracing subscriber. Failure to install is ignored.
pub fn init() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Write a status line for the user.
pub fn report(message: &str) {
    let _ = writeln!(std::io::stderr(), "{message}");
}
