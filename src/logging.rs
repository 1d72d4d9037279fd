//! Tracing subscriber setup
//!
//! Logs go to stderr: stdout belongs to the stdio transport.

use tracing_subscriber::EnvFilter;

/// Filter variable checked before `RUST_LOG`
pub const ENV_LOG: &str = "CORTEX_LOG";

/// Install the global subscriber. `verbose` forces debug level.
pub fn init(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(ENV_LOG)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // A second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
