//! Diagnostic logging to stderr

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "oasconform=warn";
const VERBOSE_FILTER: &str = "oasconform=debug";

/// Install the global subscriber. `RUST_LOG` wins unless `--verbose` is given.
pub fn init(verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    };

    // a second init (tests) is harmless
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}
