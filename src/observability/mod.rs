//! # Observability
//!
//! Log output goes to stderr through `tracing-subscriber`. `RUST_LOG` wins
//! when set; otherwise the level is `info`, or `debug` with `--verbose`.

use tracing_subscriber::EnvFilter;

/// Default filter directive for a verbosity flag
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "hotel_cms=debug,tower_http=debug,info"
    } else {
        "info"
    }
}

/// Build the filter from `RUST_LOG`, falling back to `default_directive`
pub fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)))
}

/// Install the global subscriber. Calling it twice is harmless.
pub fn init_tracing(verbose: bool) {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter(verbose))
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(false), "info");
        assert!(default_directive(true).starts_with("hotel_cms=debug"));
    }

    #[test]
    fn test_init_twice() {
        init_tracing(false);
        init_tracing(true);
    }
}
