//! Tracing subscriber setup shared by binaries and integration tests.

use tracing_subscriber::EnvFilter;

use crate::config::GeneralConfig;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence; otherwise the configured log level is used.
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing(config: &GeneralConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_idempotent() {
        let config = GeneralConfig::default();
        init_tracing(&config);
        init_tracing(&config);
    }
}
