use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::models::LoggingConfig;

/// Install the global subscriber. `RUST_LOG` overrides the configured
/// filter. Returns `false` when a subscriber was already installed.
pub fn init_tracing(logging: &LoggingConfig) -> bool {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&logging.filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_a_no_op() {
        let logging = LoggingConfig::default();
        let _ = init_tracing(&logging);
        assert!(!init_tracing(&logging));
    }
}
