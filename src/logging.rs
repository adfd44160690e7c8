use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Install the global tracing subscriber. `RUST_LOG` takes precedence over
/// the configured filter. Fails if a subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))?;

    let json_layer = config.json.then(|| tracing_subscriber::fmt::layer().json());
    let plain_layer = (!config.json).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(plain_layer)
        .try_init()?;

    tracing::debug!(filter = %config.filter, json = config.json, "Tracing initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_invalid_filter_is_rejected() {
        // SAFETY: every test touching the environment is `#[serial]`
        unsafe { std::env::remove_var("RUST_LOG") };
        let config = LoggingConfig { filter: "bucketfs=[".to_string(), json: false };
        assert!(init_tracing(&config).is_err());
    }
}
