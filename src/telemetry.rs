use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the JSON structured-logging subscriber.
/// `RUST_LOG` controls the level; `default_filter` applies when it is unset.
/// Calling this more than once is harmless: later calls are ignored.
pub fn init_telemetry(default_filter: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let formatting_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .json()
        .with_current_span(true);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(formatting_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_initialization_is_ignored() {
        init_telemetry("warn");
        assert!(tracing::dispatcher::has_been_set());

        init_telemetry("debug");
        assert!(tracing::dispatcher::has_been_set());
    }
}
