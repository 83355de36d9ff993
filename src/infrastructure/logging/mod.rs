// Logging module - Logging infrastructure
use crate::domain::error::{PaiCoreError, PaiCoreResult};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use std::io;

/// Default filter directive for a configured level name
pub fn filter_directive(log_level: &str, verbose: bool) -> String {
    let level = if verbose {
        "debug"
    } else {
        match log_level {
            "error" | "warn" | "info" | "debug" | "trace" => log_level,
            _ => "info",
        }
    };
    format!("paicore_uart={},warn", level)
}

/// Initialize logging system. `RUST_LOG` wins over the configured level.
pub fn init_logging(log_level: &str, verbose: bool) -> PaiCoreResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(log_level, verbose)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_level(true)
        )
        .try_init()
        .map_err(|e| PaiCoreError::Config {
            message: format!("Failed to initialize logging: {}", e),
        })?;

    tracing::debug!("PAICORE logging system initialized");
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive("warn", false), "paicore_uart=warn,warn");
        assert_eq!(filter_directive("warn", true), "paicore_uart=debug,warn");
        assert_eq!(filter_directive("loud", false), "paicore_uart=info,warn");
    }

    #[test]
    fn test_logging_init() {
        // A repeated initialisation reports an error instead of panicking
        let _ = init_logging("info", false);
        assert!(init_logging("info", false).is_err());
    }
}
