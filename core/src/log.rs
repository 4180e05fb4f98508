//! Tracing subscriber setup.
//!
//! Library code only emits `tracing` events; embedding binaries and tests call
//! [`init`] once to route them to stderr.

use tracing_subscriber::EnvFilter;

use crate::config::{LogConfig, LogLevel};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level. Returns `false` when a global
/// subscriber was already installed.
pub fn init(config: &LogConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(config.level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if config.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    }
}

fn filter_directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive(LogLevel::Debug), "debug");
        assert_eq!(filter_directive(LogLevel::Error), "error");
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = LogConfig::default();
        init(&config);
        assert!(!init(&config));
    }
}
