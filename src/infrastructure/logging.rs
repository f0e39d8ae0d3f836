use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::{self as app_config, LogFormat};

/// Subscriber settings; `RUST_LOG` takes precedence over `level`
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    /// Log span close events, useful to time the recovery stages
    pub span_events: bool,
}

impl From<&app_config::LoggingConfig> for LoggingConfig {
    fn from(config: &app_config::LoggingConfig) -> Self {
        Self {
            level: config.level.clone(),
            format: config.format.clone(),
            span_events: false,
        }
    }
}

fn span_events(config: &LoggingConfig) -> FmtSpan {
    if config.span_events {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

/// Installs the global subscriber; later calls leave the first one in place
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let installed = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_span_events(span_events(config)),
            )
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr)
                    .with_span_events(span_events(config)),
            )
            .try_init(),
    };

    if installed.is_ok() {
        tracing::debug!(level = %config.level, format = ?config.format, "Logging initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_initialization_is_harmless() {
        let config = LoggingConfig::from(&app_config::LoggingConfig::default());

        init_logging(&config);
        init_logging(&config);

        assert_eq!(config.level, "info");
        assert!(!config.span_events);
    }
}
