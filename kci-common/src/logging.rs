//! Process-wide tracing setup for the tracker binaries.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// How the global subscriber should be configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Level used when `RUST_LOG` is unset.
    pub level: String,
    /// Ignore `RUST_LOG` and force `level`.
    pub force_level: bool,
    /// JSON lines instead of human-readable output.
    pub json: bool,
}

impl LogConfig {
    /// Start from `default_level`, letting `RUST_LOG` take precedence.
    pub fn from_env(default_level: &str) -> Self {
        Self {
            level: default_level.to_string(),
            force_level: false,
            json: false,
        }
    }

    /// Force a specific level (e.g. `--verbose`).
    #[must_use]
    pub fn with_level(mut self, level: &str) -> Self {
        self.level = level.to_string();
        self.force_level = true;
        self
    }

    #[must_use]
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    fn filter(&self) -> EnvFilter {
        if self.force_level {
            return EnvFilter::new(&self.level);
        }
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level))
    }
}

/// Install the global subscriber. Output goes to stderr so JSON results
/// on stdout stay machine-readable.
pub fn init_logging(config: &LogConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let registry = tracing_subscriber::registry().with(config.filter());
    if config.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_level_forces_level() {
        let config = LogConfig::from_env("info").with_level("debug");
        assert!(config.force_level);
        assert_eq!(config.level, "debug");
    }

    #[test]
    fn test_second_init_fails_without_panicking() {
        let config = LogConfig::from_env("warn");
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
    }
}
