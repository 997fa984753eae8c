//! Configuration for the regression tracker.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `KCI_*` environment overrides.

pub mod env;
pub mod source;

pub use env::{EnvError, EnvParser};
pub use source::{ConfigSource, Sourced};

use crate::errors::ErrorCode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default lock wait, in seconds.
pub const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 5;
/// Default lock name prefix.
pub const DEFAULT_LOCK_PREFIX: &str = "test-group-regressions";
/// Default number of concurrent tracking tasks.
pub const DEFAULT_WORKERS: usize = 4;

const LOCK_TIMEOUT_RANGE: (u64, u64) = (1, 300);
const WORKERS_RANGE: (u64, u64) = (1, 256);

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("invalid environment: {}", join_env_errors(.0))]
    Env(Vec<EnvError>),
}

fn join_env_errors(errors: &[EnvError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ConfigError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Read { .. } => ErrorCode::ConfigReadError,
            Self::Parse { .. } | Self::Invalid { .. } => ErrorCode::ConfigParseError,
            Self::Env(_) => ErrorCode::ConfigEnvError,
        }
    }
}

/// Runtime settings for the regression engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegressionConfig {
    /// How long to wait for a scope lock before giving up.
    pub lock_timeout_secs: u64,
    /// Prefix of every lock name.
    pub lock_prefix: String,
    /// Concurrent tracking tasks for batch runs.
    pub workers: usize,
    /// Default tracing level when `RUST_LOG` is unset.
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones.
    pub log_json: bool,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            lock_timeout_secs: DEFAULT_LOCK_TIMEOUT_SECS,
            lock_prefix: DEFAULT_LOCK_PREFIX.to_string(),
            workers: DEFAULT_WORKERS,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl RegressionConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    /// Defaults, overlaid with `path` when given, overlaid with the
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        base.with_env_overrides(&mut EnvParser::new())
    }

    /// Parse a TOML file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `KCI_*` overrides on top of the current values.
    pub fn with_env_overrides(mut self, parser: &mut EnvParser) -> Result<Self, ConfigError> {
        let timeout = parser.get_u64_range(
            "LOCK_TIMEOUT_SECS",
            self.lock_timeout_secs,
            LOCK_TIMEOUT_RANGE.0,
            LOCK_TIMEOUT_RANGE.1,
        );
        let prefix = parser.get_string("LOCK_PREFIX", &self.lock_prefix);
        let workers = parser.get_u64_range(
            "WORKERS",
            self.workers as u64,
            WORKERS_RANGE.0,
            WORKERS_RANGE.1,
        );
        let level = parser.get_log_level("LOG_LEVEL", &self.log_level);
        let json = parser.get_bool("LOG_JSON", self.log_json);

        if parser.has_errors() {
            return Err(ConfigError::Env(parser.take_errors()));
        }

        for (name, source) in [
            ("lock_timeout_secs", &timeout.source),
            ("lock_prefix", &prefix.source),
            ("workers", &workers.source),
            ("log_level", &level.source),
            ("log_json", &json.source),
        ] {
            if matches!(source, ConfigSource::Environment(_)) {
                tracing::debug!(field = name, %source, "configuration override");
            }
        }

        self.lock_timeout_secs = timeout.value;
        self.lock_prefix = prefix.value;
        self.workers = workers.value as usize;
        self.log_level = level.value;
        self.log_json = json.value;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let (min, max) = LOCK_TIMEOUT_RANGE;
        if !(min..=max).contains(&self.lock_timeout_secs) {
            return Err(ConfigError::Invalid {
                field: "lock_timeout_secs",
                message: format!("{} is outside {min}..={max}", self.lock_timeout_secs),
            });
        }
        let (min, max) = WORKERS_RANGE;
        if !(min..=max).contains(&(self.workers as u64)) {
            return Err(ConfigError::Invalid {
                field: "workers",
                message: format!("{} is outside {min}..={max}", self.workers),
            });
        }
        if self.lock_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "lock_prefix",
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn env_test_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|e| e.into_inner())
}
