//! Tracks where each configuration value came from.

use std::fmt;
use std::path::PathBuf;

/// Origin of a configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Built-in default.
    Default,
    /// Loaded from a TOML file.
    File(PathBuf),
    /// Overridden by the named environment variable.
    Environment(String),
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::File(path) => write!(f, "file {}", path.display()),
            Self::Environment(var) => write!(f, "env {var}"),
        }
    }
}

/// A value paired with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sourced<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> Sourced<T> {
    pub fn default_value(value: T) -> Self {
        Self {
            value,
            source: ConfigSource::Default,
        }
    }

    pub fn from_env(value: T, var: String) -> Self {
        Self {
            value,
            source: ConfigSource::Environment(var),
        }
    }

    /// Whether an environment variable set this value.
    pub fn is_override(&self) -> bool {
        matches!(self.source, ConfigSource::Environment(_))
    }
}
