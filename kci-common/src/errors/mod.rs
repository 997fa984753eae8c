//! Error types and the error catalog for the regression tracker.
//!
//! Each collaborator boundary has its own `thiserror` enum; every variant
//! maps onto a catalog [`ErrorCode`] so callers can classify failures
//! (400/404/500) without string matching.

pub mod catalog;

pub use catalog::{ErrorCategory, ErrorCode, ErrorEntry};

use std::time::Duration;
use thiserror::Error;

/// A document id string that is not 24 hexadecimal characters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid document id '{value}': expected 24 hexadecimal characters")]
pub struct DocIdError {
    pub value: String,
}

impl DocIdError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::InvalidDocId
    }
}

/// Failures reported by a document store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("read from '{collection}' failed: {message}")]
    Read { collection: String, message: String },

    #[error("write to '{collection}' failed: {message}")]
    Write { collection: String, message: String },
}

impl StoreError {
    pub fn read(collection: &str, message: impl Into<String>) -> Self {
        Self::Read {
            collection: collection.to_string(),
            message: message.into(),
        }
    }

    pub fn write(collection: &str, message: impl Into<String>) -> Self {
        Self::Write {
            collection: collection.to_string(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Read { .. } => ErrorCode::StoreReadFailed,
            Self::Write { .. } => ErrorCode::StoreWriteFailed,
        }
    }
}

/// Failures acquiring a named lock.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    #[error("timed out after {timeout:?} waiting for lock '{key}'")]
    Timeout { key: String, timeout: Duration },

    #[error("lock backend unavailable for '{key}': {message}")]
    Unavailable { key: String, message: String },
}

impl LockError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout { .. } => ErrorCode::LockTimeout,
            Self::Unavailable { .. } => ErrorCode::LockUnavailable,
        }
    }
}
