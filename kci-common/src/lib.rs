//! Shared types and utilities for the KernelCI regression tracker.

pub mod config;
pub mod errors;
pub mod logging;
pub mod testing;
pub mod types;
pub mod util;

pub use config::{ConfigError, RegressionConfig};
pub use errors::{DocIdError, ErrorCategory, ErrorCode, LockError, StoreError};
pub use logging::{LogConfig, init_logging};
pub use types::{
    DocId, LineageKey, RegressionDoc, RegressionIndexEntry, RegressionScope, Report,
    ReportSummary, StatusTotals, TestCase, TestStatus,
};
pub use util::sanitize_key;
