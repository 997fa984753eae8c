//! Error catalog for the regression tracker.
//!
//! Every failure the engine can surface maps to a stable code (KCI-E001
//! through KCI-E599), a category, and the HTTP-style status class the
//! calling pipeline logs it under.
//!
//! # Error Code Ranges
//!
//! | Range      | Category    | Description                          |
//! |------------|-------------|--------------------------------------|
//! | E001-E099  | Input       | Malformed identifiers and requests   |
//! | E100-E199  | Lookup      | Missing reports and documents        |
//! | E200-E299  | Persistence | Document store reads and writes      |
//! | E300-E399  | Lock        | Named lock acquisition               |
//! | E400-E499  | Integrity   | Malformed report trees               |
//! | E500-E599  | Config      | Configuration loading                |

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error code enumeration covering every tracker failure site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    // =========================================================================
    // Input Errors (E001-E099)
    // =========================================================================
    /// Document id is not 24 hexadecimal characters
    InvalidDocId,

    // =========================================================================
    // Lookup Errors (E100-E199)
    // =========================================================================
    /// Report id does not resolve to a stored report
    ReportNotFound,
    /// Index entry points at a regression document that is gone
    RegressionNotFound,

    // =========================================================================
    // Persistence Errors (E200-E299)
    // =========================================================================
    /// Reading from the document store failed
    StoreReadFailed,
    /// Writing to the document store failed
    StoreWriteFailed,
    /// Regression document disappeared between lookup and write
    RegressionVanished,

    // =========================================================================
    // Lock Errors (E300-E399)
    // =========================================================================
    /// Lock was not acquired before the timeout elapsed
    LockTimeout,
    /// Lock backend is unreachable
    LockUnavailable,

    // =========================================================================
    // Integrity Errors (E400-E499)
    // =========================================================================
    /// A sub-group is linked under more than one parent
    SharedSubGroup,

    // =========================================================================
    // Config Errors (E500-E599)
    // =========================================================================
    /// Configuration file could not be read
    ConfigReadError,
    /// Configuration file contains invalid TOML
    ConfigParseError,
    /// Environment variable has an invalid value
    ConfigEnvError,
}

impl ErrorCode {
    /// All catalog entries, in code order.
    pub const fn all() -> &'static [ErrorCode] {
        &[
            Self::InvalidDocId,
            Self::ReportNotFound,
            Self::RegressionNotFound,
            Self::StoreReadFailed,
            Self::StoreWriteFailed,
            Self::RegressionVanished,
            Self::LockTimeout,
            Self::LockUnavailable,
            Self::SharedSubGroup,
            Self::ConfigReadError,
            Self::ConfigParseError,
            Self::ConfigEnvError,
        ]
    }

    /// Numeric part of the code.
    #[must_use]
    pub const fn code_number(&self) -> u16 {
        match self {
            Self::InvalidDocId => 1,

            Self::ReportNotFound => 100,
            Self::RegressionNotFound => 101,

            Self::StoreReadFailed => 200,
            Self::StoreWriteFailed => 201,
            Self::RegressionVanished => 202,

            Self::LockTimeout => 300,
            Self::LockUnavailable => 301,

            Self::SharedSubGroup => 400,

            Self::ConfigReadError => 500,
            Self::ConfigParseError => 501,
            Self::ConfigEnvError => 502,
        }
    }

    /// Returns the formatted error code string (e.g., "KCI-E001").
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("KCI-E{:03}", self.code_number())
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self.code_number() {
            1..=99 => ErrorCategory::Input,
            100..=199 => ErrorCategory::Lookup,
            200..=299 => ErrorCategory::Persistence,
            300..=399 => ErrorCategory::Lock,
            400..=499 => ErrorCategory::Integrity,
            _ => ErrorCategory::Config,
        }
    }

    /// HTTP-style status the pipeline reports this error under.
    #[must_use]
    pub const fn status_class(&self) -> u16 {
        match self.category() {
            ErrorCategory::Input => 400,
            ErrorCategory::Lookup => 404,
            _ => 500,
        }
    }

    /// Returns the error message template.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::InvalidDocId => "Provided document id is not valid",
            Self::ReportNotFound => "Report not found",
            Self::RegressionNotFound => "Regression document not found",
            Self::StoreReadFailed => "Failed to read from the document store",
            Self::StoreWriteFailed => "Failed to write to the document store",
            Self::RegressionVanished => "Regression document disappeared during a write",
            Self::LockTimeout => "Timed out waiting for the regression lock",
            Self::LockUnavailable => "Regression lock service is unavailable",
            Self::SharedSubGroup => "Test group is linked under more than one parent",
            Self::ConfigReadError => "Failed to read configuration file",
            Self::ConfigParseError => "Configuration file contains invalid TOML syntax",
            Self::ConfigEnvError => "Environment variable has invalid value",
        }
    }

    /// Returns remediation steps for the error.
    #[must_use]
    pub const fn remediation(&self) -> &'static [&'static str] {
        match self {
            Self::InvalidDocId => &["Pass the 24 character hexadecimal id of the report"],
            Self::ReportNotFound => &[
                "Check that the report import finished before tracking was requested",
            ],
            Self::RegressionNotFound => &[
                "The index entry is stale; re-run tracking for the report",
            ],
            Self::StoreReadFailed | Self::StoreWriteFailed => &[
                "Check document store connectivity",
                "Re-run tracking for the report once the store is healthy",
            ],
            Self::RegressionVanished => &[
                "Check for processes deleting regression documents",
                "Re-run tracking for the report to start a fresh lineage",
            ],
            Self::LockTimeout => &[
                "Another worker held the lock for this scope; re-run tracking later",
                "Raise KCI_LOCK_TIMEOUT_SECS if imports are consistently slow",
            ],
            Self::LockUnavailable => &["Check the lock backend connectivity"],
            Self::SharedSubGroup => &[
                "Fix the importer so each test group has exactly one parent",
            ],
            Self::ConfigReadError => &["Check the configuration file path and permissions"],
            Self::ConfigParseError => &["Validate the file with a TOML linter"],
            Self::ConfigEnvError => &["Unset or correct the reported KCI_* variable"],
        }
    }

    /// Returns the full error entry with all metadata.
    #[must_use]
    pub fn entry(&self) -> ErrorEntry {
        ErrorEntry {
            code: self.code_string(),
            category: self.category(),
            message: self.message().to_string(),
            remediation: self
                .remediation()
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code_string(), self.message())
    }
}

/// Error category for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Malformed input (E001-E099)
    Input,
    /// Missing documents (E100-E199)
    Lookup,
    /// Document store failures (E200-E299)
    Persistence,
    /// Lock failures (E300-E399)
    Lock,
    /// Malformed report trees (E400-E499)
    Integrity,
    /// Configuration errors (E500-E599)
    Config,
}

impl ErrorCategory {
    /// Returns a human-readable name for the category.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Input => "Input",
            Self::Lookup => "Lookup",
            Self::Persistence => "Persistence",
            Self::Lock => "Lock",
            Self::Integrity => "Integrity",
            Self::Config => "Configuration",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Complete error entry with all metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// Error code string (e.g., "KCI-E001")
    pub code: String,
    /// Error category
    pub category: ErrorCategory,
    /// Human-readable error message
    pub message: String,
    /// Steps to remediate the error
    pub remediation: Vec<String>,
}

impl ErrorEntry {
    /// Formats the error for display with full remediation steps.
    #[must_use]
    pub fn format_full(&self) -> String {
        let mut output = format!("[{}] {}\n\n", self.code, self.message);

        if !self.remediation.is_empty() {
            output.push_str("Remediation steps:\n");
            for (i, step) in self.remediation.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, step));
            }
        }

        output
    }

    /// Formats the error as a single line.
    #[must_use]
    pub fn format_brief(&self) -> String {
        format!("[{}] {}", self.code, self.message)
    }
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_brief())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_numbers_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for code in ErrorCode::all() {
            let num = code.code_number();
            assert!(
                seen.insert(num),
                "Duplicate error code number: {} for {:?}",
                num,
                code
            );
        }
    }

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::InvalidDocId.code_string(), "KCI-E001");
        assert_eq!(ErrorCode::LockTimeout.code_string(), "KCI-E300");
    }

    #[test]
    fn test_status_class_by_category() {
        assert_eq!(ErrorCode::InvalidDocId.status_class(), 400);
        assert_eq!(ErrorCode::ReportNotFound.status_class(), 404);
        assert_eq!(ErrorCode::StoreWriteFailed.status_class(), 500);
        assert_eq!(ErrorCode::RegressionVanished.status_class(), 500);
        assert_eq!(ErrorCode::RegressionNotFound.status_class(), 404);
        assert_eq!(ErrorCode::LockTimeout.status_class(), 500);
        assert_eq!(ErrorCode::SharedSubGroup.status_class(), 500);
    }

    #[test]
    fn test_every_code_has_remediation() {
        for code in ErrorCode::all() {
            assert!(
                !code.remediation().is_empty(),
                "{:?} has no remediation steps",
                code
            );
        }
    }

    #[test]
    fn test_entry_format_full_lists_steps() {
        let text = ErrorCode::StoreWriteFailed.entry().format_full();
        assert!(text.starts_with("[KCI-E201]"));
        assert!(text.contains("  1. Check document store connectivity"));
    }

    #[test]
    fn test_serde_uses_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorCode::SharedSubGroup).unwrap();
        assert_eq!(json, "\"SHARED_SUB_GROUP\"");
    }
}
