//! Lineage key construction.
//!
//! A key names one test configuration:
//! `lab.arch.board.instance.defconfig_full.compiler`. Every component is
//! sanitized so the `.` separator stays unambiguous.

use crate::aggregate::AggregatedReport;
use kci_common::{LineageKey, Report, ReportSummary, sanitize_key};

/// Placeholder for a report without a board instance.
pub const NO_INSTANCE: &str = "none";
/// Placeholder for a report without a compiler version.
pub const NO_COMPILER: &str = "None";

/// The six dimensions a lineage key is built from.
///
/// Test groups and boot reports store these under different fields; each
/// report kind implements this trait to expose them uniformly.
pub trait LineageDimensions {
    fn lab_name(&self) -> &str;
    fn arch(&self) -> &str;
    fn board(&self) -> &str;
    fn board_instance(&self) -> Option<&str>;
    fn defconfig_full(&self) -> &str;
    fn compiler(&self) -> Option<&str>;
}

/// Build the lineage key for `source`.
pub fn build_key<D: LineageDimensions + ?Sized>(source: &D) -> LineageKey {
    let instance = source
        .board_instance()
        .map_or_else(|| NO_INSTANCE.to_string(), str::to_lowercase);
    let compiler = source.compiler().unwrap_or(NO_COMPILER);

    let parts = [
        sanitize_key(source.lab_name()),
        sanitize_key(source.arch()),
        sanitize_key(source.board()),
        sanitize_key(&instance),
        sanitize_key(source.defconfig_full()),
        sanitize_key(compiler),
    ];
    LineageKey::from_formatted(parts.join("."))
}

impl LineageDimensions for Report {
    fn lab_name(&self) -> &str {
        &self.lab_name
    }
    fn arch(&self) -> &str {
        &self.arch
    }
    fn board(&self) -> &str {
        &self.board
    }
    fn board_instance(&self) -> Option<&str> {
        self.board_instance.as_deref()
    }
    fn defconfig_full(&self) -> &str {
        &self.defconfig_full
    }
    fn compiler(&self) -> Option<&str> {
        self.compiler_version_ext.as_deref()
    }
}

impl LineageDimensions for ReportSummary {
    fn lab_name(&self) -> &str {
        &self.lab_name
    }
    fn arch(&self) -> &str {
        &self.arch
    }
    fn board(&self) -> &str {
        &self.board
    }
    fn board_instance(&self) -> Option<&str> {
        self.board_instance.as_deref()
    }
    fn defconfig_full(&self) -> &str {
        &self.defconfig_full
    }
    fn compiler(&self) -> Option<&str> {
        self.compiler_version_ext.as_deref()
    }
}

impl LineageDimensions for AggregatedReport {
    fn lab_name(&self) -> &str {
        self.report.lab_name()
    }
    fn arch(&self) -> &str {
        self.report.arch()
    }
    fn board(&self) -> &str {
        self.report.board()
    }
    fn board_instance(&self) -> Option<&str> {
        LineageDimensions::board_instance(&self.report)
    }
    fn defconfig_full(&self) -> &str {
        self.report.defconfig_full()
    }
    fn compiler(&self) -> Option<&str> {
        self.report.compiler()
    }
}
