//! Common types shared by the regression tracker components.

use crate::errors::DocIdError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Opaque 12-byte document identifier, rendered as 24 hex characters.
///
/// The first four bytes hold the creation time in seconds so ids sort
/// roughly by creation, the remaining eight are random.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocId([u8; 12]);

impl DocId {
    /// Generate a fresh id.
    pub fn new() -> Self {
        let mut bytes = [0u8; 12];
        let secs = Utc::now().timestamp().clamp(0, i64::from(u32::MAX)) as u32;
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..].copy_from_slice(&uuid::Uuid::new_v4().as_bytes()[..8]);
        Self(bytes)
    }

    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    /// Parse the 24 character hexadecimal form.
    pub fn parse(value: &str) -> Result<Self, DocIdError> {
        let invalid = || DocIdError {
            value: value.to_string(),
        };
        if value.len() != 24 || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let mut bytes = [0u8; 12];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&value[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        }
        Ok(Self(bytes))
    }
}

impl Default for DocId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for DocId {
    type Err = DocIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for DocId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DocId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Outcome of a single test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestStatus {
    Pass,
    Fail,
    Skip,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
            Self::Skip => write!(f, "SKIP"),
        }
    }
}

/// PASS/FAIL/SKIP counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTotals {
    #[serde(rename = "PASS")]
    pub pass: u32,
    #[serde(rename = "FAIL")]
    pub fail: u32,
    #[serde(rename = "SKIP")]
    pub skip: u32,
}

impl StatusTotals {
    pub const fn new(pass: u32, fail: u32, skip: u32) -> Self {
        Self { pass, fail, skip }
    }

    /// Count one more outcome.
    pub fn record(&mut self, status: TestStatus) {
        match status {
            TestStatus::Pass => self.pass += 1,
            TestStatus::Fail => self.fail += 1,
            TestStatus::Skip => self.skip += 1,
        }
    }

    /// Fold another set of totals into this one.
    pub fn add(&mut self, other: &StatusTotals) {
        self.pass += other.pass;
        self.fail += other.fail;
        self.skip += other.skip;
    }

    pub const fn total(&self) -> u32 {
        self.pass + self.fail + self.skip
    }

    pub const fn has_failures(&self) -> bool {
        self.fail > 0
    }
}

/// A test-group (or boot) report: one node in a report tree.
///
/// Dimension fields are set once by the importer and never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub id: DocId,
    pub name: String,
    pub job: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<DocId>,
    pub kernel: String,
    pub git_branch: String,
    pub arch: String,
    pub board: String,
    #[serde(default)]
    pub board_instance: Option<String>,
    #[serde(default)]
    pub defconfig: String,
    pub defconfig_full: String,
    #[serde(default)]
    pub compiler_version_ext: Option<String>,
    pub lab_name: String,
    #[serde(default)]
    pub parent_id: Option<DocId>,
    #[serde(default)]
    pub sub_groups: Vec<DocId>,
    #[serde(default)]
    pub test_cases: Vec<DocId>,
    pub created_on: DateTime<Utc>,
}

/// A leaf test result belonging to one report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: DocId,
    pub name: String,
    pub status: TestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_group_id: Option<DocId>,
}

/// Flat compound key identifying one configuration lineage:
/// `lab.arch.board.instance.defconfig.compiler`, every part sanitized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineageKey(String);

impl LineageKey {
    /// Number of dot separated components in a key.
    pub const COMPONENTS: usize = 6;

    /// Wrap an already formatted key.
    pub fn from_formatted(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split back into the six components, if well formed.
    pub fn components(&self) -> Option<[&str; Self::COMPONENTS]> {
        let mut parts = self.0.split('.');
        let out = [
            parts.next()?,
            parts.next()?,
            parts.next()?,
            parts.next()?,
            parts.next()?,
            parts.next()?,
        ];
        if parts.next().is_some() {
            return None;
        }
        Some(out)
    }
}

impl fmt::Display for LineageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of a report as stored inside a regression history list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub id: DocId,
    pub name: String,
    pub job: String,
    pub kernel: String,
    pub git_branch: String,
    pub lab_name: String,
    pub arch: String,
    pub board: String,
    #[serde(default)]
    pub board_instance: Option<String>,
    pub defconfig_full: String,
    #[serde(default)]
    pub compiler_version_ext: Option<String>,
    pub created_on: DateTime<Utc>,
    pub total_results: StatusTotals,
    pub total_tests: u32,
}

impl ReportSummary {
    pub fn new(report: &Report, total_results: StatusTotals) -> Self {
        Self {
            id: report.id,
            name: report.name.clone(),
            job: report.job.clone(),
            kernel: report.kernel.clone(),
            git_branch: report.git_branch.clone(),
            lab_name: report.lab_name.clone(),
            arch: report.arch.clone(),
            board: report.board.clone(),
            board_instance: report.board_instance.clone(),
            defconfig_full: report.defconfig_full.clone(),
            compiler_version_ext: report.compiler_version_ext.clone(),
            created_on: report.created_on,
            total_results,
            total_tests: total_results.total(),
        }
    }
}

/// The identity a regression document is found and locked by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegressionScope {
    pub job: String,
    pub git_branch: String,
    pub kernel: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<DocId>,
}

impl RegressionScope {
    pub fn of(report: &Report) -> Self {
        Self {
            job: report.job.clone(),
            git_branch: report.git_branch.clone(),
            kernel: report.kernel.clone(),
            name: report.name.clone(),
            job_id: report.job_id,
        }
    }

    /// Whether `doc` belongs to this scope. A scope without a job id
    /// matches documents regardless of theirs.
    pub fn matches(&self, doc: &RegressionDoc) -> bool {
        self.job == doc.job
            && self.git_branch == doc.git_branch
            && self.kernel == doc.kernel
            && self.name == doc.name
            && self.job_id.is_none_or(|id| doc.job_id == Some(id))
    }

    /// Name of the mutual-exclusion lock guarding this scope.
    pub fn lock_key(&self, prefix: &str) -> String {
        format!(
            "{}-{}-{}-{}-{}",
            prefix, self.job, self.git_branch, self.kernel, self.name
        )
    }
}

impl fmt::Display for RegressionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.job, self.git_branch, self.kernel, self.name
        )
    }
}

/// One regression document: the failing lineages sharing a scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegressionDoc {
    pub id: DocId,
    pub job: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<DocId>,
    pub git_branch: String,
    pub kernel: String,
    pub name: String,
    pub created_on: DateTime<Utc>,
    pub regressions: BTreeMap<LineageKey, Vec<ReportSummary>>,
}

impl RegressionDoc {
    /// A new document holding a single lineage history.
    pub fn new(
        scope: &RegressionScope,
        created_on: DateTime<Utc>,
        key: LineageKey,
        history: Vec<ReportSummary>,
    ) -> Self {
        let mut regressions = BTreeMap::new();
        regressions.insert(key, history);
        Self {
            id: DocId::new(),
            job: scope.job.clone(),
            job_id: scope.job_id,
            git_branch: scope.git_branch.clone(),
            kernel: scope.kernel.clone(),
            name: scope.name.clone(),
            created_on,
            regressions,
        }
    }

    pub fn scope(&self) -> RegressionScope {
        RegressionScope {
            job: self.job.clone(),
            git_branch: self.git_branch.clone(),
            kernel: self.kernel.clone(),
            name: self.name.clone(),
            job_id: self.job_id,
        }
    }

    pub fn contains(&self, key: &LineageKey) -> bool {
        self.regressions.contains_key(key)
    }

    /// Ordered history for one lineage.
    pub fn history(&self, key: &LineageKey) -> Option<&[ReportSummary]> {
        self.regressions.get(key).map(Vec::as_slice)
    }

    /// Lineage keys tracked in this document, in key order.
    pub fn keys(&self) -> impl Iterator<Item = &LineageKey> {
        self.regressions.keys()
    }
}

/// Reverse lookup from a report to the regression document tracking it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegressionIndexEntry {
    pub report_id: DocId,
    pub regression_id: DocId,
    pub created_on: DateTime<Utc>,
}
