//! Document store seam.
//!
//! The engine only talks to storage through [`ReportStore`]. Reads of
//! absent documents return `Ok(None)`; transport failures return
//! [`StoreError`]. [`MemoryStore`] backs the CLI replay mode and the tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kci_common::{
    DocId, LineageKey, RegressionDoc, RegressionIndexEntry, RegressionScope, Report,
    ReportSummary, StoreError, TestCase,
};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

pub const REGRESSIONS_COLLECTION: &str = "test_group_regressions";

/// Equality filter selecting the reports that may precede `current` in a
/// lineage, restricted to those created strictly earlier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviousReportFilter {
    pub arch: String,
    pub board: String,
    pub compiler_version_ext: Option<String>,
    pub defconfig: String,
    pub defconfig_full: String,
    pub git_branch: String,
    pub job: String,
    pub lab_name: String,
    pub name: String,
    pub created_before: DateTime<Utc>,
}

impl PreviousReportFilter {
    pub fn for_report(current: &Report) -> Self {
        Self {
            arch: current.arch.clone(),
            board: current.board.clone(),
            compiler_version_ext: current.compiler_version_ext.clone(),
            defconfig: current.defconfig.clone(),
            defconfig_full: current.defconfig_full.clone(),
            git_branch: current.git_branch.clone(),
            job: current.job.clone(),
            lab_name: current.lab_name.clone(),
            name: current.name.clone(),
            created_before: current.created_on,
        }
    }

    pub fn matches(&self, report: &Report) -> bool {
        report.created_on < self.created_before && self.same_configuration(report)
    }

    /// Whether `report` has the configuration this filter selects,
    /// regardless of when it was created.
    pub fn same_configuration(&self, report: &Report) -> bool {
        report.arch == self.arch
            && report.board == self.board
            && report.compiler_version_ext == self.compiler_version_ext
            && report.defconfig == self.defconfig
            && report.defconfig_full == self.defconfig_full
            && report.git_branch == self.git_branch
            && report.job == self.job
            && report.lab_name == self.lab_name
            && report.name == self.name
    }
}

/// Single-key change to one lineage in a regression document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineageUpdate {
    /// Set the history for a key not yet present. No-op when present.
    SetIfAbsent(Vec<ReportSummary>),
    /// Append a summary unless an entry with the same id is already there.
    AddToSet(ReportSummary),
}

/// What a write did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Created,
    Updated,
    /// The target existed but the write changed nothing.
    Unchanged,
    NotFound,
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn report(&self, id: &DocId) -> Result<Option<Report>, StoreError>;

    async fn test_case(&self, id: &DocId) -> Result<Option<TestCase>, StoreError>;

    /// Most recent report matching `filter`.
    async fn latest_report(
        &self,
        filter: &PreviousReportFilter,
    ) -> Result<Option<Report>, StoreError>;

    async fn regression(&self, id: &DocId) -> Result<Option<RegressionDoc>, StoreError>;

    /// First regression document matching `scope`.
    async fn regression_for_scope(
        &self,
        scope: &RegressionScope,
    ) -> Result<Option<RegressionDoc>, StoreError>;

    async fn insert_regression(
        &self,
        doc: RegressionDoc,
    ) -> Result<(WriteStatus, DocId), StoreError>;

    async fn update_lineage(
        &self,
        id: &DocId,
        key: &LineageKey,
        update: LineageUpdate,
    ) -> Result<WriteStatus, StoreError>;

    async fn index_entry(
        &self,
        report_id: &DocId,
    ) -> Result<Option<RegressionIndexEntry>, StoreError>;

    /// Insert an index entry. A second entry for the same report is a no-op.
    async fn insert_index_entry(
        &self,
        entry: RegressionIndexEntry,
    ) -> Result<WriteStatus, StoreError>;
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    reports: RwLock<HashMap<DocId, Report>>,
    test_cases: RwLock<HashMap<DocId, TestCase>>,
    regressions: RwLock<Vec<RegressionDoc>>,
    index: RwLock<HashMap<DocId, RegressionIndexEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_report(&self, report: Report) -> DocId {
        let id = report.id;
        self.reports
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, report);
        id
    }

    pub fn insert_test_case(&self, case: TestCase) -> DocId {
        let id = case.id;
        self.test_cases
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, case);
        id
    }

    pub fn insert_test_cases(&self, cases: impl IntoIterator<Item = TestCase>) {
        let mut guard = self.test_cases.write().unwrap_or_else(|e| e.into_inner());
        for case in cases {
            guard.insert(case.id, case);
        }
    }

    /// Snapshot of all regression documents in insertion order.
    pub fn regressions(&self) -> Vec<RegressionDoc> {
        self.regressions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn index_entries(&self) -> Vec<RegressionIndexEntry> {
        let guard = self.index.read().unwrap_or_else(|e| e.into_inner());
        let mut entries: Vec<_> = guard.values().cloned().collect();
        entries.sort_by_key(|e| (e.created_on, e.report_id));
        entries
    }

    /// Reports without a parent, oldest first.
    pub fn root_reports(&self) -> Vec<Report> {
        let guard = self.reports.read().unwrap_or_else(|e| e.into_inner());
        let mut roots: Vec<_> = guard
            .values()
            .filter(|r| r.parent_id.is_none())
            .cloned()
            .collect();
        roots.sort_by_key(|r| (r.created_on, r.id));
        roots
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn report(&self, id: &DocId) -> Result<Option<Report>, StoreError> {
        let guard = self.reports.read().unwrap_or_else(|e| e.into_inner());
        Ok(guard.get(id).cloned())
    }

    async fn test_case(&self, id: &DocId) -> Result<Option<TestCase>, StoreError> {
        let guard = self.test_cases.read().unwrap_or_else(|e| e.into_inner());
        Ok(guard.get(id).cloned())
    }

    async fn latest_report(
        &self,
        filter: &PreviousReportFilter,
    ) -> Result<Option<Report>, StoreError> {
        let guard = self.reports.read().unwrap_or_else(|e| e.into_inner());
        Ok(guard
            .values()
            .filter(|r| filter.matches(r))
            .max_by_key(|r| (r.created_on, r.id))
            .cloned())
    }

    async fn regression(&self, id: &DocId) -> Result<Option<RegressionDoc>, StoreError> {
        let guard = self.regressions.read().unwrap_or_else(|e| e.into_inner());
        Ok(guard.iter().find(|d| d.id == *id).cloned())
    }

    async fn regression_for_scope(
        &self,
        scope: &RegressionScope,
    ) -> Result<Option<RegressionDoc>, StoreError> {
        let guard = self.regressions.read().unwrap_or_else(|e| e.into_inner());
        Ok(guard.iter().find(|d| scope.matches(d)).cloned())
    }

    async fn insert_regression(
        &self,
        doc: RegressionDoc,
    ) -> Result<(WriteStatus, DocId), StoreError> {
        let mut guard = self.regressions.write().unwrap_or_else(|e| e.into_inner());
        if guard.iter().any(|d| d.id == doc.id) {
            return Err(StoreError::write(
                REGRESSIONS_COLLECTION,
                format!("duplicate id {}", doc.id),
            ));
        }
        let id = doc.id;
        debug!("Inserted regression document {}", id);
        guard.push(doc);
        Ok((WriteStatus::Created, id))
    }

    async fn update_lineage(
        &self,
        id: &DocId,
        key: &LineageKey,
        update: LineageUpdate,
    ) -> Result<WriteStatus, StoreError> {
        let mut guard = self.regressions.write().unwrap_or_else(|e| e.into_inner());
        let Some(doc) = guard.iter_mut().find(|d| d.id == *id) else {
            return Ok(WriteStatus::NotFound);
        };
        let status = match update {
            LineageUpdate::SetIfAbsent(history) => {
                if doc.regressions.contains_key(key) {
                    WriteStatus::Unchanged
                } else {
                    doc.regressions.insert(key.clone(), history);
                    WriteStatus::Updated
                }
            }
            LineageUpdate::AddToSet(summary) => {
                let history = doc.regressions.entry(key.clone()).or_default();
                if history.iter().any(|s| s.id == summary.id) {
                    WriteStatus::Unchanged
                } else {
                    history.push(summary);
                    WriteStatus::Updated
                }
            }
        };
        Ok(status)
    }

    async fn index_entry(
        &self,
        report_id: &DocId,
    ) -> Result<Option<RegressionIndexEntry>, StoreError> {
        let guard = self.index.read().unwrap_or_else(|e| e.into_inner());
        Ok(guard.get(report_id).cloned())
    }

    async fn insert_index_entry(
        &self,
        entry: RegressionIndexEntry,
    ) -> Result<WriteStatus, StoreError> {
        let mut guard = self.index.write().unwrap_or_else(|e| e.into_inner());
        if guard.contains_key(&entry.report_id) {
            return Ok(WriteStatus::Unchanged);
        }
        guard.insert(entry.report_id, entry);
        Ok(WriteStatus::Created)
    }
}
