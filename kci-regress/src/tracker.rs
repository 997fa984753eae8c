//! Regression state machine and locked persistence.
//!
//! For one aggregated test group the tracker compares against the most
//! recent earlier report of the same configuration:
//!
//! | Earlier report              | Action                               |
//! |-----------------------------|--------------------------------------|
//! | none                        | nothing                              |
//! | passed                      | start a lineage `[pass, current]`    |
//! | failed, lineage tracked     | append `current` to the lineage      |
//! | failed, lineage not tracked | nothing                              |
//!
//! Every write runs under the scope lock, and the report is indexed once
//! the write succeeded.

use crate::aggregate::AggregatedReport;
use crate::error::EngineError;
use crate::events::{EventBus, RegressionEvent};
use crate::key::build_key;
use crate::lock::LockService;
use crate::lookup::{self, ExistingLineage};
use crate::outcome::{TrackResult, TrackStatus, Transition};
use crate::store::{LineageUpdate, ReportStore, WriteStatus};
use kci_common::{
    DocId, LineageKey, RegressionConfig, RegressionDoc, RegressionIndexEntry, RegressionScope,
    ReportSummary,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Lock parameters for tracking writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerSettings {
    pub lock_timeout: Duration,
    pub lock_prefix: String,
}

impl From<&RegressionConfig> for TrackerSettings {
    fn from(config: &RegressionConfig) -> Self {
        Self {
            lock_timeout: config.lock_timeout(),
            lock_prefix: config.lock_prefix.clone(),
        }
    }
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self::from(&RegressionConfig::default())
    }
}

pub struct RegressionTracker {
    store: Arc<dyn ReportStore>,
    locks: Arc<dyn LockService>,
    settings: TrackerSettings,
    events: Option<EventBus>,
}

impl RegressionTracker {
    pub fn new(
        store: Arc<dyn ReportStore>,
        locks: Arc<dyn LockService>,
        settings: TrackerSettings,
    ) -> Self {
        Self {
            store,
            locks,
            settings,
            events: None,
        }
    }

    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Compare `current` with its predecessor and create or extend a
    /// lineage when needed. `Ok(None)` means nothing was tracked.
    pub async fn check_and_track(
        &self,
        current: &AggregatedReport,
    ) -> Result<Option<TrackResult>, EngineError> {
        let key = build_key(current);
        let result = self.track(current, &key).await;
        if let Err(err) = &result {
            let report = &current.report;
            error!(
                job = %report.job,
                branch = %report.git_branch,
                kernel = %report.kernel,
                name = %report.name,
                key = %key,
                code = %err.code().code_string(),
                "Regression tracking failed: {}",
                err
            );
        }
        result
    }

    async fn track(
        &self,
        current: &AggregatedReport,
        key: &LineageKey,
    ) -> Result<Option<TrackResult>, EngineError> {
        let store = self.store.as_ref();
        let Some(previous) = lookup::find_previous(store, &current.report).await? else {
            info!("No previous test group report found for {}, not tracking", current.id());
            self.skipped(current, key, Transition::NoHistory, None);
            return Ok(None);
        };

        if !previous.has_failures() {
            info!(
                "Previous test group report {} passed, start tracking {}",
                previous.id(),
                key
            );
            return self
                .start_sequence(current, key, previous.summary())
                .await
                .map(Some);
        }

        debug!(
            "Previous test group report {} failed, checking previous regressions",
            previous.id()
        );
        match lookup::check_existing_lineage(store, &current.report, &previous.report).await? {
            ExistingLineage::Tracked { regression_id, .. } => {
                info!("Found previous regressions for {}, keep tracking", key);
                self.extend_sequence(current, key, regression_id)
                    .await
                    .map(Some)
            }
            existing => {
                info!("No previous regressions found for {}, not tracking", key);
                self.skipped(
                    current,
                    key,
                    Transition::PriorFailedUntracked,
                    existing.regression_id(),
                );
                Ok(None)
            }
        }
    }

    /// Start a lineage `[pass, current]` in the document for the current
    /// scope, creating the document when none exists yet.
    async fn start_sequence(
        &self,
        current: &AggregatedReport,
        key: &LineageKey,
        pass: ReportSummary,
    ) -> Result<TrackResult, EngineError> {
        let scope = RegressionScope::of(&current.report);
        let guard = self
            .locks
            .acquire(&scope.lock_key(&self.settings.lock_prefix), self.settings.lock_timeout)
            .await?;

        let summary = current.summary();
        let (write, regression_id) = match self.store.regression_for_scope(&scope).await? {
            Some(doc) if doc.contains(key) => {
                let write = self
                    .store
                    .update_lineage(&doc.id, key, LineageUpdate::AddToSet(summary))
                    .await?;
                (write, doc.id)
            }
            Some(doc) => {
                let write = self
                    .store
                    .update_lineage(&doc.id, key, LineageUpdate::SetIfAbsent(vec![pass, summary]))
                    .await?;
                (write, doc.id)
            }
            None => {
                let doc = RegressionDoc::new(
                    &scope,
                    current.report.created_on,
                    key.clone(),
                    vec![pass, summary],
                );
                self.store.insert_regression(doc).await?
            }
        };
        drop(guard);

        let status = write_status(write, regression_id)?;
        self.finish(current, key, scope, Transition::NewRegression, status, regression_id)
            .await
    }

    /// Append `current` to a lineage already tracked in `regression_id`.
    async fn extend_sequence(
        &self,
        current: &AggregatedReport,
        key: &LineageKey,
        regression_id: DocId,
    ) -> Result<TrackResult, EngineError> {
        let doc = self
            .store
            .regression(&regression_id)
            .await?
            .ok_or(EngineError::RegressionMissing(regression_id))?;
        let scope = doc.scope();
        let guard = self
            .locks
            .acquire(&scope.lock_key(&self.settings.lock_prefix), self.settings.lock_timeout)
            .await?;
        let write = self
            .store
            .update_lineage(&regression_id, key, LineageUpdate::AddToSet(current.summary()))
            .await?;
        drop(guard);

        let status = write_status(write, regression_id)?;
        self.finish(current, key, scope, Transition::Continue, status, regression_id)
            .await
    }

    async fn finish(
        &self,
        current: &AggregatedReport,
        key: &LineageKey,
        scope: RegressionScope,
        transition: Transition,
        status: TrackStatus,
        regression_id: DocId,
    ) -> Result<TrackResult, EngineError> {
        self.store
            .insert_index_entry(RegressionIndexEntry {
                report_id: current.id(),
                regression_id,
                created_on: current.report.created_on,
            })
            .await?;

        if let Some(events) = &self.events {
            events.emit_regression(&RegressionEvent {
                report_id: current.id(),
                scope,
                key: key.clone(),
                transition,
                regression_id: Some(regression_id),
                status: Some(status),
            });
        }

        Ok(TrackResult {
            status,
            regression_id,
            transition,
        })
    }

    fn skipped(
        &self,
        current: &AggregatedReport,
        key: &LineageKey,
        transition: Transition,
        regression_id: Option<DocId>,
    ) {
        if let Some(events) = &self.events {
            events.emit_regression(&RegressionEvent {
                report_id: current.id(),
                scope: RegressionScope::of(&current.report),
                key: key.clone(),
                transition,
                regression_id,
                status: None,
            });
        }
    }
}

fn write_status(write: WriteStatus, regression_id: DocId) -> Result<TrackStatus, EngineError> {
    match write {
        WriteStatus::Created => Ok(TrackStatus::Created),
        WriteStatus::Updated | WriteStatus::Unchanged => Ok(TrackStatus::Updated),
        WriteStatus::NotFound => Err(EngineError::RegressionMissing(regression_id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::lock::LocalLockService;
    use crate::store::MemoryStore;
    use kci_common::testing::fixtures::test_case;
    use kci_common::testing::{ReportFixture, day};
    use kci_common::{Report, TestStatus};

    struct Harness {
        store: Arc<MemoryStore>,
        tracker: RegressionTracker,
    }

    impl Harness {
        fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            let tracker = RegressionTracker::new(
                store.clone(),
                Arc::new(LocalLockService::new()),
                TrackerSettings::default(),
            );
            Self { store, tracker }
        }

        fn report(&self, kernel: &str, created: u32, status: TestStatus) -> Report {
            let case = test_case("t1", status);
            self.store.insert_test_case(case.clone());
            let report = ReportFixture::new("baseline")
                .kernel(kernel)
                .created_on(day(created))
                .test_cases(&[case])
                .build();
            self.store.insert_report(report.clone());
            report
        }

        async fn track(&self, report: Report) -> Option<TrackResult> {
            let agg = aggregate(self.store.as_ref(), report).await.unwrap();
            self.tracker.check_and_track(&agg).await.unwrap()
        }
    }

    #[tokio::test]
    async fn test_no_history_tracks_nothing() {
        let h = Harness::new();
        let current = h.report("v1", 1, TestStatus::Fail);
        assert!(h.track(current).await.is_none());
        assert!(h.store.regressions().is_empty());
    }

    #[tokio::test]
    async fn test_pass_then_fail_creates_lineage() {
        let h = Harness::new();
        let pass = h.report("v1", 1, TestStatus::Pass);
        let fail = h.report("v2", 2, TestStatus::Fail);

        let result = h.track(fail.clone()).await.unwrap();
        assert_eq!(result.status, TrackStatus::Created);
        assert_eq!(result.transition, Transition::NewRegression);

        let docs = h.store.regressions();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].kernel, "v2");
        let history = docs[0].history(&build_key(&fail)).unwrap();
        let ids: Vec<_> = history.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![pass.id, fail.id]);

        let index = h.store.index_entries();
        assert_eq!(index.len(), 1);
        assert_eq!(index[0].report_id, fail.id);
        assert_eq!(index[0].regression_id, result.regression_id);
    }

    #[tokio::test]
    async fn test_fail_after_tracked_fail_appends() {
        let h = Harness::new();
        h.report("v1", 1, TestStatus::Pass);
        let first = h.report("v2", 2, TestStatus::Fail);
        let created = h.track(first).await.unwrap();

        let second = h.report("v3", 3, TestStatus::Fail);
        let extended = h.track(second.clone()).await.unwrap();
        assert_eq!(extended.status, TrackStatus::Updated);
        assert_eq!(extended.transition, Transition::Continue);
        assert_eq!(extended.regression_id, created.regression_id);

        let docs = h.store.regressions();
        assert_eq!(docs.len(), 1);
        let history = docs[0].history(&build_key(&second)).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].id, second.id);
    }

    #[tokio::test]
    async fn test_fail_after_untracked_fail_is_skipped() {
        let h = Harness::new();
        h.report("v1", 1, TestStatus::Fail);
        let current = h.report("v2", 2, TestStatus::Fail);
        assert!(h.track(current).await.is_none());
        assert!(h.store.regressions().is_empty());
        assert!(h.store.index_entries().is_empty());
    }

    #[tokio::test]
    async fn test_second_lineage_joins_existing_document() {
        let h = Harness::new();
        h.report("v1", 1, TestStatus::Pass);
        let first = h.report("v2", 2, TestStatus::Fail);
        let created = h.track(first).await.unwrap();

        let case = test_case("t1", TestStatus::Pass);
        h.store.insert_test_case(case.clone());
        let other_pass = ReportFixture::new("baseline")
            .kernel("v1")
            .board("board2")
            .created_on(day(1))
            .test_cases(&[case])
            .build();
        h.store.insert_report(other_pass);
        let case = test_case("t1", TestStatus::Fail);
        h.store.insert_test_case(case.clone());
        let other_fail = ReportFixture::new("baseline")
            .kernel("v2")
            .board("board2")
            .created_on(day(2))
            .test_cases(&[case])
            .build();
        h.store.insert_report(other_fail.clone());

        let joined = h.track(other_fail.clone()).await.unwrap();
        assert_eq!(joined.status, TrackStatus::Updated);
        assert_eq!(joined.regression_id, created.regression_id);

        let docs = h.store.regressions();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].keys().count(), 2);
        assert_eq!(docs[0].history(&build_key(&other_fail)).map(<[_]>::len), Some(2));
    }

    #[tokio::test]
    async fn test_events_report_created_and_skipped() {
        let store = Arc::new(MemoryStore::new());
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let tracker = RegressionTracker::new(
            store.clone(),
            Arc::new(LocalLockService::new()),
            TrackerSettings::default(),
        )
        .with_events(bus);

        let lone = ReportFixture::new("lone").created_on(day(1)).build();
        store.insert_report(lone.clone());
        let agg = aggregate(store.as_ref(), lone).await.unwrap();
        assert!(tracker.check_and_track(&agg).await.unwrap().is_none());

        let msg = rx.recv().await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(parsed["event"], "regression_skipped");
        assert_eq!(parsed["data"]["transition"], "no_history");
    }
}
