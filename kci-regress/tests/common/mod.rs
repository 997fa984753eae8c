#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kci_common::testing::ReportFixture;
use kci_common::testing::fixtures::test_case;
use kci_common::{
    DocId, LineageKey, RegressionDoc, RegressionIndexEntry, RegressionScope, Report, StoreError,
    TestCase, TestStatus,
};
use kci_regress::store::REGRESSIONS_COLLECTION;
use kci_regress::{
    LineageUpdate, LocalLockService, LockService, MemoryStore, PreviousReportFilter,
    RegressionFinder, ReportStore, TrackerSettings, WriteStatus,
};
use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("kci_regress=debug"));

        // A guard-enabled run may already have installed the JSONL logger.
        let _ = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_line_number(true)
                    .json(),
            )
            .with(filter)
            .try_init();
    });
}

#[ctor::ctor]
fn setup() {
    init_test_logging();
}

/// Short lock timeout so contention tests finish quickly.
pub fn fast_settings() -> TrackerSettings {
    TrackerSettings {
        lock_timeout: Duration::from_millis(100),
        lock_prefix: "test-group-regressions".to_string(),
    }
}

/// Store one test group with a test case per status.
pub fn store_group(store: &MemoryStore, fixture: ReportFixture, statuses: &[TestStatus]) -> Report {
    let cases: Vec<TestCase> = statuses
        .iter()
        .enumerate()
        .map(|(i, status)| test_case(&format!("case-{i}"), *status))
        .collect();
    store.insert_test_cases(cases.clone());
    let report = fixture.test_cases(&cases).build();
    store.insert_report(report.clone());
    report
}

/// A `baseline` group for kernel `kernel` created on `day`.
pub fn baseline(kernel: &str, created_on: DateTime<Utc>) -> ReportFixture {
    ReportFixture::new("baseline")
        .kernel(kernel)
        .created_on(created_on)
}

/// A finder over `store` with a private lock service.
pub fn finder(store: Arc<dyn ReportStore>) -> RegressionFinder {
    finder_with_locks(store, Arc::new(LocalLockService::new()))
}

pub fn finder_with_locks(
    store: Arc<dyn ReportStore>,
    locks: Arc<dyn LockService>,
) -> RegressionFinder {
    RegressionFinder::new(store, locks, fast_settings())
}

pub fn single_history_len(doc: &RegressionDoc, key: &LineageKey) -> usize {
    doc.history(key).map_or(0, <[_]>::len)
}

/// Memory store whose regression writes fail while `fail_writes` is set,
/// and whose lineage updates miss their document while `lose_updates` is.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    fail_writes: AtomicBool,
    lose_updates: AtomicBool,
}

impl FlakyStore {
    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    pub fn set_losing_updates(&self, losing: bool) {
        self.lose_updates.store(losing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StoreError::write(REGRESSIONS_COLLECTION, "connection reset"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ReportStore for FlakyStore {
    async fn report(&self, id: &DocId) -> Result<Option<Report>, StoreError> {
        self.inner.report(id).await
    }

    async fn test_case(&self, id: &DocId) -> Result<Option<TestCase>, StoreError> {
        self.inner.test_case(id).await
    }

    async fn latest_report(
        &self,
        filter: &PreviousReportFilter,
    ) -> Result<Option<Report>, StoreError> {
        self.inner.latest_report(filter).await
    }

    async fn regression(&self, id: &DocId) -> Result<Option<RegressionDoc>, StoreError> {
        self.inner.regression(id).await
    }

    async fn regression_for_scope(
        &self,
        scope: &RegressionScope,
    ) -> Result<Option<RegressionDoc>, StoreError> {
        self.inner.regression_for_scope(scope).await
    }

    async fn insert_regression(
        &self,
        doc: RegressionDoc,
    ) -> Result<(WriteStatus, DocId), StoreError> {
        self.check()?;
        self.inner.insert_regression(doc).await
    }

    async fn update_lineage(
        &self,
        id: &DocId,
        key: &LineageKey,
        update: LineageUpdate,
    ) -> Result<WriteStatus, StoreError> {
        self.check()?;
        if self.lose_updates.load(Ordering::SeqCst) {
            return Ok(WriteStatus::NotFound);
        }
        self.inner.update_lineage(id, key, update).await
    }

    async fn index_entry(
        &self,
        report_id: &DocId,
    ) -> Result<Option<RegressionIndexEntry>, StoreError> {
        self.inner.index_entry(report_id).await
    }

    async fn insert_index_entry(
        &self,
        entry: RegressionIndexEntry,
    ) -> Result<WriteStatus, StoreError> {
        self.inner.insert_index_entry(entry).await
    }
}
