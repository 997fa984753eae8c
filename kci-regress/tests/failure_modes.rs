//! Error surfacing: every failure becomes a status, never a panic.

mod common;

use common::{FlakyStore, baseline, fast_settings, finder, finder_with_locks, store_group};
use kci_common::test_guard;
use kci_common::testing::{ReportFixture, day};
use kci_common::{DocId, ErrorCode, RegressionScope, TestStatus};
use kci_regress::{
    LocalLockService, LockService, MemoryStore, RegressionQuery, ReportStore, TrackStatus,
};
use std::sync::Arc;
use std::time::Duration;

use TestStatus::{Fail, Pass};

#[tokio::test]
async fn store_write_failure_is_500_and_retry_succeeds() {
    let _guard = test_guard!();
    let store = Arc::new(FlakyStore::default());
    let finder = finder(store.clone());

    store_group(&store.inner, baseline("v1", day(1)), &[Pass]);
    let failing = store_group(&store.inner, baseline("v2", day(2)), &[Fail]);

    store.set_failing(true);
    let outcome = finder.find(&failing.id).await;
    assert_eq!(outcome.status, TrackStatus::Failed);
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].contains(&ErrorCode::StoreWriteFailed.code_string()));
    assert!(store.inner.regressions().is_empty());
    assert!(store.inner.index_entries().is_empty());

    store.set_failing(false);
    let retried = finder.find(&failing.id).await;
    assert_eq!(retried.status, TrackStatus::Created);
    assert_eq!(store.inner.regressions().len(), 1);
}

#[tokio::test]
async fn regression_vanishing_mid_write_is_500() {
    let _guard = test_guard!();
    let store = Arc::new(FlakyStore::default());
    let finder = finder(store.clone());

    store_group(&store.inner, baseline("v1", day(1)), &[Pass]);
    let b = store_group(&store.inner, baseline("v2", day(2)), &[Fail]);
    let c = store_group(&store.inner, baseline("v3", day(3)), &[Fail]);
    assert_eq!(finder.find(&b.id).await.status, TrackStatus::Created);

    store.set_losing_updates(true);
    let outcome = finder.find(&c.id).await;
    assert_eq!(outcome.status, TrackStatus::Failed);
    assert_eq!(outcome.status.code(), 500);
    assert!(outcome.errors[0].contains(&ErrorCode::RegressionVanished.code_string()));
    assert!(store.inner.index_entry(&c.id).await.unwrap().is_none());

    store.set_losing_updates(false);
    assert_eq!(finder.find(&c.id).await.status, TrackStatus::Updated);
}

#[tokio::test]
async fn lock_timeout_is_500() {
    let _guard = test_guard!();
    let store = Arc::new(MemoryStore::new());
    let locks = Arc::new(LocalLockService::new());
    let finder = finder_with_locks(store.clone(), locks.clone());

    store_group(&store, baseline("v1", day(1)), &[Pass]);
    let failing = store_group(&store, baseline("v2", day(2)), &[Fail]);

    let settings = fast_settings();
    let held = locks
        .acquire(
            &RegressionScope::of(&failing).lock_key(&settings.lock_prefix),
            Duration::from_secs(1),
        )
        .await
        .expect("test holds the scope lock");

    let outcome = finder.find(&failing.id).await;
    assert_eq!(outcome.status, TrackStatus::Failed);
    assert!(outcome.errors[0].contains(&ErrorCode::LockTimeout.code_string()));
    assert!(store.regressions().is_empty());

    drop(held);
    let retried = finder.find(&failing.id).await;
    assert_eq!(retried.status, TrackStatus::Created);
}

#[tokio::test]
async fn invalid_report_id_is_400() {
    let store = Arc::new(MemoryStore::new());
    let finder = finder(store.clone());

    for bad in ["", "xyz", "0123456789abcdef0123456", "0123456789abcdef0123456g"] {
        let outcome = finder.find_str(bad).await;
        assert_eq!(outcome.status, TrackStatus::BadRequest, "id {bad:?}");
    }
}

#[tokio::test]
async fn unknown_report_is_nothing_to_do() {
    let store = Arc::new(MemoryStore::new());
    let outcome = finder(store).find(&DocId::new()).await;
    assert_eq!(outcome.status, TrackStatus::Updated);
    assert!(!outcome.tracked());
}

#[tokio::test]
async fn shared_sub_group_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let finder = finder(store.clone());

    let shared = store_group(&store, ReportFixture::new("shared"), &[Fail]);
    let left = store_group(
        &store,
        ReportFixture::new("left").sub_groups(vec![shared.id]),
        &[],
    );
    let right = store_group(
        &store,
        ReportFixture::new("right").sub_groups(vec![shared.id]),
        &[],
    );
    let root = store_group(
        &store,
        baseline("v1", day(1)).sub_groups(vec![left.id, right.id]),
        &[],
    );

    let outcome = finder.find(&root.id).await;
    assert_eq!(outcome.status, TrackStatus::Failed);
    assert!(outcome.errors[0].contains(&ErrorCode::SharedSubGroup.code_string()));
    assert!(store.regressions().is_empty());
}

#[tokio::test]
async fn query_rejects_bad_and_unknown_ids() {
    let query = RegressionQuery::new(Arc::new(MemoryStore::new()));

    let bad = query.regressions_for("not-hex").await;
    assert_eq!(bad.status, TrackStatus::BadRequest);
    assert_eq!(bad.status.code(), 400);

    let unknown = query.regressions_for(&DocId::new().to_string()).await;
    assert_eq!(unknown.status, TrackStatus::NotFound);
    assert_eq!(unknown.status.code(), 404);
}
