//! Read side: the regression history a report belongs to.

use crate::error::EngineError;
use crate::key::build_key;
use crate::outcome::TrackStatus;
use crate::store::ReportStore;
use kci_common::{DocId, ErrorCode, LineageKey, ReportSummary};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Response for one history lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryResponse {
    pub status: TrackStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regression_id: Option<DocId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<LineageKey>,
    pub result: Vec<ReportSummary>,
}

impl HistoryResponse {
    fn empty(status: TrackStatus, reason: Option<String>) -> Self {
        Self {
            status,
            reason,
            regression_id: None,
            key: None,
            result: Vec::new(),
        }
    }

    fn failed(err: &EngineError) -> Self {
        Self::coded(err.code(), &err.to_string())
    }

    fn coded(code: ErrorCode, detail: &str) -> Self {
        Self::empty(
            TrackStatus::for_error(code),
            Some(format!("{}: {}", code.code_string(), detail)),
        )
    }

    pub fn count(&self) -> usize {
        self.result.len()
    }
}

pub struct RegressionQuery {
    store: Arc<dyn ReportStore>,
}

impl RegressionQuery {
    pub fn new(store: Arc<dyn ReportStore>) -> Self {
        Self { store }
    }

    /// Ordered history of the lineage `report_id` was tracked in.
    pub async fn regressions_for(&self, report_id: &str) -> HistoryResponse {
        let id = match DocId::parse(report_id) {
            Ok(id) => id,
            Err(err) => return HistoryResponse::failed(&EngineError::from(err)),
        };
        match self.lookup(&id).await {
            Ok(response) => response,
            Err(err) => HistoryResponse::failed(&err),
        }
    }

    async fn lookup(&self, id: &DocId) -> Result<HistoryResponse, EngineError> {
        let Some(report) = self.store.report(id).await? else {
            return Ok(HistoryResponse::coded(
                ErrorCode::ReportNotFound,
                &format!("test group report {id} not found"),
            ));
        };

        let Some(entry) = self.store.index_entry(id).await? else {
            debug!("Test group {} is not part of any regression", id);
            return Ok(HistoryResponse::empty(TrackStatus::Updated, None));
        };

        let Some(doc) = self.store.regression(&entry.regression_id).await? else {
            warn!(
                "Index entry for {} points at missing regression {}",
                id, entry.regression_id
            );
            return Ok(HistoryResponse::coded(
                ErrorCode::RegressionNotFound,
                &format!("regression document {} not found", entry.regression_id),
            ));
        };

        let key = build_key(&report);
        let result = match doc.history(&key) {
            Some(history) => history.to_vec(),
            None => {
                warn!("Regression {} has no lineage {}", doc.id, key);
                Vec::new()
            }
        };
        Ok(HistoryResponse {
            status: TrackStatus::Updated,
            reason: None,
            regression_id: Some(doc.id),
            key: Some(key),
            result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use kci_common::RegressionIndexEntry;
    use kci_common::testing::ReportFixture;

    #[tokio::test]
    async fn test_invalid_and_missing_ids() {
        let query = RegressionQuery::new(Arc::new(MemoryStore::new()));

        let bad = query.regressions_for("1234").await;
        assert_eq!(bad.status, TrackStatus::BadRequest);
        assert!(bad.reason.is_some());

        let missing = query.regressions_for(&DocId::new().to_string()).await;
        assert_eq!(missing.status, TrackStatus::NotFound);
        assert_eq!(missing.count(), 0);
        assert!(missing.reason.unwrap().starts_with("KCI-E100"));
    }

    #[tokio::test]
    async fn test_stale_index_entry_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let report = ReportFixture::new("baseline").build();
        let id = store.insert_report(report.clone());
        store
            .insert_index_entry(RegressionIndexEntry {
                report_id: id,
                regression_id: DocId::new(),
                created_on: report.created_on,
            })
            .await
            .unwrap();

        let response = RegressionQuery::new(store).regressions_for(&id.to_string()).await;
        assert_eq!(response.status, TrackStatus::NotFound);
        assert!(response.reason.unwrap().starts_with("KCI-E101"));
    }

    #[tokio::test]
    async fn test_untracked_report_returns_empty_list() {
        let store = Arc::new(MemoryStore::new());
        let id = store.insert_report(ReportFixture::new("baseline").build());
        let query = RegressionQuery::new(store);

        let response = query.regressions_for(&id.to_string()).await;
        assert_eq!(response.status, TrackStatus::Updated);
        assert!(response.result.is_empty());
        assert!(response.regression_id.is_none());
    }
}
