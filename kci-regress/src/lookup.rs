//! Prior-report and existing-lineage lookups.

use crate::aggregate::{AggregatedReport, aggregate};
use crate::error::EngineError;
use crate::key::build_key;
use crate::store::{PreviousReportFilter, ReportStore};
use kci_common::{
    DocId, LineageKey, RegressionDoc, RegressionScope, Report, ReportSummary, StoreError,
};
use tracing::debug;

/// What the store already knows about the current lineage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExistingLineage {
    /// The prior report is neither indexed nor covered by a document of its scope.
    Absent,
    /// A document exists but does not track this lineage key.
    Untracked { regression_id: DocId },
    /// The document tracks this lineage; `history` is its current list.
    Tracked {
        regression_id: DocId,
        history: Vec<ReportSummary>,
    },
}

impl ExistingLineage {
    pub fn regression_id(&self) -> Option<DocId> {
        match self {
            Self::Absent => None,
            Self::Untracked { regression_id } | Self::Tracked { regression_id, .. } => {
                Some(*regression_id)
            }
        }
    }

    pub fn is_tracked(&self) -> bool {
        matches!(self, Self::Tracked { .. })
    }
}

/// Most recent earlier report of the same configuration, aggregated.
pub async fn find_previous(
    store: &dyn ReportStore,
    current: &Report,
) -> Result<Option<AggregatedReport>, EngineError> {
    let filter = PreviousReportFilter::for_report(current);
    match store.latest_report(&filter).await? {
        Some(previous) => {
            debug!("Group {} follows earlier report {}", current.id, previous.id);
            Ok(Some(aggregate(store, previous).await?))
        }
        None => Ok(None),
    }
}

/// Look for the regression document that holds `previous`, and check
/// whether it already tracks the lineage `current` belongs to.
///
/// A tracked report is found through its index entry: a lineage stays in
/// the document that started it, so a continuation on a later kernel has
/// no document of its own scope. Reports that were never indexed fall
/// back to the document of their own scope.
pub async fn check_existing_lineage(
    store: &dyn ReportStore,
    current: &Report,
    previous: &Report,
) -> Result<ExistingLineage, StoreError> {
    let key = build_key(current);

    if let Some(entry) = store.index_entry(&previous.id).await? {
        match store.regression(&entry.regression_id).await? {
            Some(doc) if doc.contains(&key) => return Ok(lineage_in(doc, &key)),
            Some(_) => debug!(
                "Regression {} indexed for {} does not track {}",
                entry.regression_id, previous.id, key
            ),
            None => debug!(
                "Regression {} indexed for {} is gone",
                entry.regression_id, previous.id
            ),
        }
    }

    let scope = RegressionScope::of(previous);
    Ok(match store.regression_for_scope(&scope).await? {
        Some(doc) => lineage_in(doc, &key),
        None => ExistingLineage::Absent,
    })
}

fn lineage_in(doc: RegressionDoc, key: &LineageKey) -> ExistingLineage {
    match doc.regressions.get(key) {
        Some(history) => ExistingLineage::Tracked {
            regression_id: doc.id,
            history: history.clone(),
        },
        None => ExistingLineage::Untracked {
            regression_id: doc.id,
        },
    }
}
