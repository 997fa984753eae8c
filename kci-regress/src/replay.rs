//! JSON fixtures of stored reports, replayed through the engine.

use crate::finder::RegressionFinder;
use crate::outcome::FindOutcome;
use crate::store::{MemoryStore, PreviousReportFilter};
use crate::worker::Dispatcher;
use anyhow::{Context, Result};
use kci_common::{DocId, Report, TestCase};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// The reports and test cases an import pipeline would have persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplayFixture {
    #[serde(default)]
    pub reports: Vec<Report>,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

impl ReplayFixture {
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse fixture {}", path.display()))
    }

    /// A store holding every report and test case in the fixture.
    pub fn into_store(self) -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_test_cases(self.test_cases);
        for report in self.reports {
            store.insert_report(report);
        }
        store
    }
}

/// Outcome of one replayed report.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayedReport {
    pub report_id: DocId,
    #[serde(flatten)]
    pub outcome: FindOutcome,
}

/// Run `find` for every top-level report in `store`, oldest first.
///
/// With more than one job, reports are grouped by configuration and the
/// groups are dispatched concurrently. Within a group reports still run
/// oldest first, so a failure is never tracked before its predecessor.
/// Results are returned in completion order.
pub async fn replay(
    store: &MemoryStore,
    finder: Arc<RegressionFinder>,
    jobs: usize,
) -> Vec<ReplayedReport> {
    let roots = store.root_reports();
    info!("Replaying {} top-level reports with {} jobs", roots.len(), jobs);

    let results = if jobs > 1 {
        let chains = configuration_chains(roots);
        debug!("Replaying {} configurations concurrently", chains.len());
        Dispatcher::new(finder, jobs).run_chains(chains).await
    } else {
        let mut results = Vec::with_capacity(roots.len());
        for report in roots {
            let outcome = finder.find(&report.id).await;
            results.push((report.id, outcome));
        }
        results
    };

    results
        .into_iter()
        .map(|(report_id, outcome)| ReplayedReport { report_id, outcome })
        .collect()
}

/// Split `reports` (oldest first) into per-configuration chains, keeping
/// the order inside each chain.
fn configuration_chains(reports: Vec<Report>) -> Vec<Vec<DocId>> {
    let mut chains: Vec<(PreviousReportFilter, Vec<DocId>)> = Vec::new();
    for report in reports {
        match chains
            .iter_mut()
            .find(|(filter, _)| filter.same_configuration(&report))
        {
            Some((_, ids)) => ids.push(report.id),
            None => chains.push((PreviousReportFilter::for_report(&report), vec![report.id])),
        }
    }
    chains.into_iter().map(|(_, ids)| ids).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kci_common::testing::{ReportFixture, day};
    use std::io::Write;

    #[test]
    fn test_fixture_round_trips_through_file() {
        let fixture = ReplayFixture {
            reports: vec![ReportFixture::new("baseline").build()],
            test_cases: Vec::new(),
        };
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&fixture).unwrap().as_bytes())
            .unwrap();

        let loaded = ReplayFixture::from_path(file.path()).unwrap();
        assert_eq!(loaded, fixture);
    }

    #[test]
    fn test_configuration_chains_group_by_board() {
        let a1 = ReportFixture::new("baseline").board("a").created_on(day(1)).build();
        let b1 = ReportFixture::new("baseline").board("b").created_on(day(1)).build();
        let a2 = ReportFixture::new("baseline").board("a").created_on(day(2)).build();
        let b2 = ReportFixture::new("baseline").board("b").created_on(day(2)).build();

        let chains = configuration_chains(vec![a1.clone(), b1.clone(), a2.clone(), b2.clone()]);
        assert_eq!(chains, vec![vec![a1.id, a2.id], vec![b1.id, b2.id]]);
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"reports": [], "builds": []}"#).unwrap();
        let err = ReplayFixture::from_path(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("builds"));
    }
}
