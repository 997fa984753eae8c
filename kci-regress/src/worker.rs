//! Bounded concurrent dispatch of `find` runs.

use crate::finder::RegressionFinder;
use crate::outcome::{FindOutcome, TrackStatus};
use kci_common::DocId;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error};

/// Runs [`RegressionFinder::find`] for many reports with at most `workers`
/// tasks in flight. No ordering between tasks is promised.
pub struct Dispatcher {
    finder: Arc<RegressionFinder>,
    workers: usize,
}

impl Dispatcher {
    pub fn new(finder: Arc<RegressionFinder>, workers: usize) -> Self {
        Self {
            finder,
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// One outcome per id, in completion order.
    pub async fn run(&self, ids: Vec<DocId>) -> Vec<(DocId, FindOutcome)> {
        self.run_chains(ids.into_iter().map(|id| vec![id]).collect())
            .await
    }

    /// Like [`run`](Self::run), but the ids of one chain are found one
    /// after another in the given order. Only whole chains run concurrently.
    pub async fn run_chains(&self, chains: Vec<Vec<DocId>>) -> Vec<(DocId, FindOutcome)> {
        let permits = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();
        let total: usize = chains.iter().map(Vec::len).sum();

        for chain in chains {
            let finder = Arc::clone(&self.finder);
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                // The semaphore is never closed.
                let _permit = permits.acquire_owned().await.ok();
                let mut outcomes = Vec::with_capacity(chain.len());
                for id in chain {
                    let outcome = finder.find(&id).await;
                    outcomes.push((id, outcome));
                }
                outcomes
            });
        }

        let mut results = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcomes) => results.extend(outcomes),
                Err(err) => error!("Regression task aborted: {}", err),
            }
        }
        debug!("Dispatched {} of {} reports", results.len(), total);
        results
    }
}

/// Fold per-report outcomes into one status.
pub fn overall_status<'a>(outcomes: impl IntoIterator<Item = &'a FindOutcome>) -> TrackStatus {
    outcomes
        .into_iter()
        .fold(TrackStatus::Updated, |acc, outcome| acc.combine(outcome.status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::LocalLockService;
    use crate::store::MemoryStore;
    use crate::tracker::TrackerSettings;
    use kci_common::testing::ReportFixture;

    #[tokio::test]
    async fn test_run_returns_one_outcome_per_id() {
        let store = Arc::new(MemoryStore::new());
        let ids: Vec<_> = (0..5)
            .map(|i| store.insert_report(ReportFixture::new(&format!("g{i}")).build()))
            .collect();
        let finder = Arc::new(RegressionFinder::new(
            store,
            Arc::new(LocalLockService::new()),
            TrackerSettings::default(),
        ));
        let dispatcher = Dispatcher::new(finder, 2);

        let results = dispatcher.run(ids.clone()).await;
        assert_eq!(results.len(), ids.len());
        for id in &ids {
            assert!(results.iter().any(|(got, _)| got == id));
        }
        assert_eq!(
            overall_status(results.iter().map(|(_, outcome)| outcome)),
            TrackStatus::Updated
        );
    }

    #[tokio::test]
    async fn test_run_chains_keeps_chain_order() {
        let store = Arc::new(MemoryStore::new());
        let chains: Vec<Vec<DocId>> = (0..3)
            .map(|c| {
                (0..4)
                    .map(|i| store.insert_report(ReportFixture::new(&format!("c{c}-{i}")).build()))
                    .collect()
            })
            .collect();
        let finder = Arc::new(RegressionFinder::new(
            store,
            Arc::new(LocalLockService::new()),
            TrackerSettings::default(),
        ));

        let results = Dispatcher::new(finder, 3).run_chains(chains.clone()).await;
        assert_eq!(results.len(), 12);
        for chain in &chains {
            let seen: Vec<DocId> = results
                .iter()
                .map(|(id, _)| *id)
                .filter(|id| chain.contains(id))
                .collect();
            assert_eq!(&seen, chain);
        }
    }

    #[test]
    fn test_zero_workers_is_clamped() {
        let finder = Arc::new(RegressionFinder::new(
            Arc::new(MemoryStore::new()),
            Arc::new(LocalLockService::new()),
            TrackerSettings::default(),
        ));
        assert_eq!(Dispatcher::new(finder, 0).workers(), 1);
    }
}
