//! Entry point run once per imported report.

use crate::aggregate::aggregate;
use crate::error::EngineError;
use crate::events::EventBus;
use crate::lock::LockService;
use crate::outcome::FindOutcome;
use crate::store::ReportStore;
use crate::tracker::{RegressionTracker, TrackerSettings};
use kci_common::DocId;
use std::sync::Arc;
use tracing::{debug, info};

pub struct RegressionFinder {
    store: Arc<dyn ReportStore>,
    tracker: RegressionTracker,
}

impl RegressionFinder {
    pub fn new(
        store: Arc<dyn ReportStore>,
        locks: Arc<dyn LockService>,
        settings: TrackerSettings,
    ) -> Self {
        let tracker = RegressionTracker::new(store.clone(), locks, settings);
        Self { store, tracker }
    }

    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.tracker = self.tracker.with_events(events);
        self
    }

    /// Parse `report_id` and run [`find`](Self::find). A malformed id
    /// yields a 400 outcome.
    pub async fn find_str(&self, report_id: &str) -> FindOutcome {
        match DocId::parse(report_id) {
            Ok(id) => self.find(&id).await,
            Err(err) => FindOutcome::rejected(&EngineError::from(err)),
        }
    }

    /// Track regressions for a stored report and each of its direct
    /// sub-groups. Running it twice for the same report writes nothing new.
    pub async fn find(&self, report_id: &DocId) -> FindOutcome {
        info!("Searching test group regressions for {}", report_id);
        let mut outcome = FindOutcome::default();
        if let Err(err) = self.find_inner(report_id, &mut outcome).await {
            outcome.fail(&err);
        }
        outcome
    }

    async fn find_inner(
        &self,
        report_id: &DocId,
        outcome: &mut FindOutcome,
    ) -> Result<(), EngineError> {
        let Some(report) = self.store.report(report_id).await? else {
            info!("Test group report {} not found", report_id);
            return Ok(());
        };

        let aggregated = aggregate(self.store.as_ref(), report).await?;
        if !aggregated.has_failures() {
            debug!("Test group {} has no failures", report_id);
            return Ok(());
        }
        if self.store.index_entry(report_id).await?.is_some() {
            info!("Test group {} already tracked", report_id);
            return Ok(());
        }

        outcome.record(self.tracker.check_and_track(&aggregated).await);

        for sub_group in &aggregated.sub_groups {
            if !sub_group.totals.has_failures() {
                continue;
            }
            match self.store.index_entry(&sub_group.id()).await {
                Ok(Some(_)) => {
                    debug!("Sub-group {} already tracked", sub_group.id());
                }
                Ok(None) => outcome.record(self.tracker.check_and_track(sub_group).await),
                Err(err) => outcome.fail(&EngineError::from(err)),
            }
        }
        Ok(())
    }
}
