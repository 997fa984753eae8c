//! Test group regression tracking.
//!
//! [`RegressionFinder::find`] runs once per imported test group report. It
//! aggregates the report tree, compares each failing group with the most
//! recent earlier report of the same configuration, and creates or extends
//! the regression lineage under a per-scope lock.

pub mod aggregate;
pub mod error;
pub mod events;
pub mod finder;
pub mod key;
pub mod lock;
pub mod lookup;
pub mod outcome;
pub mod query;
pub mod replay;
pub mod store;
pub mod tracker;
pub mod worker;

pub use aggregate::{AggregatedReport, aggregate};
pub use error::EngineError;
pub use events::{EventBus, RegressionEvent};
pub use finder::RegressionFinder;
pub use key::{LineageDimensions, build_key};
pub use lock::{LocalLockService, LockGuard, LockService};
pub use lookup::{ExistingLineage, check_existing_lineage, find_previous};
pub use outcome::{FindOutcome, TrackResult, TrackStatus, Transition};
pub use query::{HistoryResponse, RegressionQuery};
pub use replay::{ReplayFixture, ReplayedReport, replay};
pub use store::{LineageUpdate, MemoryStore, PreviousReportFilter, ReportStore, WriteStatus};
pub use tracker::{RegressionTracker, TrackerSettings};
pub use worker::{Dispatcher, overall_status};
