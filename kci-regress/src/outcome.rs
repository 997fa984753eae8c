//! Status reporting for tracking runs.
//!
//! Callers get an HTTP-like status plus the set of regression documents that
//! were touched, never an exception.

use crate::error::EngineError;
use kci_common::{DocId, ErrorCode};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// HTTP-like result of a tracking step or a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "u16")]
pub enum TrackStatus {
    /// 200: nothing to do, or an existing document was updated.
    Updated,
    /// 201: a new regression document was created.
    Created,
    /// 400: the report id was malformed.
    BadRequest,
    /// 404: the report or regression was not found.
    NotFound,
    /// 500: a store or lock operation failed.
    Failed,
}

impl TrackStatus {
    pub const fn code(self) -> u16 {
        match self {
            Self::Updated => 200,
            Self::Created => 201,
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::Failed => 500,
        }
    }

    pub const fn is_success(self) -> bool {
        matches!(self, Self::Updated | Self::Created)
    }

    /// Status class for an error code from the shared catalog.
    pub fn for_error(code: ErrorCode) -> Self {
        match code.status_class() {
            400 => Self::BadRequest,
            404 => Self::NotFound,
            _ => Self::Failed,
        }
    }

    fn rank(self) -> u8 {
        match self {
            Self::Updated => 0,
            Self::Created => 1,
            Self::NotFound => 2,
            Self::BadRequest => 3,
            Self::Failed => 4,
        }
    }

    /// Fold two step statuses into one run status. Failures dominate,
    /// then creation, then plain updates.
    #[must_use]
    pub fn combine(self, other: Self) -> Self {
        if other.rank() > self.rank() { other } else { self }
    }
}

impl From<TrackStatus> for u16 {
    fn from(status: TrackStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for TrackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// The state-machine branch taken for one test group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// No earlier matching report exists.
    NoHistory,
    /// The earlier report passed; a new lineage starts.
    NewRegression,
    /// The earlier report failed and its lineage is tracked; append.
    Continue,
    /// The earlier report failed but was never tracked.
    PriorFailedUntracked,
}

impl Transition {
    /// Whether this branch writes to the store.
    pub const fn tracks(self) -> bool {
        matches!(self, Self::NewRegression | Self::Continue)
    }
}

/// A successful write for one test group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackResult {
    pub status: TrackStatus,
    pub regression_id: DocId,
    pub transition: Transition,
}

/// Aggregate result of one `find` run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FindOutcome {
    pub status: TrackStatus,
    pub regression_ids: BTreeSet<DocId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl Default for FindOutcome {
    fn default() -> Self {
        Self {
            status: TrackStatus::Updated,
            regression_ids: BTreeSet::new(),
            errors: Vec::new(),
        }
    }
}

impl FindOutcome {
    /// Outcome for a run rejected before any lookup.
    pub fn rejected(err: &EngineError) -> Self {
        let mut outcome = Self::default();
        outcome.fail(err);
        outcome
    }

    /// Fold in the result of tracking one group.
    pub fn record(&mut self, result: Result<Option<TrackResult>, EngineError>) {
        match result {
            Ok(Some(tracked)) => {
                self.status = self.status.combine(tracked.status);
                self.regression_ids.insert(tracked.regression_id);
            }
            Ok(None) => {}
            Err(err) => self.fail(&err),
        }
    }

    pub fn fail(&mut self, err: &EngineError) {
        self.status = self.status.combine(TrackStatus::for_error(err.code()));
        self.errors.push(format!("{}: {}", err.code().code_string(), err));
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Whether any regression document was created or extended.
    pub fn tracked(&self) -> bool {
        !self.regression_ids.is_empty()
    }
}
