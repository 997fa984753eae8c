//! Engine error type.

use kci_common::{DocId, DocIdError, ErrorCode, LockError, StoreError};
use thiserror::Error;

/// Everything that can stop one tracking attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error(transparent)]
    InvalidId(#[from] DocIdError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("test group {child} is reachable a second time through {parent}")]
    SharedSubGroup { child: DocId, parent: DocId },

    #[error("regression document {0} disappeared while being extended")]
    RegressionMissing(DocId),
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidId(err) => err.code(),
            Self::Store(err) => err.code(),
            Self::Lock(err) => err.code(),
            Self::SharedSubGroup { .. } => ErrorCode::SharedSubGroup,
            Self::RegressionMissing(_) => ErrorCode::RegressionVanished,
        }
    }
}
