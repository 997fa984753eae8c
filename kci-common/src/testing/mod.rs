//! Test helpers: structured test logging and report tree fixtures.

pub mod fixtures;
pub mod log;

pub use fixtures::{ReportFixture, day};
pub use log::{GuardEvent, GuardRecord, TestGuard, init_global_test_logging};
