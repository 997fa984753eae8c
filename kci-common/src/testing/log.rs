//! JSONL test records for CI debugging.
//!
//! With `KCI_TEST_LOGGING=1` (or `CI` set) every test holding a
//! [`TestGuard`] writes a start line and a pass/fail line to
//! `target/test-logs/<test>.jsonl`, and tracing output of the tracker
//! crates lands in `target/test-logs/all_tests.jsonl`.
//!
//! ```ignore
//! use kci_common::test_guard;
//!
//! #[tokio::test]
//! async fn tracks_lineage() {
//!     let _guard = test_guard!();
//!     // ...
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, Once};
use std::time::Instant;
use tracing_subscriber::prelude::*;

/// What a guard record marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardEvent {
    Start,
    Pass,
    Fail,
}

/// One line of a per-test JSONL file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardRecord {
    pub timestamp: String,
    pub test_name: String,
    pub event: GuardEvent,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

static GLOBAL_LOGGING_INIT: Once = Once::new();

/// Install a subscriber writing the tracker crates' events as JSON to
/// `all_tests.jsonl` (or `KCI_TEST_LOG_FILE`). `KCI_TEST_LOG_LEVEL` picks
/// the level, `info` by default. Later calls, and calls after another
/// subscriber was installed, do nothing.
pub fn init_global_test_logging() {
    GLOBAL_LOGGING_INIT.call_once(|| {
        let file_layer = global_log_file().map(|file| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(Mutex::new(file))
                .with_thread_ids(true)
                .with_line_number(true)
        });

        let level = std::env::var("KCI_TEST_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let filter =
            tracing_subscriber::EnvFilter::try_new(format!("kci_common={level},kci_regress={level}"))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(tracing_subscriber::fmt::layer().with_test_writer().compact())
            .try_init();
    });
}

fn global_log_file() -> Option<File> {
    let path = match std::env::var("KCI_TEST_LOG_FILE") {
        Ok(custom) => PathBuf::from(custom),
        Err(_) => log_dir().join("all_tests.jsonl"),
    };
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    File::create(path).ok()
}

/// `target/test-logs`, found from `CARGO_TARGET_DIR` or by walking up.
fn log_dir() -> PathBuf {
    if let Ok(target_dir) = std::env::var("CARGO_TARGET_DIR") {
        return PathBuf::from(target_dir).join("test-logs");
    }
    let mut cwd = std::env::current_dir().unwrap_or_default();
    loop {
        if cwd.join("target").is_dir() {
            return cwd.join("target").join("test-logs");
        }
        if !cwd.pop() {
            return PathBuf::from("target").join("test-logs");
        }
    }
}

struct GuardLog {
    test_name: String,
    started: Instant,
    file: Option<Mutex<File>>,
}

impl GuardLog {
    fn open(test_name: &str) -> Self {
        let dir = log_dir();
        let safe_name = test_name.replace("::", "_").replace(['/', '\\'], "_");
        let file = std::fs::create_dir_all(&dir)
            .and_then(|()| File::create(dir.join(format!("{safe_name}.jsonl"))))
            .ok();
        Self {
            test_name: test_name.to_string(),
            started: Instant::now(),
            file: file.map(Mutex::new),
        }
    }

    fn record(&self, event: GuardEvent, reason: Option<String>) {
        let record = GuardRecord {
            timestamp: chrono::Utc::now().to_rfc3339(),
            test_name: self.test_name.clone(),
            event,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
            reason,
        };
        if let Some(file) = &self.file
            && let Ok(mut f) = file.lock()
            && let Ok(json) = serde_json::to_string(&record)
        {
            let _ = writeln!(f, "{json}");
        }
        tracing::info!(
            test = %record.test_name,
            event = ?record.event,
            elapsed_ms = record.elapsed_ms,
            "test guard"
        );
    }
}

/// Records test start on creation and pass or fail on drop. A no-op unless
/// `KCI_TEST_LOGGING=1`, or `CI` is set and `KCI_TEST_LOGGING` is not `0`.
pub struct TestGuard {
    log: Option<GuardLog>,
}

impl TestGuard {
    pub fn new(test_name: &str) -> Self {
        let log = Self::is_enabled().then(|| {
            init_global_test_logging();
            let log = GuardLog::open(test_name);
            log.record(GuardEvent::Start, None);
            log
        });
        Self { log }
    }

    fn is_enabled() -> bool {
        match std::env::var("KCI_TEST_LOGGING").as_deref() {
            Ok("1" | "true") => true,
            Ok("0" | "false") => false,
            _ => std::env::var("CI").is_ok(),
        }
    }
}

impl Drop for TestGuard {
    fn drop(&mut self) {
        if let Some(log) = self.log.take() {
            if std::thread::panicking() {
                log.record(GuardEvent::Fail, Some("test panicked".to_string()));
            } else {
                log.record(GuardEvent::Pass, None);
            }
        }
    }
}

/// Create a [`TestGuard`] named after the enclosing function.
#[macro_export]
macro_rules! test_guard {
    () => {{
        fn _f() {}
        fn _type_name_of<T>(_: T) -> &'static str {
            std::any::type_name::<T>()
        }
        let name = _type_name_of(_f);
        let name = name.strip_suffix("::_f").unwrap_or(name);
        let name = name.rsplit("::").next().unwrap_or(name);
        $crate::testing::TestGuard::new(name)
    }};
}
