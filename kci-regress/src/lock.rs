//! Named mutual-exclusion locks with acquisition timeout.

use async_trait::async_trait;
use kci_common::LockError;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, trace};

/// Prune idle entries once the map grows past this many keys.
const PRUNE_THRESHOLD: usize = 1024;

/// Held lock. Dropping it releases the lock on every exit path.
pub struct LockGuard {
    key: String,
    _release: Box<dyn Send + Sync>,
}

impl LockGuard {
    /// Wrap whatever value keeps the lock held; dropping it must release.
    pub fn new(key: impl Into<String>, release: impl Send + Sync + 'static) -> Self {
        Self {
            key: key.into(),
            _release: Box::new(release),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard").field("key", &self.key).finish()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        trace!("Released lock {}", self.key);
    }
}

#[async_trait]
pub trait LockService: Send + Sync {
    /// Block until `key` is held or `timeout` elapses.
    async fn acquire(&self, key: &str, timeout: Duration) -> Result<LockGuard, LockError>;
}

/// Process-local lock service: one async mutex per key.
#[derive(Debug, Default)]
pub struct LocalLockService {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl LocalLockService {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks.len() > PRUNE_THRESHOLD {
            locks.retain(|_, slot| Arc::strong_count(slot) > 1);
        }
        locks.entry(key.to_string()).or_default().clone()
    }
}

#[async_trait]
impl LockService for LocalLockService {
    async fn acquire(&self, key: &str, timeout: Duration) -> Result<LockGuard, LockError> {
        let slot = self.slot(key);
        match tokio::time::timeout(timeout, slot.lock_owned()).await {
            Ok(held) => {
                debug!("Acquired lock {}", key);
                Ok(LockGuard::new(key, held))
            }
            Err(_) => Err(LockError::Timeout {
                key: key.to_string(),
                timeout,
            }),
        }
    }
}
