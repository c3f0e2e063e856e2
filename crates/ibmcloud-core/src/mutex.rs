//! Named mutexes
//!
//! Some remote objects are singletons per scope (an App ID tenant's password
//! policy, a zone's permitted network list). Two adapters doing
//! read-modify-write against the same scope must not interleave, so they
//! take a lock keyed by the scope string first.
//!
//! ```rust
//! # async fn example() {
//! use ibmcloud_core::MutexKv;
//!
//! let _guard = MutexKv::global().lock("tenant-123").await;
//! // ... GET, modify, PUT ...
//! // released when `_guard` is dropped
//! # }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Lazily populated map of string key to lock
#[derive(Debug, Default)]
pub struct MutexKv {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Held lock on one key; released on drop
#[derive(Debug)]
pub struct MutexGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for MutexGuard {
    fn drop(&mut self) {
        tracing::trace!("Unlocked {:?}", self.key);
    }
}

impl MutexKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide instance shared by every adapter
    pub fn global() -> &'static MutexKv {
        static GLOBAL: OnceLock<MutexKv> = OnceLock::new();
        GLOBAL.get_or_init(MutexKv::new)
    }

    fn get(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(key.to_string()).or_default().clone()
    }

    /// Wait for and take the lock for `key`
    pub async fn lock(&self, key: impl Into<String>) -> MutexGuard {
        let key = key.into();
        tracing::trace!("Locking {:?}", key);
        let guard = self.get(&key).lock_owned().await;
        tracing::trace!("Locked {:?}", key);
        MutexGuard { key, _guard: guard }
    }

    /// Number of keys that have ever been locked
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
