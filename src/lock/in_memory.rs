use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::LockError;

type LockTable = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// Held lock on one record. Released on drop, and the table entry goes with
/// it once nobody else holds or waits on the key.
pub struct RecordGuard {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
    table: LockTable,
}

impl RecordGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for RecordGuard {
    fn drop(&mut self) {
        // The owned guard keeps its own handle on the mutex; release it first.
        drop(self.guard.take());

        let Ok(mut locks) = self.table.lock() else {
            tracing::warn!(key = %self.key, "record lock table poisoned, leaving entry");
            return;
        };
        let idle = locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle {
            locks.remove(&self.key);
            tracing::trace!(key = %self.key, "record lock entry released");
        }
    }
}

impl std::fmt::Debug for RecordGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordGuard").field("key", &self.key).finish()
    }
}

/// In-memory lock manager backed by a `HashMap<String, Arc<AsyncMutex<()>>>`.
///
/// Lazily creates one lock per unique key and returns the same `Arc` for
/// repeated lookups. Keys are `"collection:id"`. Entries only live while a
/// guard or a waiter needs them.
#[derive(Default)]
pub struct RecordLocks {
    locks: LockTable,
}

impl RecordLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for a record, waiting until it becomes available.
    pub async fn acquire(&self, collection: &str, id: &str) -> Result<RecordGuard, LockError> {
        let key = Self::make_key(collection, id);
        let lock = self.ensure_lock(&key)?;
        tracing::trace!(key = %key, "waiting for record lock");
        let guard = lock.lock_owned().await;
        Ok(self.guard(key, guard))
    }

    /// Try to acquire the lock without waiting.
    /// Returns `Ok(None)` if it is already held.
    pub fn try_acquire(&self, collection: &str, id: &str) -> Result<Option<RecordGuard>, LockError> {
        let key = Self::make_key(collection, id);
        let lock = self.ensure_lock(&key)?;
        match lock.try_lock_owned() {
            Ok(guard) => Ok(Some(self.guard(key, guard))),
            Err(_) => Ok(None),
        }
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> Result<usize, LockError> {
        let locks = self
            .locks
            .lock()
            .map_err(|_| LockError::Poisoned("record lock table poisoned".into()))?;
        Ok(locks.len())
    }

    pub fn is_empty(&self) -> Result<bool, LockError> {
        Ok(self.len()? == 0)
    }

    fn guard(&self, key: String, guard: OwnedMutexGuard<()>) -> RecordGuard {
        RecordGuard {
            key,
            guard: Some(guard),
            table: Arc::clone(&self.locks),
        }
    }

    fn ensure_lock(&self, key: &str) -> Result<Arc<AsyncMutex<()>>, LockError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| LockError::Poisoned("record lock table poisoned".into()))?;
        Ok(locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone())
    }

    fn make_key(collection: &str, id: &str) -> String {
        format!("{}:{}", collection, id)
    }
}
