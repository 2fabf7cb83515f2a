//! CachedStore - read-through document cache with TTL expiry.
//!
//! Wraps any [`DocumentStore`] the same way a decorator would:
//! - `get` serves a cached copy younger than the TTL, otherwise reads through
//! - `put` / `delete` drop the cached entry before returning to the caller
//! - `list` always reads through
//!
//! Cache keys are `"collection:id"`, so different collections with the same
//! ID do not collide.
//!
//! Every invalidation bumps a generation counter. A read-through only fills
//! the cache if no invalidation happened while it was reading, so a slow read
//! that overlaps a write never puts the old document back.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use crate::store::{DocumentPredicate, DocumentStore, StoreError};

struct CacheEntry {
    document: Value,
    stored_at: Instant,
}

/// Hit/miss counters, mostly useful in tests and debug logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    stats: CacheStats,
    generation: u64,
}

enum Lookup {
    Hit(Value),
    /// Carries the generation seen at the miss.
    Miss(u64),
}

/// A `DocumentStore` wrapper that caches single-document reads.
pub struct CachedStore<S> {
    inner: S,
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl<S> CachedStore<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        CachedStore {
            inner,
            ttl,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Access the inner store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Drop the cached copy of one document.
    pub fn invalidate(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let key = Self::make_key(collection, id);
        let mut state = self.lock_state("invalidate")?;
        state.generation += 1;
        if state.entries.remove(&key).is_some() {
            state.stats.invalidations += 1;
            tracing::trace!(key = %key, "cache entry invalidated");
        }
        Ok(())
    }

    /// Drop every cached document of a collection.
    pub fn invalidate_collection(&self, collection: &str) -> Result<(), StoreError> {
        let prefix = format!("{}:", collection);
        let mut state = self.lock_state("invalidate collection")?;
        state.generation += 1;
        let before = state.entries.len();
        state.entries.retain(|key, _| !key.starts_with(&prefix));
        let removed = (before - state.entries.len()) as u64;
        state.stats.invalidations += removed;
        Ok(())
    }

    /// Drop everything.
    pub fn clear(&self) -> Result<(), StoreError> {
        let mut state = self.lock_state("clear")?;
        state.generation += 1;
        let removed = state.entries.len() as u64;
        state.entries.clear();
        state.stats.invalidations += removed;
        Ok(())
    }

    pub fn stats(&self) -> Result<CacheStats, StoreError> {
        Ok(self.lock_state("stats")?.stats)
    }

    /// Number of live (possibly expired but not yet evicted) entries.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock_state("len")?.entries.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    fn lookup(&self, key: &str) -> Result<Lookup, StoreError> {
        let mut state = self.lock_state("lookup")?;
        let fresh = state
            .entries
            .get(key)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.document.clone());

        match fresh {
            Some(document) => {
                state.stats.hits += 1;
                Ok(Lookup::Hit(document))
            }
            None => {
                state.entries.remove(key);
                state.stats.misses += 1;
                Ok(Lookup::Miss(state.generation))
            }
        }
    }

    /// Cache a read-through result unless something was invalidated since
    /// the miss at `seen`.
    fn remember(&self, key: String, document: Value, seen: u64) -> Result<(), StoreError> {
        let mut state = self.lock_state("remember")?;
        if state.generation != seen {
            tracing::trace!(key = %key, "invalidated during read, not caching");
            return Ok(());
        }
        state.entries.insert(
            key,
            CacheEntry {
                document,
                stored_at: Instant::now(),
            },
        );
        Ok(())
    }

    fn lock_state(
        &self,
        operation: &'static str,
    ) -> Result<std::sync::MutexGuard<'_, CacheState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Poisoned(operation))
    }

    fn make_key(collection: &str, id: &str) -> String {
        format!("{}:{}", collection, id)
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for CachedStore<S> {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let key = Self::make_key(collection, id);
        let seen = match self.lookup(&key)? {
            Lookup::Hit(document) => {
                tracing::trace!(key = %key, "cache hit");
                return Ok(Some(document));
            }
            Lookup::Miss(generation) => generation,
        };

        let loaded = self.inner.get(collection, id).await?;
        if let Some(document) = &loaded {
            self.remember(key, document.clone(), seen)?;
        }
        Ok(loaded)
    }

    async fn list(
        &self,
        collection: &str,
        predicate: Option<DocumentPredicate<'_>>,
    ) -> Result<Vec<Value>, StoreError> {
        self.inner.list(collection, predicate).await
    }

    async fn put(
        &self,
        collection: &str,
        id: &str,
        document: Value,
        merge: bool,
    ) -> Result<(), StoreError> {
        self.invalidate(collection, id)?;
        let result = self.inner.put(collection, id, document, merge).await;
        // Runs whether or not the write succeeded.
        self.invalidate(collection, id)?;
        result
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        self.invalidate(collection, id)?;
        let result = self.inner.delete(collection, id).await;
        self.invalidate(collection, id)?;
        result
    }
}

/// Builder trait for wrapping a store with a read-through cache.
pub trait Cacheable: Sized {
    fn cached(self, ttl: Duration) -> CachedStore<Self> {
        CachedStore::new(self, ttl)
    }
}

impl<T: DocumentStore> Cacheable for T {}
