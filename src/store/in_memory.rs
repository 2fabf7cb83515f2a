//! InMemoryDocumentStore - HashMap-backed document store for tests and local runs.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use super::{merge_documents, DocumentPredicate, DocumentStore, StoreError};

/// In-memory document store backed by a HashMap.
///
/// Storage key is `"collection:id"`. Clone-friendly via Arc.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    storage: Arc<RwLock<HashMap<String, Value>>>,
}

impl InMemoryDocumentStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn make_key(collection: &str, id: &str) -> String {
        format!("{}:{}", collection, id)
    }

    /// Number of documents across all collections.
    pub fn len(&self) -> Result<usize, StoreError> {
        let storage = self
            .storage
            .read()
            .map_err(|_| StoreError::Poisoned("len"))?;
        Ok(storage.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let key = Self::make_key(collection, id);
        let storage = self
            .storage
            .read()
            .map_err(|_| StoreError::Poisoned("read"))?;
        Ok(storage.get(&key).cloned())
    }

    async fn list(
        &self,
        collection: &str,
        predicate: Option<DocumentPredicate<'_>>,
    ) -> Result<Vec<Value>, StoreError> {
        let storage = self
            .storage
            .read()
            .map_err(|_| StoreError::Poisoned("read"))?;

        let prefix = format!("{}:", collection);
        Ok(storage
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(_, document)| document)
            .filter(|document| predicate.map_or(true, |matches| matches(document)))
            .cloned()
            .collect())
    }

    async fn put(
        &self,
        collection: &str,
        id: &str,
        document: Value,
        merge: bool,
    ) -> Result<(), StoreError> {
        let key = Self::make_key(collection, id);
        let mut storage = self
            .storage
            .write()
            .map_err(|_| StoreError::Poisoned("write"))?;

        let document = match storage.remove(&key) {
            Some(existing) if merge => merge_documents(existing, document),
            _ => document,
        };
        storage.insert(key, document);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let key = Self::make_key(collection, id);
        let mut storage = self
            .storage
            .write()
            .map_err(|_| StoreError::Poisoned("write"))?;
        Ok(storage.remove(&key).is_some())
    }
}
