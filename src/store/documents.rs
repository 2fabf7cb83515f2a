//! Documents - Typed accessor over a [`DocumentStore`].

use std::marker::PhantomData;

use super::{DocumentStore, Model, StoreError};

/// Typed wrapper for reading and writing documents of a specific model type.
pub struct Documents<'a, S: ?Sized, M> {
    store: &'a S,
    _marker: PhantomData<M>,
}

impl<'a, S: DocumentStore + ?Sized, M: Model> Documents<'a, S, M> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    /// Get a document by ID.
    pub async fn get(&self, id: &str) -> Result<Option<M>, StoreError> {
        match self.store.get(M::COLLECTION, id).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Upsert a document, replacing any previous version.
    pub async fn save(&self, model: &M) -> Result<(), StoreError> {
        let value = serde_json::to_value(model)?;
        self.store.put(M::COLLECTION, model.id(), value, false).await
    }

    /// Delete a document by ID. Returns true if it existed.
    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.store.delete(M::COLLECTION, id).await
    }

    /// Find documents matching a predicate.
    ///
    /// Documents that no longer decode as `M` are skipped.
    pub async fn find<F>(&self, predicate: F) -> Result<Vec<M>, StoreError>
    where
        F: Fn(&M) -> bool,
    {
        let values = self.store.list(M::COLLECTION, None).await?;
        let mut results = Vec::with_capacity(values.len());
        for value in values {
            match serde_json::from_value::<M>(value) {
                Ok(model) if predicate(&model) => results.push(model),
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(collection = M::COLLECTION, error = %err, "skipping undecodable document");
                }
            }
        }
        Ok(results)
    }

    /// Find all documents in the collection.
    pub async fn all(&self) -> Result<Vec<M>, StoreError> {
        self.find(|_| true).await
    }
}

/// Extension trait for typed document access on any DocumentStore.
pub trait DocumentsExt: DocumentStore {
    /// Get a typed document accessor.
    fn documents<M: Model>(&self) -> Documents<'_, Self, M> {
        Documents::new(self)
    }
}

impl<S: DocumentStore + ?Sized> DocumentsExt for S {}
