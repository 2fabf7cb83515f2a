//! Document store - the persistence seam under the ledger.
//!
//! The ledger only needs four operations over `(collection, id)` JSON
//! documents. Anything that can provide them works: the bundled
//! [`InMemoryDocumentStore`], a cloud document database, or a relational
//! key-value table.
//!
//! ## Example
//!
//! ```ignore
//! use poolpal_ledger::{DocumentsExt, InMemoryDocumentStore, Model};
//!
//! #[derive(Serialize, Deserialize, Clone)]
//! struct Note {
//!     pub id: String,
//!     pub body: String,
//! }
//!
//! impl Model for Note {
//!     const COLLECTION: &'static str = "notes";
//!     fn id(&self) -> &str { &self.id }
//! }
//!
//! let store = InMemoryDocumentStore::new();
//! store.documents::<Note>().save(&note).await?;
//! let loaded = store.documents::<Note>().get("note-1").await?;
//! ```

mod documents;
mod in_memory;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use documents::{Documents, DocumentsExt};
pub use in_memory::InMemoryDocumentStore;

/// Predicate over raw documents, used by [`DocumentStore::list`].
pub type DocumentPredicate<'a> = &'a (dyn Fn(&Value) -> bool + Send + Sync);

/// Trait for types that can be stored as documents.
pub trait Model: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// The collection name for this type (e.g. "orders", "payments").
    /// Maps to a collection in a document database, a table in SQL, a key
    /// prefix in KV stores, etc.
    const COLLECTION: &'static str;

    /// Returns the unique identifier for this document.
    fn id(&self) -> &str;
}

/// Error type for document store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Serialization/deserialization error.
    #[error("document serialization error: {0}")]
    Serde(String),
    /// Storage-level error reported by the backend.
    #[error("document storage error: {0}")]
    Storage(String),
    /// A lock guarding in-process state was poisoned.
    #[error("document store lock poisoned during {0}")]
    Poisoned(&'static str),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serde(err.to_string())
    }
}

/// Abstract storage for JSON documents grouped into collections.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Get a document by collection and id. Returns `None` if absent.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// List the documents of a collection, optionally filtered.
    async fn list(
        &self,
        collection: &str,
        predicate: Option<DocumentPredicate<'_>>,
    ) -> Result<Vec<Value>, StoreError>;

    /// Write a document.
    ///
    /// With `merge` set, the top-level fields of `document` are merged over
    /// an existing object document; otherwise the document is replaced.
    async fn put(
        &self,
        collection: &str,
        id: &str,
        document: Value,
        merge: bool,
    ) -> Result<(), StoreError>;

    /// Delete a document. Returns true if it existed.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError>;
}

/// Shallow merge of `incoming` over `existing` when both are objects.
pub(crate) fn merge_documents(existing: Value, incoming: Value) -> Value {
    match (existing, incoming) {
        (Value::Object(mut base), Value::Object(fields)) => {
            for (key, value) in fields {
                base.insert(key, value);
            }
            Value::Object(base)
        }
        (_, incoming) => incoming,
    }
}
