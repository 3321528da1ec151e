//! Store seam
//!
//! The differ only ever needs one operation from a cluster: fetch the
//! current document for a key. Connections are opened through a
//! [`StoreConnector`] and then shared read-only by every worker.

use crate::config::ClusterEndpoint;
use crate::error::{DifferError, FetchError};
use crate::types::{Document, Side};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Asynchronous "get document by key"
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch the current document for `key`.
    ///
    /// # Errors
    /// - `FetchError::NotFound` if no document exists
    /// - `FetchError::Other` for any other failure
    async fn get(&self, key: &str) -> Result<Document, FetchError>;
}

/// Opens an authenticated connection to one cluster
#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// Connect to the bucket described by `endpoint`.
    ///
    /// # Errors
    /// Returns `DifferError::Connect` when the cluster is unreachable or
    /// rejects the credentials.
    async fn connect(
        &self,
        side: Side,
        endpoint: &ClusterEndpoint,
    ) -> Result<Arc<dyn DocumentStore>, DifferError>;
}

/// Thread-safe in-memory bucket
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<String, Document>>,
}

impl MemoryStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create store pre-loaded with documents
    #[must_use]
    pub fn from_documents(documents: HashMap<String, Document>) -> Self {
        Self {
            documents: RwLock::new(documents),
        }
    }

    /// Insert or replace a document
    pub fn insert(&self, key: impl Into<String>, document: Document) {
        self.documents.write().insert(key.into(), document);
    }

    /// Remove a document
    pub fn remove(&self, key: &str) -> Option<Document> {
        self.documents.write().remove(key)
    }

    /// Number of stored documents
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// Whether the store holds no documents
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Document, FetchError> {
        self.documents
            .read()
            .get(key)
            .cloned()
            .ok_or(FetchError::NotFound)
    }
}
