//! Document store client.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::Result;

/// Collection-oriented document client keyed by document `_id`.
#[async_trait]
pub trait DocumentClient: Send + Sync {
    /// Fetch a document by id.
    async fn find_one(&self, collection: &str, id: &str) -> Result<Option<Value>>;

    /// Replace the document with `id`, inserting it if absent.
    async fn replace_one(&self, collection: &str, id: &str, document: Value) -> Result<()>;

    /// Delete a document by id. Returns whether it existed.
    async fn delete_one(&self, collection: &str, id: &str) -> Result<bool>;
}

/// In-process [`DocumentClient`].
#[derive(Debug, Default)]
pub struct InMemoryDocumentClient {
    collections: Mutex<HashMap<String, HashMap<String, Value>>>,
}

impl InMemoryDocumentClient {
    /// Create an empty client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in `collection`.
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .get(collection)
            .map_or(0, HashMap::len)
    }
}

#[async_trait]
impl DocumentClient for InMemoryDocumentClient {
    async fn find_one(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        Ok(self
            .collections
            .lock()
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn replace_one(&self, collection: &str, id: &str, document: Value) -> Result<()> {
        self.collections
            .lock()
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), document);
        Ok(())
    }

    async fn delete_one(&self, collection: &str, id: &str) -> Result<bool> {
        Ok(self
            .collections
            .lock()
            .get_mut(collection)
            .is_some_and(|docs| docs.remove(id).is_some()))
    }
}
