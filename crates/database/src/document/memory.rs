//! In-memory document store for testing.

use super::store::{Document, DocumentStore};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use recordbase_query::Query;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Document store backed by maps behind [`RwLock`]s, so every method works
/// on `&self`.
///
/// [`fail_uploads`](MemoryStore::fail_uploads) makes the next few blob
/// writes fail with a retryable error.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    blobs: RwLock<HashMap<(String, String), Vec<u8>>>,
    failing_uploads: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` blob uploads.
    pub fn fail_uploads(&self, count: usize) {
        self.failing_uploads.store(count, Ordering::SeqCst);
    }

    /// Every document of `collection`, duplicates included.
    pub async fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections.read().await.get(collection).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, collection: &str, query: &Query) -> Result<Vec<Document>> {
        // Snapshot under the read lock, evaluate after dropping it.
        let documents = self.documents(collection).await;
        let mut found = Vec::new();
        for document in documents {
            if query.matches(&document.to_value()).map_err(ErrorKind::query)? {
                found.push(document);
            }
        }
        Ok(found)
    }

    async fn insert(&self, collection: &str, document: Document) -> Result<()> {
        self.collections.write().await.entry(collection.to_string()).or_default().push(document);
        Ok(())
    }

    async fn remove(&self, collection: &str, name: &str) -> Result<bool> {
        let mut guard = self.collections.write().await;
        let Some(documents) = guard.get_mut(collection) else {
            return Ok(false);
        };
        match documents.iter().position(|d| d.name == name) {
            Some(index) => {
                documents.remove(index);
                Ok(true)
            },
            None => Ok(false),
        }
    }

    async fn put_blob(&self, collection: &str, name: &str, data: Vec<u8>) -> Result<()> {
        if self.failing_uploads.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok() {
            exn::bail!(ErrorKind::Backend("simulated upload failure".to_string()));
        }
        self.blobs.write().await.insert((collection.to_string(), name.to_string()), data);
        Ok(())
    }

    async fn get_blob(&self, collection: &str, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.read().await.get(&(collection.to_string(), name.to_string())).cloned())
    }

    async fn remove_blob(&self, collection: &str, name: &str) -> Result<bool> {
        Ok(self.blobs.write().await.remove(&(collection.to_string(), name.to_string())).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_remove_takes_oldest_duplicate() {
        let store = MemoryStore::new();
        store.insert("widget", Document::new("w1", json!({"v": 1}))).await.unwrap();
        store.insert("widget", Document::new("w1", json!({"v": 2}))).await.unwrap();
        assert!(store.remove("widget", "w1").await.unwrap());
        assert_eq!(store.documents("widget").await, vec![Document::new("w1", json!({"v": 2}))]);
        assert!(store.remove("widget", "w1").await.unwrap());
        assert!(!store.remove("widget", "w1").await.unwrap());
    }

    #[tokio::test]
    async fn test_failing_uploads() {
        let store = MemoryStore::new();
        store.fail_uploads(1);
        assert!(store.put_blob("widget", "w1", vec![1]).await.is_err());
        store.put_blob("widget", "w1", vec![1]).await.unwrap();
        assert_eq!(store.get_blob("widget", "w1").await.unwrap(), Some(vec![1]));
    }
}
