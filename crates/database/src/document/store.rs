use crate::error::Result;
use async_trait::async_trait;
use recordbase_query::Query;
use serde_json::{Value, json};

/// One stored record: its name and its model.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub name: String,
    pub content: Value,
}

impl Document {
    pub fn new(name: impl Into<String>, content: Value) -> Self {
        Self { name: name.into(), content }
    }

    /// The `{name, content}` shape queries are evaluated against.
    pub fn to_value(&self) -> Value {
        json!({"name": self.name, "content": self.content})
    }
}

/// Collections of documents plus a blob store, one collection per record
/// style.
///
/// Stores do not enforce unique names; [`DocumentDatabase`] checks before it
/// inserts.
///
/// [`DocumentDatabase`]: super::DocumentDatabase
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Documents of `collection` matching `query`, in insertion order.
    async fn find(&self, collection: &str, query: &Query) -> Result<Vec<Document>>;

    async fn insert(&self, collection: &str, document: Document) -> Result<()>;

    /// Remove the oldest document named `name`; `false` if there was none.
    async fn remove(&self, collection: &str, name: &str) -> Result<bool>;

    /// Store a blob, replacing any previous one under the same key.
    async fn put_blob(&self, collection: &str, name: &str, data: Vec<u8>) -> Result<()>;

    async fn get_blob(&self, collection: &str, name: &str) -> Result<Option<Vec<u8>>>;

    /// `false` if there was no such blob.
    async fn remove_blob(&self, collection: &str, name: &str) -> Result<bool>;
}
