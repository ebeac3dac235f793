use crate::error::Result;
use async_trait::async_trait;
use recordbase_query::Query;

/// One data entry on the curated service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CuratedRecord {
    pub id: String,
    /// Record name.
    pub title: String,
    /// Record style.
    pub template: String,
    /// XML content.
    pub content: String,
}

/// One stored binary file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blob {
    pub id: String,
    pub filename: String,
}

/// The calls [`RemoteCuratedDatabase`] makes against a curated-content
/// service.
///
/// Templates stand for record styles and titles for record names. Queries
/// address the record's model from its root element.
///
/// [`RemoteCuratedDatabase`]: super::RemoteCuratedDatabase
#[async_trait]
pub trait CuratorClient: Send + Sync {
    /// Entries of `template` matching `query`, narrowed to one title if given.
    ///
    /// A `keyword` runs the service's full-text search instead; callers pass
    /// an empty `query` with it.
    async fn query(
        &self,
        template: &str,
        title: Option<&str>,
        query: &Query,
        keyword: Option<&str>,
    ) -> Result<Vec<CuratedRecord>>;

    /// Create an entry, returning its id.
    async fn upload(&self, template: &str, title: &str, content: &str) -> Result<String>;

    /// Replace an entry's content.
    async fn update(&self, record: &CuratedRecord, content: &str) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Share an entry with a workspace, by workspace title.
    async fn assign(&self, id: &str, workspace: &str) -> Result<()>;

    /// Blobs stored under `filename`.
    async fn blobs(&self, filename: &str) -> Result<Vec<Blob>>;

    /// Store a blob, returning its id.
    async fn upload_blob(&self, filename: &str, data: Vec<u8>) -> Result<String>;

    async fn download_blob(&self, id: &str) -> Result<Vec<u8>>;

    async fn delete_blob(&self, id: &str) -> Result<()>;
}
