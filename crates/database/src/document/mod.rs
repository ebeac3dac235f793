//! Document-store database.
//!
//! One collection per record style, each document `{name, content}` where
//! content is the record's model. Searches run as document queries: the
//! record style's native query (anchored under `content`) or a caller's own
//! query written against the whole document.

#[cfg(any(test, feature = "mock"))]
mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;
mod store;

#[cfg(any(test, feature = "mock"))]
pub use self::memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use self::sqlite::{IN_MEMORY, SqliteStore};
pub use self::store::{Document, DocumentStore};
use crate::archive::ArchiveSource;
use crate::database::Database;
use crate::error::{ErrorKind, Result, label};
use crate::retry::{UPLOAD_ATTEMPTS, retry};
use crate::search::Search;
use async_trait::async_trait;
use recordbase_query::{Predicate, Query, StrMatch, Table, Values};
use recordbase_record::{Model, Record, RecordRegistry};
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;

/// Options a document database reads from its configuration entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DocumentOptions {
    /// Connection pool size for file databases.
    pub max_connections: Option<u32>,
}

/// Records kept as documents in a [`DocumentStore`].
///
/// Each record style gets its own collection, and each record is one
/// `{name, content}` document whose content is the record's model exactly as
/// [`Record::content`] builds it. Filter terms are handed to the record style
/// to become a native query, which this database anchors under `content`
/// before passing it to the store; a caller's own [`Search::query`] is used
/// as written, so it addresses `name` and `content.<root>...` itself.
///
/// Archives are stored next to the documents as blobs keyed by style and
/// name. There is no archive folder fallback here, unlike [`LocalDatabase`].
///
/// [`Search::query`]: crate::Search::query
/// [`LocalDatabase`]: crate::LocalDatabase
pub struct DocumentDatabase {
    host: String,
    store: Arc<dyn DocumentStore>,
    records: Arc<RecordRegistry>,
}

impl DocumentDatabase {
    pub fn new(host: impl Into<String>, store: Arc<dyn DocumentStore>, records: Arc<RecordRegistry>) -> Self {
        Self { host: host.into(), store, records }
    }

    /// Open the SQLite database at `host`, or a private in-memory one for
    /// [`IN_MEMORY`].
    #[cfg(feature = "sqlite")]
    pub async fn connect(host: &str, records: Arc<RecordRegistry>, options: &DocumentOptions) -> Result<Self> {
        let store = match host {
            IN_MEMORY => SqliteStore::connect_in_memory().await?,
            path => SqliteStore::connect(path, options.max_connections).await?,
        };
        Ok(Self::new(host, Arc::new(store), records))
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    async fn find_named(&self, style: &str, name: &str) -> Result<Vec<Document>> {
        let mut query = Query::new();
        StrMatch.query(&mut query, "name", Some(&Values::from(name))).map_err(ErrorKind::query)?;
        self.store.find(style, &query).await
    }

    fn document(record: &dyn Record) -> Result<Document> {
        let content = record.content().map_err(ErrorKind::record)?;
        Ok(Document::new(record.name(), content.to_value()))
    }
}

#[async_trait]
impl Database for DocumentDatabase {
    fn style(&self) -> &str {
        "document"
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn records(&self) -> &RecordRegistry {
        &self.records
    }

    #[instrument(skip(self, search), fields(host = %self.host, search = %search))]
    async fn get_records_table(&self, search: &Search) -> Result<(Vec<Box<dyn Record>>, Table)> {
        search.validate()?;
        let handle = self.record_style(&search.style)?;
        let mut query = match &search.query {
            Some(query) => query.clone(),
            None => handle.native_query(&search.terms()).map_err(ErrorKind::record)?.prefixed("content"),
        };
        let mut by_name = Query::new();
        StrMatch.query(&mut by_name, "name", search.names()).map_err(ErrorKind::query)?;
        query.merge(by_name);

        let mut records = Vec::new();
        for document in self.store.find(&search.style, &query).await? {
            let model = Model::try_from(document.content).map_err(ErrorKind::record)?;
            // Stores have no text index, so keywords are checked here.
            if !search.keeps(&model) {
                continue;
            }
            records.push(handle.load(&document.name, model).map_err(ErrorKind::record)?);
        }
        records.sort_by(|a, b| a.name().cmp(b.name()));
        let table = Table::from_rows(records.iter().map(|r| r.metadata()));
        Ok((records, table))
    }

    #[instrument(skip(self, record), fields(host = %self.host, style = record.style(), name = record.name()))]
    async fn add_record(&self, record: &dyn Record) -> Result<()> {
        self.record_style(record.style())?;
        let document = Self::document(record)?;
        if !self.find_named(record.style(), record.name()).await?.is_empty() {
            exn::bail!(ErrorKind::DuplicateKey(label(record.style(), record.name())));
        }
        self.store.insert(record.style(), document).await
    }

    /// Delete then insert; readers in between see no record.
    #[instrument(skip(self, record), fields(host = %self.host, style = record.style(), name = record.name()))]
    async fn update_record(&self, record: &dyn Record) -> Result<()> {
        self.record_style(record.style())?;
        let document = Self::document(record)?;
        if !self.store.remove(record.style(), record.name()).await? {
            exn::bail!(ErrorKind::NotFound(label(record.style(), record.name())));
        }
        self.store.insert(record.style(), document).await
    }

    #[instrument(skip(self), fields(host = %self.host))]
    async fn delete_record(&self, style: &str, name: &str) -> Result<()> {
        self.record_style(style)?;
        if !self.store.remove(style, name).await? {
            exn::bail!(ErrorKind::NotFound(label(style, name)));
        }
        Ok(())
    }

    #[instrument(skip(self, source), fields(host = %self.host))]
    async fn add_archive(&self, style: &str, name: &str, source: ArchiveSource) -> Result<()> {
        if self.find_named(style, name).await?.is_empty() {
            exn::bail!(ErrorKind::NotFound(label(style, name)));
        }
        if self.store.get_blob(style, name).await?.is_some() {
            exn::bail!(ErrorKind::DuplicateKey(format!("archive of {}", label(style, name))));
        }
        let bytes = source.into_bytes(name).await?;
        retry(UPLOAD_ATTEMPTS, "archive upload", || self.store.put_blob(style, name, bytes.clone())).await
    }

    async fn get_archive(&self, style: &str, name: &str) -> Result<Vec<u8>> {
        match self.store.get_blob(style, name).await? {
            Some(bytes) => Ok(bytes),
            None => exn::bail!(ErrorKind::NotFound(format!("archive of {}", label(style, name)))),
        }
    }

    #[instrument(skip(self), fields(host = %self.host))]
    async fn delete_archive(&self, style: &str, name: &str) -> Result<()> {
        if !self.store.remove_blob(style, name).await? {
            exn::bail!(ErrorKind::NotFound(format!("archive of {}", label(style, name))));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordbase_record::styles::{Faq, Widget};
    use serde_json::json;

    fn open() -> (Arc<MemoryStore>, DocumentDatabase) {
        let store = Arc::new(MemoryStore::new());
        let db = DocumentDatabase::new("memory", store.clone(), Arc::new(RecordRegistry::builtin()));
        (store, db)
    }

    fn widget(name: &str, label: &str, count: i64) -> Widget {
        Widget::new(name, label).unwrap().count(count)
    }

    fn names(records: &[Box<dyn Record>]) -> Vec<&str> {
        records.iter().map(|r| r.name()).collect()
    }

    #[tokio::test]
    async fn test_crud() {
        let (store, db) = open();
        db.add_record(&widget("w1", "first", 1)).await.unwrap();
        assert_eq!(store.documents("widget").await[0].to_value()["content"]["widget"]["label"], json!("first"));

        let record = db.get_record(&Search::new("widget").name("w1")).await.unwrap();
        assert_eq!(record.metadata()["count"], json!(1));

        db.update_record(&widget("w1", "second", 2)).await.unwrap();
        let (records, table) = db.get_records_table(&Search::new("widget")).await.unwrap();
        assert_eq!(names(&records), vec!["w1"]);
        assert_eq!(table.cell(0, "label"), &json!("second"));

        db.delete_record("widget", "w1").await.unwrap();
        assert!(db.get_records(&Search::new("widget")).await.unwrap().is_empty());
        let err = db.delete_record("widget", "w1").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        let err = db.update_record(&widget("w1", "third", 3)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_duplicates_are_checked_not_enforced() {
        let (store, db) = open();
        db.add_record(&widget("w1", "first", 1)).await.unwrap();
        let err = db.add_record(&widget("w1", "second", 2)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::DuplicateKey(_)));
        assert_eq!(db.get_record(&Search::new("widget").name("w1")).await.unwrap().metadata()["label"], json!("first"));

        // A racing writer that skipped the check leaves two documents behind.
        store.insert("widget", Document::new("w1", json!({"widget": {"label": "racer"}}))).await.unwrap();
        let err = db.get_record(&Search::new("widget").name("w1")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::AmbiguousMatch(_, 2)));
    }

    async fn found(db: &DocumentDatabase, search: Search) -> Vec<String> {
        db.get_records(&search).await.unwrap().iter().map(|r| r.name().to_string()).collect()
    }

    #[tokio::test]
    async fn test_style_filters_and_names() {
        let (_store, db) = open();
        db.add_record(&widget("w1", "gear", 1).tags(["red"]).part("cog", None)).await.unwrap();
        db.add_record(&widget("w2", "axle", 2).tags(["red", "long"])).await.unwrap();
        db.add_record(&widget("w3", "gear", 3).description("a small gear")).await.unwrap();

        assert_eq!(found(&db, Search::new("widget").with("label", "gear")).await, ["w1", "w3"]);
        assert_eq!(found(&db, Search::new("widget").with("tag", ["red", "long"])).await, ["w2"]);
        assert_eq!(found(&db, Search::new("widget").with("count", [2, 3])).await, ["w2", "w3"]);
        assert_eq!(found(&db, Search::new("widget").with("kind", "cog")).await, ["w1"]);
        assert_eq!(found(&db, Search::new("widget").with("description", "small")).await, ["w3"]);
        assert_eq!(found(&db, Search::new("widget").with("label", "gear").name("w3")).await, ["w3"]);
        assert!(found(&db, Search::new("widget").name(json!([]))).await.is_empty());
    }

    #[tokio::test]
    async fn test_native_query_on_whole_document() {
        let (_store, db) = open();
        db.add_record(&Faq::new("q1", "Why is the sky blue?", "Scattering.").unwrap()).await.unwrap();
        db.add_record(&Faq::new("q2", "What is a potential?", "A model.").unwrap()).await.unwrap();

        let query: Query = serde_json::from_value(json!({"content.faq.question": {"$regex": "sky"}})).unwrap();
        let records = db.get_records(&Search::new("FAQ").query(query.clone())).await.unwrap();
        assert_eq!(names(&records), vec!["q1"]);
        let records = db.get_records(&Search::new("FAQ").query(query).name("q2")).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_keyword_searches_content() {
        let (_store, db) = open();
        db.add_record(&Faq::new("q1", "Why is the sky blue?", "Scattering.").unwrap()).await.unwrap();
        db.add_record(&Faq::new("q2", "What is a potential?", "A model of the SKY.").unwrap()).await.unwrap();
        db.add_record(&Faq::new("q3", "How do I cite?", "Use the DOI.").unwrap()).await.unwrap();

        let records = db.get_records(&Search::new("FAQ").keyword("sky")).await.unwrap();
        assert_eq!(names(&records), vec!["q1", "q2"]);
        let records = db.get_records(&Search::new("FAQ").keyword("sky").name(["q2", "q3"])).await.unwrap();
        assert_eq!(names(&records), vec!["q2"]);

        let query: Query = serde_json::from_value(json!({"content.faq.question": {"$regex": "sky"}})).unwrap();
        let err = db.get_records(&Search::new("FAQ").keyword("sky").query(query)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::ConflictingArguments(_)));
    }

    #[tokio::test]
    async fn test_archive_upload_is_retried() {
        let (store, db) = open();
        db.add_record(&widget("w1", "first", 1)).await.unwrap();

        store.fail_uploads(1);
        db.add_archive("widget", "w1", ArchiveSource::Bytes(vec![7])).await.unwrap();
        assert_eq!(db.get_archive("widget", "w1").await.unwrap(), vec![7]);

        let err = db.add_archive("widget", "w1", ArchiveSource::Bytes(vec![8])).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::DuplicateKey(_)));
        db.update_archive("widget", "w1", ArchiveSource::Bytes(vec![8])).await.unwrap();
        assert_eq!(db.get_archive("widget", "w1").await.unwrap(), vec![8]);

        db.delete_archive("widget", "w1").await.unwrap();
        store.fail_uploads(UPLOAD_ATTEMPTS);
        let err = db.add_archive("widget", "w1", ArchiveSource::Bytes(vec![9])).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Backend(_)));
        assert!(db.get_archive("widget", "w1").await.is_err());
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_sqlite_backed() {
        let db = DocumentDatabase::connect(IN_MEMORY, Arc::new(RecordRegistry::builtin()), &DocumentOptions::default())
            .await
            .unwrap();
        db.add_record(&widget("w1", "gear", 1).tags(["red"])).await.unwrap();
        db.add_record(&widget("w2", "axle", 2)).await.unwrap();
        let record = db.get_record(&Search::new("widget").with("tag", "red")).await.unwrap();
        assert_eq!(record.name(), "w1");
        db.add_archive("widget", "w2", ArchiveSource::Bytes(vec![1])).await.unwrap();
        assert_eq!(db.get_archive("widget", "w2").await.unwrap(), vec![1]);
    }
}
