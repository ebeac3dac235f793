//! Database styles by name, and opening configured databases.

#[cfg(feature = "sqlite")]
use crate::document::{DocumentDatabase, DocumentOptions};
use crate::database::DatabaseHandle;
use crate::error::{ErrorKind, Result};
use crate::local::{LocalDatabase, LocalOptions};
#[cfg(feature = "remote")]
use crate::remote::{RemoteCuratedDatabase, RemoteOptions};
use async_trait::async_trait;
use recordbase_config::{Config, DatabaseConfig};
use recordbase_record::{RecordRegistry, StyleRegistry};
use std::sync::Arc;
use tracing::{info, instrument};

/// Opens databases of one backend style from configuration.
#[async_trait]
pub trait DatabaseStyle: Send + Sync {
    fn style(&self) -> &'static str;

    async fn open(&self, config: &DatabaseConfig, records: Arc<RecordRegistry>) -> Result<DatabaseHandle>;
}

struct Local;

#[async_trait]
impl DatabaseStyle for Local {
    fn style(&self) -> &'static str {
        "local"
    }

    async fn open(&self, config: &DatabaseConfig, records: Arc<RecordRegistry>) -> Result<DatabaseHandle> {
        let options: LocalOptions = config.options().map_err(ErrorKind::config)?;
        Ok(Arc::new(LocalDatabase::from_options(&config.host, records, &options)?))
    }
}

#[cfg(feature = "sqlite")]
struct Document;

#[cfg(feature = "sqlite")]
#[async_trait]
impl DatabaseStyle for Document {
    fn style(&self) -> &'static str {
        "document"
    }

    async fn open(&self, config: &DatabaseConfig, records: Arc<RecordRegistry>) -> Result<DatabaseHandle> {
        let options: DocumentOptions = config.options().map_err(ErrorKind::config)?;
        Ok(Arc::new(DocumentDatabase::connect(&config.host, records, &options).await?))
    }
}

#[cfg(feature = "remote")]
struct Remote;

#[cfg(feature = "remote")]
#[async_trait]
impl DatabaseStyle for Remote {
    fn style(&self) -> &'static str {
        "remote"
    }

    async fn open(&self, config: &DatabaseConfig, records: Arc<RecordRegistry>) -> Result<DatabaseHandle> {
        let options: RemoteOptions = config.options().map_err(ErrorKind::config)?;
        Ok(Arc::new(RemoteCuratedDatabase::connect(&config.host, records, &options)?))
    }
}

/// The database styles known to this process.
pub struct DatabaseRegistry {
    styles: StyleRegistry<Arc<dyn DatabaseStyle>>,
}

impl Default for DatabaseRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl DatabaseRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self { styles: StyleRegistry::new() }
    }

    /// Every backend this build can open. Backends behind a disabled cargo
    /// feature are listed as failed, with the feature named.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.add(Local);
        #[cfg(feature = "sqlite")]
        registry.add(Document);
        #[cfg(not(feature = "sqlite"))]
        registry.styles.register_failure("document", "built without the `sqlite` feature");
        #[cfg(feature = "remote")]
        registry.add(Remote);
        #[cfg(not(feature = "remote"))]
        registry.styles.register_failure("remote", "built without the `remote` feature");
        registry
    }

    pub fn add(&mut self, style: impl DatabaseStyle + 'static) {
        self.styles.register(style.style(), Arc::new(style) as Arc<dyn DatabaseStyle>);
    }

    pub fn styles(&self) -> &StyleRegistry<Arc<dyn DatabaseStyle>> {
        &self.styles
    }

    /// Open the database a configuration entry describes.
    #[instrument(skip(self, records), fields(style = %config.style, host = %config.host))]
    pub async fn open(&self, config: &DatabaseConfig, records: Arc<RecordRegistry>) -> Result<DatabaseHandle> {
        let style = self.styles.get(&config.style).map_err(ErrorKind::record)?;
        let database = style.open(config, records).await?;
        info!("opened database");
        Ok(database)
    }
}

/// Open the database configured under `name` with the built-in backends.
pub async fn load_database(config: &Config, name: &str, records: Arc<RecordRegistry>) -> Result<DatabaseHandle> {
    let entry = config.database(name).map_err(ErrorKind::config)?;
    DatabaseRegistry::builtin().open(entry, records).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordbase_record::styles::Faq;

    fn records() -> Arc<RecordRegistry> {
        Arc::new(RecordRegistry::builtin())
    }

    #[tokio::test]
    async fn test_open_local_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let host = dir.path().join("db");
        let config = DatabaseConfig::new("local", host.display().to_string()).with_option("format", "xml");
        let db = DatabaseRegistry::builtin().open(&config, records()).await.unwrap();
        assert_eq!(db.style(), "local");
        db.add_record(&Faq::new("q1", "Why?", "Because.").unwrap()).await.unwrap();
        assert!(host.join("FAQ").join("q1.xml").is_file());
    }

    #[tokio::test]
    async fn test_unknown_and_invalid() {
        let registry = DatabaseRegistry::builtin();
        let err = registry.open(&DatabaseConfig::new("mongo", "x"), records()).await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::UnknownStyle(s) if s == "mongo"));

        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig::new("local", dir.path().display().to_string()).with_option("indent", "wide");
        let err = registry.open(&config, records()).await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::Config(_)));
    }

    #[cfg(not(feature = "remote"))]
    #[tokio::test]
    async fn test_compiled_out_backend_is_a_load_failure() {
        let registry = DatabaseRegistry::builtin();
        assert!(registry.styles().failed_names().contains(&"remote"));
        let err = registry.open(&DatabaseConfig::new("remote", "https://x"), records()).await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::StyleLoadFailure(s, reason) if s == "remote" && reason.contains("remote")));
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_load_database_by_name() {
        use crate::search::Search;
        use serde_json::json;

        let config: Config = serde_json::from_value(json!({
            "databases": {"scratch": {"style": "document", "host": ":memory:", "max_connections": 1}}
        }))
        .unwrap();
        let db = load_database(&config, "scratch", records()).await.unwrap();
        assert_eq!(db.style(), "document");
        db.add_record(&Faq::new("q1", "Why?", "Because.").unwrap()).await.unwrap();
        assert_eq!(db.get_records(&Search::new("FAQ")).await.unwrap().len(), 1);

        let err = load_database(&config, "missing", records()).await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::Config(_)));
    }
}
