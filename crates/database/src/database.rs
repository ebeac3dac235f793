//! The database contract shared by every backend.

use crate::archive::ArchiveSource;
use crate::error::{ErrorKind, Result, label};
use crate::search::{CopyOptions, CopyReport, DestroyReport, Search};
use async_trait::async_trait;
use exn::OptionExt;
use recordbase_query::Table;
use recordbase_record::{Model, Record, RecordRegistry, StyleHandle};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Uniform CRUD over styled records, plus one optional archive per record.
///
/// Every backend enforces `(style, name)` uniqueness by checking before it
/// writes; two concurrent writers of the same key can both pass the check.
///
/// # Examples
///
/// ```no_run
/// use recordbase_database::{Database, Search, error::Result};
///
/// async fn question_of(db: &dyn Database, name: &str) -> Result<String> {
///     let record = db.get_record(&Search::new("FAQ").name(name)).await?;
///     Ok(record.metadata()["question"].to_string())
/// }
/// ```
#[async_trait]
pub trait Database: Send + Sync {
    /// Backend style (`local`, `document` or `remote`).
    fn style(&self) -> &str;

    /// Where the records live: a directory, a database file or a URL.
    fn host(&self) -> &str;

    /// Record styles this database can reconstruct records for.
    fn records(&self) -> &RecordRegistry;

    /// Every record matching `search`, sorted by name, together with a table
    /// of their metadata (one row per record, `name` first).
    ///
    /// Zero matches is an empty result, not an error.
    async fn get_records_table(&self, search: &Search) -> Result<(Vec<Box<dyn Record>>, Table)>;

    async fn get_records(&self, search: &Search) -> Result<Vec<Box<dyn Record>>> {
        Ok(self.get_records_table(search).await?.0)
    }

    /// The single record matching `search`.
    async fn get_record(&self, search: &Search) -> Result<Box<dyn Record>> {
        let mut records = self.get_records(search).await?;
        if records.len() > 1 {
            exn::bail!(ErrorKind::AmbiguousMatch(format!("record matching {search}"), records.len()));
        }
        records.pop().ok_or_raise(|| ErrorKind::NotFound(format!("record matching {search}")))
    }

    /// Store a new record; fails with [`ErrorKind::DuplicateKey`] if one of
    /// that style and name exists.
    async fn add_record(&self, record: &dyn Record) -> Result<()>;

    /// Replace an existing record's content wholesale.
    async fn update_record(&self, record: &dyn Record) -> Result<()>;

    async fn delete_record(&self, style: &str, name: &str) -> Result<()>;

    /// Attach an archive to an existing record. Replacing one means deleting
    /// it first (or [`update_archive`](Database::update_archive)).
    async fn add_archive(&self, style: &str, name: &str, source: ArchiveSource) -> Result<()>;

    /// The record's archive as `.tar.gz` bytes.
    async fn get_archive(&self, style: &str, name: &str) -> Result<Vec<u8>>;

    async fn delete_archive(&self, style: &str, name: &str) -> Result<()>;

    async fn update_archive(&self, style: &str, name: &str, source: ArchiveSource) -> Result<()> {
        self.delete_archive(style, name).await?;
        self.add_archive(style, name, source).await
    }

    /// An unpacked folder associated with the record, for backends that have
    /// such a thing.
    async fn get_folder(&self, _style: &str, _name: &str) -> Result<Option<PathBuf>> {
        Ok(None)
    }

    /// The archive to copy for a record: its stored archive, else its folder
    /// (packed on the fly), else nothing.
    async fn archive_source(&self, style: &str, name: &str) -> Result<Option<ArchiveSource>> {
        match self.get_archive(style, name).await {
            Ok(bytes) => return Ok(Some(ArchiveSource::Bytes(bytes))),
            Err(err) if err.is_not_found() => {},
            Err(err) => return Err(err),
        }
        let folder = self.get_folder(style, name).await?;
        Ok(folder.and_then(|path| path.parent().map(|root| ArchiveSource::Directory(root.to_path_buf()))))
    }

    /// Look up a record style this database knows.
    fn record_style(&self, style: &str) -> Result<&StyleHandle> {
        self.records().get(style).map_err(ErrorKind::record)
    }

    /// Build a record of `style` from content, as if it had been fetched.
    fn load_record(&self, style: &str, name: &str, model: Model) -> Result<Box<dyn Record>> {
        self.record_style(style)?.load(name, model).map_err(ErrorKind::record)
    }

    /// Copy every record of `style` into `dest`.
    #[instrument(skip(self, dest), fields(source = %self.host(), dest = %dest.host()))]
    async fn copy_records(&self, dest: &dyn Database, style: &str, options: CopyOptions) -> Result<CopyReport> {
        let records = self.get_records(&Search::new(style)).await?;
        self.copy_selected(dest, &records, options).await
    }

    /// Copy the given records (and optionally their archives) into `dest`.
    ///
    /// Existing records are updated only with `overwrite`; each failure is
    /// counted and logged and never stops the batch.
    async fn copy_selected(
        &self,
        dest: &dyn Database,
        records: &[Box<dyn Record>],
        options: CopyOptions,
    ) -> Result<CopyReport> {
        let mut report = CopyReport::default();
        for record in records {
            let (style, name) = (record.style(), record.name());
            match dest.add_record(record.as_ref()).await {
                Ok(()) => report.added += 1,
                Err(err) if err.is_duplicate() && !options.overwrite => report.skipped += 1,
                Err(err) if err.is_duplicate() => match dest.update_record(record.as_ref()).await {
                    Ok(()) => report.updated += 1,
                    Err(err) => {
                        warn!(style, name, error = ?err, "could not update record");
                        report.failed += 1;
                        continue;
                    },
                },
                Err(err) => {
                    warn!(style, name, error = ?err, "could not copy record");
                    report.failed += 1;
                    continue;
                },
            }
            if !options.include_archives {
                continue;
            }

            let source = match self.archive_source(style, name).await {
                Ok(Some(source)) => source,
                Ok(None) => continue,
                Err(err) => {
                    warn!(style, name, error = ?err, "could not read archive");
                    report.archives_failed += 1;
                    continue;
                },
            };
            match dest.add_archive(style, name, source.clone()).await {
                Ok(()) => report.archives_added += 1,
                Err(err) if err.is_duplicate() && !options.overwrite => report.archives_skipped += 1,
                Err(err) if err.is_duplicate() => match dest.update_archive(style, name, source).await {
                    Ok(()) => report.archives_updated += 1,
                    Err(err) => {
                        warn!(style, name, error = ?err, "could not update archive");
                        report.archives_failed += 1;
                    },
                },
                Err(err) => {
                    warn!(style, name, error = ?err, "could not copy archive");
                    report.archives_failed += 1;
                },
            }
        }
        info!(%report, "copy finished");
        Ok(report)
    }

    /// Delete every record of `style` and, where present, its archive.
    #[instrument(skip(self), fields(host = %self.host()))]
    async fn destroy_records(&self, style: &str) -> Result<DestroyReport> {
        let records = self.get_records(&Search::new(style)).await?;
        self.destroy_selected(&records).await
    }

    /// Delete the given records. Archives go first, and failing to delete
    /// one does not keep its record.
    async fn destroy_selected(&self, records: &[Box<dyn Record>]) -> Result<DestroyReport> {
        let mut report = DestroyReport::default();
        for record in records {
            let (style, name) = (record.style(), record.name());
            match self.delete_archive(style, name).await {
                Ok(()) => report.archives_deleted += 1,
                Err(err) if err.is_not_found() => {},
                Err(err) => {
                    warn!(style, name, error = ?err, "could not delete archive");
                    report.archives_failed += 1;
                },
            }
            match self.delete_record(style, name).await {
                Ok(()) => report.deleted += 1,
                Err(err) => {
                    warn!(style, name, error = ?err, "could not delete {}", label(style, name));
                    report.failed += 1;
                },
            }
        }
        info!(%report, "destroy finished");
        Ok(report)
    }
}

/// Shared handle to any backend.
pub type DatabaseHandle = Arc<dyn Database>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::unpack;
    use crate::document::{DocumentDatabase, MemoryStore};
    use crate::local::LocalDatabase;
    use crate::remote::{MockCurator, RemoteCuratedDatabase};
    use recordbase_record::styles::Widget;
    use serde_json::json;
    use tempfile::TempDir;

    fn registry() -> Arc<RecordRegistry> {
        Arc::new(RecordRegistry::builtin())
    }

    fn local() -> (TempDir, LocalDatabase) {
        let dir = tempfile::tempdir().unwrap();
        let db = LocalDatabase::new(dir.path(), registry()).unwrap();
        (dir, db)
    }

    fn document() -> DocumentDatabase {
        DocumentDatabase::new("memory", Arc::new(MemoryStore::new()), registry())
    }

    fn widget(name: &str, label: &str) -> Widget {
        Widget::new(name, label).unwrap()
    }

    async fn label_of(db: &dyn Database, name: &str) -> serde_json::Value {
        db.get_record(&Search::new("widget").name(name)).await.unwrap().metadata()["label"].clone()
    }

    #[tokio::test]
    async fn test_copy_respects_overwrite() {
        let (_dir, source) = local();
        let dest = document();
        source.add_record(&widget("x", "v1")).await.unwrap();
        dest.add_record(&widget("x", "v2")).await.unwrap();
        dest.add_record(&widget("y", "v2")).await.unwrap();

        let report = source.copy_records(&dest, "widget", CopyOptions::default()).await.unwrap();
        assert_eq!(report, CopyReport { skipped: 1, ..CopyReport::default() });
        assert_eq!(label_of(&dest, "x").await, json!("v2"));

        let options = CopyOptions { overwrite: true, ..CopyOptions::default() };
        let report = source.copy_records(&dest, "widget", options).await.unwrap();
        assert_eq!(report, CopyReport { updated: 1, ..CopyReport::default() });
        assert_eq!(label_of(&dest, "x").await, json!("v1"));
        assert_eq!(label_of(&dest, "y").await, json!("v2"));
    }

    #[tokio::test]
    async fn test_copy_archives_and_folders() {
        let (dir, source) = local();
        let dest = document();
        source.add_record(&widget("w1", "packed")).await.unwrap();
        source.add_record(&widget("w2", "folder")).await.unwrap();
        source.add_record(&widget("w3", "bare")).await.unwrap();
        let staging = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(staging.path().join("w1")).unwrap();
        std::fs::write(staging.path().join("w1/log.txt"), "packed").unwrap();
        source.add_archive("widget", "w1", ArchiveSource::Directory(staging.path().to_path_buf())).await.unwrap();
        std::fs::create_dir_all(dir.path().join("widget/w2")).unwrap();
        std::fs::write(dir.path().join("widget/w2/log.txt"), "folder").unwrap();

        let report = source.copy_records(&dest, "widget", CopyOptions::default()).await.unwrap();
        assert_eq!(report, CopyReport { added: 3, archives_added: 2, ..CopyReport::default() });

        let out = tempfile::tempdir().unwrap();
        for name in ["w1", "w2"] {
            unpack(dest.get_archive("widget", name).await.unwrap(), out.path().to_path_buf()).await.unwrap();
        }
        assert_eq!(std::fs::read_to_string(out.path().join("w1/log.txt")).unwrap(), "packed");
        assert_eq!(std::fs::read_to_string(out.path().join("w2/log.txt")).unwrap(), "folder");
        assert!(dest.get_archive("widget", "w3").await.is_err());

        let report = source.copy_records(&dest, "widget", CopyOptions::default()).await.unwrap();
        assert_eq!(report, CopyReport { skipped: 3, archives_skipped: 2, ..CopyReport::default() });
        let options = CopyOptions { overwrite: true, include_archives: true };
        let report = source.copy_records(&dest, "widget", options).await.unwrap();
        assert_eq!(report, CopyReport { updated: 3, archives_updated: 2, ..CopyReport::default() });
    }

    #[tokio::test]
    async fn test_copy_without_archives() {
        let (_dir, source) = local();
        let dest = document();
        source.add_record(&widget("w1", "packed")).await.unwrap();
        source.add_archive("widget", "w1", ArchiveSource::Bytes(vec![1, 2, 3])).await.unwrap();

        let options = CopyOptions { include_archives: false, ..CopyOptions::default() };
        let report = source.copy_records(&dest, "widget", options).await.unwrap();
        assert_eq!(report, CopyReport { added: 1, ..CopyReport::default() });
        let err = dest.get_archive("widget", "w1").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_copy_failures_do_not_stop_the_batch() {
        let (_dir, source) = local();
        source.add_record(&widget("w1", "a")).await.unwrap();
        source.add_record(&widget("w2", "b")).await.unwrap();
        let curator = Arc::new(MockCurator::new());
        curator.set_read_only(true);
        let dest = RemoteCuratedDatabase::new("https://curator.test", curator.clone(), registry());

        let report = source.copy_records(&dest, "widget", CopyOptions::default()).await.unwrap();
        assert_eq!(report, CopyReport { failed: 2, ..CopyReport::default() });
        assert!(curator.entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_destroy_records() {
        let db = document();
        db.add_record(&widget("w1", "a")).await.unwrap();
        db.add_record(&widget("w2", "b")).await.unwrap();
        db.add_archive("widget", "w1", ArchiveSource::Bytes(vec![1, 2, 3])).await.unwrap();

        let report = db.destroy_records("widget").await.unwrap();
        assert_eq!(report, DestroyReport { deleted: 2, archives_deleted: 1, ..DestroyReport::default() });
        assert!(db.get_records(&Search::new("widget")).await.unwrap().is_empty());
        assert!(db.get_archive("widget", "w1").await.is_err());

        let report = db.destroy_records("widget").await.unwrap();
        assert_eq!(report, DestroyReport::default());
    }

    #[tokio::test]
    async fn test_load_record_uses_style() {
        let db = document();
        let model = Model::new("widget", json!({"label": "loaded", "count": 4}));
        let record = db.load_record("widget", "w9", model).unwrap();
        assert_eq!(record.metadata()["count"], json!(4));
        let err = db.load_record("citation", "c1", Model::new("citation", json!({}))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnknownStyle(_)));
    }
}
