//! Local filesystem database.
//!
//! Layout under the host directory:
//!
//! ```text
//! <host>/<style>.csv               metadata cache
//! <host>/<style>/<name>.<ext>      record content (json or xml)
//! <host>/<style>/<name>.tar.gz     archive
//! <host>/<style>/<name>/           unpacked folder
//! ```
//!
//! Writes go straight to the record files and never touch the cache. Reads
//! refresh the cache lazily, so a reader that does not ask for a full refresh
//! may see rows for files deleted since the last one.

mod cache;

use crate::archive::{ARCHIVE_SUFFIX, ArchiveSource, is_dir};
use crate::database::Database;
use crate::error::{ErrorKind, Result, label};
use crate::search::Search;
use async_stream::stream;
use async_trait::async_trait;
use exn::OptionExt;
use futures::{Stream, TryStreamExt};
use recordbase_query::{Predicate, StrMatch, Table};
use recordbase_record::{Format, Record, RecordRegistry, StyleHandle, validate_name};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

/// Options a local database reads from its configuration entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LocalOptions {
    /// `json` (default) or `xml`.
    pub format: Option<String>,
    /// Pretty-print with this many spaces; compact when absent.
    pub indent: Option<usize>,
}

impl LocalOptions {
    pub fn format(&self) -> Result<Format> {
        match &self.format {
            None => Ok(Format::default()),
            Some(text) => {
                Format::from_extension(text).ok_or_raise(|| ErrorKind::Config(format!("unknown record format `{text}`")))
            },
        }
    }
}

/// Records stored as files under one directory.
///
/// Each record style has a subdirectory holding one content file per record,
/// named after the record and written in the database's [`Format`]. Next to
/// each subdirectory sits a CSV file caching every record's metadata, so
/// searches can filter without opening the content files.
///
/// # Searching
///
/// Filter terms are evaluated against the cached metadata. A native query or
/// keyword needs the content, so those searches read every file that survives
/// the `name` constraint and evaluate the query against `{name, content}`.
///
/// # Archives
///
/// A record's archive is either a `<name>.tar.gz` file or an unpacked
/// `<name>/` folder beside the content file. The folder is packed on the fly
/// when the archive is read, and having both at once is a conflict.
///
/// # Examples
///
/// ```no_run
/// use recordbase_database::LocalDatabase;
/// use recordbase_record::{Format, RecordRegistry};
/// use std::sync::Arc;
///
/// # fn example() -> recordbase_database::error::Result<()> {
/// let db = LocalDatabase::new("/srv/records", Arc::new(RecordRegistry::builtin()))?
///     .with_format(Format::Xml)
///     .with_indent(Some(4));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalDatabase {
    /// Absolute host directory.
    root: PathBuf,
    host: String,
    records: Arc<RecordRegistry>,
    format: Format,
    indent: Option<usize>,
}

impl LocalDatabase {
    /// Open (creating if needed) the database rooted at `host`.
    ///
    /// # Arguments
    /// * `host` - Database directory; relative paths are resolved against the
    ///   working directory
    /// * `records` - Record styles this database can store
    ///
    /// # Errors
    ///
    /// Returns an error if `host` exists but is not a directory, or cannot be
    /// created.
    pub fn new(host: impl AsRef<Path>, records: Arc<RecordRegistry>) -> Result<Self> {
        let host = host.as_ref();
        let root = std::path::absolute(host).map_err(|e| ErrorKind::io(e, "host directory", host))?;
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::Config(format!("host {} is not a directory", root.display())));
            }
        } else {
            // Use non-async here; it only happens once when the database is opened.
            sync_create_dir(&root).map_err(|e| ErrorKind::io(e, "host directory", &root))?;
            info!(host = %root.display(), "created local database directory");
        }
        Ok(Self { host: root.display().to_string(), root, records, format: Format::default(), indent: None })
    }

    pub fn from_options(host: impl AsRef<Path>, records: Arc<RecordRegistry>, options: &LocalOptions) -> Result<Self> {
        Ok(Self::new(host, records)?.with_format(options.format()?).with_indent(options.indent))
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn with_indent(mut self, indent: Option<usize>) -> Self {
        self.indent = indent;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn format(&self) -> Format {
        self.format
    }

    fn style_dir(&self, style: &str) -> Result<PathBuf> {
        let style = validate_name(style).map_err(ErrorKind::record)?;
        Ok(self.root.join(style))
    }

    fn cache_path(&self, style: &str) -> Result<PathBuf> {
        let style = validate_name(style).map_err(ErrorKind::record)?;
        Ok(self.root.join(format!("{style}.csv")))
    }

    fn entry_path(&self, style: &str, name: &str, suffix: &str) -> Result<PathBuf> {
        let name = validate_name(name).map_err(ErrorKind::record)?;
        Ok(self.style_dir(style)?.join(format!("{name}{suffix}")))
    }

    fn record_path(&self, style: &str, name: &str) -> Result<PathBuf> {
        self.entry_path(style, name, &format!(".{}", self.format.extension()))
    }

    fn archive_path(&self, style: &str, name: &str) -> Result<PathBuf> {
        self.entry_path(style, name, ARCHIVE_SUFFIX)
    }

    fn folder_path(&self, style: &str, name: &str) -> Result<PathBuf> {
        self.entry_path(style, name, "")
    }

    async fn exists(path: &Path) -> Result<bool> {
        fs::try_exists(path).await.map_err(|e| ErrorKind::io(e, "path", path).into())
    }

    async fn read_record(&self, handle: &StyleHandle, name: &str, path: &Path) -> Result<Box<dyn Record>> {
        let text = fs::read_to_string(path).await.map_err(|e| ErrorKind::io(e, &label(handle.style(), name), path))?;
        let model = self.format.parse(&text).map_err(ErrorKind::record)?;
        handle.load(name, model).map_err(ErrorKind::record)
    }

    async fn write_record(&self, record: &dyn Record, path: &Path) -> Result<()> {
        let content = record.content().map_err(ErrorKind::record)?;
        let text = self.format.render(&content, self.indent).map_err(ErrorKind::record)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await.map_err(|e| ErrorKind::io(e, "style directory", dir))?;
        }
        fs::write(path, text).await.map_err(|e| ErrorKind::io(e, "record file", path))?;
        debug!(path = %path.display(), "wrote record");
        Ok(())
    }

    /// Stream `(name, path)` for every record file in a style directory. A
    /// missing directory is an empty style.
    fn record_files(&self, dir: PathBuf) -> impl Stream<Item = Result<(String, PathBuf)>> + Send + '_ {
        let extension = self.format.extension();
        stream! {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => return,
                Err(err) => {
                    yield Err(exn::Exn::from(ErrorKind::io(err, "style directory", &dir)));
                    return;
                }
            };
            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(err) => {
                        yield Err(exn::Exn::from(ErrorKind::io(err, "style directory", &dir)));
                        break;
                    }
                };
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some(extension) {
                    continue;
                }
                let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                    continue;
                };
                if matches!(entry.file_type().await, Ok(kind) if kind.is_file()) {
                    yield Ok((name, path));
                }
            }
        }
    }

    /// The metadata table of one style, loaded from and maintained in its
    /// cache file.
    ///
    /// - Without `refresh`, an existing cache file is loaded as-is.
    /// - With `add_new` (or `refresh`), record files missing from the table
    ///   are parsed and appended. Files that fail to parse are skipped.
    /// - The cache file is rewritten after a refresh or when rows were
    ///   appended, and left untouched otherwise.
    ///
    /// A refresh therefore always matches the directory exactly, while the
    /// incremental path only ever grows the table.
    #[instrument(skip(self), fields(host = %self.host))]
    pub async fn cached_table(&self, style: &str, refresh: bool, add_new: bool) -> Result<Table> {
        let handle = self.record_style(style)?;
        let cache = self.cache_path(style)?;
        let mut table = match refresh {
            true => Table::default(),
            false => match fs::read(&cache).await {
                Ok(bytes) => cache::decode(&bytes, handle.fields(), &cache)?,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Table::default(),
                Err(err) => return Err(ErrorKind::io(err, "cache file", &cache).into()),
            },
        };

        let mut appended = 0;
        if refresh || add_new {
            let known: BTreeSet<String> = table.name_set();
            let files: Vec<(String, PathBuf)> = self.record_files(self.style_dir(style)?).try_collect().await?;
            for (name, path) in files {
                if known.contains(&name) {
                    continue;
                }
                match self.read_record(handle, &name, &path).await {
                    Ok(record) => {
                        table.push(record.metadata());
                        appended += 1;
                    },
                    Err(err) => warn!(path = %path.display(), error = ?err, "skipping unreadable record file"),
                }
            }
        }

        if refresh || appended > 0 {
            let bytes = cache::encode(&table, &cache)?;
            fs::write(&cache, bytes).await.map_err(|e| ErrorKind::io(e, "cache file", &cache))?;
            debug!(rows = table.len(), appended, "wrote metadata cache");
        }
        table.sort_by_name();
        Ok(table)
    }
}

#[async_trait]
impl Database for LocalDatabase {
    fn style(&self) -> &str {
        "local"
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
        let table = self.cached_table(&search.style, search.refresh_cache, true).await?;

        let mut mask = StrMatch.mask(&table, "name", search.names(), None).map_err(ErrorKind::query)?;
        if search.query.is_none() {
            mask = mask & handle.filter_mask(&table, &search.terms()).map_err(ErrorKind::record)?;
        }

        let mut records = Vec::new();
        let mut rows = Vec::new();
        for row in table.filter(&mask).into_rows() {
            let Some(name) = row.get("name").and_then(Value::as_str).map(str::to_string) else {
                continue;
            };
            let path = self.record_path(&search.style, &name)?;
            if !Self::exists(&path).await? {
                debug!(name, "cached row has no record file");
                if search.query.is_none() && search.keyword.is_none() {
                    rows.push(row);
                }
                continue;
            }
            let record = self.read_record(handle, &name, &path).await?;
            if search.query.is_some() || search.keyword.is_some() {
                let content = record.content().map_err(ErrorKind::record)?;
                if !search.keeps(&content) {
                    continue;
                }
                if let Some(query) = &search.query {
                    let document = json!({"name": name, "content": content.to_value()});
                    if !query.matches(&document).map_err(ErrorKind::query)? {
                        continue;
                    }
                }
            }
            rows.push(row);
            records.push(record);
        }
        Ok((records, Table::from_rows(rows)))
    }

    #[instrument(skip(self, record), fields(host = %self.host, style = record.style(), name = record.name()))]
    async fn add_record(&self, record: &dyn Record) -> Result<()> {
        self.record_style(record.style())?;
        let path = self.record_path(record.style(), record.name())?;
        if Self::exists(&path).await? {
            exn::bail!(ErrorKind::DuplicateKey(label(record.style(), record.name())));
        }
        self.write_record(record, &path).await
    }

    #[instrument(skip(self, record), fields(host = %self.host, style = record.style(), name = record.name()))]
    async fn update_record(&self, record: &dyn Record) -> Result<()> {
        self.record_style(record.style())?;
        let path = self.record_path(record.style(), record.name())?;
        if !Self::exists(&path).await? {
            exn::bail!(ErrorKind::NotFound(label(record.style(), record.name())));
        }
        self.write_record(record, &path).await
    }

    #[instrument(skip(self), fields(host = %self.host))]
    async fn delete_record(&self, style: &str, name: &str) -> Result<()> {
        self.record_style(style)?;
        let path = self.record_path(style, name)?;
        fs::remove_file(&path).await.map_err(|e| ErrorKind::io(e, &label(style, name), &path))?;
        Ok(())
    }

    #[instrument(skip(self, source), fields(host = %self.host))]
    async fn add_archive(&self, style: &str, name: &str, source: ArchiveSource) -> Result<()> {
        let record = self.record_path(style, name)?;
        if !Self::exists(&record).await? {
            exn::bail!(ErrorKind::NotFound(label(style, name)));
        }
        let path = self.archive_path(style, name)?;
        if Self::exists(&path).await? || is_dir(&self.folder_path(style, name)?).await {
            exn::bail!(ErrorKind::DuplicateKey(format!("archive of {}", label(style, name))));
        }
        let bytes = source.into_bytes(name).await?;
        fs::write(&path, bytes).await.map_err(|e| ErrorKind::io(e, "archive file", &path))?;
        Ok(())
    }

    async fn get_archive(&self, style: &str, name: &str) -> Result<Vec<u8>> {
        let path = self.archive_path(style, name)?;
        let bytes = fs::read(&path).await.map_err(|e| ErrorKind::io(e, &format!("archive of {}", label(style, name)), &path))?;
        Ok(bytes)
    }

    #[instrument(skip(self), fields(host = %self.host))]
    async fn delete_archive(&self, style: &str, name: &str) -> Result<()> {
        let path = self.archive_path(style, name)?;
        fs::remove_file(&path).await.map_err(|e| ErrorKind::io(e, &format!("archive of {}", label(style, name)), &path))?;
        Ok(())
    }

    async fn get_folder(&self, style: &str, name: &str) -> Result<Option<PathBuf>> {
        let path = self.folder_path(style, name)?;
        Ok(is_dir(&path).await.then_some(path))
    }
}
