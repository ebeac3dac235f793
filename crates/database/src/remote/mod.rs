//! Remote curated-content database.
//!
//! Records live on a curator service as XML data entries: the template is the
//! record style and the title is the record name. Archives are separate blobs
//! named `<name>.tar.gz`. Every write needs an account with write access.

mod client;
#[cfg(feature = "remote")]
mod http;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use self::client::{Blob, CuratedRecord, CuratorClient};
#[cfg(feature = "remote")]
pub use self::http::HttpCurator;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockCurator;
use crate::archive::{ArchiveSource, archive_name};
use crate::database::Database;
use crate::error::{ErrorKind, Result, label};
use crate::retry::{UPLOAD_ATTEMPTS, retry};
use crate::search::Search;
use async_trait::async_trait;
use exn::ResultExt;
use recordbase_query::{Query, Table};
use recordbase_record::{Model, Record, RecordRegistry};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Connection settings a remote database reads from its configuration entry.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RemoteOptions {
    pub username: Option<String>,
    pub password: Option<String>,
    /// File whose trimmed contents are the password.
    pub password_file: Option<PathBuf>,
    /// PEM root certificate to trust.
    pub cert: Option<PathBuf>,
    pub verify: bool,
    /// Workspace new and updated records are assigned to.
    pub workspace: Option<String>,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self { username: None, password: None, password_file: None, cert: None, verify: true, workspace: None }
    }
}

impl RemoteOptions {
    /// The password, read from `password_file` when one is given.
    pub fn password(&self) -> Result<Option<String>> {
        match (&self.password, &self.password_file) {
            (Some(_), Some(_)) => {
                exn::bail!(ErrorKind::ConflictingArguments("give either password or password_file".into()))
            },
            (password, None) => Ok(password.clone()),
            (None, Some(path)) => {
                let text = std::fs::read_to_string(path)
                    .or_raise(|| ErrorKind::Config(format!("could not read password file {}", path.display())))?;
                Ok(Some(text.trim().to_string()))
            },
        }
    }
}

/// Records kept on a curated-content service.
///
/// Every call goes through a [`CuratorClient`]: `HttpCurator` against a real
/// service (with the `remote` feature), or an in-memory double in tests.
/// Content is uploaded as compact XML and parsed back into a model on read,
/// so styles see only text in what they load.
///
/// Searches are delegated to the service: filter terms become the style's
/// native query, addressed from the model root (`faq.question`, not
/// `content.faq.question`), and a keyword is passed on as the service's own
/// full-text search. Names narrow the result by title, one service query per
/// name.
///
/// Writes need an account with write access; a refusal surfaces as
/// [`ErrorKind::Authorization`] and is never retried.
pub struct RemoteCuratedDatabase {
    host: String,
    client: Arc<dyn CuratorClient>,
    records: Arc<RecordRegistry>,
    workspace: Option<String>,
}

impl RemoteCuratedDatabase {
    pub fn new(host: impl Into<String>, client: Arc<dyn CuratorClient>, records: Arc<RecordRegistry>) -> Self {
        Self { host: host.into(), client, records, workspace: None }
    }

    /// Connect over HTTPS.
    #[cfg(feature = "remote")]
    pub fn connect(host: &str, records: Arc<RecordRegistry>, options: &RemoteOptions) -> Result<Self> {
        let client = HttpCurator::new(host, options)?;
        Ok(Self::new(host, Arc::new(client), records).with_workspace(options.workspace.clone()))
    }

    /// Assign every added or updated record to `workspace`.
    pub fn with_workspace(mut self, workspace: Option<String>) -> Self {
        self.workspace = workspace;
        self
    }

    pub fn client(&self) -> &Arc<dyn CuratorClient> {
        &self.client
    }

    /// The single entry holding a record.
    async fn entry(&self, style: &str, name: &str) -> Result<CuratedRecord> {
        let mut entries = self.client.query(style, Some(name), &Query::new(), None).await?;
        match entries.len() {
            0 => exn::bail!(ErrorKind::NotFound(label(style, name))),
            1 => Ok(entries.remove(0)),
            n => exn::bail!(ErrorKind::AmbiguousMatch(label(style, name), n)),
        }
    }

    async fn archive_blob(&self, style: &str, name: &str) -> Result<Option<String>> {
        let blobs = self.client.blobs(&archive_name(name)).await?;
        match blobs.len() {
            0 => Ok(None),
            1 => Ok(blobs.into_iter().next().map(|b| b.id)),
            n => exn::bail!(ErrorKind::AmbiguousMatch(format!("archive of {}", label(style, name)), n)),
        }
    }

    fn xml(record: &dyn Record) -> Result<String> {
        let content = record.content().map_err(ErrorKind::record)?;
        content.to_xml(None).map_err(ErrorKind::record)
    }

    /// Share a stored record with a workspace.
    #[instrument(skip(self), fields(host = %self.host))]
    pub async fn assign_to_workspace(&self, style: &str, name: &str, workspace: &str) -> Result<()> {
        let entry = self.entry(style, name).await?;
        self.client.assign(&entry.id, workspace).await?;
        info!(style, name, workspace, "assigned record to workspace");
        Ok(())
    }

    async fn assign_default(&self, id: &str) -> Result<()> {
        match &self.workspace {
            Some(workspace) => self.client.assign(id, workspace).await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Database for RemoteCuratedDatabase {
    fn style(&self) -> &str {
        "remote"
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn records(&self) -> &RecordRegistry {
        &self.records
    }

    /// One service query per requested name (or a single unnamed one). A
    /// keyword is searched by the service itself.
    #[instrument(skip(self, search), fields(host = %self.host, search = %search))]
    async fn get_records_table(&self, search: &Search) -> Result<(Vec<Box<dyn Record>>, Table)> {
        search.validate()?;
        let handle = self.record_style(&search.style)?;
        let query = match &search.query {
            Some(query) => query.clone(),
            None => handle.native_query(&search.terms()).map_err(ErrorKind::record)?,
        };
        let titles: Vec<Option<String>> = match search.names() {
            Some(names) => names.to_strings().into_iter().map(Some).collect(),
            None => vec![None],
        };

        let mut seen = HashSet::new();
        let mut records = Vec::new();
        for title in &titles {
            let entries = self.client.query(&search.style, title.as_deref(), &query, search.keyword.as_deref()).await?;
            for entry in entries {
                if !seen.insert(entry.id.clone()) {
                    continue;
                }
                let model = Model::from_xml(&entry.content).map_err(ErrorKind::record)?;
                records.push(handle.load(&entry.title, model).map_err(ErrorKind::record)?);
            }
        }
        debug!(found = records.len(), queries = titles.len(), "queried curator");
        records.sort_by(|a, b| a.name().cmp(b.name()));
        let table = Table::from_rows(records.iter().map(|r| r.metadata()));
        Ok((records, table))
    }

    #[instrument(skip(self, record), fields(host = %self.host, style = record.style(), name = record.name()))]
    async fn add_record(&self, record: &dyn Record) -> Result<()> {
        let (style, name) = (record.style(), record.name());
        self.record_style(style)?;
        let content = Self::xml(record)?;
        if !self.client.query(style, Some(name), &Query::new(), None).await?.is_empty() {
            exn::bail!(ErrorKind::DuplicateKey(label(style, name)));
        }
        let id = self.client.upload(style, name, &content).await?;
        self.assign_default(&id).await
    }

    #[instrument(skip(self, record), fields(host = %self.host, style = record.style(), name = record.name()))]
    async fn update_record(&self, record: &dyn Record) -> Result<()> {
        self.record_style(record.style())?;
        let content = Self::xml(record)?;
        let entry = self.entry(record.style(), record.name()).await?;
        self.client.update(&entry, &content).await?;
        self.assign_default(&entry.id).await
    }

    #[instrument(skip(self), fields(host = %self.host))]
    async fn delete_record(&self, style: &str, name: &str) -> Result<()> {
        let entry = self.entry(style, name).await?;
        self.client.delete(&entry.id).await
    }

    #[instrument(skip(self, source), fields(host = %self.host))]
    async fn add_archive(&self, style: &str, name: &str, source: ArchiveSource) -> Result<()> {
        self.entry(style, name).await?;
        if self.archive_blob(style, name).await?.is_some() {
            exn::bail!(ErrorKind::DuplicateKey(format!("archive of {}", label(style, name))));
        }
        let bytes = source.into_bytes(name).await?;
        let filename = archive_name(name);
        retry(UPLOAD_ATTEMPTS, "archive upload", || self.client.upload_blob(&filename, bytes.clone())).await?;
        Ok(())
    }

    async fn get_archive(&self, style: &str, name: &str) -> Result<Vec<u8>> {
        match self.archive_blob(style, name).await? {
            Some(id) => self.client.download_blob(&id).await,
            None => exn::bail!(ErrorKind::NotFound(format!("archive of {}", label(style, name)))),
        }
    }

    #[instrument(skip(self), fields(host = %self.host))]
    async fn delete_archive(&self, style: &str, name: &str) -> Result<()> {
        match self.archive_blob(style, name).await? {
            Some(id) => self.client.delete_blob(&id).await,
            None => exn::bail!(ErrorKind::NotFound(format!("archive of {}", label(style, name)))),
        }
    }
}
