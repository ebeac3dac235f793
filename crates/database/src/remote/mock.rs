//! In-memory curated service for testing.

use super::client::{Blob, CuratedRecord, CuratorClient};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use recordbase_query::Query;
use recordbase_record::Model;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Curated service double.
///
/// Queries are evaluated against each entry's parsed XML, and keywords
/// against its text (see [`Model::mentions`]). Write access can be
/// revoked with [`set_read_only`](MockCurator::set_read_only), and
/// [`fail_uploads`](MockCurator::fail_uploads) makes the next few blob
/// uploads fail with a retryable error.
#[derive(Default)]
pub struct MockCurator {
    records: RwLock<Vec<CuratedRecord>>,
    blobs: RwLock<Vec<(Blob, Vec<u8>)>>,
    assignments: RwLock<Vec<(String, String)>>,
    next_id: AtomicUsize,
    read_only: AtomicBool,
    failing_uploads: AtomicUsize,
}

impl MockCurator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    pub fn fail_uploads(&self, count: usize) {
        self.failing_uploads.store(count, Ordering::SeqCst);
    }

    /// Every `(id, workspace)` assignment made so far.
    pub async fn assignments(&self) -> Vec<(String, String)> {
        self.assignments.read().await.clone()
    }

    /// Every stored entry, duplicates included.
    pub async fn entries(&self) -> Vec<CuratedRecord> {
        self.records.read().await.clone()
    }

    /// Store an entry without any duplicate check.
    pub async fn insert(&self, template: &str, title: &str, content: &str) -> String {
        let id = self.id();
        self.records.write().await.push(CuratedRecord {
            id: id.clone(),
            title: title.to_string(),
            template: template.to_string(),
            content: content.to_string(),
        });
        id
    }

    fn id(&self) -> String {
        (self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    fn check_writable(&self, what: &str) -> Result<()> {
        if self.read_only.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Authorization(format!("{what} requires write access")));
        }
        Ok(())
    }
}

#[async_trait]
impl CuratorClient for MockCurator {
    async fn query(
        &self,
        template: &str,
        title: Option<&str>,
        query: &Query,
        keyword: Option<&str>,
    ) -> Result<Vec<CuratedRecord>> {
        let candidates: Vec<_> = self
            .entries()
            .await
            .into_iter()
            .filter(|r| r.template == template && title.is_none_or(|t| r.title == t))
            .collect();
        let mut found = Vec::new();
        for record in candidates {
            let model = Model::from_xml(&record.content).map_err(ErrorKind::record)?;
            if keyword.is_some_and(|keyword| !model.mentions(keyword)) {
                continue;
            }
            if query.matches(&model.to_value()).map_err(ErrorKind::query)? {
                found.push(record);
            }
        }
        Ok(found)
    }

    async fn upload(&self, template: &str, title: &str, content: &str) -> Result<String> {
        self.check_writable("upload")?;
        Ok(self.insert(template, title, content).await)
    }

    async fn update(&self, record: &CuratedRecord, content: &str) -> Result<()> {
        self.check_writable("update")?;
        let mut records = self.records.write().await;
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(stored) => {
                stored.content = content.to_string();
                Ok(())
            },
            None => exn::bail!(ErrorKind::NotFound(format!("data entry {}", record.id))),
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.check_writable("delete")?;
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            exn::bail!(ErrorKind::NotFound(format!("data entry {id}")));
        }
        Ok(())
    }

    async fn assign(&self, id: &str, workspace: &str) -> Result<()> {
        self.check_writable("workspace assignment")?;
        self.assignments.write().await.push((id.to_string(), workspace.to_string()));
        Ok(())
    }

    async fn blobs(&self, filename: &str) -> Result<Vec<Blob>> {
        let blobs = self.blobs.read().await;
        Ok(blobs.iter().filter(|(b, _)| b.filename == filename).map(|(b, _)| b.clone()).collect())
    }

    async fn upload_blob(&self, filename: &str, data: Vec<u8>) -> Result<String> {
        self.check_writable("blob upload")?;
        if self.failing_uploads.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok() {
            exn::bail!(ErrorKind::Backend("simulated upload failure".to_string()));
        }
        let blob = Blob { id: self.id(), filename: filename.to_string() };
        let id = blob.id.clone();
        self.blobs.write().await.push((blob, data));
        Ok(id)
    }

    async fn download_blob(&self, id: &str) -> Result<Vec<u8>> {
        let blobs = self.blobs.read().await;
        match blobs.iter().find(|(b, _)| b.id == id) {
            Some((_, data)) => Ok(data.clone()),
            None => exn::bail!(ErrorKind::NotFound(format!("blob {id}"))),
        }
    }

    async fn delete_blob(&self, id: &str) -> Result<()> {
        self.check_writable("blob deletion")?;
        let mut blobs = self.blobs.write().await;
        let before = blobs.len();
        blobs.retain(|(b, _)| b.id != id);
        if blobs.len() == before {
            exn::bail!(ErrorKind::NotFound(format!("blob {id}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const XML: &str = "<faq><question>Why?</question><answer>Because.</answer></faq>";

    #[tokio::test]
    async fn test_query_by_template_title_and_content() {
        let curator = MockCurator::new();
        curator.insert("FAQ", "q1", XML).await;
        curator.insert("FAQ", "q2", "<faq><question>How?</question></faq>").await;
        curator.insert("Request", "q1", "<request/>").await;

        assert_eq!(curator.query("FAQ", None, &Query::new(), None).await.unwrap().len(), 2);
        let found = curator.query("FAQ", Some("q1"), &Query::new(), None).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].content, XML);

        let query: Query = serde_json::from_value(json!({"faq.question": "How?"})).unwrap();
        let found = curator.query("FAQ", None, &query, None).await.unwrap();
        assert_eq!(found[0].title, "q2");

        let found = curator.query("FAQ", None, &Query::new(), Some("because")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "q1");
    }

    #[tokio::test]
    async fn test_read_only_rejects_writes() {
        let curator = MockCurator::new();
        curator.set_read_only(true);
        let err = curator.upload("FAQ", "q1", XML).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Authorization(_)));
        assert!(curator.entries().await.is_empty());
    }
}
