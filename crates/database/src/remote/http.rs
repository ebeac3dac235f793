//! HTTP client for a CDCS curator REST API.

use super::RemoteOptions;
use super::client::{Blob, CuratedRecord, CuratorClient};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use recordbase_query::{Query, stringify};
use reqwest::multipart::{Form, Part};
use reqwest::{Certificate, Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

#[derive(Deserialize)]
struct TemplateManager {
    title: String,
    current: Value,
}

#[derive(Deserialize)]
struct DataEntry {
    id: Value,
    title: String,
    #[serde(default)]
    xml_content: String,
}

#[derive(Deserialize)]
struct Created {
    id: Value,
}

#[derive(Deserialize)]
struct Workspace {
    id: Value,
    title: String,
}

#[derive(Deserialize)]
struct BlobEntry {
    id: Value,
    filename: String,
}

/// Talks to a curator over HTTPS with basic authentication.
///
/// Template ids are looked up by title once and remembered.
pub struct HttpCurator {
    base: String,
    client: Client,
    username: Option<String>,
    password: Option<String>,
    templates: RwLock<HashMap<String, String>>,
}

impl HttpCurator {
    pub fn new(host: &str, options: &RemoteOptions) -> Result<Self> {
        let mut builder = Client::builder().danger_accept_invalid_certs(!options.verify);
        if let Some(cert) = &options.cert {
            let pem = std::fs::read(cert)
                .or_raise(|| ErrorKind::Config(format!("could not read certificate {}", cert.display())))?;
            let cert = Certificate::from_pem(&pem).or_raise(|| ErrorKind::Config("invalid PEM certificate".into()))?;
            builder = builder.add_root_certificate(cert);
        }
        let client = builder.build().or_raise(|| ErrorKind::Config("could not build HTTP client".into()))?;
        Ok(Self {
            base: host.trim_end_matches('/').to_string(),
            client,
            username: options.username.clone(),
            password: options.password()?,
            templates: RwLock::new(HashMap::new()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.username {
            Some(username) => request.basic_auth(username, self.password.as_deref()),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let response = self
            .authed(request)
            .send()
            .await
            .or_raise(|| ErrorKind::Backend(format!("{what}: request failed")))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!(what, %status, %body, "curator refused request");
        exn::bail!(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorKind::Authorization(format!("{what}: {status}")),
            StatusCode::NOT_FOUND => ErrorKind::NotFound(what.to_string()),
            _ => ErrorKind::Backend(format!("{what}: {status} {body}")),
        })
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        self.send(request, what)
            .await?
            .json()
            .await
            .or_raise(|| ErrorKind::Backend(format!("{what}: unexpected response")))
    }

    async fn template_id(&self, template: &str) -> Result<String> {
        if let Some(id) = self.templates.read().await.get(template) {
            return Ok(id.clone());
        }
        let managers: Vec<TemplateManager> = self
            .json(self.client.get(self.url("rest/template-version-manager/global/")), "template list")
            .await?;
        let mut templates = self.templates.write().await;
        for manager in managers {
            templates.insert(manager.title, stringify(&manager.current));
        }
        templates.get(template).cloned().ok_or_raise(|| ErrorKind::NotFound(format!("template `{template}`")))
    }

    async fn workspace_id(&self, workspace: &str) -> Result<String> {
        let workspaces: Vec<Workspace> =
            self.json(self.client.get(self.url("rest/workspace/read_access")), "workspace list").await?;
        workspaces
            .into_iter()
            .find(|w| w.title == workspace)
            .map(|w| stringify(&w.id))
            .ok_or_raise(|| ErrorKind::NotFound(format!("workspace `{workspace}`")))
    }
}

#[async_trait]
impl CuratorClient for HttpCurator {
    #[instrument(skip(self, query), fields(base = %self.base))]
    async fn query(
        &self,
        template: &str,
        title: Option<&str>,
        query: &Query,
        keyword: Option<&str>,
    ) -> Result<Vec<CuratedRecord>> {
        let template_id = self.template_id(template).await?;
        // Keyword searches have their own endpoint, taking the keyword as the query.
        let (path, query) = match keyword {
            Some(keyword) => ("rest/data/query/keyword/", keyword.to_string()),
            None => ("rest/data/query/", query.to_string()),
        };
        let mut body = json!({
            "query": query,
            "templates": json!([{ "id": template_id }]).to_string(),
            "all": "true",
        });
        if let Some(title) = title {
            body["title"] = Value::from(title);
        }
        let entries: Vec<DataEntry> = self.json(self.client.post(self.url(path)).json(&body), "data query").await?;
        Ok(entries
            .into_iter()
            .map(|e| CuratedRecord {
                id: stringify(&e.id),
                title: e.title,
                template: template.to_string(),
                content: e.xml_content,
            })
            .collect())
    }

    #[instrument(skip(self, content), fields(base = %self.base))]
    async fn upload(&self, template: &str, title: &str, content: &str) -> Result<String> {
        let body = json!({
            "title": title,
            "template": self.template_id(template).await?,
            "xml_content": content,
        });
        let created: Created = self.json(self.client.post(self.url("rest/data/")).json(&body), "data upload").await?;
        Ok(stringify(&created.id))
    }

    #[instrument(skip(self, record, content), fields(base = %self.base, id = %record.id))]
    async fn update(&self, record: &CuratedRecord, content: &str) -> Result<()> {
        let request = self.client.patch(self.url(&format!("rest/data/{}/", record.id))).json(&json!({
            "xml_content": content,
        }));
        self.send(request, "data update").await?;
        Ok(())
    }

    #[instrument(skip(self), fields(base = %self.base))]
    async fn delete(&self, id: &str) -> Result<()> {
        self.send(self.client.delete(self.url(&format!("rest/data/{id}/"))), "data deletion").await?;
        Ok(())
    }

    #[instrument(skip(self), fields(base = %self.base))]
    async fn assign(&self, id: &str, workspace: &str) -> Result<()> {
        let workspace_id = self.workspace_id(workspace).await?;
        let url = self.url(&format!("rest/data/{id}/assign/{workspace_id}"));
        self.send(self.client.patch(url), "workspace assignment").await?;
        Ok(())
    }

    async fn blobs(&self, filename: &str) -> Result<Vec<Blob>> {
        let request = self.client.get(self.url("rest/blob/")).query(&[("filename", filename)]);
        let entries: Vec<BlobEntry> = self.json(request, "blob list").await?;
        Ok(entries
            .into_iter()
            .filter(|b| b.filename == filename)
            .map(|b| Blob { id: stringify(&b.id), filename: b.filename })
            .collect())
    }

    #[instrument(skip(self, data), fields(base = %self.base, size = data.len()))]
    async fn upload_blob(&self, filename: &str, data: Vec<u8>) -> Result<String> {
        let form = Form::new().part("blob", Part::bytes(data).file_name(filename.to_string()));
        let created: Created =
            self.json(self.client.post(self.url("rest/blob/")).multipart(form), "blob upload").await?;
        Ok(stringify(&created.id))
    }

    async fn download_blob(&self, id: &str) -> Result<Vec<u8>> {
        let response = self.send(self.client.get(self.url(&format!("rest/blob/download/{id}/"))), "blob download").await?;
        let bytes = response.bytes().await.or_raise(|| ErrorKind::Backend("blob download: truncated".into()))?;
        Ok(bytes.to_vec())
    }

    #[instrument(skip(self), fields(base = %self.base))]
    async fn delete_blob(&self, id: &str) -> Result<()> {
        self.send(self.client.delete(self.url(&format!("rest/blob/{id}/"))), "blob deletion").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_urls_from_host() {
        let curator = HttpCurator::new("https://curator.example.org/", &RemoteOptions::default()).unwrap();
        assert_eq!(curator.url("rest/data/"), "https://curator.example.org/rest/data/");
    }

    #[test]
    fn test_missing_certificate_is_config_error() {
        let options = RemoteOptions { cert: Some("/nonexistent/cert.pem".into()), ..RemoteOptions::default() };
        let err = HttpCurator::new("https://curator.example.org", &options).err().unwrap();
        assert!(matches!(&*err, ErrorKind::Config(_)));
    }
}
