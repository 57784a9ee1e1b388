#![doc = "HTTP adapter for the store-sync-core `FileStore` contract, speaking the OpenAI Files API."]
//
//! # Files API client
//!
//! Bridges the [`FileStore`] trait in `store-sync-core` to a real remote
//! service. [`OpenAiFiles`] works against any OpenAI-compatible Files API:
//!
//! - `GET    {base_url}/files?purpose=..` lists files
//! - `DELETE {base_url}/files/{id}` deletes one file
//! - `POST   {base_url}/files` uploads one file as `multipart/form-data`
//!
//! Every request carries `Authorization: Bearer <api key>`. Non-2xx replies
//! become errors carrying the status and the service's error message.
//!
//! Construct the client from a [`ClientConfig`], usually built with
//! [`ClientConfig::resolve`] from the CLI flags and the environment
//! (`OPENAI_API_KEY`, `OPENAI_BASE_URL`).

use std::env;
use std::fmt;
use std::path::Path;

use anyhow::bail;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use store_sync_core::contract::{FileStore, RemoteFile, StoreError};

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Endpoint and credential for [`OpenAiFiles`].
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: String,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ClientConfig {
    /// Resolve the credential (`api_key`, else `OPENAI_API_KEY`) and the
    /// endpoint (`base_url`, else `OPENAI_BASE_URL`, else the public API).
    ///
    /// A missing credential is a configuration error.
    pub fn resolve(api_key: Option<String>, base_url: Option<String>) -> anyhow::Result<Self> {
        let api_key = match api_key.filter(|k| !k.is_empty()) {
            Some(key) => key,
            None => match env::var(API_KEY_ENV) {
                Ok(key) if !key.is_empty() => {
                    tracing::info!("{API_KEY_ENV} found in env");
                    key
                }
                _ => {
                    tracing::error!("No API key given and {API_KEY_ENV} not set");
                    bail!("missing API key: pass --api-key or set {API_KEY_ENV}");
                }
            },
        };
        let base_url = base_url
            .filter(|u| !u.is_empty())
            .or_else(|| env::var(BASE_URL_ENV).ok().filter(|u| !u.is_empty()))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());

        tracing::info!(base_url = %base_url, "Resolved Files API client config");
        Ok(Self { api_key, base_url })
    }
}

pub struct OpenAiFiles {
    http: reqwest::Client,
    conf: ClientConfig,
}

#[derive(Debug, Deserialize)]
struct FileList {
    data: Vec<RemoteFile>,
}

#[derive(Debug, Deserialize)]
struct DeletedFile {
    #[allow(dead_code)]
    id: Option<String>,
    deleted: bool,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Human-readable message for a failed reply: the service's
/// `{"error": {"message": ..}}` when present, the raw body otherwise.
fn api_error_message(status: reqwest::StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_owned());
    if detail.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {detail}")
    }
}

fn join_url(base: &str, segment: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), segment)
}

async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(api_error_message(status, &body).into())
}

impl OpenAiFiles {
    pub fn new(conf: ClientConfig) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("store-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                tracing::error!(error = ?e, "Failed to build HTTP client");
                e
            })?;
        tracing::info!(base_url = %conf.base_url, "Initialized Files API client");
        Ok(Self { http, conf })
    }

    fn url(&self, segment: &str) -> String {
        join_url(&self.conf.base_url, segment)
    }
}

#[async_trait]
impl FileStore for OpenAiFiles {
    async fn list_by_purpose(&self, purpose: &str) -> Result<Vec<RemoteFile>, StoreError> {
        tracing::info!(purpose, "Listing remote files");
        let resp = self
            .http
            .get(self.url("files"))
            .bearer_auth(&self.conf.api_key)
            .query(&[("purpose", purpose)])
            .send()
            .await?;
        let list: FileList = ensure_success(resp).await?.json().await?;
        let total = list.data.len();
        let files: Vec<RemoteFile> = list
            .data
            .into_iter()
            .filter(|f| f.has_purpose(purpose))
            .collect();
        tracing::info!(total, matching = files.len(), "Fetched remote file listing");
        Ok(files)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        tracing::info!(id, "Deleting remote file");
        let resp = self
            .http
            .delete(self.url(&format!("files/{id}")))
            .bearer_auth(&self.conf.api_key)
            .send()
            .await?;
        let reply: DeletedFile = ensure_success(resp).await?.json().await?;
        if !reply.deleted {
            tracing::error!(id, "Service reported the file as not deleted");
            return Err(format!("service did not delete file {id}").into());
        }
        Ok(())
    }

    async fn create(&self, path: &Path, purpose: &str) -> Result<RemoteFile, StoreError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            tracing::error!(error = ?e, path = %path.display(), "Failed to read upload payload");
            format!("failed to read {}: {e}", path.display())
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_owned());
        tracing::info!(path = %path.display(), size = bytes.len(), purpose, "Uploading file");

        let form = Form::new()
            .text("purpose", purpose.to_owned())
            .part("file", Part::bytes(bytes).file_name(file_name));
        let resp = self
            .http
            .post(self.url("files"))
            .bearer_auth(&self.conf.api_key)
            .multipart(form)
            .send()
            .await?;
        let created: RemoteFile = ensure_success(resp).await?.json().await?;
        tracing::info!(id = ?created.id, "Remote file created");
        Ok(created)
    }
}
