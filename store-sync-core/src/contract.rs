//! # contract: the remote file store interface
//!
//! This module defines the single trait ([`FileStore`]) the sync pipeline needs
//! against a remote file-storage service, plus the typed record it exchanges.
//!
//! ## Interface & Extensibility
//! - Implement [`FileStore`] once per target service. The CLI crate ships the
//!   HTTP adapter for OpenAI-compatible Files APIs.
//! - All methods are async and return boxed errors ([`StoreError`]); adapters
//!   convert transport and API failures into that one shape.
//! - Responses are decoded into [`RemoteFile`] at the adapter boundary, so the
//!   pipeline never inspects raw payloads.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`; `MockFileStore` is exported under
//!   the `test-export-mocks` feature for downstream integration tests.

use std::path::Path;

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};

/// Boxed error returned by every [`FileStore`] operation.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// A file record as reported by the remote service.
///
/// Only the identifier and purpose matter to the pipeline; the rest is kept
/// for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Assigned by the service. Absent only when a response omits it.
    pub id: Option<String>,
    pub purpose: Option<String>,
    pub filename: Option<String>,
    pub bytes: Option<u64>,
    pub created_at: Option<i64>,
}

impl RemoteFile {
    /// True when the record carries exactly this purpose tag.
    pub fn has_purpose(&self, purpose: &str) -> bool {
        self.purpose.as_deref() == Some(purpose)
    }
}

/// The three operations the sync pipeline performs against a remote store.
///
/// Implementors own the transport, credentials and endpoint. Calls are issued
/// strictly one at a time by the pipeline.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait FileStore: Send + Sync {
    /// List every remote file whose purpose equals `purpose`.
    ///
    /// One listing call; no pagination beyond what the service returns.
    async fn list_by_purpose(&self, purpose: &str) -> Result<Vec<RemoteFile>, StoreError>;

    /// Delete one remote file by id. Errors when the id is unknown or the
    /// service rejects the call.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Upload the file at `path` tagged with `purpose` and return the created
    /// record.
    async fn create(&self, path: &Path, purpose: &str) -> Result<RemoteFile, StoreError>;
}
