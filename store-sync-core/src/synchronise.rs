//! High-level pipeline: purge the remote store, assemble local payloads,
//! upload them.
//!
//! One run walks a strictly linear sequence:
//!   - validate the input path (no remote call happens before this succeeds)
//!   - delete every remote file carrying the configured purpose
//!   - build the payloads (text bundle + binaries, or a given bundle as-is)
//!   - upload the payloads one at a time, bundle first
//!   - drop the temporary bundle
//!
//! # Error Handling
//! - A failed listing, an assembly failure or an upload failure ends the run
//!   with a [`SyncError`]. An upload failure also carries the purge outcome.
//! - A failed delete during the purge is logged, recorded in the
//!   [`PurgeReport`] and skipped.
//! - Nothing is retried and completed uploads are never rolled back. An upload
//!   failure carries the uploads that finished before it.
//!
//! Callers supply the [`FileStore`]; this module never builds one.

use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::assemble::{assemble, AssembleError, Payloads};
use crate::config::{InputMode, SyncConfig};
use crate::contract::{FileStore, StoreError};

/// A payload the store accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub path: PathBuf,
    /// `None` when the store accepted the upload but returned no identifier.
    pub id: Option<String>,
}

/// A remote file the purge could not remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeFailure {
    pub id: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub deleted: Vec<String>,
    pub failed: Vec<PurgeFailure>,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub purpose: String,
    pub purge: PurgeReport,
    pub uploads: Vec<UploadedFile>,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{}: {reason}", path.display())]
    InvalidInput { path: PathBuf, reason: &'static str },
    #[error("failed to list remote files with purpose {purpose:?}: {source}")]
    List {
        purpose: String,
        #[source]
        source: StoreError,
    },
    #[error(transparent)]
    Assemble(#[from] AssembleError),
    #[error("upload of {} failed: {source}", path.display())]
    Upload {
        path: PathBuf,
        #[source]
        source: StoreError,
        /// Uploads that succeeded before this one and remain in the store.
        completed: Vec<UploadedFile>,
        /// Outcome of the purge that ran before any upload.
        purge: PurgeReport,
    },
}

/// Check that the configured input exists with the right kind.
pub fn validate_input(input: &InputMode) -> Result<(), SyncError> {
    match input {
        InputMode::Directory(path) if !path.is_dir() => Err(SyncError::InvalidInput {
            path: path.clone(),
            reason: "is not a directory",
        }),
        InputMode::Bundle(path) if !path.is_file() => Err(SyncError::InvalidInput {
            path: path.clone(),
            reason: "not found",
        }),
        _ => Ok(()),
    }
}

/// Run the whole pipeline against `store`.
pub async fn synchronise<S>(config: &SyncConfig, store: &S) -> Result<SyncReport, SyncError>
where
    S: FileStore + ?Sized,
{
    config.trace_loaded();
    validate_input(&config.input)?;

    info!(purpose = %config.purpose, "[SYNC] Purging remote store");
    let purge = purge_store(store, &config.purpose).await?;

    let payloads = match &config.input {
        InputMode::Directory(root) => assemble(root)?,
        InputMode::Bundle(path) => {
            info!(path = %path.display(), "[SYNC] Using existing bundle as-is");
            Payloads::single(path.clone())
        }
    };

    let result = upload_payloads(store, &config.purpose, payloads.paths()).await;

    if let Some(bundle) = payloads.bundle_path() {
        debug!(path = %bundle.display(), "[SYNC] Removing temporary bundle");
    }
    drop(payloads);

    let uploads = match result {
        Ok(uploads) => uploads,
        Err(SyncError::Upload {
            path,
            source,
            completed,
            ..
        }) => {
            return Err(SyncError::Upload {
                path,
                source,
                completed,
                purge,
            })
        }
        Err(e) => return Err(e),
    };
    info!(
        purpose = %config.purpose,
        deleted = purge.deleted.len(),
        uploaded = uploads.len(),
        "[SYNC] Synchronisation complete"
    );
    Ok(SyncReport {
        purpose: config.purpose.clone(),
        purge,
        uploads,
    })
}

/// Delete every remote file tagged with `purpose`.
///
/// Best-effort: a failed delete is recorded and the next file is attempted.
/// Only the listing call itself is fatal.
pub async fn purge_store<S>(store: &S, purpose: &str) -> Result<PurgeReport, SyncError>
where
    S: FileStore + ?Sized,
{
    let files = store
        .list_by_purpose(purpose)
        .await
        .map_err(|source| {
            error!(error = %source, purpose, "[SYNC][ERROR] Listing remote files failed");
            SyncError::List {
                purpose: purpose.to_owned(),
                source,
            }
        })?;
    info!(count = files.len(), purpose, "[SYNC] Remote files to delete");

    let mut report = PurgeReport::default();
    for file in files {
        if !file.has_purpose(purpose) {
            warn!(id = ?file.id, other = ?file.purpose, "[SYNC] Listing returned a file with another purpose; leaving it");
            continue;
        }
        let Some(id) = file.id else {
            warn!(filename = ?file.filename, "[SYNC] Remote file has no id; cannot delete it");
            report.failed.push(PurgeFailure {
                id: None,
                error: "remote file has no id".to_owned(),
            });
            continue;
        };
        match store.delete(&id).await {
            Ok(()) => {
                info!(id = %id, "Deleted remote file");
                report.deleted.push(id);
            }
            Err(e) => {
                error!(id = %id, error = %e, "[SYNC][ERROR] Deleting remote file failed");
                report.failed.push(PurgeFailure {
                    id: Some(id),
                    error: e.to_string(),
                });
            }
        }
    }
    Ok(report)
}

/// Upload `paths` in order. Stops at the first failure.
pub async fn upload_payloads<S>(
    store: &S,
    purpose: &str,
    paths: &[PathBuf],
) -> Result<Vec<UploadedFile>, SyncError>
where
    S: FileStore + ?Sized,
{
    let mut completed = Vec::with_capacity(paths.len());
    for path in paths {
        info!(path = %path.display(), purpose, "Uploading");
        match store.create(path, purpose).await {
            Ok(remote) => {
                match remote.id.as_deref() {
                    Some(id) => info!(path = %path.display(), id, "Uploaded"),
                    None => warn!(path = %path.display(), "Upload returned no file id"),
                }
                completed.push(UploadedFile {
                    path: path.clone(),
                    id: remote.id,
                });
            }
            Err(source) => {
                error!(path = %path.display(), error = %source, "[SYNC][ERROR] Upload failed");
                return Err(SyncError::Upload {
                    path: path.clone(),
                    source,
                    completed,
                    purge: PurgeReport::default(),
                });
            }
        }
    }
    Ok(completed)
}
