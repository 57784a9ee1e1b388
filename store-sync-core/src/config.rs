use std::path::PathBuf;

use tracing::{debug, info};

/// Purpose tag used when none is configured: general-purpose user data.
pub const DEFAULT_PURPOSE: &str = "user_data";

/// Where the payloads for one run come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    /// Walk a directory, bundle its text files and upload its binaries.
    Directory(PathBuf),
    /// Upload an existing bundle file as-is.
    Bundle(PathBuf),
}

/// Resolved configuration for one sync run. Credentials live with the store
/// adapter, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub purpose: String,
    pub input: InputMode,
}

impl SyncConfig {
    pub fn new(purpose: impl Into<String>, input: InputMode) -> Self {
        Self {
            purpose: purpose.into(),
            input,
        }
    }

    pub fn trace_loaded(&self) {
        let (mode, path) = match &self.input {
            InputMode::Directory(p) => ("directory", p),
            InputMode::Bundle(p) => ("bundle", p),
        };
        info!(
            purpose = %self.purpose,
            mode,
            path = %path.display(),
            "Loaded SyncConfig"
        );
        debug!(?self, "SyncConfig loaded (full debug)");
    }
}
