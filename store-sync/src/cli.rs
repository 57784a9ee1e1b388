///
/// This module implements the CLI interface for store-sync: argument parsing,
/// configuration resolution, the async entrypoint and the operator report.
///
/// All pipeline logic (assembly, purge, upload ordering) lives in the
/// [`store-sync-core`] crate. This module is CLI glue only.
///
/// ## How To Use
/// - Command line: `store-sync --dir <DIR>` or `store-sync --file <BUNDLE>`.
/// - Programmatic/integration use: call [`run`] with a constructed [`Cli`],
///   or [`execute`] with any [`FileStore`].
///
/// [`store-sync-core`]: ../../store-sync-core/
use crate::load_config::{load_config, FileConfig};
use crate::upload::{ClientConfig, OpenAiFiles};
use anyhow::{Context, Result};
use clap::{Args, Parser};
use std::fmt::Write as _;
use std::path::PathBuf;
use store_sync_core::config::{InputMode, SyncConfig, DEFAULT_PURPOSE};
use store_sync_core::contract::FileStore;
use store_sync_core::synchronise::{
    synchronise, validate_input, PurgeReport, SyncError, SyncReport, UploadedFile,
};

/// CLI for store-sync: overwrite a remote file store with a directory's supported files.
#[derive(Parser, Debug)]
#[clap(
    name = "store-sync",
    version,
    about = "Overwrite your remote file store with supported files only"
)]
pub struct Cli {
    #[clap(flatten)]
    pub input: InputArgs,

    /// Purpose tag to purge and upload with [default: user_data]
    #[clap(short, long)]
    pub purpose: Option<String>,

    /// API key (or set OPENAI_API_KEY)
    #[clap(short = 'k', long)]
    pub api_key: Option<String>,

    /// Optional YAML config file with non-secret defaults
    #[clap(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct InputArgs {
    /// Directory of supported files
    #[clap(short, long)]
    pub dir: Option<PathBuf>,

    /// Path to an existing JSONL bundle, uploaded as-is
    #[clap(short, long)]
    pub file: Option<PathBuf>,
}

impl InputArgs {
    pub fn mode(&self) -> Option<InputMode> {
        match (&self.dir, &self.file) {
            (Some(dir), None) => Some(InputMode::Directory(dir.clone())),
            (None, Some(file)) => Some(InputMode::Bundle(file.clone())),
            _ => None,
        }
    }
}

/// Everything a run needs once arguments, config file and environment are merged.
#[derive(Debug)]
pub struct Resolved {
    pub sync: SyncConfig,
    pub client: ClientConfig,
}

/// Merge flags, the optional config file and the environment, then check the
/// input path. Nothing remote is touched here.
pub fn resolve(cli: &Cli) -> Result<Resolved> {
    let file = match &cli.config {
        Some(path) => load_config(path)?,
        None => FileConfig::default(),
    };

    let client = ClientConfig::resolve(cli.api_key.clone(), file.base_url.clone())?;

    let input = cli
        .input
        .mode()
        .context("exactly one of --dir or --file is required")?;
    let purpose = cli
        .purpose
        .clone()
        .or(file.purpose)
        .unwrap_or_else(|| DEFAULT_PURPOSE.to_owned());
    let sync = SyncConfig::new(purpose, input);
    validate_input(&sync.input)?;

    tracing::info!(purpose = %sync.purpose, "Arguments resolved");
    Ok(Resolved { sync, client })
}

/// Async CLI entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let resolved = resolve(&cli)?;
    let client = OpenAiFiles::new(resolved.client)
        .map_err(|e| anyhow::anyhow!("Failed to construct Files API client: {e}"))?;
    execute(&resolved.sync, &client).await.map(|_| ())
}

/// Run the pipeline against `store` and print the operator report.
pub async fn execute<S>(config: &SyncConfig, store: &S) -> Result<SyncReport>
where
    S: FileStore + ?Sized,
{
    tracing::info!(command = "sync", "Starting synchronisation");
    match synchronise(config, store).await {
        Ok(report) => {
            print!("{}", format_report(&report));
            tracing::info!(command = "sync", uploads = report.uploads.len(), "Synchronisation complete");
            Ok(report)
        }
        Err(e) => {
            if let SyncError::Upload { completed, purge, .. } = &e {
                print!("{}", format_failed_run(&config.purpose, purge, completed));
            }
            tracing::error!(command = "sync", error = %e, "Synchronisation failed");
            Err(anyhow::Error::new(e).context("Synchronisation failed"))
        }
    }
}

/// One line per upload; a missing id is flagged as a warning.
pub fn format_uploads(uploads: &[UploadedFile]) -> String {
    let mut out = String::new();
    for upload in uploads {
        match &upload.id {
            Some(id) => {
                let _ = writeln!(out, "Uploaded {} → File ID: {}", upload.path.display(), id);
            }
            None => {
                let _ = writeln!(
                    out,
                    "Warning: no file ID returned for {}",
                    upload.path.display()
                );
            }
        }
    }
    out
}

/// Purge summary plus one warning per file left behind.
pub fn format_purge(purpose: &str, purge: &PurgeReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Deleted {} remote file(s) with purpose '{}'",
        purge.deleted.len(),
        purpose
    );
    for failure in &purge.failed {
        let _ = writeln!(
            out,
            "Warning: could not delete {}: {}",
            failure.id.as_deref().unwrap_or("<no id>"),
            failure.error
        );
    }
    out
}

pub fn format_report(report: &SyncReport) -> String {
    let mut out = format_purge(&report.purpose, &report.purge);
    out.push_str(&format_uploads(&report.uploads));
    let _ = writeln!(out, "Synchronise complete: {} file(s) uploaded.", report.uploads.len());
    out
}

/// What is on the remote store after an upload failure: the purge outcome and
/// the uploads that went through before it.
pub fn format_failed_run(purpose: &str, purge: &PurgeReport, completed: &[UploadedFile]) -> String {
    let mut out = format_purge(purpose, purge);
    out.push_str(&format_uploads(completed));
    out
}
