/// `load_config` module: Loads the optional static YAML config file.
///
/// The file only carries non-secret defaults; the API key is never read from
/// it. Values given on the command line win over the file, and the file wins
/// over the environment.
///
/// ```yaml
/// purpose: user_data
/// base_url: https://api.openai.com/v1
/// ```
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary. Unknown
/// keys are rejected so that typos do not silently fall back to defaults.
use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{error, info};

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Purpose tag to purge and upload with.
    #[serde(default)]
    pub purpose: Option<String>,
    /// Root of the Files API, e.g. `https://api.openai.com/v1`.
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Reads and parses the YAML config file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<FileConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let conf: FileConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    Ok(conf)
}
