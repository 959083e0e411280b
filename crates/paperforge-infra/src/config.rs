//! Pipeline configuration loader for Paperforge.
//!
//! Reads a TOML file (`~/.paperforge/config.toml` by default) and
//! deserializes it into [`PipelineConfig`]. Falls back to defaults when the
//! file is missing or malformed. API keys never live in the file; they are
//! read from the environment variables the config names.

use std::path::{Path, PathBuf};

use paperforge_types::config::PipelineConfig;
use secrecy::SecretString;

/// Directory under the home directory holding Paperforge's files.
const DATA_DIR_NAME: &str = ".paperforge";

/// Default config path: `~/.paperforge/config.toml`.
///
/// Returns `None` when the home directory cannot be determined.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(DATA_DIR_NAME).join("config.toml"))
}

/// Load the pipeline configuration from `path`.
///
/// - If the file does not exist, returns [`PipelineConfig::default()`].
/// - If the file exists but fails to read or parse, logs a warning and returns the default.
/// - Otherwise returns the parsed config; omitted fields take their defaults.
pub async fn load_pipeline_config(path: &Path) -> PipelineConfig {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config found at {}, using defaults", path.display());
            return PipelineConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return PipelineConfig::default();
        }
    };

    match toml::from_str::<PipelineConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            PipelineConfig::default()
        }
    }
}

/// Read a secret from environment variable `var`.
///
/// Unset and blank variables both resolve to `None`.
pub fn resolve_secret(var: &str) -> Option<SecretString> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Some(SecretString::from(value)),
        _ => None,
    }
}
