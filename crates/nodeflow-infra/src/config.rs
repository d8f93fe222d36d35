//! Configuration loading and data directory resolution.
//!
//! Reads `config.toml` from the data directory (`~/.nodeflow/` by default)
//! into [`GlobalConfig`]. A missing or malformed file yields the defaults.

use std::path::{Path, PathBuf};

use nodeflow_types::config::GlobalConfig;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "NODEFLOW_DATA_DIR";

/// Resolve the data directory.
///
/// Priority:
/// 1. `NODEFLOW_DATA_DIR` environment variable
/// 2. `~/.nodeflow`
/// 3. `./.nodeflow`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".nodeflow");
    }

    PathBuf::from(".nodeflow")
}

/// Load global configuration from `{data_dir}/config.toml`.
pub async fn load_global_config(data_dir: &Path) -> GlobalConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
    };

    match toml::from_str::<GlobalConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            GlobalConfig::default()
        }
    }
}
