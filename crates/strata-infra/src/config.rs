//! Configuration loader for strata.
//!
//! Reads `strata.toml` from the data directory (`~/.strata/` by default) and
//! deserializes it into [`StrataConfig`]. Falls back to defaults when the
//! file is missing or malformed, then applies environment overrides.

use std::path::{Path, PathBuf};

use strata_types::config::StrataConfig;

/// Name of the config file inside the data directory.
pub const CONFIG_FILE: &str = "strata.toml";

/// Overrides the data directory.
pub const DATA_DIR_ENV: &str = "STRATA_DATA_DIR";

/// Overrides `[rate_gate] min_interval_secs`.
pub const MIN_INTERVAL_ENV: &str = "STRATA_EXTRACTION_MIN_INTERVAL_SECS";

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `STRATA_DATA_DIR` environment variable
/// 2. `~/.strata`
/// 3. `./.strata`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".strata");
    }

    PathBuf::from(".strata")
}

/// Load configuration from `{data_dir}/strata.toml`, then apply environment
/// overrides.
///
/// - If the file does not exist, defaults are used.
/// - If the file exists but fails to read or parse, a warning is logged and
///   defaults are used.
pub async fn load_config(data_dir: &Path) -> StrataConfig {
    let mut config = load_config_file(data_dir).await;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config
}

async fn load_config_file(data_dir: &Path) -> StrataConfig {
    let config_path = data_dir.join(CONFIG_FILE);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No {CONFIG_FILE} found at {}, using defaults", config_path.display());
            return StrataConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return StrataConfig::default();
        }
    };

    match toml::from_str::<StrataConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            StrataConfig::default()
        }
    }
}

/// Apply overrides read through `lookup` (normally the process environment).
pub fn apply_env_overrides(config: &mut StrataConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(raw) = lookup(MIN_INTERVAL_ENV) {
        match raw.trim().parse::<i64>() {
            Ok(secs) => config.rate_gate.min_interval_secs = secs,
            Err(err) => tracing::warn!("Ignoring {MIN_INTERVAL_ENV}={raw:?}: {err}"),
        }
    }
}

/// SQLite file for the configured storage path, relative to `data_dir`
/// unless absolute.
pub fn database_path(data_dir: &Path, config: &StrataConfig) -> PathBuf {
    under_data_dir(data_dir, &config.storage.path)
}

/// LanceDB directory for the configured vector path, relative to `data_dir`
/// unless absolute.
pub fn vector_store_path(data_dir: &Path, config: &StrataConfig) -> PathBuf {
    under_data_dir(data_dir, &config.storage.vector_path)
}

fn under_data_dir(data_dir: &Path, configured: &str) -> PathBuf {
    let path = Path::new(configured);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        data_dir.join(path)
    }
}
