use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CardError, Result};
use crate::schema::{REQUIRED_COLUMNS, SKIPPED_SHEETS};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const CONFIG_PATH_ENV: &str = "CARD_ALBUM_CONFIG";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ingest: IngestConfig,
    pub storage: StorageConfig,
    pub export: ExportConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Sheet names that never contain card rows
    pub skip_sheets: Vec<String>,
    /// Columns every ingested batch must end up with
    pub required_columns: Vec<String>,
    /// Rows of each intermediate table written to the debug log
    pub preview_rows: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            skip_sheets: SKIPPED_SHEETS.iter().map(|s| s.to_string()).collect(),
            required_columns: REQUIRED_COLUMNS.iter().map(|s| s.to_string()).collect(),
            preview_rows: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("cards.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Listing template whose first sheet header defines the output columns
    pub template_path: Option<PathBuf>,
    pub output_path: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            template_path: None,
            output_path: PathBuf::from("exported_collection.xlsx"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub debug: bool,
    pub log_dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            debug: false,
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl AppConfig {
    /// Load from `CARD_ALBUM_CONFIG` or `config.toml`; a missing file yields defaults.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        if !config_path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            CardError::Config(format!(
                "Failed to read config file '{}': {}",
                config_path.display(),
                e
            ))
        })?;
        Self::from_toml(&config_content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        if config.ingest.required_columns.is_empty() {
            return Err(CardError::Config(
                "ingest.required_columns must not be empty".to_string(),
            ));
        }
        Ok(config)
    }
}
