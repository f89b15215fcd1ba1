//! Startup configuration

use assetbook_core::AssetbookError;
use assetbook_depreciation::RunPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "ASSETBOOK_CONFIG";
pub const DATA_PATH_ENV: &str = "ASSETBOOK_DATA_PATH";
pub const USE_ACQUISITION_MONTH_ENV: &str = "ASSETBOOK_USE_ACQUISITION_MONTH";

const DEFAULT_DATA_PATH: &str = "/app/assetbook/register.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct Settings {
    /// Register JSON file
    pub data_path: PathBuf,
    pub use_acquisition_month: bool,
    /// Used when `RUST_LOG` is not set
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            use_acquisition_month: false,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Read settings from a local JSON file; missing keys take defaults
    pub fn read_config_file(path: impl AsRef<Path>) -> Result<Self, AssetbookError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            AssetbookError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            AssetbookError::config(format!("{} is not a valid settings file: {}", path.display(), e))
                .with_suggestion("Expected keys: dataPath, useAcquisitionMonth, logLevel")
        })
    }

    /// Settings from the process environment
    pub fn from_env() -> Result<Self, AssetbookError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Settings from any key lookup. The config file is read first, then
    /// the individual variables override it.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AssetbookError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = match lookup(CONFIG_ENV).filter(|v| !v.trim().is_empty()) {
            Some(path) => Self::read_config_file(path.trim())?,
            None => Self::default(),
        };

        if let Some(path) = lookup(DATA_PATH_ENV) {
            let path = path.trim();
            if path.is_empty() {
                return Err(AssetbookError::config(format!("{} is empty", DATA_PATH_ENV))
                    .in_field(DATA_PATH_ENV));
            }
            settings.data_path = PathBuf::from(path);
        }

        if let Some(flag) = lookup(USE_ACQUISITION_MONTH_ENV) {
            settings.use_acquisition_month = parse_flag(USE_ACQUISITION_MONTH_ENV, &flag)?;
        }

        Ok(settings)
    }

    pub fn policy(&self) -> RunPolicy {
        RunPolicy::new().with_acquisition_month(self.use_acquisition_month)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, AssetbookError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(AssetbookError::config(format!("{} must be a boolean, got '{}'", key, other))
            .in_field(key)
            .with_suggestion("Use true or false")),
    }
}
