//! Format-agnostic configuration loading
//!
//! Any `serde` configuration type can be read from YAML, TOML or JSON. Files
//! are dispatched on their extension.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{IoOperation, StorageError, StorageResult};

/// Supported configuration syntaxes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.yaml` or `.yml`
    Yaml,
    /// `.toml`
    Toml,
    /// `.json`
    Json,
}

impl ConfigFormat {
    /// Format for a file extension, ignoring case
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "toml" => Some(ConfigFormat::Toml),
            "json" => Some(ConfigFormat::Json),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "YAML",
            ConfigFormat::Toml => "TOML",
            ConfigFormat::Json => "JSON",
        }
    }
}

/// Reads configuration files
pub struct ConfigLoader;

impl ConfigLoader {
    /// Read and parse `path`, choosing the format from its extension
    pub fn load_from_file<T, P>(path: P) -> StorageResult<T>
    where
        T: DeserializeOwned,
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        let format = ConfigFormat::from_extension(ext).ok_or_else(|| {
            StorageError::parse_error(
                path.to_path_buf(),
                "configuration",
                format!("unrecognised extension {:?}; use .yaml, .yml, .toml or .json", ext),
            )
        })?;

        let content = std::fs::read_to_string(path)
            .map_err(|e| StorageError::io_error(path.to_path_buf(), IoOperation::Read, e))?;
        Self::load_from_string(&content, format, path)
    }

    /// Parse `content` as `format`; `origin` is only used in error messages
    pub fn load_from_string<T, P>(content: &str, format: ConfigFormat, origin: P) -> StorageResult<T>
    where
        T: DeserializeOwned,
        P: AsRef<Path>,
    {
        let parsed = match format {
            ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            ConfigFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        };
        parsed.map_err(|message| StorageError::parse_error(origin.as_ref().to_path_buf(), format.name(), message))
    }
}
