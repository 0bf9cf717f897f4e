//! Configuration module

use crate::backend::DEFAULT_CHUNK_SIZE;
use crate::{Error, Result};
use dirs::config_dir;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Streaming settings
    #[serde(default)]
    pub io: IoConfig,
    /// Symlink metadata keys per provider
    #[serde(default)]
    pub symlinks: SymlinkConfig,
    /// Object store adapter settings
    #[serde(default)]
    pub cloud: CloudConfig,
}

/// Streaming I/O configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoConfig {
    /// Chunk size for streaming reads in bytes
    #[serde(deserialize_with = "deserialize_size")]
    pub chunk_size: u64,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE as u64,
        }
    }
}

/// Metadata key that marks an empty object as a symlink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymlinkConfig {
    pub s3: String,
    pub gs: String,
    pub azure: String,
    pub memory: String,
}

impl Default for SymlinkConfig {
    fn default() -> Self {
        Self {
            s3: "symlink-target".to_string(),
            gs: "gcsfuse_symlink_target".to_string(),
            azure: "symlink_target".to_string(),
            memory: "symlink-target".to_string(),
        }
    }
}

impl SymlinkConfig {
    /// Key for a scheme; unknown schemes use the S3 convention
    pub fn key_for(&self, scheme: &str) -> &str {
        match scheme {
            "gs" => &self.gs,
            "az" | "azure" => &self.azure,
            "memory" => &self.memory,
            _ => &self.s3,
        }
    }
}

/// Object store adapter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Number of per-bucket stores kept alive per client
    pub store_cache_size: usize,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            store_cache_size: 16,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SizeValue {
    Numeric(u64),
    String(String),
}

/// Deserialize a size from either a number or a string like "64KiB"
fn deserialize_size<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match SizeValue::deserialize(deserializer)? {
        SizeValue::Numeric(bytes) => Ok(bytes),
        SizeValue::String(text) => parse_size(&text)
            .map_err(|e| D::Error::custom(format!("Failed to parse size: {}", e))),
    }
}

/// Parse size string like "100MiB" to bytes
pub fn parse_size(size_str: &str) -> Result<u64> {
    let size_str = size_str.trim();

    if let Ok(bytes) = size_str.parse::<u64>() {
        return Ok(bytes);
    }

    let split_pos = size_str
        .chars()
        .position(|c| !c.is_ascii_digit() && c != '.')
        .unwrap_or(size_str.len());

    if split_pos == 0 {
        return Err(Error::Config(format!("Invalid size format: {}", size_str)));
    }

    let (number_part, unit_part) = size_str.split_at(split_pos);
    let number: f64 = number_part
        .parse()
        .map_err(|_| Error::Config(format!("Invalid number in size: {}", number_part)))?;

    let multiplier: u64 = match unit_part.trim().to_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" => 1_000,
        "m" | "mb" => 1_000_000,
        "g" | "gb" => 1_000_000_000,
        "ki" | "kib" => 1_024,
        "mi" | "mib" => 1_048_576,
        "gi" | "gib" => 1_073_741_824,
        _ => return Err(Error::Config(format!("Unknown size unit: {}", unit_part))),
    };

    Ok((number * multiplier as f64) as u64)
}

impl Config {
    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = config_dir()
            .ok_or_else(|| Error::Config("Unable to determine config directory".to_string()))?;

        let polypath_dir = config_dir.join("polypath");
        if !polypath_dir.exists() {
            fs::create_dir_all(&polypath_dir)?;
        }

        Ok(polypath_dir.join("config.toml"))
    }

    /// Streaming chunk size, never zero
    pub fn chunk_size(&self) -> usize {
        usize::try_from(self.io.chunk_size)
            .unwrap_or(DEFAULT_CHUNK_SIZE)
            .max(1)
    }

    /// Get default configuration content with examples
    pub fn default_config_content() -> String {
        r#"# Polypath Configuration File

[io]
# Chunk size for streaming reads; a byte count or a size such as "64KiB"
chunk_size = "64KiB"

[symlinks]
# Metadata key marking an empty object as a symlink, per provider
s3 = "symlink-target"
gs = "gcsfuse_symlink_target"
azure = "symlink_target"
memory = "symlink-target"

[cloud]
# Number of per-bucket object stores kept in each client's cache
store_cache_size = 16
"#
        .to_string()
    }

    /// Parse configuration text
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            fs::write(&path, Self::default_config_content())?;
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to an explicit file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, contents)?;
        Ok(())
    }

    /// Load configuration or use defaults if loading fails
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}
