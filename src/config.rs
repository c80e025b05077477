//! Configuration Module - User preferences from the sigsift config.toml
//!
//! Supports:
//! - Log level
//! - Default worker count, catalog file and format filters for scans
//! - Report encoding and destination

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::report::ReportFormat;

/// sigsift configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// Scan settings
    pub scan: ScanConfig,
    /// Report settings
    pub report: ReportConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Scan settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Number of parallel workers (0 = auto)
    pub workers: usize,
    /// TOML format catalog replacing the built-in table
    pub catalog: Option<PathBuf>,
    /// Only scan these formats (empty = all)
    pub formats: Vec<String>,
    /// Only scan these categories (empty = all)
    pub categories: Vec<String>,
    /// Include a blake3 digest of the image in reports
    pub hash_image: bool,
}

/// Report settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// human or json
    pub format: ReportFormat,
    /// Write reports here instead of stdout
    pub output: Option<PathBuf>,
}

impl Config {
    /// Load config from default path or return defaults
    pub fn load() -> Self {
        let path = Self::default_path();
        if !path.exists() {
            return Self::default();
        }
        Self::load_from(&path).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config");
            Self::default()
        })
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;

        Ok(config)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;

        Ok(())
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "tunclon", "sigsift")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".sigsift")
                    .join("config.toml")
            })
    }

    /// Write the commented sample config to `path` unless a file exists there
    pub fn ensure_exists(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, generate_sample_config())
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        tracing::info!("Created default config at {}", path.display());
        Ok(true)
    }
}

/// Generate a sample config file with comments
pub fn generate_sample_config() -> String {
    r#"# sigsift configuration
# Location: ~/.config/sigsift/config.toml (or %APPDATA%\tunclon\sigsift\config\config.toml on Windows)

[general]
# Log level: trace, debug, info, warn, error
log_level = "info"

[scan]
# Number of parallel workers (0 = auto-detect CPU count)
workers = 0

# Format catalog to use instead of the built-in table
# (dump the built-in one with `sigsift formats --toml`)
# catalog = "/home/user/formats.toml"

# Only scan these formats (empty = all)
# Example: ["zip", "pdf", "jpg"]
formats = []

# Only scan these categories: documents, archives, images, media (empty = all)
categories = []

# Include a blake3 digest of the image in reports
hash_image = false

[report]
# Report encoding: "human" or "json"
format = "human"

# Write reports to a file instead of stdout
# output = "/home/user/scan-report.json"
"#
    .to_string()
}
