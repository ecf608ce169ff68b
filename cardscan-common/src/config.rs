//! Configuration loading for cardscan services
//!
//! Resolution priority: environment variables override the TOML config file,
//! which overrides compiled defaults. The TOML file lives at
//! `~/.config/cardscan/cardscan.toml` (platform config dir).

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Admission-control limits for the ingest pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Max simultaneously served batches (one per user)
    pub max_concurrent_batches: usize,
    /// Max files accepted in a single batch
    pub max_files_per_batch: usize,
    /// Max files in extraction across all batches
    pub max_total_concurrent_files: usize,
    /// Fan-out window within one batch
    pub max_concurrent_files_per_batch: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_concurrent_batches: 10,
            max_files_per_batch: 300,
            max_total_concurrent_files: 20,
            max_concurrent_files_per_batch: 3,
        }
    }
}

/// Vision-extraction API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// API key; `CARDSCAN_VISION_API_KEY` overrides
    pub api_key: Option<String>,
    /// Model identifier sent to the API
    pub model: String,
    /// Base URL of the generateContent-style endpoint
    pub endpoint: String,
    /// Client-side request rate cap (requests per second)
    pub requests_per_second: u32,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.0-flash".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            requests_per_second: 1,
        }
    }
}

/// Service configuration loaded from TOML + environment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub limits: Limits,
    pub vision: VisionConfig,
    /// Root directory for uploaded files; defaults to the platform data dir
    pub storage_path: Option<PathBuf>,
    /// Listen address, e.g. "127.0.0.1:5820"
    pub listen: Option<String>,
}

impl TomlConfig {
    /// Load from the default config path, falling back to defaults when the
    /// file does not exist, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = default_config_path();
        let mut config = match path {
            Some(ref p) if p.exists() => Self::load_from(p)?,
            _ => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from an explicit TOML file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read config failed ({}): {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse config failed ({}): {}", path.display(), e)))
    }

    /// Environment variables take priority over file values
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("CARDSCAN_VISION_API_KEY") {
            if !key.trim().is_empty() {
                self.vision.api_key = Some(key);
            }
        }
        if let Ok(listen) = std::env::var("CARDSCAN_LISTEN") {
            self.listen = Some(listen);
        }
        if let Ok(path) = std::env::var("CARDSCAN_STORAGE_PATH") {
            self.storage_path = Some(PathBuf::from(path));
        }
    }

    /// Storage root, resolved to the platform data dir when unset
    pub fn storage_root(&self) -> PathBuf {
        self.storage_path
            .clone()
            .unwrap_or_else(default_storage_root)
    }

    /// Listen address with compiled default
    pub fn listen_addr(&self) -> String {
        self.listen
            .clone()
            .unwrap_or_else(|| "127.0.0.1:5820".to_string())
    }
}

/// Default configuration file path for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cardscan").join("cardscan.toml"))
}

fn default_storage_root() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("cardscan").join("uploads"))
        .unwrap_or_else(|| PathBuf::from("./cardscan_uploads"))
}

/// Write configuration back to a TOML file, creating parent directories
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::Config(format!("Create config dir failed: {}", e)))?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize config failed: {}", e)))?;
    std::fs::write(path, content)
        .map_err(|e| Error::Config(format!("Write config failed: {}", e)))?;
    Ok(())
}
