//! Configuration Module - User preferences from ~/.dwf-drill/config.toml
//!
//! Supports:
//! - Default log level
//! - Output directory for extracted streams
//! - Inference endpoint, model and credentials
//! - Default visual analysis focus

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::analysis::FocusArea;

/// DWF Drill Configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// Stream extraction settings
    pub extract: ExtractConfig,
    /// Inference client settings
    pub inference: InferenceConfig,
    /// Visual analysis settings
    pub analysis: AnalysisConfig,
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

/// Stream extraction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Directory extracted streams are written to when none is given
    pub output_dir: PathBuf,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("extracted_images"),
        }
    }
}

/// Multimodal inference endpoint (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Chat completions URL
    pub endpoint: String,
    /// Model identifier sent with each request
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Name of the environment variable holding the bearer token
    pub api_key_env: String,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:1234/v1/chat/completions".to_string(),
            model: "llava".to_string(),
            max_tokens: 2000,
            temperature: 0.3,
            timeout_secs: 120,
            api_key_env: "DWF_DRILL_API_KEY".to_string(),
        }
    }
}

impl InferenceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Bearer token from the configured environment variable, if set
    pub fn api_key(&self) -> Option<String> {
        if self.api_key_env.is_empty() {
            return None;
        }
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    pub fn is_configured(&self) -> bool {
        !self.endpoint.trim().is_empty() && !self.model.trim().is_empty()
    }
}

/// Visual analysis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Default focus area
    pub focus: FocusArea,
    /// Attach container metadata to analysis output
    pub include_metadata: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            focus: FocusArea::General,
            include_metadata: true,
        }
    }
}

impl Config {
    /// Defaults when nothing is at `path`, unless the file is required
    pub fn load_or_default(path: &Path, required: bool) -> Result<Self> {
        if required || path.exists() {
            Self::load_from(path)
        } else {
            Ok(Self::default())
        }
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
        directories::ProjectDirs::from("com", "dwf-drill", "dwf-drill")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".dwf-drill")
                    .join("config.toml")
            })
    }

    /// Write the commented sample config unless a file is already there
    pub fn init_at(path: &Path, force: bool) -> Result<bool> {
        if path.exists() && !force {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, generate_sample_config())
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        tracing::info!("Created sample config at {}", path.display());
        Ok(true)
    }
}

/// Generate a sample config file with comments
pub fn generate_sample_config() -> String {
    r#"# DWF Drill Configuration
# Location: ~/.dwf-drill/config.toml (or the platform config directory)

[general]
# Log level: trace, debug, info, warn, error
log_level = "info"

[extract]
# Where `dwf-drill extract --save` writes streams when no directory is given
output_dir = "extracted_images"

[inference]
# OpenAI-compatible chat completions endpoint with image input
endpoint = "http://localhost:1234/v1/chat/completions"
model = "llava"
max_tokens = 2000
temperature = 0.3
timeout_secs = 120

# Environment variable holding the bearer token (unset = no auth header)
api_key_env = "DWF_DRILL_API_KEY"

[analysis]
# Focus: general, structural, dimensions, connectivity, annotations
focus = "general"

# Attach container metadata to visual analysis output
include_metadata = true
"#
    .to_string()
}
