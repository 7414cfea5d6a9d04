//! Configuration file support for Liftlog.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/liftlog/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub completion: CompletionConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Sign-in configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_app_id")]
    pub app_id: String,

    /// Sign in with this token instead of anonymously
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            app_id: default_app_id(),
            token: None,
        }
    }
}

/// Generative-language endpoint configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: default_endpoint(),
            model: default_model(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Workout session parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Rest length used when no suggestion exists for an exercise
    #[serde(default = "default_rest_seconds")]
    pub default_rest_seconds: u32,

    /// Seconds added by the timer's "+" control
    #[serde(default = "default_rest_increment_seconds")]
    pub rest_increment_seconds: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_rest_seconds: default_rest_seconds(),
            rest_increment_seconds: default_rest_increment_seconds(),
        }
    }
}

// Default value functions
fn home_dir_or_cwd() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_data_dir() -> PathBuf {
    let base =
        dirs::data_local_dir().unwrap_or_else(|| home_dir_or_cwd().join(".local/share"));
    base.join("liftlog")
}

fn default_app_id() -> String {
    "default-app-id".into()
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}

fn default_model() -> String {
    "gemini-2.5-flash-preview-09-2025".into()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_rest_seconds() -> u32 {
    crate::session::DEFAULT_REST_SECONDS
}

fn default_rest_increment_seconds() -> u32 {
    30
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        Self::load_or_default(&Self::default_config_path())
    }

    /// Load configuration from `path`, falling back to defaults when it is missing
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from(path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| home_dir_or_cwd().join(".config"));
        base.join("liftlog").join("config.toml")
    }

    /// Reject values that would leave the application unusable
    pub fn validate(&self) -> Result<()> {
        if self.identity.app_id.trim().is_empty() {
            return Err(Error::Config("identity.app_id must not be empty".into()));
        }
        if self.completion.max_attempts == 0 {
            return Err(Error::Config("completion.max_attempts must be at least 1".into()));
        }
        Ok(())
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
