//! Configuration management for promtable.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - Builder overrides from the CLI
//! - Validation and defaults

use crate::core::{MetricsError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Longest readable key a slot may retain.
const MAX_ORIGINAL_KEY_LENGTH: usize = 4096;

/// Complete configuration for promtable
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shared table sizing
    pub storage: StorageConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Construction-time sizing of the four shared tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Maximum distinct metric names per metric type
    pub table_size: usize,
    /// Maximum serialized bytes of one metric record
    pub value_size: usize,
    /// Maximum stored length of the readable key kept per slot
    pub original_key_length: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Include targets and thread ids in log lines
    pub structured: bool,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Everything, including per-update lines
    Trace,
    /// Record creation and deletion
    Debug,
    /// Lifecycle events
    Info,
    /// Rejected writes and skipped records
    Warn,
    /// Errors only
    Error,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            table_size: 1024,
            value_size: 1024,
            original_key_length: 256,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            structured: false,
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.storage.validate()
    }
}

impl StorageConfig {
    /// Validate table sizing
    pub fn validate(&self) -> Result<()> {
        if self.table_size == 0 {
            return Err(MetricsError::config("table_size must be greater than 0"));
        }

        if self.value_size == 0 {
            return Err(MetricsError::config("value_size must be greater than 0"));
        }

        if self.original_key_length == 0 || self.original_key_length > MAX_ORIGINAL_KEY_LENGTH {
            return Err(MetricsError::config(format!(
                "original_key_length must be between 1 and {}, got {}",
                MAX_ORIGINAL_KEY_LENGTH, self.original_key_length
            )));
        }

        Ok(())
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| MetricsError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Load configuration from a YAML file
    pub fn from_file(self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        tracing::info!("Loaded configuration from: {:?}", path);
        self.from_yaml(&content)
    }

    /// Set max distinct metric names per type
    pub fn table_size(mut self, slots: usize) -> Self {
        self.config.storage.table_size = slots;
        self
    }

    /// Set max serialized bytes per record
    pub fn value_size(mut self, bytes: usize) -> Self {
        self.config.storage.value_size = bytes;
        self
    }

    /// Set max stored readable key length
    pub fn original_key_length(mut self, len: usize) -> Self {
        self.config.storage.original_key_length = len;
        self
    }

    /// Set log level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
