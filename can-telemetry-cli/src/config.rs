//! Configuration loading and parsing

use anyhow::{Context, Result};
use can_telemetry::DEFAULT_RAW_CAPACITY;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub schema: SchemaConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchemaConfig {
    #[serde(default = "default_map_path")]
    pub path: PathBuf,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            path: default_map_path(),
        }
    }
}

fn default_map_path() -> PathBuf {
    PathBuf::from("canmap.csv")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// candump log path, or "-" for stdin
    #[serde(default = "default_input")]
    pub input: String,
    pub max_frames: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            input: default_input(),
            max_frames: None,
        }
    }
}

fn default_input() -> String {
    "-".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_raw_capacity")]
    pub raw_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            raw_capacity: default_raw_capacity(),
        }
    }
}

fn default_raw_capacity() -> usize {
    DEFAULT_RAW_CAPACITY
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    /// Write the final snapshot here instead of stdout
    pub path: Option<PathBuf>,
    /// How often the running store is polled, in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Render raw frames newest first
    #[serde(default = "default_true")]
    pub raw_latest_first: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            path: None,
            poll_interval_ms: default_poll_interval(),
            raw_latest_first: true,
        }
    }
}

fn default_poll_interval() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Txt,
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    config
        .validate()
        .with_context(|| format!("Invalid config file: {:?}", path))?;

    Ok(config)
}

impl AppConfig {
    /// Reject settings that would silently disable part of the output
    pub fn validate(&self) -> Result<()> {
        if self.output.poll_interval_ms == 0 {
            anyhow::bail!("output.poll_interval_ms must be greater than zero");
        }
        // Without raw history, unmapped traffic looks the same as no traffic
        if self.store.raw_capacity == 0 {
            anyhow::bail!("store.raw_capacity must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_deserialization() {
        let toml_content = r#"
            [schema]
            path = "maps/vehicle.csv"

            [source]
            input = "trace.log"
            max_frames = 1000

            [store]
            raw_capacity = 50

            [output]
            format = "txt"
            raw_latest_first = false
        "#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.schema.path, PathBuf::from("maps/vehicle.csv"));
        assert_eq!(config.source.input, "trace.log");
        assert_eq!(config.source.max_frames, Some(1000));
        assert_eq!(config.store.raw_capacity, 50);
        assert_eq!(config.output.format, OutputFormat::Txt);
        assert_eq!(config.output.poll_interval_ms, 500);
        assert!(!config.output.raw_latest_first);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.schema.path, PathBuf::from("canmap.csv"));
        assert_eq!(config.source.input, "-");
        assert_eq!(config.store.raw_capacity, DEFAULT_RAW_CAPACITY);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.output.raw_latest_first);
    }

    #[test]
    fn test_load_config_rejects_zero_poll_interval() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[output]\npoll_interval_ms = 0").unwrap();
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_load_config_rejects_zero_raw_capacity() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[store]\nraw_capacity = 0").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("raw_capacity"));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }
}
