//! # Recorder Configuration
//!
//! YAML configuration for the SigMF sink: where the metadata goes, what the
//! global record says, which tag keys are recognised and how logging is set up.
//!
//! ## Configuration Search Path
//!
//! Configuration is loaded from the first file found:
//! 1. Path specified via `R4W_SIGMF_CONFIG` environment variable
//! 2. `./r4w-sigmf.yaml` (current directory)
//! 3. `~/.config/r4w-sigmf/config.yaml` (user config)
//! 4. `/etc/r4w-sigmf/config.yaml` (system config)
//!
//! ## Example Configuration
//!
//! ```yaml
//! metadata:
//!   path: "capture.sigmf-meta"
//!   dataset_path: "capture.sigmf-data"
//!   mode: full
//!   datatype: "cf32_le"
//!   sample_rate: 2.4e6
//!   hw: "USRP B210"
//!
//! tags:
//!   frequency: "rx_freq"
//!
//! sink:
//!   max_items_per_work: 1024
//!   stamp_capture_datetime: true
//! ```

use r4w_sigmf::{Global, Mode, SIGMF_VERSION};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::logging::LogConfig;
use crate::stream_tags::{ANNOTATION, ANNOTATION_END, ANNOTATION_START, RX_FREQ};

/// Environment variable naming a configuration file.
pub const CONFIG_ENV: &str = "R4W_SIGMF_CONFIG";

/// Metadata file and global record settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Metadata (`.sigmf-meta`) file
    pub path: PathBuf,
    /// Dataset (`.sigmf-data`) file; samples are not recorded when unset
    pub dataset_path: Option<PathBuf>,
    /// Sections the metadata file may contain
    pub mode: Mode,
    pub datatype: String,
    pub version: String,
    pub sample_rate: Option<f64>,
    pub offset: Option<u64>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub license: Option<String>,
    pub hw: Option<String>,
    pub sha512: Option<String>,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("recording.sigmf-meta"),
            dataset_path: None,
            mode: Mode::Full,
            datatype: "cf32_le".to_string(),
            version: SIGMF_VERSION.to_string(),
            sample_rate: None,
            offset: None,
            description: None,
            author: None,
            license: None,
            hw: None,
            sha512: None,
        }
    }
}

/// Stream tag keys the sink reacts to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagKeys {
    /// Frequency change → capture
    pub frequency: String,
    pub annotation_start: String,
    pub annotation_end: String,
    /// Pre-aggregated capture or annotation
    pub annotation: String,
}

impl Default for TagKeys {
    fn default() -> Self {
        Self {
            frequency: RX_FREQ.to_string(),
            annotation_start: ANNOTATION_START.to_string(),
            annotation_end: ANNOTATION_END.to_string(),
            annotation: ANNOTATION.to_string(),
        }
    }
}

/// Sink behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkSettings {
    /// Upper bound on items consumed per `work` call
    pub max_items_per_work: usize,
    /// Stamp captures created from frequency tags with the wall-clock time
    pub stamp_capture_datetime: bool,
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            max_items_per_work: 1024,
            stamp_capture_datetime: false,
        }
    }
}

/// Complete recorder configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub metadata: MetadataConfig,
    pub tags: TagKeys,
    pub sink: SinkSettings,
    pub logging: LogConfig,
}

impl RecorderConfig {
    /// Load configuration from the default search path.
    ///
    /// Returns the default configuration if no file is found.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if Path::new(&path).exists() {
                return Self::load_from(Path::new(&path));
            }
        }

        for path in &Self::config_search_paths() {
            if path.exists() {
                return Self::load_from(path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            serde_yaml::to_string(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        std::fs::write(path, content)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))
    }

    /// Configuration search paths, in priority order.
    pub fn config_search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./r4w-sigmf.yaml")];

        if let Some(dirs) = directories::ProjectDirs::from("", "", "r4w-sigmf") {
            paths.push(dirs.config_dir().join("config.yaml"));
        }

        paths.push(PathBuf::from("/etc/r4w-sigmf/config.yaml"));
        paths
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.metadata.path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError("metadata.path must be set".to_string()));
        }
        if self.metadata.datatype.is_empty() {
            return Err(ConfigError::ValidationError("metadata.datatype must be set".to_string()));
        }
        if self.metadata.version.is_empty() {
            return Err(ConfigError::ValidationError("metadata.version must be set".to_string()));
        }
        if self.sink.max_items_per_work == 0 {
            return Err(ConfigError::ValidationError(
                "sink.max_items_per_work must be > 0".to_string(),
            ));
        }

        let keys = [
            &self.tags.frequency,
            &self.tags.annotation_start,
            &self.tags.annotation_end,
            &self.tags.annotation,
        ];
        let distinct: HashSet<&String> = keys.iter().copied().collect();
        if distinct.len() != keys.len() {
            return Err(ConfigError::ValidationError("tag keys must be distinct".to_string()));
        }

        Ok(())
    }

    /// The global record described by the metadata section.
    pub fn global(&self) -> Global {
        let m = &self.metadata;
        let mut global = Global::new(&m.datatype, &m.version);
        global.sample_rate = m.sample_rate;
        global.offset = m.offset;
        global.description = m.description.clone();
        global.author = m.author.clone();
        global.license = m.license.clone();
        global.hw = m.hw.clone();
        global.sha512 = m.sha512.clone();
        global
    }

    /// Generate example configuration YAML.
    pub fn example_yaml() -> String {
        let config = Self {
            metadata: MetadataConfig {
                path: PathBuf::from("capture.sigmf-meta"),
                dataset_path: Some(PathBuf::from("capture.sigmf-data")),
                sample_rate: Some(2_400_000.0),
                hw: Some("USRP B210".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        serde_yaml::to_string(&config).unwrap_or_default()
    }
}
