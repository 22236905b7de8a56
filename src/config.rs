//! Configuration for a dataload run.
//!
//! Everything has a default, so a run can be driven from CLI flags alone;
//! a YAML or JSON file can override any section.

use crate::analytics::AnalyticsConfig;
use crate::error::ConfigError;
use crate::pipeline::Mode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub input: InputConfig,

    #[serde(default)]
    pub mode: ModeConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub processing: ProcessingConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

/// Which files to ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Directory holding the CSV files
    #[serde(default)]
    pub folder: PathBuf,

    /// File extension to match, without the dot
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::new(),
            extension: default_extension(),
        }
    }
}

impl InputConfig {
    /// List matching files in the folder, sorted by path.
    pub fn discover_files(&self) -> Result<Vec<PathBuf>, ConfigError> {
        if !self.folder.is_dir() {
            return Err(ConfigError::BadDirectory(self.folder.clone()));
        }

        let entries = std::fs::read_dir(&self.folder).map_err(|source| ConfigError::Io {
            path: self.folder.clone(),
            source,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ConfigError::Io {
                path: self.folder.clone(),
                source,
            })?;
            let path = entry.path();
            let matches = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == self.extension);
            if matches && path.is_file() {
                files.push(path);
            }
        }

        if files.is_empty() {
            return Err(ConfigError::NoMatchingFiles {
                folder: self.folder.clone(),
                extension: self.extension.clone(),
            });
        }

        files.sort();
        Ok(files)
    }
}

/// Concurrency strategy flags. Setting both is a configuration error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModeConfig {
    /// Read files concurrently on the least-loaded core
    #[serde(default)]
    pub unique_process: bool,

    /// Read files in parallel worker processes across all cores
    #[serde(default)]
    pub multi_process: bool,
}

/// Chunked ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Records per line-range chunk in multi-process mode
    #[serde(default = "default_rows_per_chunk")]
    pub rows_per_chunk: usize,

    /// Maximum chunk workers in flight per file (null = one per chunk)
    #[serde(default)]
    pub chunk_concurrency: Option<usize>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            rows_per_chunk: default_rows_per_chunk(),
            chunk_concurrency: None,
        }
    }
}

/// Runtime and worker sizing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Maximum worker processes alive at once (null = number of cores)
    #[serde(default)]
    pub max_processes: Option<usize>,

    /// Number of Tokio worker threads (null = number of cores)
    #[serde(default)]
    pub worker_threads: Option<usize>,

    /// Rayon thread pool size for analytics sorting
    #[serde(default)]
    pub rayon_threads: Option<usize>,
}

/// Report destinations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory that receives the summary CSV
    #[serde(default = "default_summary_dir")]
    pub summary_dir: PathBuf,

    /// Print the ranking tables after ingestion
    #[serde(default = "default_true")]
    pub enable_analytics: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            summary_dir: default_summary_dir(),
            enable_analytics: true,
        }
    }
}

impl Config {
    /// Load configuration from a YAML or JSON file, chosen by extension.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match ext {
            "json" => Self::from_json(&contents),
            _ => Self::from_yaml(&contents),
        }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Selected concurrency strategy.
    pub fn mode(&self) -> Result<Mode, ConfigError> {
        match (self.mode.unique_process, self.mode.multi_process) {
            (true, true) => Err(ConfigError::ConflictingModes),
            (true, false) => Ok(Mode::SingleCoreConcurrent),
            (false, true) => Ok(Mode::MultiCoreConcurrent),
            (false, false) => Ok(Mode::Sequential),
        }
    }

    /// Validate the configuration. Does not touch the input folder.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mode()?;

        if self.ingest.rows_per_chunk == 0 {
            return Err(ConfigError::InvalidRowsPerChunk);
        }
        for (name, value) in [
            ("chunk_concurrency", self.ingest.chunk_concurrency),
            ("max_processes", self.processing.max_processes),
            ("worker_threads", self.processing.worker_threads),
            ("rayon_threads", self.processing.rayon_threads),
        ] {
            if value == Some(0) {
                return Err(ConfigError::MustBePositive(name));
            }
        }
        if self.analytics.top_n == 0 {
            return Err(ConfigError::MustBePositive("analytics.top_n"));
        }
        Ok(())
    }
}

fn default_extension() -> String { "csv".to_string() }
fn default_rows_per_chunk() -> usize { 20_000 }
fn default_summary_dir() -> PathBuf { PathBuf::from(".") }
fn default_true() -> bool { true }

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.ingest.rows_per_chunk, 20_000);
        assert_eq!(config.input.extension, "csv");
        assert!(config.output.enable_analytics);
        assert_eq!(config.mode().unwrap(), Mode::Sequential);
    }

    #[test]
    fn test_mode_selection() {
        let mut config = Config::default();
        config.mode.unique_process = true;
        assert_eq!(config.mode().unwrap(), Mode::SingleCoreConcurrent);

        config.mode.unique_process = false;
        config.mode.multi_process = true;
        assert_eq!(config.mode().unwrap(), Mode::MultiCoreConcurrent);
    }

    #[test]
    fn test_conflicting_modes_rejected() {
        let mut config = Config::default();
        config.mode.unique_process = true;
        config.mode.multi_process = true;
        assert!(matches!(config.validate(), Err(ConfigError::ConflictingModes)));
    }

    #[test]
    fn test_zero_rows_per_chunk_rejected() {
        let mut config = Config::default();
        config.ingest.rows_per_chunk = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRowsPerChunk)));
    }

    #[test]
    fn test_zero_max_processes_rejected() {
        let mut config = Config::default();
        config.processing.max_processes = Some(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MustBePositive("max_processes"))
        ));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = Config::from_yaml(
            "input:\n  folder: /data/videos\ningest:\n  rows_per_chunk: 500\n",
        )
        .unwrap();
        assert_eq!(config.input.folder, PathBuf::from("/data/videos"));
        assert_eq!(config.input.extension, "csv");
        assert_eq!(config.ingest.rows_per_chunk, 500);
        assert!(config.ingest.chunk_concurrency.is_none());
    }

    #[test]
    fn test_json_config() {
        let config = Config::from_json(r#"{"mode": {"multi_process": true}}"#).unwrap();
        assert_eq!(config.mode().unwrap(), Mode::MultiCoreConcurrent);
    }

    #[test]
    fn test_discover_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        for name in ["US.csv", "CA.csv", "notes.txt", "DE.CSV.bak"] {
            std::fs::write(dir.path().join(name), "a\n").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.csv")).unwrap();

        let input = InputConfig {
            folder: dir.path().to_path_buf(),
            ..Default::default()
        };
        let files = input.discover_files().unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["CA.csv", "US.csv"]);
    }

    #[test]
    fn test_discover_bad_directory() {
        let input = InputConfig {
            folder: PathBuf::from("/nonexistent/folder"),
            ..Default::default()
        };
        assert!(matches!(input.discover_files(), Err(ConfigError::BadDirectory(_))));
    }

    #[test]
    fn test_discover_no_matching_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("readme.md"), "x").unwrap();

        let input = InputConfig {
            folder: dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(matches!(
            input.discover_files(),
            Err(ConfigError::NoMatchingFiles { .. })
        ));
    }
}
