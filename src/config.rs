use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Config file looked up in the working directory.
pub const CONFIG_FILE: &str = "taskurai.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the board's stored values live.
    pub data_dir: PathBuf,
    pub export_dir: PathBuf,
    /// `error`, `warn`, `info`, `debug` or `trace`.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .map(|d| d.join("taskurai"))
                .unwrap_or_else(|| PathBuf::from(".taskurai")),
            export_dir: PathBuf::from("."),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl Config {
    /// Loads `path`, or the defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn log_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }

    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join("taskurai.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = Config::load(Path::new("/nonexistent/taskurai.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.log_filter(), log::LevelFilter::Info);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(tmp, r#"{{"export_dir": "/tmp/out", "log_level": "debug"}}"#).unwrap();

        let config = Config::load(tmp.path()).unwrap();
        assert_eq!(config.export_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.log_filter(), log::LevelFilter::Debug);
        assert_eq!(config.data_dir, Config::default().data_dir);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(tmp, "{{ not json").unwrap();
        assert!(matches!(
            Config::load(tmp.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_unknown_level_falls_back_to_info() {
        let config = Config {
            log_level: "chatty".into(),
            ..Config::default()
        };
        assert_eq!(config.log_filter(), log::LevelFilter::Info);
    }
}
