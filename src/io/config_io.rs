use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::model::config::EngineConfig;

/// Default config file name, looked up next to the snapshot
pub const CONFIG_FILE: &str = "tasktree.toml";

/// Error type for config loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    ReadError { path: PathBuf, source: io::Error },
    #[error("could not parse {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Read a config file. A missing file yields the defaults.
pub fn read_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(EngineConfig::default()),
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };
    toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Resolve the config path: explicit, or `tasktree.toml` beside the snapshot
pub fn config_path(explicit: Option<&Path>, snapshot: &Path) -> PathBuf {
    match explicit {
        Some(p) => p.to_path_buf(),
        None => snapshot
            .parent()
            .unwrap_or(Path::new(""))
            .join(CONFIG_FILE),
    }
}
