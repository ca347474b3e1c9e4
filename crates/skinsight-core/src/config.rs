//! Persisted config (Ollama endpoint, models, chunking, retry policy) in the app data directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app_data;
use crate::chunks::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::ollama::{DEFAULT_BASE_URL, DEFAULT_CHAT_MODEL, DEFAULT_EMBED_MODEL};

const CONFIG_FILENAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the Ollama server.
    pub ollama_url: String,
    pub embed_model: String,
    pub chat_model: String,
    /// Characters per indexed chunk.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks.
    pub chunk_overlap: usize,
    /// Chunks embedded per batch during indexing.
    pub batch_size: usize,
    /// Attempts per embedding batch before indexing gives up.
    pub retry_attempts: u32,
    /// Delay before the first retry; doubles on each further attempt.
    pub retry_delay_ms: u64,
    /// Segment length used when extracting graph triples from posts.
    pub graph_segment_len: usize,
    pub top_k: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ollama_url: DEFAULT_BASE_URL.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            batch_size: 32,
            retry_attempts: 5,
            retry_delay_ms: 5_000,
            graph_segment_len: 400,
            top_k: 5,
        }
    }
}

impl Config {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Path of the config file in the app data directory, if it can be determined.
pub fn config_path() -> Option<PathBuf> {
    app_data::app_data_dir().map(|dir| dir.join(CONFIG_FILENAME))
}

/// Load config from the app data directory. Returns default config if missing or invalid.
pub fn load_config() -> Config {
    match config_path() {
        Some(path) => load_config_from(&path),
        None => Config::default(),
    }
}

/// Load config from `path`. Returns default config if missing or invalid.
pub fn load_config_from(path: &Path) -> Config {
    let Ok(s) = std::fs::read_to_string(path) else {
        return Config::default();
    };
    match toml::from_str(&s) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "invalid config, using defaults");
            Config::default()
        }
    }
}

/// Save config to `path`, creating its parent directory.
pub fn save_config_to(path: &Path, config: &Config) -> Result<(), ConfigError> {
    let s = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(ConfigError::Write)?;
    }
    std::fs::write(path, s).map_err(ConfigError::Write)
}

/// Writes the default config to `path` (the app data config when `None`).
/// An existing file is left alone unless `force`; returns the path and whether it was written.
pub fn init_config(path: Option<&Path>, force: bool) -> Result<(PathBuf, bool), ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_path().ok_or(ConfigError::NoDataDir)?,
    };
    if path.exists() && !force {
        return Ok((path, false));
    }
    save_config_to(&path, &Config::default())?;
    Ok((path, true))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine app data directory")]
    NoDataDir,
    #[error("failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("failed to write config: {0}")]
    Write(std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_config_from(&dir.path().join("nope.toml")), Config::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "chat_model = \"mistral\"\nbatch_size = 8\n").unwrap();
        let config = load_config_from(&path);
        assert_eq!(config.chat_model, "mistral");
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn invalid_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "batch_size = \"lots\"").unwrap();
        assert_eq!(load_config_from(&path), Config::default());
    }

    #[test]
    fn save_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = Config {
            top_k: 9,
            ..Config::default()
        };
        save_config_to(&path, &config).unwrap();
        assert_eq!(load_config_from(&path), config);
    }

    #[test]
    fn init_writes_defaults_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let (written_to, written) = init_config(Some(&path), false).unwrap();
        assert!(written);
        assert_eq!(written_to, path);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("embed_model = \"mxbai-embed-large\""));
        assert_eq!(load_config_from(&path), Config::default());

        std::fs::write(&path, "top_k = 3\n").unwrap();
        let (_, written) = init_config(Some(&path), false).unwrap();
        assert!(!written);
        assert_eq!(load_config_from(&path).top_k, 3);

        let (_, written) = init_config(Some(&path), true).unwrap();
        assert!(written);
        assert_eq!(load_config_from(&path).top_k, Config::default().top_k);
    }
}
