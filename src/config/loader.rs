//! Configuration structures and loading logic.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::download::DownloadOptions;
use crate::error::{Error, Result};
use crate::fs::{write_atomic, AppPaths};
use crate::pipeline::PreloadOptions;

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub preload: PreloadConfig,

    #[serde(default)]
    pub download: DownloadConfig,

    #[serde(default)]
    pub paths: PathsConfig,
}

/// HTTP behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Browser user agent string.
    pub user_agent: String,

    /// Minimum spacing between two requests.
    pub request_interval_ms: u64,

    pub timeout_secs: u64,

    /// Attempts per request, the first one included.
    pub retry_attempts: u32,

    pub backoff_base_ms: u64,

    pub backoff_max_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            request_interval_ms: 300,
            timeout_secs: 30,
            retry_attempts: 5,
            backoff_base_ms: 1_000,
            backoff_max_ms: 32_000,
        }
    }
}

/// Detail fetching ahead of consumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreloadConfig {
    pub workers: usize,

    /// Queue capacity as a multiple of the worker count.
    pub queue_multiplier: usize,

    /// Items requested per listing page.
    pub page_size: usize,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            workers: 15,
            queue_multiplier: 2,
            page_size: 50,
        }
    }
}

impl PreloadConfig {
    pub fn options(&self) -> PreloadOptions {
        PreloadOptions {
            workers: self.workers,
            queue_multiplier: self.queue_multiplier,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Base directory for downloads; the working directory when unset.
    pub dest: Option<PathBuf>,

    /// Write a JSON sidecar next to each post.
    pub dump_metadata: bool,

    /// Add each post's comments to the sidecar.
    pub dump_comments: bool,

    /// Add the usernames of each post's likers to the sidecar.
    pub dump_likes: bool,

    /// Compare existing files by md5 instead of size.
    pub verify: bool,

    pub fail_fast: bool,

    pub hook_timeout_secs: u64,

    pub show_progress: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            dest: None,
            dump_metadata: false,
            dump_comments: false,
            dump_likes: false,
            verify: true,
            fail_fast: false,
            hook_timeout_secs: 30,
            show_progress: true,
        }
    }
}

impl DownloadConfig {
    /// Get the effective download directory.
    pub fn dest_dir(&self) -> PathBuf {
        self.dest
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    pub fn options(&self) -> DownloadOptions {
        DownloadOptions {
            dest: self.dest_dir(),
            dump_metadata: self.dump_metadata,
            dump_comments: self.dump_comments,
            dump_likes: self.dump_likes,
            verify: self.verify,
            fail_fast: self.fail_fast,
            hook_timeout: Duration::from_secs(self.hook_timeout_secs),
            show_progress: self.show_progress,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Overrides `~/.instascrape` for sessions.
    pub data_dir: Option<PathBuf>,
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/144.0.0.0 Safari/537.36".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Config(format!("Configuration file not found: {}", path.display()))
            } else {
                Error::Io(e)
            }
        })?;

        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load `path`, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        write_atomic(path, content.as_bytes())
    }

    /// Application directories, honouring `[paths]`.
    pub fn app_paths(&self) -> Result<AppPaths> {
        AppPaths::resolve(self.paths.data_dir.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.preload.workers, 15);
        assert_eq!(config.preload.queue_multiplier, 2);
        assert_eq!(config.network.request_interval_ms, 300);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[preload]\nworkers = 4\n\n[download]\nverify = false\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.preload.workers, 4);
        assert_eq!(config.preload.page_size, 50);
        assert!(!config.download.verify);
        assert_eq!(config.network.retry_attempts, 5);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.download.dest = Some(PathBuf::from("/data/ig"));
        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[preload\n").unwrap();
        assert!(matches!(Config::load(&path), Err(Error::TomlParse(_))));
    }
}
