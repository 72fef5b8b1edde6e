//! Path and directory management.

use std::path::{Path, PathBuf};

use directories::BaseDirs;

use crate::error::{Error, Result};
use crate::fs::naming::sanitize_path_component;

/// Name of the per-user application directory under `$HOME`.
const APP_DIR: &str = ".instascrape";

/// Locations of the files the application owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    root: PathBuf,
}

impl AppPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `~/.instascrape`, or `override_dir` when given.
    pub fn resolve(override_dir: Option<&Path>) -> Result<Self> {
        if let Some(dir) = override_dir {
            return Ok(Self::new(dir));
        }
        let base = BaseDirs::new()
            .ok_or_else(|| Error::Config("Could not determine the home directory".into()))?;
        Ok(Self::new(base.home_dir().join(APP_DIR)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.root.join("sessions")
    }
}

/// Folder for one listing of a target, e.g. `timeline@alice` or `recent#rust`.
pub fn listing_folder(listing: &str, marker: char, name: &str) -> Result<String> {
    let name = sanitize_path_component(name)?;
    Ok(format!("{}{}{}", listing, marker, name))
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| Error::storage(path, e))?;
    }
    Ok(())
}
