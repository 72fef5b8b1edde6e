//! Filesystem module.
//!
//! Provides:
//! - Path and directory management
//! - Filename validation
//! - Atomic file replacement

pub mod naming;
pub mod paths;

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{Error, Result};

pub use naming::{sanitize_filename, sanitize_path_component, validate_account_name};
pub use paths::{ensure_dir, listing_folder, AppPaths};

/// Replace `path` with `contents` so readers never observe a partial file.
///
/// The data goes to a uniquely named temp file in the same directory, is
/// synced, then renamed over the target.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::InvalidFilename(path.display().to_string()))?;
    fs::create_dir_all(dir).map_err(|e| Error::storage(dir, e))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::InvalidFilename(path.display().to_string()))?;
    let tmp = dir.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4().simple()));

    let result = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(Error::storage(path, e));
    }
    Ok(())
}
