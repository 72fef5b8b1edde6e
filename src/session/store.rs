//! On-disk session persistence.
//!
//! Layout under the sessions directory:
//!
//! ```text
//! sessions/
//!   <account>.json   one serialized Session per account
//!   current          name of the account of the active session
//! ```
//!
//! Every write goes through [`crate::fs::write_atomic`].

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::fs::{validate_account_name, write_atomic};
use crate::session::Session;

const SESSION_EXT: &str = "json";
const CURRENT_FILE: &str = "current";

/// Stores sessions as one JSON file per account.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, account: &str) -> Result<PathBuf> {
        validate_account_name(account)?;
        Ok(self.dir.join(format!("{}.{}", account, SESSION_EXT)))
    }

    pub fn save(&self, account: &str, session: &Session) -> Result<()> {
        let path = self.path_for(account)?;
        let data = serde_json::to_vec_pretty(session)?;
        write_atomic(&path, &data)?;
        tracing::debug!("Saved session for '{}' to {}", account, path.display());
        Ok(())
    }

    /// Load the session of `account`.
    ///
    /// A missing file is [`Error::SessionNotFound`]; a file that exists but
    /// cannot be decoded is [`Error::Corrupted`].
    pub fn load(&self, account: &str) -> Result<Session> {
        let path = self.path_for(account)?;
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::SessionNotFound(account.to_string()))
            }
            Err(e) => return Err(Error::storage(&path, e)),
        };

        let session: Session = serde_json::from_slice(&data).map_err(|e| Error::Corrupted {
            account: account.to_string(),
            message: e.to_string(),
        })?;

        if session.account != account {
            return Err(Error::Corrupted {
                account: account.to_string(),
                message: format!("file belongs to '{}'", session.account),
            });
        }
        Ok(session)
    }

    pub fn delete(&self, account: &str) -> Result<()> {
        let path = self.path_for(account)?;
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::SessionNotFound(account.to_string()))
            }
            Err(e) => return Err(Error::storage(&path, e)),
        }

        if self.current()?.as_deref() == Some(account) {
            self.clear_current()?;
        }
        Ok(())
    }

    /// Accounts with a stored session.
    pub fn list(&self) -> Result<BTreeSet<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(Error::storage(&self.dir, e)),
        };

        let mut accounts = BTreeSet::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::storage(&self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SESSION_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_account_name(stem).is_ok() {
                    accounts.insert(stem.to_string());
                }
            }
        }
        Ok(accounts)
    }

    /// When the session of `account` was last written.
    pub fn last_used(&self, account: &str) -> Result<DateTime<Utc>> {
        let path = self.path_for(account)?;
        let modified = fs::metadata(&path)
            .and_then(|m| m.modified())
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => Error::SessionNotFound(account.to_string()),
                _ => Error::storage(&path, e),
            })?;
        Ok(DateTime::<Utc>::from(modified))
    }

    pub fn set_current(&self, account: &str) -> Result<()> {
        validate_account_name(account)?;
        write_atomic(&self.dir.join(CURRENT_FILE), account.as_bytes())
    }

    /// Account of the active session, if one is set.
    pub fn current(&self) -> Result<Option<String>> {
        let path = self.dir.join(CURRENT_FILE);
        match fs::read_to_string(&path) {
            Ok(name) => {
                let name = name.trim();
                if name.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(name.to_string()))
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::storage(&path, e)),
        }
    }

    pub fn clear_current(&self) -> Result<()> {
        let path = self.dir.join(CURRENT_FILE);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::storage(&path, e)),
        }
    }
}
