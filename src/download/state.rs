//! Download outcomes and statistics.

use std::path::PathBuf;

use crate::error::{Error, ErrorKind};
use crate::model::MediaKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Downloaded,
    /// An identical file was already in place.
    Skipped,
}

/// Result of fetching one media file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub path: PathBuf,
    pub kind: MediaKind,
    pub outcome: FileOutcome,
    pub bytes: u64,
}

/// Result of downloading every file of one post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostReport {
    pub shortcode: String,
    pub files: Vec<FileReport>,
    pub metadata_written: bool,
}

impl PostReport {
    pub fn downloaded(&self) -> usize {
        self.files
            .iter()
            .filter(|f| f.outcome == FileOutcome::Downloaded)
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.files.len() - self.downloaded()
    }
}

/// A post that could not be downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub position: usize,
    pub key: String,
    pub message: String,
    pub kind: ErrorKind,
}

impl ItemFailure {
    pub fn new(position: usize, key: impl Into<String>, error: &Error) -> Self {
        Self {
            position,
            key: key.into(),
            message: error.to_string(),
            kind: error.kind(),
        }
    }

    /// Build from a contained pipeline error.
    pub fn from_item_error(error: &Error) -> Option<Self> {
        match error {
            Error::Item {
                position,
                key,
                source,
            } => Some(Self::new(*position, key.clone(), source)),
            _ => None,
        }
    }
}

/// Totals over a whole download run.
#[derive(Debug, Clone, Default)]
pub struct DownloadSummary {
    pub posts: u64,
    pub images: u64,
    pub videos: u64,
    pub skipped: u64,
    pub bytes: u64,
    pub failures: Vec<ItemFailure>,
}

impl DownloadSummary {
    pub fn record(&mut self, report: &PostReport) {
        self.posts += 1;
        for file in &report.files {
            match (file.outcome, file.kind) {
                (FileOutcome::Skipped, _) => self.skipped += 1,
                (FileOutcome::Downloaded, MediaKind::Image) => self.images += 1,
                (FileOutcome::Downloaded, MediaKind::Video) => self.videos += 1,
            }
            if file.outcome == FileOutcome::Downloaded {
                self.bytes += file.bytes;
            }
        }
    }

    pub fn downloaded(&self) -> u64 {
        self.images + self.videos
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
