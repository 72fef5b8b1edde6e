//! Download module for post media.
//!
//! This module provides:
//! - The post downloader driven by an item sequence
//! - Streaming media files with skip-if-identical
//! - JSON metadata sidecars
//! - User hooks and per-run statistics

pub mod downloader;
pub mod hooks;
pub mod media;
pub mod metadata;
pub mod state;

pub use downloader::{DownloadOptions, DownloadTask, Downloader};
pub use hooks::Hooks;
pub use state::{DownloadSummary, FileOutcome, FileReport, ItemFailure, PostReport};
