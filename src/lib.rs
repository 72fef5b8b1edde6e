//! instascrape - scrape and download Instagram posts and profiles.
//!
//! This library provides:
//!
//! - Login with two-factor and checkpoint flows, with sessions persisted per account
//! - Paginated listings (timeline, tagged, IGTV, saved, followers, likes, hashtags)
//! - Bounded, order-preserving preloading of full items
//! - Streaming media downloads with skip-if-identical and JSON sidecars
//! - Rate limiting and retry logic
//!
//! # Example
//!
//! ```no_run
//! use instascrape::{Config, Downloader, Scraper};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> instascrape::Result<()> {
//!     let scraper = Scraper::new(Config::default())?;
//!     let profile = scraper.profile("instagram").await?;
//!
//!     let mut posts = scraper.timeline(&profile)?;
//!     posts.limit(Some(10))?.preload(true)?;
//!
//!     let downloader = Downloader::new(
//!         Arc::clone(scraper.client()),
//!         scraper.config().download.options(),
//!     );
//!     let summary = downloader.download_all(&mut posts).await?;
//!     println!("{} files", summary.downloaded());
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod fs;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod scraper;
pub mod session;

// Re-exports for convenience
pub use api::FetchClient;
pub use config::{Config, Target};
pub use download::{DownloadOptions, DownloadSummary, Downloader, Hooks};
pub use error::{Error, Result};
pub use model::{Post, Profile, Record};
pub use pipeline::ItemSequence;
pub use scraper::Scraper;
pub use session::{Authenticator, LoginOutcome, Session, SessionStore};
