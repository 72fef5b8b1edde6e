//! Configuration module.
//!
//! This module handles:
//! - Loading configuration from TOML files
//! - CLI argument merging (see `cli::args`)
//! - Configuration validation and target parsing

pub mod loader;
pub mod validation;

pub use loader::{Config, DownloadConfig, NetworkConfig, PathsConfig, PreloadConfig};
pub use validation::{parse_shortcode, parse_target, validate_config, Target};
