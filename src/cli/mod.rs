//! Command-line interface.

pub mod args;
pub mod commands;
pub mod filter;

pub use args::{Args, Command};
pub use commands::execute;
