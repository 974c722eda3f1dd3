//! Audience segmentation CLI library.
//!
//! This crate provides the CLI interface for the segmentation engine.

mod campaign;
mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands};
pub use commands::campaigns::CampaignsAction;
pub use config::Config;
