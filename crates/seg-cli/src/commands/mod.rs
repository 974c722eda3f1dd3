//! CLI subcommand implementations.

pub mod audience;
pub mod campaigns;
pub mod evaluate;
pub mod export;
pub mod import;
pub mod rules;
pub mod summary;
pub mod sync;
pub mod util;

#[cfg(test)]
pub(crate) mod fixtures;

use anyhow::{Context, Result};
use seg_db::Database;

use crate::Config;

/// Opens the configured database, creating its directory if necessary.
pub fn open_database(config: &Config) -> Result<Database> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))
}
