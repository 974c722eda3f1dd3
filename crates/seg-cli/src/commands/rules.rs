//! Rules command for printing the rules summary of a campaign.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use seg_core::CachedStore;

use super::open_database;
use crate::{Config, campaign};

#[derive(Debug, Args)]
pub struct RulesArgs {
    /// Campaign file describing the filter sets.
    pub campaign: PathBuf,
}

pub fn run<W: Write>(writer: &mut W, args: &RulesArgs, config: &Config) -> Result<()> {
    let campaign = campaign::load(&args.campaign)?;

    // Sets without dates resolve against the stored events.
    let mut store = CachedStore::new(open_database(config)?);
    let snapshot = store.snapshot().context("failed to load datasets")?;
    let filters = campaign
        .filter_sets(snapshot.event_span())
        .with_context(|| format!("invalid rules in {}", args.campaign.display()))?;

    writeln!(writer, "Campaign: {}", campaign.name)?;
    writeln!(
        writer,
        "Combine: {}",
        campaign.combine_mode(config.default_combine)
    )?;
    for (idx, filter) in filters.iter().enumerate() {
        writeln!(writer)?;
        writeln!(writer, "Set {}", idx + 1)?;
        writeln!(writer, "{filter}")?;
    }
    Ok(())
}
