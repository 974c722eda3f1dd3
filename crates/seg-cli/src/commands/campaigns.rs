//! Campaigns command for listing and saving campaign names.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Subcommand;

use seg_core::CachedStore;

use super::open_database;
use crate::Config;

/// Campaign subcommands.
#[derive(Debug, Subcommand)]
pub enum CampaignsAction {
    /// List saved campaigns, oldest first.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Save a campaign name.
    Save {
        /// Campaign name; surrounding whitespace is trimmed.
        name: String,
    },
}

pub fn list<W: Write>(writer: &mut W, json: bool, config: &Config) -> Result<()> {
    let mut store = CachedStore::new(open_database(config)?);
    let campaigns = store.campaigns().context("failed to load campaigns")?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&*campaigns)?)?;
        return Ok(());
    }

    if campaigns.is_empty() {
        writeln!(writer, "No campaigns saved.")?;
        return Ok(());
    }
    for campaign in campaigns.iter() {
        writeln!(
            writer,
            "{}  {}",
            campaign.created_at.format("%Y-%m-%d %H:%M"),
            campaign.name
        )?;
    }
    Ok(())
}

pub fn save<W: Write>(writer: &mut W, name: &str, config: &Config) -> Result<()> {
    let mut store = CachedStore::new(open_database(config)?);
    let campaign = store
        .save_campaign(name)
        .context("failed to save campaign")?;
    writeln!(writer, "Saved campaign {} ({})", campaign.name, campaign.id)?;
    Ok(())
}
