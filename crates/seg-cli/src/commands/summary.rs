//! Summary command for audience size, average tasks and a breakdown.

use std::io::Write;

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use seg_core::{AudienceSummary, BreakdownRow, CachedStore, Dimension, breakdown};

use super::audience::{PassArgs, run_pass};
use super::open_database;
use crate::Config;

#[derive(Debug, Args)]
pub struct SummaryArgs {
    #[command(flatten)]
    pub pass: PassArgs,

    /// Attribute to break the audience down by (country, device, plan).
    #[arg(long, default_value = "country")]
    pub by: Dimension,

    /// Number of breakdown rows to show.
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct SummaryOutput<'a> {
    campaign: &'a str,
    #[serde(flatten)]
    summary: AudienceSummary,
    dimension: Dimension,
    breakdown: Vec<BreakdownRow>,
}

pub fn run<W: Write>(writer: &mut W, args: &SummaryArgs, config: &Config) -> Result<()> {
    let mut store = CachedStore::new(open_database(config)?);
    let pass = run_pass(&mut store, &args.pass, config)?;

    let summary = AudienceSummary::of(&pass.audience);
    let rows = breakdown(&pass.audience, args.by, args.top);

    if args.json {
        let output = SummaryOutput {
            campaign: &pass.campaign.name,
            summary,
            dimension: args.by,
            breakdown: rows,
        };
        writeln!(writer, "{}", serde_json::to_string_pretty(&output)?)?;
        return Ok(());
    }

    writeln!(writer, "Matching users: {}", summary.matching_users)?;
    match summary.mean_num_tasks {
        Some(mean) => writeln!(writer, "Average tasks: {mean:.2}")?,
        None => writeln!(writer, "Average tasks: n/a")?,
    }

    if rows.is_empty() {
        return Ok(());
    }
    writeln!(writer, "Top {} by {}:", args.top, args.by)?;
    let width = rows.iter().map(|row| row.value.len()).max().unwrap_or(0);
    for row in rows {
        writeln!(writer, "  {:<width$}  {}", row.value, row.users)?;
    }
    Ok(())
}
