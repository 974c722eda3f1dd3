//! One evaluation pass: campaign file, dataset snapshot, per-set candidates,
//! combined audience.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;

use seg_core::{
    CachedStore, CampaignDefinition, CandidateAudience, CombineMode, FilterSet, FinalAudience,
    combine, evaluate_all,
};
use seg_db::Database;

use super::util::parse_datetime;
use crate::{Config, campaign};

/// Arguments shared by every command that evaluates a campaign.
#[derive(Debug, Args)]
pub struct PassArgs {
    /// Campaign file describing the filter sets.
    pub campaign: PathBuf,

    /// Override the campaign's combine mode (and, or).
    #[arg(long)]
    pub combine: Option<CombineMode>,

    /// Reference time for recency checks (ISO 8601 or relative, e.g. '2 days ago').
    #[arg(long)]
    pub now: Option<String>,
}

/// Everything one pass produced.
#[derive(Debug)]
pub struct Pass {
    pub campaign: CampaignDefinition,
    pub filters: Vec<FilterSet>,
    pub candidates: Vec<CandidateAudience>,
    pub audience: FinalAudience,
}

impl PassArgs {
    fn evaluated_at(&self) -> Result<DateTime<Utc>> {
        self.now
            .as_deref()
            .map_or_else(|| Ok(Utc::now()), parse_datetime)
    }
}

/// Loads the campaign, snapshots the datasets and evaluates every set.
pub fn run_pass(
    store: &mut CachedStore<Database>,
    args: &PassArgs,
    config: &Config,
) -> Result<Pass> {
    let campaign = campaign::load(&args.campaign)?;
    let now = args.evaluated_at()?;

    let snapshot = store.snapshot().context("failed to load datasets")?;
    let filters = campaign
        .filter_sets(snapshot.event_span())
        .with_context(|| format!("invalid rules in {}", args.campaign.display()))?;

    if config.strict_date_ranges {
        for (idx, filter) in filters.iter().enumerate() {
            filter
                .validate()
                .with_context(|| format!("set {} has an invalid date range", idx + 1))?;
        }
    }

    let candidates = evaluate_all(&snapshot, &filters, now);
    let mode = args
        .combine
        .unwrap_or_else(|| campaign.combine_mode(config.default_combine));
    let audience = combine(&candidates, mode).context("failed to combine audiences")?;

    tracing::debug!(
        campaign = %campaign.name,
        sets = filters.len(),
        %mode,
        matched = audience.len(),
        "evaluation pass finished"
    );

    Ok(Pass {
        campaign,
        filters,
        candidates,
        audience,
    })
}
