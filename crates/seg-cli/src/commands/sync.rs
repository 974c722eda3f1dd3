//! Sync command for overwriting the destination table and notifying the CRM.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;

use seg_core::{AudienceSink, CachedStore};
use seg_crm::{Client, SyncRequest};

use super::audience::{PassArgs, run_pass};
use super::open_database;
use crate::Config;

#[derive(Debug, Args)]
pub struct SyncArgs {
    #[command(flatten)]
    pub pass: PassArgs,

    /// Destination table (defaults to `destination_table` from config).
    #[arg(long)]
    pub table: Option<String>,

    /// Only write the table; do not call the CRM.
    #[arg(long)]
    pub skip_crm: bool,
}

pub fn run<W: Write>(writer: &mut W, args: &SyncArgs, config: &Config) -> Result<()> {
    let mut store = CachedStore::new(open_database(config)?);
    let pass = run_pass(&mut store, &args.pass, config)?;
    let table = args.table.as_deref().unwrap_or(&config.destination_table);

    let written = store
        .inner_mut()
        .sync(&pass.audience, table)
        .with_context(|| format!("failed to sync audience to {table}"))?;
    writeln!(writer, "Synced {written} users to table {table}")?;

    if args.skip_crm {
        return Ok(());
    }
    let Some(endpoint) = config.crm_endpoint.as_deref() else {
        tracing::debug!("no CRM endpoint configured; skipping CRM request");
        return Ok(());
    };

    let api_key = config
        .crm_api_key
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            anyhow::anyhow!("missing CRM API key (set SEG_CRM_API_KEY or config.toml)")
        })?;
    let client = Client::new(endpoint, api_key).context("failed to create CRM client")?;
    let request = SyncRequest {
        table: table.to_string(),
        rows: written,
        campaign: Some(pass.campaign.name),
    };

    let runtime = tokio::runtime::Runtime::new().context("failed to initialize tokio runtime")?;
    let receipt = runtime
        .block_on(client.request_sync(&request))
        .context("CRM sync request failed")?;

    match receipt.job_id {
        Some(job_id) => writeln!(writer, "CRM sync {} (job {job_id})", receipt.status)?,
        None => writeln!(writer, "CRM sync {}", receipt.status)?,
    }
    Ok(())
}
