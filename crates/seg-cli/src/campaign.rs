//! Campaign file loading.

use std::path::Path;

use anyhow::{Context, Result, bail};
use figment::Figment;
use figment::providers::{Format, Toml};
use seg_core::CampaignDefinition;

/// Reads a TOML campaign file.
pub fn load(path: &Path) -> Result<CampaignDefinition> {
    // Toml::file treats a missing file as empty.
    if !path.is_file() {
        bail!("campaign file not found: {}", path.display());
    }
    let campaign: CampaignDefinition = Figment::from(Toml::file(path))
        .extract()
        .with_context(|| format!("invalid campaign file {}", path.display()))?;
    if campaign.sets.is_empty() {
        bail!("campaign {} has no [[sets]]", path.display());
    }
    Ok(campaign)
}
