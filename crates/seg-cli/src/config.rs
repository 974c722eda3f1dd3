//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use seg_core::CombineMode;

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Combine mode for campaign files that do not name one.
    pub default_combine: CombineMode,
    /// Table overwritten by `seg sync`.
    pub destination_table: String,
    /// CRM sync endpoint. Sync skips the CRM request when unset.
    pub crm_endpoint: Option<String>,
    pub crm_api_key: Option<String>,
    /// Reject inverted date ranges instead of evaluating them to nothing.
    pub strict_date_ranges: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("default_combine", &self.default_combine)
            .field("destination_table", &self.destination_table)
            .field("crm_endpoint", &self.crm_endpoint)
            .field(
                "crm_api_key",
                &self.crm_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("strict_date_ranges", &self.strict_date_ranges)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("seg.db"),
            default_combine: CombineMode::And,
            destination_table: "Campaign".to_string(),
            crm_endpoint: None,
            crm_api_key: None,
            strict_date_ranges: false,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (SEG_*)
        figment = figment.merge(Env::prefixed("SEG_"));

        figment.extract()
    }
}

/// Returns the platform-specific config directory for seg.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("seg"))
}

/// Returns the platform-specific data directory for seg.
///
/// On Linux: `~/.local/share/seg`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("seg"))
}
