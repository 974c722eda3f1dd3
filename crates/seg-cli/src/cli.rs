//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::campaigns::CampaignsAction;
use crate::commands::evaluate::EvaluateArgs;
use crate::commands::export::ExportArgs;
use crate::commands::import::ImportArgs;
use crate::commands::rules::RulesArgs;
use crate::commands::summary::SummaryArgs;
use crate::commands::sync::SyncArgs;

/// Audience segmentation for campaign targeting.
///
/// Evaluates rule groups over imported events and users, combines the
/// results with AND or OR, and exports or syncs the final audience.
#[derive(Debug, Parser)]
#[command(name = "seg", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load events or users from a CSV file.
    Import(ImportArgs),

    /// Print the final audience of a campaign.
    Evaluate(EvaluateArgs),

    /// Show audience size, average tasks and a breakdown.
    Summary(SummaryArgs),

    /// Write the final audience as CSV.
    Export(ExportArgs),

    /// Overwrite the destination table with the final audience.
    Sync(SyncArgs),

    /// List or save campaign names.
    #[command(subcommand)]
    Campaigns(CampaignsAction),

    /// Print the rules summary of a campaign.
    Rules(RulesArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_pass_arguments() {
        let cli = Cli::try_parse_from([
            "seg",
            "summary",
            "spring.toml",
            "--combine",
            "or",
            "--by",
            "plan",
            "--top",
            "3",
        ])
        .unwrap();

        let Some(Commands::Summary(args)) = cli.command else {
            panic!("expected summary command");
        };
        assert_eq!(args.pass.campaign, PathBuf::from("spring.toml"));
        assert_eq!(args.pass.combine, Some(seg_core::CombineMode::Or));
        assert_eq!(args.by, seg_core::Dimension::Plan);
        assert_eq!(args.top, 3);
    }

    #[test]
    fn rejects_unknown_combine_mode() {
        assert!(Cli::try_parse_from(["seg", "evaluate", "a.toml", "--combine", "xor"]).is_err());
    }
}
