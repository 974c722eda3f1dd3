use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use seg_cli::commands::{campaigns, evaluate, export, import, rules, summary, sync};
use seg_cli::{CampaignsAction, Cli, Commands, Config};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        // No subcommand, show help
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match command {
        Commands::Import(args) => import::run(&mut out, args, &config)?,
        Commands::Evaluate(args) => evaluate::run(&mut out, args, &config)?,
        Commands::Summary(args) => summary::run(&mut out, args, &config)?,
        Commands::Export(args) => export::run(&mut out, args, &config)?,
        Commands::Sync(args) => sync::run(&mut out, args, &config)?,
        Commands::Campaigns(action) => match action {
            CampaignsAction::List { json } => campaigns::list(&mut out, *json, &config)?,
            CampaignsAction::Save { name } => campaigns::save(&mut out, name, &config)?,
        },
        Commands::Rules(args) => rules::run(&mut out, args, &config)?,
    }
    out.flush()?;

    Ok(())
}
