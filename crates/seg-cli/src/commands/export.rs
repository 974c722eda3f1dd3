//! Export command for writing the final audience as CSV.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use seg_core::CachedStore;
use seg_core::export::write_csv;

use super::audience::{PassArgs, run_pass};
use super::open_database;
use crate::Config;

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub pass: PassArgs,

    /// Write to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run<W: Write>(writer: &mut W, args: &ExportArgs, config: &Config) -> Result<()> {
    let mut store = CachedStore::new(open_database(config)?);
    let pass = run_pass(&mut store, &args.pass, config)?;

    let Some(path) = &args.output else {
        write_csv(writer, &pass.audience).context("failed to write CSV")?;
        return Ok(());
    };

    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    write_csv(BufWriter::new(file), &pass.audience)
        .with_context(|| format!("failed to write {}", path.display()))?;
    writeln!(
        writer,
        "Exported {} users to {}",
        pass.audience.len(),
        path.display()
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;

    use crate::commands::fixtures::{Fixture, NOW};

    const EXPECTED_CSV: &str = "\
user_id,country,device,plan,num_tasks,email,last_login,event_count
1,US,mobile,pro,3,one@example.com,2024-01-30T12:00:00Z,2
2,DE,web,free,1,two@example.com,2024-01-25T08:00:00Z,1
4,FR,mobile,free,5,four@example.com,2024-01-31T09:00:00Z,1
";

    fn args(fixture: &Fixture, output: Option<PathBuf>) -> ExportArgs {
        ExportArgs {
            pass: PassArgs {
                campaign: fixture.campaign(),
                combine: None,
                now: Some(NOW.to_string()),
            },
            output,
        }
    }

    #[test]
    fn export_writes_csv_to_stdout() {
        let fixture = Fixture::seeded();
        let mut output = Vec::new();
        run(&mut output, &args(&fixture, None), &fixture.config).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), EXPECTED_CSV);
    }

    #[test]
    fn export_writes_csv_to_file() {
        let fixture = Fixture::seeded();
        let path = fixture.dir().join("audience.csv");

        let mut output = Vec::new();
        run(&mut output, &args(&fixture, Some(path.clone())), &fixture.config).unwrap();

        let output = String::from_utf8(output).unwrap();
        let output = output.replace(&path.display().to_string(), "[TEMP]/audience.csv");
        assert_snapshot!(output.trim_end(), @"Exported 3 users to [TEMP]/audience.csv");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), EXPECTED_CSV);
    }
}
