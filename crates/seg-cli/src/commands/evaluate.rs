//! Evaluate command for printing the final audience of a campaign.

use std::io::Write;

use anyhow::Result;
use clap::Args;

use seg_core::{CachedStore, FinalMember};

use super::audience::{PassArgs, run_pass};
use super::open_database;
use crate::Config;

#[derive(Debug, Args)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub pass: PassArgs,

    /// Output one JSON object per user instead of a table.
    #[arg(long)]
    pub json: bool,
}

pub fn run<W: Write>(writer: &mut W, args: &EvaluateArgs, config: &Config) -> Result<()> {
    let mut store = CachedStore::new(open_database(config)?);
    let pass = run_pass(&mut store, &args.pass, config)?;

    if args.json {
        for member in pass.audience.members() {
            writeln!(writer, "{}", serde_json::to_string(member)?)?;
        }
        return Ok(());
    }

    writeln!(
        writer,
        "Campaign: {} ({})",
        pass.campaign.name,
        pass.audience.mode()
    )?;
    for (idx, candidate) in pass.candidates.iter().enumerate() {
        writeln!(writer, "Set {}: {} users", idx + 1, candidate.len())?;
    }
    writeln!(writer, "Final audience: {} users", pass.audience.len())?;

    if pass.audience.is_empty() {
        return Ok(());
    }

    writeln!(writer)?;
    writeln!(
        writer,
        "{:<12} {:<8} {:<8} {:<8} {:>6}  sets",
        "user_id", "country", "device", "plan", "events"
    )?;
    for member in pass.audience.members() {
        writeln!(
            writer,
            "{:<12} {:<8} {:<8} {:<8} {:>6}  {}",
            member.user_id.as_str(),
            member.country,
            member.device,
            member.plan,
            member.event_count,
            matched_sets(member)
        )?;
    }
    Ok(())
}

/// One-based set positions, matching the `Set N` labels.
fn matched_sets(member: &FinalMember) -> String {
    member
        .matched_sets
        .iter()
        .map(|idx| (idx + 1).to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;

    use crate::commands::fixtures::{Fixture, NOW};

    fn args(fixture: &Fixture, json: bool) -> EvaluateArgs {
        EvaluateArgs {
            pass: PassArgs {
                campaign: fixture.campaign(),
                combine: None,
                now: Some(NOW.to_string()),
            },
            json,
        }
    }

    #[test]
    fn evaluate_prints_set_counts_and_rows() {
        let fixture = Fixture::seeded();
        let mut output = Vec::new();
        run(&mut output, &args(&fixture, false), &fixture.config).unwrap();
        let output = String::from_utf8(output).unwrap();

        let lines: Vec<Vec<&str>> = output
            .lines()
            .map(|line| line.split_whitespace().collect())
            .collect();
        assert_eq!(
            lines,
            vec![
                vec!["Campaign:", "Spring", "re-engagement", "(or)"],
                vec!["Set", "1:", "2", "users"],
                vec!["Set", "2:", "1", "users"],
                vec!["Final", "audience:", "3", "users"],
                vec![],
                vec!["user_id", "country", "device", "plan", "events", "sets"],
                vec!["1", "US", "mobile", "pro", "2", "1"],
                vec!["2", "DE", "web", "free", "1", "1"],
                vec!["4", "FR", "mobile", "free", "1", "2"],
            ]
        );
    }

    #[test]
    fn evaluate_json_emits_one_object_per_user() {
        let fixture = Fixture::seeded();
        let mut output = Vec::new();
        run(&mut output, &args(&fixture, true), &fixture.config).unwrap();
        let output = String::from_utf8(output).unwrap();

        let first = output.lines().next().unwrap();
        assert_snapshot!(first, @r#"{"user_id":"1","country":"US","device":"mobile","plan":"pro","num_tasks":3,"email":"one@example.com","last_login":"2024-01-30T12:00:00Z","event_count":2,"matched_sets":[0]}"#);
        assert_eq!(output.lines().count(), 3);
    }

    #[test]
    fn evaluate_empty_audience_prints_counts_only() {
        let fixture = Fixture::seeded();
        let mut args = args(&fixture, false);
        args.pass.combine = Some(seg_core::CombineMode::And);

        let mut output = Vec::new();
        run(&mut output, &args, &fixture.config).unwrap();
        let output = String::from_utf8(output).unwrap();

        assert!(output.ends_with("Final audience: 0 users\n"));
        assert!(output.starts_with("Campaign: Spring re-engagement (and)\n"));
    }
}
