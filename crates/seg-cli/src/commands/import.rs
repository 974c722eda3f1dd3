//! Import command for loading events and users from CSV into the store.

use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use serde::Deserialize;

use seg_core::{CacheEvent, CachedStore, Event, User, UserId};

use super::open_database;
use super::util::parse_timestamp;
use crate::Config;

/// Relation loaded by `seg import`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Dataset {
    Events,
    Users,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Which relation the file holds.
    #[arg(value_enum)]
    pub dataset: Dataset,

    /// CSV file with a header row.
    pub path: PathBuf,
}

pub fn run<W: Write>(writer: &mut W, args: &ImportArgs, config: &Config) -> Result<()> {
    let file =
        File::open(&args.path).with_context(|| format!("failed to open {}", args.path.display()))?;

    let mut store = CachedStore::new(open_database(config)?);
    let (label, written) = match args.dataset {
        Dataset::Events => {
            let events = parse_events(file)?;
            ("events", store.inner_mut().insert_events(&events)?)
        }
        Dataset::Users => {
            let users = parse_users(file)?;
            ("users", store.inner_mut().upsert_users(&users)?)
        }
    };
    store.invalidate_after(CacheEvent::DatasetsImported);
    tracing::debug!(dataset = label, written, "import finished");

    writeln!(
        writer,
        "Imported {written} {label} from {}",
        args.path.display()
    )?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct ImportEvent {
    event_id: String,
    user_id: String,
    event_type: String,
    #[serde(default)]
    device: Option<String>,
    #[serde(default)]
    plan_at_event: Option<String>,
    timestamp: String,
}

#[derive(Debug, Deserialize)]
struct ImportUser {
    user_id: String,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    device: Option<String>,
    #[serde(default)]
    plan: Option<String>,
    #[serde(default)]
    num_tasks: Option<i64>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    last_login: Option<String>,
}

fn parse_events<R: Read>(reader: R) -> Result<Vec<Event>> {
    let mut csv = csv::Reader::from_reader(reader);
    let mut events = Vec::new();
    for (idx, row) in csv.deserialize::<ImportEvent>().enumerate() {
        // Line 1 is the header.
        let line = idx + 2;
        let row = row.with_context(|| format!("invalid event on line {line}"))?;
        let user_id = UserId::from_text(&row.user_id)
            .with_context(|| format!("invalid event on line {line}"))?;
        let timestamp = parse_timestamp(&row.timestamp)
            .with_context(|| format!("invalid event on line {line}"))?;
        events.push(Event {
            event_id: row.event_id,
            user_id,
            event_type: row.event_type,
            device: non_empty(row.device),
            plan_at_event: non_empty(row.plan_at_event),
            timestamp,
        });
    }
    Ok(events)
}

fn parse_users<R: Read>(reader: R) -> Result<Vec<User>> {
    let mut csv = csv::Reader::from_reader(reader);
    let mut users = Vec::new();
    for (idx, row) in csv.deserialize::<ImportUser>().enumerate() {
        let line = idx + 2;
        let row = row.with_context(|| format!("invalid user on line {line}"))?;
        let user_id = UserId::from_text(&row.user_id)
            .with_context(|| format!("invalid user on line {line}"))?;
        let last_login = non_empty(row.last_login)
            .map(|value| parse_timestamp(&value))
            .transpose()
            .with_context(|| format!("invalid user on line {line}"))?;
        users.push(User {
            user_id,
            country: non_empty(row.country),
            device: non_empty(row.device),
            plan: non_empty(row.plan),
            last_login,
            num_tasks: row.num_tasks,
            email: non_empty(row.email),
        });
    }
    Ok(users)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
