//! Storage layer for audience segmentation.
//!
//! Provides persistence for events, users and campaigns using `rusqlite`, and
//! the SQLite-backed implementations of the `seg-core` store seams.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` can be moved between threads but not shared across threads
//! without external synchronization. Evaluation works on a loaded
//! `DatasetSnapshot`, so the connection is never touched mid-pass.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 format (e.g., `2024-01-15T10:30:00.000Z`),
//! so lexicographic order matches chronological order.
//!
//! ## User Identifiers
//!
//! `user_id` columns carry no type affinity. Rows written by other tools may
//! hold integers, reals or text; every value is normalized to a `UserId` on
//! load, and a value that cannot be normalized fails the load.
//!
//! ## Query Parameters
//!
//! Every value reaching SQL is a bound parameter. The only identifier ever
//! spliced into SQL is a sync destination table name, which must pass
//! [`validate_table_name`] and is always double-quoted.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, params};
use seg_core::{
    AudienceSink, Campaign, CampaignStore, DatasetStore, Event, FinalAudience, PersistError,
    SegmentError, StoreError, SyncError, User, UserId,
};
use thiserror::Error;
use uuid::Uuid;

/// Tables owned by the store; never valid sync destinations.
const RESERVED_TABLES: [&str; 3] = ["events", "users", "campaigns"];

/// Longest accepted sync destination table name.
const MAX_TABLE_NAME_LEN: usize = 64;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp in {table} row {key}: {timestamp}")]
    TimestampParse {
        table: &'static str,
        key: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored user id could not be normalized.
    #[error("invalid user id in {table} row {row}")]
    InvalidUserId {
        table: &'static str,
        row: usize,
        #[source]
        source: SegmentError,
    },
    /// A sync destination name was rejected.
    #[error("invalid table name {name:?}: {reason}")]
    InvalidTableName { name: String, reason: &'static str },
    /// A campaign name was empty after trimming.
    #[error("campaign name cannot be empty")]
    EmptyCampaignName,
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- users: one row per user, attributes are a point-in-time snapshot
            CREATE TABLE IF NOT EXISTS users (
                user_id NOT NULL PRIMARY KEY,
                country TEXT,
                device TEXT,
                plan TEXT,
                last_login TEXT,
                num_tasks INTEGER,
                email TEXT
            );

            -- events: user_id is not a foreign key; orphan events are allowed
            CREATE TABLE IF NOT EXISTS events (
                event_id TEXT PRIMARY KEY,
                user_id NOT NULL,
                event_type TEXT NOT NULL,
                device TEXT,
                plan_at_event TEXT,
                timestamp TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_events_user ON events(user_id);
            CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);

            CREATE TABLE IF NOT EXISTS campaigns (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Inserts a batch of events, ignoring duplicates by ID.
    pub fn insert_events(&mut self, events: &[Event]) -> Result<usize, DbError> {
        if events.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "
                INSERT OR IGNORE INTO events
                (event_id, user_id, event_type, device, plan_at_event, timestamp)
                VALUES (?, ?, ?, ?, ?, ?)
                ",
            )?;
            for event in events {
                inserted += stmt.execute(params![
                    event.event_id,
                    event.user_id.as_str(),
                    event.event_type,
                    event.device,
                    event.plan_at_event,
                    format_timestamp(event.timestamp),
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Inserts users, replacing the attribute snapshot of existing ids.
    pub fn upsert_users(&mut self, users: &[User]) -> Result<usize, DbError> {
        if users.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO users (user_id, country, device, plan, last_login, num_tasks, email)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(user_id) DO UPDATE SET
                    country = excluded.country,
                    device = excluded.device,
                    plan = excluded.plan,
                    last_login = excluded.last_login,
                    num_tasks = excluded.num_tasks,
                    email = excluded.email
                ",
            )?;
            for user in users {
                written += stmt.execute(params![
                    user.user_id.as_str(),
                    user.country,
                    user.device,
                    user.plan,
                    user.last_login.map(format_timestamp),
                    user.num_tasks,
                    user.email,
                ])?;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    /// Lists all events ordered by timestamp then ID.
    pub fn list_events(&self) -> Result<Vec<Event>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT event_id, user_id, event_type, device, plan_at_event, timestamp
            FROM events
            ORDER BY timestamp ASC, event_id ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(EventRow {
                event_id: row.get(0)?,
                user_id: row.get(1)?,
                event_type: row.get(2)?,
                device: row.get(3)?,
                plan_at_event: row.get(4)?,
                timestamp: row.get(5)?,
            })
        })?;

        let mut events = Vec::new();
        for (idx, row) in rows.enumerate() {
            let row = row?;
            let timestamp = parse_timestamp(&row.timestamp, "events", &row.event_id)?;
            events.push(Event {
                user_id: normalize_user_id(&row.user_id, "events", idx)?,
                event_id: row.event_id,
                event_type: row.event_type,
                device: row.device,
                plan_at_event: row.plan_at_event,
                timestamp,
            });
        }
        Ok(events)
    }

    /// Lists all users in insertion order.
    pub fn list_users(&self) -> Result<Vec<User>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT user_id, country, device, plan, last_login, num_tasks, email
            FROM users
            ORDER BY rowid ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(UserRow {
                user_id: row.get(0)?,
                country: row.get(1)?,
                device: row.get(2)?,
                plan: row.get(3)?,
                last_login: row.get(4)?,
                num_tasks: row.get(5)?,
                email: row.get(6)?,
            })
        })?;

        let mut users = Vec::new();
        for (idx, row) in rows.enumerate() {
            let row = row?;
            let user_id = normalize_user_id(&row.user_id, "users", idx)?;
            let last_login = row
                .last_login
                .as_deref()
                .map(|ts| parse_timestamp(ts, "users", user_id.as_str()))
                .transpose()?;
            users.push(User {
                user_id,
                country: row.country,
                device: row.device,
                plan: row.plan,
                last_login,
                num_tasks: row.num_tasks,
                email: row.email,
            });
        }
        Ok(users)
    }

    /// Records a campaign name. The name is trimmed and bound as a parameter.
    pub fn insert_campaign(&mut self, name: &str) -> Result<Campaign, DbError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DbError::EmptyCampaignName);
        }
        let campaign = Campaign {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        self.conn.execute(
            "INSERT INTO campaigns (id, name, created_at) VALUES (?, ?, ?)",
            params![
                campaign.id,
                campaign.name,
                format_timestamp(campaign.created_at)
            ],
        )?;
        tracing::debug!(id = %campaign.id, name = %campaign.name, "saved campaign");
        Ok(campaign)
    }

    /// Lists campaigns, oldest first.
    pub fn list_campaigns(&self) -> Result<Vec<Campaign>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, name, created_at
            FROM campaigns
            ORDER BY created_at ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let name: String = row.get(1)?;
            let created_at: String = row.get(2)?;
            Ok((id, name, created_at))
        })?;

        let mut campaigns = Vec::new();
        for row in rows {
            let (id, name, created_at) = row?;
            let created_at = parse_timestamp(&created_at, "campaigns", &id)?;
            campaigns.push(Campaign {
                id,
                name,
                created_at,
            });
        }
        Ok(campaigns)
    }

    /// Replaces `table` with the rows of `audience`.
    ///
    /// The drop, create and inserts run in one transaction, so a failure
    /// leaves the previous contents of `table` untouched.
    pub fn replace_audience_table(
        &mut self,
        table: &str,
        audience: &FinalAudience,
    ) -> Result<usize, DbError> {
        let table = validate_table_name(table)?;
        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!(
            "
            DROP TABLE IF EXISTS \"{table}\";
            CREATE TABLE \"{table}\" (
                user_id TEXT PRIMARY KEY,
                country TEXT,
                device TEXT,
                plan TEXT,
                num_tasks INTEGER,
                email TEXT,
                last_login TEXT,
                event_count INTEGER NOT NULL
            );
            "
        ))?;
        {
            let mut stmt = tx.prepare(&format!(
                "
                INSERT INTO \"{table}\"
                (user_id, country, device, plan, num_tasks, email, last_login, event_count)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "
            ))?;
            for member in audience.members() {
                stmt.execute(params![
                    member.user_id.as_str(),
                    member.country,
                    member.device,
                    member.plan,
                    member.num_tasks,
                    member.email,
                    member.last_login.map(format_timestamp),
                    i64::try_from(member.event_count).unwrap_or(i64::MAX),
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(table, rows = audience.len(), "replaced audience table");
        Ok(audience.len())
    }
}

impl DatasetStore for Database {
    fn load_events(&self) -> Result<Vec<Event>, StoreError> {
        self.list_events()
            .map_err(|err| StoreError::new("events", err))
    }

    fn load_users(&self) -> Result<Vec<User>, StoreError> {
        self.list_users().map_err(|err| StoreError::new("users", err))
    }

    fn load_campaigns(&self) -> Result<Vec<Campaign>, StoreError> {
        self.list_campaigns()
            .map_err(|err| StoreError::new("campaigns", err))
    }
}

impl CampaignStore for Database {
    fn save_campaign(&mut self, name: &str) -> Result<Campaign, PersistError> {
        self.insert_campaign(name).map_err(|err| match err {
            DbError::EmptyCampaignName => PersistError::EmptyName,
            other => PersistError::Storage(Box::new(other)),
        })
    }
}

impl AudienceSink for Database {
    fn sync(&mut self, audience: &FinalAudience, table: &str) -> Result<usize, SyncError> {
        self.replace_audience_table(table, audience)
            .map_err(|err| match err {
                DbError::InvalidTableName { name, reason } => SyncError::InvalidTable {
                    table: name,
                    reason,
                },
                other => SyncError::Storage(Box::new(other)),
            })
    }
}

/// Checks that `name` can be used as a sync destination table.
///
/// Accepts `[A-Za-z_][A-Za-z0-9_]*` up to 64 characters, excluding the
/// store's own tables and SQLite's internal `sqlite_` namespace.
pub fn validate_table_name(name: &str) -> Result<&str, DbError> {
    let reject = |reason| {
        Err(DbError::InvalidTableName {
            name: name.to_string(),
            reason,
        })
    };

    let Some(first) = name.chars().next() else {
        return reject("name is empty");
    };
    if name.len() > MAX_TABLE_NAME_LEN {
        return reject("name is longer than 64 characters");
    }
    if !(first.is_ascii_alphabetic() || first == '_') {
        return reject("name must start with a letter or underscore");
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return reject("name may only contain letters, digits and underscores");
    }
    let lower = name.to_ascii_lowercase();
    if lower.starts_with("sqlite_") {
        return reject("name is in the reserved sqlite_ namespace");
    }
    if RESERVED_TABLES.contains(&lower.as_str()) {
        return reject("name collides with a dataset table");
    }
    Ok(name)
}

#[derive(Debug)]
struct EventRow {
    event_id: String,
    user_id: SqlValue,
    event_type: String,
    device: Option<String>,
    plan_at_event: Option<String>,
    timestamp: String,
}

#[derive(Debug)]
struct UserRow {
    user_id: SqlValue,
    country: Option<String>,
    device: Option<String>,
    plan: Option<String>,
    last_login: Option<String>,
    num_tasks: Option<i64>,
    email: Option<String>,
}

fn normalize_user_id(value: &SqlValue, table: &'static str, row: usize) -> Result<UserId, DbError> {
    let normalized = match value {
        SqlValue::Integer(id) => Ok(UserId::from_i64(*id)),
        SqlValue::Real(id) => UserId::from_f64(*id),
        SqlValue::Text(id) => UserId::new(id.as_str()),
        SqlValue::Null => Err(SegmentError::TypeMismatch {
            value: "NULL".to_string(),
            reason: "missing identifier",
        }),
        SqlValue::Blob(bytes) => Err(SegmentError::TypeMismatch {
            value: format!("<{} byte blob>", bytes.len()),
            reason: "unsupported identifier type",
        }),
    };
    normalized.map_err(|source| DbError::InvalidUserId { table, row, source })
}

fn parse_timestamp(timestamp: &str, table: &'static str, key: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            table,
            key: key.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
