//! Filter sets: one rule group describing a candidate segment.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Event;
use crate::types::SegmentError;

/// Default minimum number of qualifying events per user.
pub const DEFAULT_MIN_EVENT_COUNT: u64 = 5;

/// Default recency window in days.
pub const DEFAULT_ACTIVE_WITHIN_DAYS: u32 = 30;

/// Polarity of the event-type predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventTypeMode {
    /// Keep events whose type is selected.
    #[default]
    Include,
    /// Keep events whose type is not selected.
    Exclude,
}

impl EventTypeMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Include => "include",
            Self::Exclude => "exclude",
        }
    }
}

impl fmt::Display for EventTypeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EventTypeMode {
    type Err = SegmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "include" => Ok(Self::Include),
            "exclude" => Ok(Self::Exclude),
            _ => Err(SegmentError::UnknownValue {
                kind: "event type mode",
                value: s.to_string(),
            }),
        }
    }
}

/// An inclusive timestamp window.
///
/// An inverted range (start after end) is accepted and contains nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// A range covering every representable timestamp.
    pub const fn unbounded() -> Self {
        Self {
            start: DateTime::<Utc>::MIN_UTC,
            end: DateTime::<Utc>::MAX_UTC,
        }
    }

    /// Builds a range from calendar dates, each taken at midnight UTC.
    ///
    /// The end bound is midnight at the start of `end`, so events later on the
    /// end date fall outside the range.
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: midnight_utc(start),
            end: midnight_utc(end),
        }
    }

    /// The smallest range containing every given timestamp.
    pub fn spanning<I>(timestamps: I) -> Option<Self>
    where
        I: IntoIterator<Item = DateTime<Utc>>,
    {
        timestamps.into_iter().fold(None, |range, ts| match range {
            None => Some(Self::new(ts, ts)),
            Some(Self { start, end }) => Some(Self::new(start.min(ts), end.max(ts))),
        })
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }

    pub fn is_inverted(&self) -> bool {
        self.start > self.end
    }
}

/// Parses a range bound given either as `YYYY-MM-DD` or as RFC 3339.
pub fn parse_date_bound(value: &str) -> Result<DateTime<Utc>, SegmentError> {
    let trimmed = value.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(timestamp.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map(midnight_utc)
        .map_err(|_| SegmentError::InvalidDate {
            value: value.to_string(),
        })
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// One rule group over events and users.
///
/// Empty `event_types`, `devices` or `plans` place no constraint on that
/// dimension. `mode` only matters when `event_types` is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    pub mode: EventTypeMode,
    pub event_types: BTreeSet<String>,
    pub devices: BTreeSet<String>,
    pub plans: BTreeSet<String>,
    pub date_range: DateRange,
    pub min_event_count: u64,
    pub active_within_days: u32,
}

impl FilterSet {
    /// Creates a filter set with no type/device/plan constraints and default thresholds.
    pub fn new(date_range: DateRange) -> Self {
        Self {
            mode: EventTypeMode::Include,
            event_types: BTreeSet::new(),
            devices: BTreeSet::new(),
            plans: BTreeSet::new(),
            date_range,
            min_event_count: DEFAULT_MIN_EVENT_COUNT,
            active_within_days: DEFAULT_ACTIVE_WITHIN_DAYS,
        }
    }

    /// Strict check for callers that reject inverted date ranges.
    ///
    /// Evaluation never calls this; it treats an inverted range as empty.
    pub fn validate(&self) -> Result<(), SegmentError> {
        if self.date_range.is_inverted() {
            return Err(SegmentError::InvalidDateRange {
                start: self.date_range.start,
                end: self.date_range.end,
            });
        }
        Ok(())
    }

    pub fn matches_event_type(&self, event: &Event) -> bool {
        if self.event_types.is_empty() {
            return true;
        }
        let selected = self.event_types.contains(&event.event_type);
        match self.mode {
            EventTypeMode::Include => selected,
            EventTypeMode::Exclude => !selected,
        }
    }

    pub fn matches_device(&self, event: &Event) -> bool {
        matches_selection(&self.devices, event.device.as_deref())
    }

    pub fn matches_plan(&self, event: &Event) -> bool {
        matches_selection(&self.plans, event.plan_at_event.as_deref())
    }

    /// Applies the event-level predicates in order: type, device, plan, date.
    pub fn matches_event(&self, event: &Event) -> bool {
        self.matches_event_type(event)
            && self.matches_device(event)
            && self.matches_plan(event)
            && self.date_range.contains(event.timestamp)
    }
}

// A missing value never matches a non-empty selection.
fn matches_selection(selection: &BTreeSet<String>, value: Option<&str>) -> bool {
    selection.is_empty() || value.is_some_and(|v| selection.contains(v))
}

/// Human-readable rules summary.
impl fmt::Display for FilterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Event Type Mode: {}", self.mode)?;
        writeln!(f, "Event Types: {}", list_or_all(&self.event_types))?;
        writeln!(f, "Devices: {}", list_or_all(&self.devices))?;
        writeln!(f, "Plans: {}", list_or_all(&self.plans))?;
        writeln!(
            f,
            "Event Date Range: {} to {}",
            format_bound(self.date_range.start),
            format_bound(self.date_range.end)
        )?;
        writeln!(f, "Min Event Count: {}", self.min_event_count)?;
        write!(f, "Active in Last Days: {}", self.active_within_days)
    }
}

fn list_or_all(values: &BTreeSet<String>) -> String {
    if values.is_empty() {
        "All".to_string()
    } else {
        values.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
    }
}

fn format_bound(bound: DateTime<Utc>) -> String {
    if bound == DateTime::<Utc>::MIN_UTC || bound == DateTime::<Utc>::MAX_UTC {
        "*".to_string()
    } else if bound.time() == NaiveTime::MIN {
        bound.format("%Y-%m-%d").to_string()
    } else {
        bound.to_rfc3339()
    }
}
