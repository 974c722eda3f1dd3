//! Campaign definitions: a named, ordered list of rule groups.
//!
//! A definition is plain data deserialized from a campaign file. It becomes a
//! list of [`FilterSet`]s once the dataset's event span is known, because
//! rule groups without explicit dates default to the full span of events.

use serde::{Deserialize, Serialize};

use crate::combine::CombineMode;
use crate::filter::{
    DEFAULT_ACTIVE_WITHIN_DAYS, DEFAULT_MIN_EVENT_COUNT, DateRange, EventTypeMode, FilterSet,
    parse_date_bound,
};
use crate::types::SegmentError;

/// A campaign as written in a campaign file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignDefinition {
    pub name: String,
    /// Falls back to the configured default when absent.
    #[serde(default)]
    pub combine: Option<CombineMode>,
    #[serde(default)]
    pub sets: Vec<RuleConfig>,
}

/// One rule group as written in a campaign file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    #[serde(default)]
    pub mode: EventTypeMode,
    #[serde(default)]
    pub event_types: Vec<String>,
    #[serde(default)]
    pub devices: Vec<String>,
    #[serde(default)]
    pub plans: Vec<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default = "default_min_event_count")]
    pub min_event_count: u64,
    #[serde(default = "default_active_within_days")]
    pub active_within_days: u32,
}

const fn default_min_event_count() -> u64 {
    DEFAULT_MIN_EVENT_COUNT
}

const fn default_active_within_days() -> u32 {
    DEFAULT_ACTIVE_WITHIN_DAYS
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            mode: EventTypeMode::default(),
            event_types: Vec::new(),
            devices: Vec::new(),
            plans: Vec::new(),
            start: None,
            end: None,
            min_event_count: DEFAULT_MIN_EVENT_COUNT,
            active_within_days: DEFAULT_ACTIVE_WITHIN_DAYS,
        }
    }
}

impl RuleConfig {
    /// Builds the filter set, filling missing dates from `span`.
    pub fn to_filter_set(&self, span: DateRange) -> Result<FilterSet, SegmentError> {
        let start = match self.start.as_deref() {
            Some(value) => parse_date_bound(value)?,
            None => span.start,
        };
        let end = match self.end.as_deref() {
            Some(value) => parse_date_bound(value)?,
            None => span.end,
        };
        Ok(FilterSet {
            mode: self.mode,
            event_types: self.event_types.iter().cloned().collect(),
            devices: self.devices.iter().cloned().collect(),
            plans: self.plans.iter().cloned().collect(),
            date_range: DateRange::new(start, end),
            min_event_count: self.min_event_count,
            active_within_days: self.active_within_days,
        })
    }
}

impl CampaignDefinition {
    /// Builds every filter set in file order.
    ///
    /// `span` is the event span of the dataset; with no events, missing
    /// dates are unbounded.
    pub fn filter_sets(&self, span: Option<DateRange>) -> Result<Vec<FilterSet>, SegmentError> {
        let span = span.unwrap_or_else(DateRange::unbounded);
        self.sets
            .iter()
            .map(|rule| rule.to_filter_set(span))
            .collect()
    }

    /// The combine mode of this campaign, or `default` if unset.
    pub fn combine_mode(&self, default: CombineMode) -> CombineMode {
        self.combine.unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{TimeZone, Utc};

    fn span() -> DateRange {
        DateRange::new(
            Utc.with_ymd_and_hms(2024, 1, 3, 8, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 28, 17, 0, 0).unwrap(),
        )
    }

    #[test]
    fn missing_fields_use_defaults() {
        let json = r#"{"name": "Spring", "sets": [{}]}"#;
        let campaign: CampaignDefinition = serde_json::from_str(json).unwrap();

        let sets = campaign.filter_sets(Some(span())).unwrap();

        assert_eq!(sets, vec![FilterSet::new(span())]);
        assert_eq!(campaign.combine_mode(CombineMode::Or), CombineMode::Or);
    }

    #[test]
    fn explicit_fields_override_defaults() {
        let json = r#"{
            "name": "Spring",
            "combine": "or",
            "sets": [{
                "mode": "exclude",
                "event_types": ["view"],
                "devices": ["web", "mobile"],
                "plans": ["pro"],
                "start": "2024-01-10",
                "end": "2024-01-20T12:00:00Z",
                "min_event_count": 0,
                "active_within_days": 7
            }]
        }"#;
        let campaign: CampaignDefinition = serde_json::from_str(json).unwrap();

        let set = &campaign.filter_sets(Some(span())).unwrap()[0];

        assert_eq!(set.mode, EventTypeMode::Exclude);
        assert_eq!(set.devices.len(), 2);
        assert_eq!(
            set.date_range,
            DateRange::new(
                Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 1, 20, 12, 0, 0).unwrap(),
            )
        );
        assert_eq!(set.min_event_count, 0);
        assert_eq!(set.active_within_days, 7);
        assert_eq!(campaign.combine_mode(CombineMode::And), CombineMode::Or);
    }

    #[test]
    fn missing_dates_without_events_are_unbounded() {
        let campaign = CampaignDefinition {
            name: "Empty".to_string(),
            combine: None,
            sets: vec![RuleConfig::default()],
        };

        let sets = campaign.filter_sets(None).unwrap();

        assert_eq!(sets[0].date_range, DateRange::unbounded());
    }

    #[test]
    fn bad_date_is_reported() {
        let campaign = CampaignDefinition {
            name: "Bad".to_string(),
            combine: None,
            sets: vec![RuleConfig {
                start: Some("01/02/2024".to_string()),
                ..RuleConfig::default()
            }],
        };

        assert!(matches!(
            campaign.filter_sets(Some(span())),
            Err(SegmentError::InvalidDate { .. })
        ));
    }
}
