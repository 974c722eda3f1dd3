//! Audience breakdowns: user counts per attribute value and summary figures.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::combine::{FinalAudience, FinalMember};
use crate::types::SegmentError;

/// Attribute used to group the final audience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    #[default]
    Country,
    Device,
    Plan,
}

impl Dimension {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Country => "country",
            Self::Device => "device",
            Self::Plan => "plan",
        }
    }

    fn value_of(self, member: &FinalMember) -> &str {
        match self {
            Self::Country => &member.country,
            Self::Device => &member.device,
            Self::Plan => &member.plan,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = SegmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "country" => Ok(Self::Country),
            "device" => Ok(Self::Device),
            "plan" => Ok(Self::Plan),
            _ => Err(SegmentError::UnknownValue {
                kind: "dimension",
                value: s.to_string(),
            }),
        }
    }
}

/// Number of users sharing one attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakdownRow {
    pub value: String,
    pub users: usize,
}

/// Counts users per value of `dimension`, largest first, keeping `top_n` rows.
///
/// Users with an empty value are not counted. Ties are ordered by value.
pub fn breakdown(
    audience: &FinalAudience,
    dimension: Dimension,
    top_n: usize,
) -> Vec<BreakdownRow> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for member in audience.members() {
        let value = dimension.value_of(member);
        if !value.is_empty() {
            *counts.entry(value).or_insert(0) += 1;
        }
    }

    let mut rows: Vec<BreakdownRow> = counts
        .into_iter()
        .map(|(value, users)| BreakdownRow {
            value: value.to_string(),
            users,
        })
        .collect();
    rows.sort_by(|a, b| b.users.cmp(&a.users).then_with(|| a.value.cmp(&b.value)));
    rows.truncate(top_n);
    rows
}

/// Headline figures for a final audience.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudienceSummary {
    pub matching_users: usize,
    /// Mean `num_tasks` over users that have a value.
    pub mean_num_tasks: Option<f64>,
}

impl AudienceSummary {
    #[expect(
        clippy::cast_precision_loss,
        reason = "task totals and user counts stay far below 2^52"
    )]
    pub fn of(audience: &FinalAudience) -> Self {
        let tasks: Vec<i64> = audience
            .members()
            .iter()
            .filter_map(|m| m.num_tasks)
            .collect();
        let mean_num_tasks = if tasks.is_empty() {
            None
        } else {
            let total: i64 = tasks.iter().sum();
            Some(total as f64 / tasks.len() as f64)
        };
        Self {
            matching_users: audience.len(),
            mean_num_tasks,
        }
    }
}
