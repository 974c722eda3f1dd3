//! Combination of candidate audiences into the final audience.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::evaluate::{AudienceMember, CandidateAudience};
use crate::types::{SegmentError, UserId};

/// How candidate audiences are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombineMode {
    /// Users present in every candidate.
    #[default]
    And,
    /// Users present in any candidate.
    Or,
}

impl CombineMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

impl fmt::Display for CombineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CombineMode {
    type Err = SegmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "and" => Ok(Self::And),
            "or" => Ok(Self::Or),
            _ => Err(SegmentError::UnknownValue {
                kind: "combine mode",
                value: s.to_string(),
            }),
        }
    }
}

/// A user in the final audience with one resolved value per display attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalMember {
    pub user_id: UserId,
    pub country: String,
    pub device: String,
    pub plan: String,
    pub num_tasks: Option<i64>,
    pub email: String,
    pub last_login: Option<DateTime<Utc>>,
    /// Qualifying event count from the earliest contributing filter set.
    pub event_count: u64,
    /// Positions of the filter sets whose candidates contain this user.
    pub matched_sets: Vec<usize>,
}

/// The combined audience of one evaluation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalAudience {
    mode: CombineMode,
    members: Vec<FinalMember>,
}

impl FinalAudience {
    pub const fn mode(&self) -> CombineMode {
        self.mode
    }

    pub fn members(&self) -> &[FinalMember] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn user_ids(&self) -> impl Iterator<Item = &UserId> {
        self.members.iter().map(|m| &m.user_id)
    }

    pub fn get(&self, user_id: &UserId) -> Option<&FinalMember> {
        self.members.iter().find(|m| &m.user_id == user_id)
    }
}

/// Rows of one user across candidates, as (set position, row) in set order.
type Contributions<'a> = Vec<(usize, &'a AudienceMember)>;

/// Combines candidate audiences.
///
/// `And` folds inner joins left to right and keeps the first candidate's row
/// order. `Or` unions candidates in sequence order and keeps the first row
/// seen for each user.
pub fn combine(
    candidates: &[CandidateAudience],
    mode: CombineMode,
) -> Result<FinalAudience, SegmentError> {
    let Some((first, rest)) = candidates.split_first() else {
        return Err(SegmentError::EmptyCombinationInput);
    };

    let members = match mode {
        CombineMode::And => intersect(first, rest)
            .iter()
            .map(|rows| resolve(rows, rows))
            .collect(),
        CombineMode::Or => union(candidates)
            .iter()
            .map(|rows| resolve(&rows[..1], rows))
            .collect(),
    };
    let audience = FinalAudience { mode, members };

    tracing::debug!(
        %mode,
        candidates = candidates.len(),
        matched = audience.len(),
        "combined candidate audiences"
    );
    Ok(audience)
}

fn intersect<'a>(
    first: &'a CandidateAudience,
    rest: &'a [CandidateAudience],
) -> Vec<Contributions<'a>> {
    let mut rows: Vec<Contributions<'a>> =
        first.members().iter().map(|m| vec![(0, m)]).collect();

    for (offset, candidate) in rest.iter().enumerate() {
        let index = candidate.by_user_id();
        rows.retain_mut(|row| {
            let (_, head) = row[0];
            match index.get(&head.user.user_id) {
                Some(member) => {
                    row.push((offset + 1, *member));
                    true
                }
                None => false,
            }
        });
    }
    rows
}

fn union(candidates: &[CandidateAudience]) -> Vec<Contributions<'_>> {
    let mut rows: Vec<Contributions<'_>> = Vec::new();
    let mut positions: HashMap<&UserId, usize> = HashMap::new();

    for (set, candidate) in candidates.iter().enumerate() {
        for member in candidate.members() {
            match positions.entry(&member.user.user_id) {
                Entry::Occupied(entry) => rows[*entry.get()].push((set, member)),
                Entry::Vacant(entry) => {
                    entry.insert(rows.len());
                    rows.push(vec![(set, member)]);
                }
            }
        }
    }
    rows
}

/// Picks one value per display attribute.
///
/// Each attribute comes from the earliest row in `sources` that carries it,
/// falling back to empty. `event_count` and `last_login` come from the
/// earliest source row. `all` only feeds `matched_sets`.
fn resolve(
    sources: &[(usize, &AudienceMember)],
    all: &[(usize, &AudienceMember)],
) -> FinalMember {
    let (_, primary) = sources[0];
    let pick = |field: fn(&AudienceMember) -> Option<&String>| {
        sources
            .iter()
            .find_map(|(_, member)| field(*member))
            .cloned()
            .unwrap_or_default()
    };

    FinalMember {
        user_id: primary.user.user_id.clone(),
        country: pick(|m| m.user.country.as_ref()),
        device: pick(|m| m.user.device.as_ref()),
        plan: pick(|m| m.user.plan.as_ref()),
        num_tasks: sources.iter().find_map(|(_, m)| m.user.num_tasks),
        email: pick(|m| m.user.email.as_ref()),
        last_login: primary.user.last_login,
        event_count: primary.event_count,
        matched_sets: all.iter().map(|(set, _)| *set).collect(),
    }
}
