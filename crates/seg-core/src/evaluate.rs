//! Set evaluation: turns one filter set into a candidate audience.
//!
//! # Algorithm Summary
//!
//! 1. Narrow events by type (with include/exclude polarity), device, plan and date
//! 2. Count surviving events per user
//! 3. Left-join every user against the counts (missing counts are zero)
//! 4. Keep users meeting the minimum count
//! 5. Intersect with users who logged in within the recency window

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use serde::Serialize;

use crate::filter::FilterSet;
use crate::model::{Event, User};
use crate::store::DatasetSnapshot;
use crate::types::UserId;

/// A user that passed one filter set, with the number of qualifying events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudienceMember {
    #[serde(flatten)]
    pub user: User,
    pub event_count: u64,
}

/// The users passing a single filter set.
///
/// Rows follow the order of the users relation and never repeat a user id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CandidateAudience {
    members: Vec<AudienceMember>,
}

impl CandidateAudience {
    /// Builds an audience from rows, keeping the first row for each user id.
    pub fn from_members(members: impl IntoIterator<Item = AudienceMember>) -> Self {
        let mut seen = HashSet::new();
        let members = members
            .into_iter()
            .filter(|member| seen.insert(member.user.user_id.clone()))
            .collect();
        Self { members }
    }

    pub fn members(&self) -> &[AudienceMember] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, user_id: &UserId) -> bool {
        self.members.iter().any(|m| &m.user.user_id == user_id)
    }

    pub fn user_ids(&self) -> impl Iterator<Item = &UserId> {
        self.members.iter().map(|m| &m.user.user_id)
    }

    /// Index of members by user id.
    pub(crate) fn by_user_id(&self) -> HashMap<&UserId, &AudienceMember> {
        self.members.iter().map(|m| (&m.user.user_id, m)).collect()
    }
}

/// Evaluates a filter set using the current time as the recency reference.
pub fn evaluate(events: &[Event], users: &[User], filter: &FilterSet) -> CandidateAudience {
    evaluate_at(events, users, filter, Utc::now())
}

/// Evaluates a filter set against a fixed evaluation instant.
pub fn evaluate_at(
    events: &[Event],
    users: &[User],
    filter: &FilterSet,
    now: DateTime<Utc>,
) -> CandidateAudience {
    if filter.date_range.is_inverted() {
        tracing::warn!(
            start = %filter.date_range.start,
            end = %filter.date_range.end,
            "date range is inverted; no events qualify"
        );
    }

    // Users with no surviving events are absent here, not zero.
    let mut event_counts: HashMap<&UserId, u64> = HashMap::new();
    for event in events.iter().filter(|event| filter.matches_event(event)) {
        *event_counts.entry(&event.user_id).or_insert(0) += 1;
    }

    let cutoff = recency_cutoff(now, filter.active_within_days);
    let audience = CandidateAudience::from_members(
        users
            .iter()
            .filter_map(|user| {
                let event_count = event_counts.get(&user.user_id).copied().unwrap_or(0);
                (event_count >= filter.min_event_count).then_some((user, event_count))
            })
            .filter(|(user, _)| user.logged_in_since(cutoff))
            .map(|(user, event_count)| AudienceMember {
                user: user.clone(),
                event_count,
            }),
    );

    tracing::debug!(
        events = events.len(),
        users = users.len(),
        users_with_events = event_counts.len(),
        matched = audience.len(),
        "evaluated filter set"
    );
    audience
}

/// Evaluates every filter set of a pass against one snapshot.
///
/// Sets are independent, so they run in parallel; results keep input order.
pub fn evaluate_all(
    snapshot: &DatasetSnapshot,
    filters: &[FilterSet],
    now: DateTime<Utc>,
) -> Vec<CandidateAudience> {
    filters
        .par_iter()
        .map(|filter| evaluate_at(snapshot.events(), snapshot.users(), filter, now))
        .collect()
}

/// Earliest login that still counts as recent.
fn recency_cutoff(now: DateTime<Utc>, active_within_days: u32) -> DateTime<Utc> {
    now.checked_sub_signed(Duration::days(i64::from(active_within_days)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
