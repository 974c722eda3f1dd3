//! Dataset relations: events and users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// A single user activity record.
///
/// Events reference users by id only; an event whose user is missing from the
/// users relation is kept and simply never joins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub user_id: UserId,
    pub event_type: String,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub plan_at_event: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// A point-in-time snapshot of a user's attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub plan: Option<String>,
    /// Most recent login. Users that never logged in are never "recent".
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default)]
    pub num_tasks: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
}

impl User {
    /// Creates a user with only an id and login time set.
    pub fn new(user_id: UserId, last_login: Option<DateTime<Utc>>) -> Self {
        Self {
            user_id,
            country: None,
            device: None,
            plan: None,
            last_login,
            num_tasks: None,
            email: None,
        }
    }

    /// Whether the user logged in at or after `cutoff`.
    pub fn logged_in_since(&self, cutoff: DateTime<Utc>) -> bool {
        self.last_login.is_some_and(|login| login >= cutoff)
    }
}
