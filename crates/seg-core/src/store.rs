//! Dataset store seam, pass snapshots, and the explicit load cache.
//!
//! Storage backends implement [`DatasetStore`] (reads), [`CampaignStore`]
//! (campaign persistence) and [`AudienceSink`] (audience sync). The engine
//! itself only ever sees a [`DatasetSnapshot`], taken once at the start of a
//! pass and never re-read.

use std::error::Error as StdError;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::combine::FinalAudience;
use crate::filter::DateRange;
use crate::model::{Event, User};

/// Boxed error from a storage backend.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Failure to load one of the dataset relations.
#[derive(Debug, Error)]
#[error("failed to load {relation}")]
pub struct StoreError {
    pub relation: &'static str,
    #[source]
    pub source: BoxError,
}

impl StoreError {
    pub fn new(relation: &'static str, source: impl Into<BoxError>) -> Self {
        Self {
            relation,
            source: source.into(),
        }
    }
}

/// Failure to sync a final audience to a destination.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The destination table name is not an acceptable identifier.
    #[error("invalid destination table {table:?}: {reason}")]
    InvalidTable { table: String, reason: &'static str },
    /// The backend failed; the previous destination contents are intact.
    #[error("sync failed")]
    Storage(#[source] BoxError),
}

/// Failure to persist a campaign.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("campaign name cannot be empty")]
    EmptyName,
    #[error("failed to save campaign")]
    Storage(#[source] BoxError),
}

/// A saved campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Read access to the three dataset relations.
pub trait DatasetStore {
    fn load_events(&self) -> Result<Vec<Event>, StoreError>;

    fn load_users(&self) -> Result<Vec<User>, StoreError>;

    fn load_campaigns(&self) -> Result<Vec<Campaign>, StoreError>;
}

/// Campaign-name persistence.
///
/// Implementations must bind the name as a query parameter.
pub trait CampaignStore {
    fn save_campaign(&mut self, name: &str) -> Result<Campaign, PersistError>;
}

/// Destination for a final audience.
///
/// Syncing replaces the destination contents; a failed sync leaves the
/// previously synced contents in place.
pub trait AudienceSink {
    fn sync(&mut self, audience: &FinalAudience, table: &str) -> Result<usize, SyncError>;
}

/// Immutable view of events and users for one evaluation pass.
///
/// Cloning is cheap; clones share the same rows.
#[derive(Debug, Clone, Default)]
pub struct DatasetSnapshot {
    events: Arc<[Event]>,
    users: Arc<[User]>,
}

impl DatasetSnapshot {
    pub fn new(events: Vec<Event>, users: Vec<User>) -> Self {
        Self {
            events: events.into(),
            users: users.into(),
        }
    }

    /// Loads both relations from a store.
    pub fn load<S: DatasetStore + ?Sized>(store: &S) -> Result<Self, StoreError> {
        Ok(Self::new(store.load_events()?, store.load_users()?))
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    /// Range from the earliest to the latest event, if there are events.
    pub fn event_span(&self) -> Option<DateRange> {
        DateRange::spanning(self.events.iter().map(|event| event.timestamp))
    }
}

/// Actions that make cached loads stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEvent {
    /// A campaign was saved; every cached load is dropped.
    CampaignSaved,
    /// Events or users were (re)imported; campaigns stay cached.
    DatasetsImported,
}

/// A store wrapper that caches loads until explicitly invalidated.
#[derive(Debug)]
pub struct CachedStore<S> {
    store: S,
    snapshot: Option<DatasetSnapshot>,
    campaigns: Option<Arc<[Campaign]>>,
}

impl<S> CachedStore<S> {
    pub const fn new(store: S) -> Self {
        Self {
            store,
            snapshot: None,
            campaigns: None,
        }
    }

    pub const fn inner(&self) -> &S {
        &self.store
    }

    /// Mutable access to the wrapped store.
    ///
    /// Writes made through this handle do not invalidate the cache; call
    /// [`Self::invalidate_after`] afterwards.
    pub const fn inner_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn invalidate_after(&mut self, event: CacheEvent) {
        tracing::debug!(?event, "invalidating dataset cache");
        match event {
            CacheEvent::CampaignSaved => {
                self.snapshot = None;
                self.campaigns = None;
            }
            CacheEvent::DatasetsImported => self.snapshot = None,
        }
    }
}

impl<S: DatasetStore> CachedStore<S> {
    /// Returns the cached snapshot, loading it on first use.
    pub fn snapshot(&mut self) -> Result<DatasetSnapshot, StoreError> {
        if let Some(snapshot) = &self.snapshot {
            return Ok(snapshot.clone());
        }
        let snapshot = DatasetSnapshot::load(&self.store)?;
        tracing::debug!(
            events = snapshot.events().len(),
            users = snapshot.users().len(),
            "loaded dataset snapshot"
        );
        self.snapshot = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Returns the cached campaigns, loading them on first use.
    pub fn campaigns(&mut self) -> Result<Arc<[Campaign]>, StoreError> {
        if let Some(campaigns) = &self.campaigns {
            return Ok(Arc::clone(campaigns));
        }
        let campaigns: Arc<[Campaign]> = self.store.load_campaigns()?.into();
        self.campaigns = Some(Arc::clone(&campaigns));
        Ok(campaigns)
    }
}

impl<S: CampaignStore> CachedStore<S> {
    /// Saves a campaign and invalidates the cache.
    pub fn save_campaign(&mut self, name: &str) -> Result<Campaign, PersistError> {
        let campaign = self.store.save_campaign(name)?;
        self.invalidate_after(CacheEvent::CampaignSaved);
        Ok(campaign)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::{Cell, RefCell};

    use chrono::TimeZone;

    use crate::types::UserId;

    #[derive(Default)]
    struct CountingStore {
        event_loads: Cell<usize>,
        campaign_loads: Cell<usize>,
        campaigns: RefCell<Vec<Campaign>>,
    }

    impl DatasetStore for CountingStore {
        fn load_events(&self) -> Result<Vec<Event>, StoreError> {
            self.event_loads.set(self.event_loads.get() + 1);
            Ok(vec![Event {
                event_id: "e1".to_string(),
                user_id: UserId::new("1").unwrap(),
                event_type: "click".to_string(),
                device: None,
                plan_at_event: None,
                timestamp: Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap(),
            }])
        }

        fn load_users(&self) -> Result<Vec<User>, StoreError> {
            Ok(vec![User::new(UserId::new("1").unwrap(), None)])
        }

        fn load_campaigns(&self) -> Result<Vec<Campaign>, StoreError> {
            self.campaign_loads.set(self.campaign_loads.get() + 1);
            Ok(self.campaigns.borrow().clone())
        }
    }

    impl CampaignStore for CountingStore {
        fn save_campaign(&mut self, name: &str) -> Result<Campaign, PersistError> {
            if name.trim().is_empty() {
                return Err(PersistError::EmptyName);
            }
            let campaign = Campaign {
                id: format!("c{}", self.campaigns.borrow().len() + 1),
                name: name.to_string(),
                created_at: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
            };
            self.campaigns.borrow_mut().push(campaign.clone());
            Ok(campaign)
        }
    }

    #[test]
    fn snapshot_is_loaded_once_until_invalidated() {
        let mut cached = CachedStore::new(CountingStore::default());

        cached.snapshot().unwrap();
        cached.snapshot().unwrap();
        assert_eq!(cached.inner().event_loads.get(), 1);

        cached.invalidate_after(CacheEvent::DatasetsImported);
        cached.snapshot().unwrap();
        assert_eq!(cached.inner().event_loads.get(), 2);
    }

    #[test]
    fn import_keeps_campaigns_cached() {
        let mut cached = CachedStore::new(CountingStore::default());

        cached.campaigns().unwrap();
        cached.invalidate_after(CacheEvent::DatasetsImported);
        cached.campaigns().unwrap();

        assert_eq!(cached.inner().campaign_loads.get(), 1);
    }

    #[test]
    fn saving_a_campaign_refreshes_the_campaign_list() {
        let mut cached = CachedStore::new(CountingStore::default());
        assert!(cached.campaigns().unwrap().is_empty());
        cached.snapshot().unwrap();

        cached.save_campaign("Spring launch").unwrap();

        let campaigns = cached.campaigns().unwrap();
        assert_eq!(campaigns.len(), 1);
        assert_eq!(campaigns[0].name, "Spring launch");
        cached.snapshot().unwrap();
        assert_eq!(cached.inner().event_loads.get(), 2);
    }

    #[test]
    fn failed_save_keeps_cache() {
        let mut cached = CachedStore::new(CountingStore::default());
        cached.campaigns().unwrap();

        assert!(matches!(
            cached.save_campaign("  "),
            Err(PersistError::EmptyName)
        ));
        cached.campaigns().unwrap();
        assert_eq!(cached.inner().campaign_loads.get(), 1);
    }

    #[test]
    fn snapshot_clones_share_rows() {
        let snapshot = DatasetSnapshot::load(&CountingStore::default()).unwrap();
        let clone = snapshot.clone();
        assert!(std::ptr::eq(snapshot.events(), clone.events()));
    }

    #[test]
    fn event_span_covers_loaded_events() {
        let snapshot = DatasetSnapshot::load(&CountingStore::default()).unwrap();
        let day = Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap();
        assert_eq!(snapshot.event_span(), Some(DateRange::new(day, day)));
        assert_eq!(DatasetSnapshot::default().event_span(), None);
    }
}
