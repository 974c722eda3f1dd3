//! Core audience segmentation logic.
//!
//! This crate contains:
//! - Filter sets: rule groups over events and users
//! - Evaluation: turning one filter set into a candidate audience
//! - Combination: AND/OR merging of candidates into the final audience
//! - Export: CSV serialization of the final audience
//! - Store seams: dataset loading, caching, campaign persistence and sync

pub mod breakdown;
pub mod campaign;
mod combine;
mod evaluate;
pub mod export;
pub mod filter;
mod model;
pub mod store;
mod types;

pub use breakdown::{AudienceSummary, BreakdownRow, Dimension, breakdown};
pub use campaign::{CampaignDefinition, RuleConfig};
pub use combine::{CombineMode, FinalAudience, FinalMember, combine};
pub use evaluate::{AudienceMember, CandidateAudience, evaluate, evaluate_all, evaluate_at};
pub use filter::{DateRange, EventTypeMode, FilterSet};
pub use model::{Event, User};
pub use store::{
    AudienceSink, CacheEvent, CachedStore, Campaign, CampaignStore, DatasetSnapshot,
    DatasetStore, PersistError, StoreError, SyncError,
};
pub use types::{SegmentError, UserId};
