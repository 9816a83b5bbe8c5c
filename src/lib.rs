//! Listing Sync - keeps a local copy of a paginated remote listing
//!
//! A sync run fetches every listing page with bounded concurrency, merges the
//! results into the stored record set without losing user-owned flags, then
//! fills in each record's classification. Progress is observable through a
//! `tokio::sync::watch` channel.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{SyncError, SyncOptions, SyncPipeline, SyncSummary};
pub use domain::{Entity, EntityId, SyncProgress, SyncStatus};
