//! Domain module - entities, observable sync state and collaborator traits
//!
//! Nothing in here performs I/O. Remote sources and persistence are reached
//! through the traits in [`services`] and [`repositories`].

pub mod entity;
pub mod label;
pub mod progress;
pub mod repositories;
pub mod services;

pub use entity::{Entity, EntityId, FetchedEntity, RecordSet};
pub use label::LabelSet;
pub use progress::{SyncProgress, SyncStatus};
