//! Repository interfaces for the local record set and label set

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::entity::Entity;

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn load_records(&self) -> Result<Vec<Entity>>;
    /// Replace the stored record set with `records`, keeping their order
    async fn save_records(&self, records: &[Entity]) -> Result<()>;
}

#[async_trait]
pub trait LabelStore: Send + Sync {
    async fn load_labels(&self) -> Result<Vec<String>>;
    async fn save_labels(&self, labels: &[String]) -> Result<()>;
}
