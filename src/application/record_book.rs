//! In-memory record set with write-through persistence

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::domain::entity::{Entity, EntityId, FetchedEntity, RecordSet};
use crate::domain::repositories::RecordStore;

/// Owns the live record set and writes it back after every mutation.
///
/// Mutations hold the lock until the write completes, so stored state always
/// matches the order mutations were applied in.
pub struct RecordBook {
    records: Mutex<RecordSet>,
    store: Arc<dyn RecordStore>,
}

impl RecordBook {
    /// Read the stored record set
    pub async fn load(store: Arc<dyn RecordStore>) -> Result<Self> {
        let stored = store
            .load_records()
            .await
            .context("Failed to load record set")?;
        info!("Loaded {} records from storage", stored.len());
        Ok(Self {
            records: Mutex::new(RecordSet::from(stored)),
            store,
        })
    }

    pub async fn snapshot(&self) -> Vec<Entity> {
        self.records.lock().await.as_slice().to_vec()
    }

    pub async fn get(&self, id: EntityId) -> Option<Entity> {
        self.records.lock().await.get(id).cloned()
    }

    pub async fn ids_needing_enrichment(&self) -> Vec<EntityId> {
        self.records.lock().await.ids_needing_enrichment()
    }

    /// Start a new generation from the first fetched page.
    ///
    /// `fetched` is merged against the live set into a fresh set, which is
    /// persisted and only then swapped in. The old set is handed back for
    /// merging the remaining pages. If the write fails the live set is left
    /// as it was.
    pub async fn start_generation(&self, fetched: Vec<FetchedEntity>) -> Result<RecordSet> {
        let mut records = self.records.lock().await;
        let mut next = RecordSet::new();
        next.merge_page(fetched, &records);
        self.store
            .save_records(next.as_slice())
            .await
            .context("Failed to persist record set")?;
        debug!("Started new record set with {} records", next.len());
        Ok(std::mem::replace(&mut *records, next))
    }

    /// Apply `f` to the live set. When it returns `Some`, the set is persisted
    /// before this call returns; `None` means nothing changed.
    pub async fn mutate<T, F>(&self, f: F) -> Result<Option<T>>
    where
        F: FnOnce(&mut RecordSet) -> Option<T>,
    {
        let mut records = self.records.lock().await;
        let Some(value) = f(&mut records) else {
            return Ok(None);
        };
        self.store
            .save_records(records.as_slice())
            .await
            .context("Failed to persist record set")?;
        debug!("Persisted {} records", records.len());
        Ok(Some(value))
    }
}
