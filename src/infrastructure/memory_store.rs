//! Volatile record and label store
//!
//! Keeps everything in process memory. Used for `--ephemeral` runs and as the
//! store behind unit and integration tests.

use std::sync::{Mutex, PoisonError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use crate::domain::entity::Entity;
use crate::domain::repositories::{LabelStore, RecordStore};

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<Entity>>,
    labels: Mutex<Vec<String>>,
    record_saves: AtomicUsize,
    label_saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn with_records(records: Vec<Entity>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    pub fn with_labels(self, labels: Vec<String>) -> Self {
        Self {
            labels: Mutex::new(labels),
            ..self
        }
    }

    /// Last saved record set
    pub fn records(&self) -> Vec<Entity> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Last saved label set
    pub fn labels(&self) -> Vec<String> {
        self.labels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of `save_records` calls so far
    pub fn record_saves(&self) -> usize {
        self.record_saves.load(Ordering::SeqCst)
    }

    pub fn label_saves(&self) -> usize {
        self.label_saves.load(Ordering::SeqCst)
    }

    /// Make every following save fail until switched off again
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(anyhow!("store is read-only"));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn load_records(&self) -> Result<Vec<Entity>> {
        let stored = self
            .records
            .lock()
            .map_err(|_| anyhow!("record store lock poisoned"))?;
        Ok(stored.clone())
    }

    async fn save_records(&self, records: &[Entity]) -> Result<()> {
        self.check_writable()?;
        let mut stored = self
            .records
            .lock()
            .map_err(|_| anyhow!("record store lock poisoned"))?;
        *stored = records.to_vec();
        self.record_saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl LabelStore for MemoryStore {
    async fn load_labels(&self) -> Result<Vec<String>> {
        let stored = self
            .labels
            .lock()
            .map_err(|_| anyhow!("label store lock poisoned"))?;
        Ok(stored.clone())
    }

    async fn save_labels(&self, labels: &[String]) -> Result<()> {
        self.check_writable()?;
        let mut stored = self
            .labels
            .lock()
            .map_err(|_| anyhow!("label store lock poisoned"))?;
        *stored = labels.to_vec();
        self.label_saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
