//! Sync pipeline
//!
//! Runs the listing stage, then the enrichment stage, and owns everything a
//! front end observes: the record set, the label set, the in-progress flag and
//! the progress/error message.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tracing::{error, info, warn};

use crate::application::enrichment_stage::{EnrichmentReport, run_enrichment_stage};
use crate::application::errors::SyncError;
use crate::application::listing_stage::{ListingFetchStage, ListingOutcome};
use crate::application::record_book::RecordBook;
use crate::domain::entity::{Entity, EntityId};
use crate::domain::label::LabelSet;
use crate::domain::progress::{SyncProgress, SyncStatus};
use crate::domain::repositories::{LabelStore, RecordStore};
use crate::domain::services::{ClassificationSource, ListingSource};

/// Concurrency caps for the two stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    pub listing_concurrency: usize,
    pub enrichment_concurrency: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            listing_concurrency: 5,
            enrichment_concurrency: 5,
        }
    }
}

/// Result of a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub listing: ListingOutcome,
    pub enrichment: EnrichmentReport,
    pub elapsed_ms: u64,
}

/// Ends a run however it ends. A run dropped mid-flight still reads as
/// finished to observers and does not block the next one.
struct RunGuard<'a> {
    status: &'a watch::Sender<SyncStatus>,
    running: &'a AtomicBool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.status.send_if_modified(|status| {
            if !status.in_progress {
                return false;
            }
            warn!("Sync was cancelled before it finished");
            status.in_progress = false;
            status.progress = None;
            true
        });
        self.running.store(false, Ordering::SeqCst);
    }
}

pub struct SyncPipeline {
    listing: Arc<dyn ListingSource>,
    classifier: Arc<dyn ClassificationSource>,
    records: RecordBook,
    labels: Mutex<LabelSet>,
    label_store: Arc<dyn LabelStore>,
    status: watch::Sender<SyncStatus>,
    running: AtomicBool,
    options: SyncOptions,
}

impl SyncPipeline {
    /// Load the stored record and label sets and build a pipeline around them
    pub async fn open(
        listing: Arc<dyn ListingSource>,
        classifier: Arc<dyn ClassificationSource>,
        record_store: Arc<dyn RecordStore>,
        label_store: Arc<dyn LabelStore>,
        options: SyncOptions,
    ) -> Result<Self> {
        let records = RecordBook::load(record_store).await?;
        let labels: LabelSet = label_store
            .load_labels()
            .await
            .context("Failed to load label set")?
            .into_iter()
            .collect();
        let (status, _) = watch::channel(SyncStatus::default());

        Ok(Self {
            listing,
            classifier,
            records,
            labels: Mutex::new(labels),
            label_store,
            status,
            running: AtomicBool::new(false),
            options,
        })
    }

    // ── Observable state ───────────────────────────────────────────

    pub async fn records(&self) -> Vec<Entity> {
        self.records.snapshot().await
    }

    pub async fn record(&self, id: EntityId) -> Option<Entity> {
        self.records.get(id).await
    }

    pub async fn labels(&self) -> Vec<String> {
        self.labels.lock().await.as_slice().to_vec()
    }

    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    pub fn is_syncing(&self) -> bool {
        self.status.borrow().in_progress
    }

    /// Current progress or error message; `None` when idle or after success
    pub fn progress(&self) -> Option<SyncProgress> {
        self.status.borrow().progress.clone()
    }

    /// Receive every status change from now on
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    fn publish(&self, in_progress: bool, progress: Option<SyncProgress>) {
        self.status.send_replace(SyncStatus {
            in_progress,
            progress,
        });
    }

    fn report_progress(&self, progress: SyncProgress) {
        self.status.send_modify(|status| status.progress = Some(progress));
    }

    // ── Sync ───────────────────────────────────────────────────────

    /// Run one full synchronization.
    ///
    /// On failure the error message stays in [`Self::progress`] until the
    /// next run starts. Records merged before the failure are kept. The live
    /// set is only replaced once page 1 has been merged and written, so a
    /// run that fails or is dropped before that leaves it untouched.
    pub async fn sync(&self) -> Result<SyncSummary, SyncError> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Sync requested while another run is active");
            return Err(SyncError::AlreadyRunning);
        }
        let _guard = RunGuard {
            status: &self.status,
            running: &self.running,
        };
        let started = Instant::now();

        info!("Sync started");
        self.publish(true, Some(SyncProgress::starting()));
        let report = |progress: SyncProgress| self.report_progress(progress);

        let mut stage = ListingFetchStage::new(
            self.listing.as_ref(),
            &self.records,
            self.options.listing_concurrency,
        );
        let listing = match stage.run(&report).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!("Sync failed: {}", err);
                self.publish(false, Some(SyncProgress::error(err.user_message())));
                return Err(err);
            }
        };

        let enrichment = run_enrichment_stage(
            self.classifier.as_ref(),
            &self.records,
            self.options.enrichment_concurrency,
            &report,
        )
        .await;

        self.publish(false, None);
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            "Sync completed in {}ms: {} records over {} pages",
            elapsed_ms, listing.records, listing.total_pages
        );
        Ok(SyncSummary {
            listing,
            enrichment,
            elapsed_ms,
        })
    }

    // ── User mutations ─────────────────────────────────────────────

    /// Flip `favorite` on `id`. Returns `false` if the id is unknown.
    pub async fn toggle_favorite(&self, id: EntityId) -> Result<bool, SyncError> {
        self.toggle_flag(id, |entity| entity.favorite = !entity.favorite)
            .await
    }

    /// Flip `bookmarked` on `id`. Returns `false` if the id is unknown.
    pub async fn toggle_bookmark(&self, id: EntityId) -> Result<bool, SyncError> {
        self.toggle_flag(id, |entity| entity.bookmarked = !entity.bookmarked)
            .await
    }

    async fn toggle_flag(
        &self,
        id: EntityId,
        flip: impl FnOnce(&mut Entity),
    ) -> Result<bool, SyncError> {
        let changed = self
            .records
            .mutate(|set| set.get_mut(id).map(flip))
            .await
            .map_err(|e| SyncError::storage(&e))?;
        Ok(changed.is_some())
    }

    /// Add `name` to the label set if absent, remove it otherwise.
    /// Returns whether the label is present afterwards.
    pub async fn toggle_label(&self, name: &str) -> Result<bool, SyncError> {
        let mut labels = self.labels.lock().await;
        let present = labels.toggle(name);
        self.label_store
            .save_labels(labels.as_slice())
            .await
            .context("Failed to persist label set")
            .map_err(|e| SyncError::storage(&e))?;
        Ok(present)
    }
}
