//! Enrichment stage
//!
//! Fills in `category` for every entity that does not have one yet. Per-entity
//! failures are logged and counted; they never fail the sync run.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::application::concurrency::map_bounded;
use crate::application::errors::EnrichmentError;
use crate::application::record_book::RecordBook;
use crate::domain::progress::SyncProgress;
use crate::domain::services::ClassificationSource;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentReport {
    /// Entities that lacked a category when the stage started
    pub attempted: usize,
    pub enriched: usize,
    pub failed: usize,
    /// Entities that left the record set before their classification arrived
    pub skipped: usize,
}

/// Classify every entity whose `category` is `None`.
///
/// `report` receives `"<completed> / N"` after each entity.
pub async fn run_enrichment_stage(
    source: &dyn ClassificationSource,
    book: &RecordBook,
    concurrency: usize,
    report: &(dyn Fn(SyncProgress) + Send + Sync),
) -> EnrichmentReport {
    let pending = book.ids_needing_enrichment().await;
    let total = pending.len();
    if total == 0 {
        debug!("No entities need enrichment");
        return EnrichmentReport::default();
    }
    info!("Enriching {} entities", total);

    let skipped = AtomicUsize::new(0);
    let results = map_bounded(
        pending.clone(),
        concurrency,
        |id| {
            let skipped = &skipped;
            async move {
                let category = source.fetch_classification(id).await?;
                let written = book
                    .mutate(|set| {
                        set.get_mut(id).map(|entity| {
                            entity.category = Some(category);
                        })
                    })
                    .await
                    .map_err(|e| EnrichmentError::Storage {
                        id,
                        reason: format!("{e:#}"),
                    })?;
                if written.is_none() {
                    debug!("Entity {} left the record set before enrichment", id);
                    skipped.fetch_add(1, Ordering::Relaxed);
                }
                Ok::<(), EnrichmentError>(())
            }
        },
        |completed| report(SyncProgress::fraction(completed, total)),
    )
    .await;

    let skipped = skipped.into_inner();
    let mut failed = 0;
    for (id, result) in pending.into_iter().zip(&results) {
        if let Err(e) = result {
            warn!("Enrichment of entity {} failed: {}", id, e);
            failed += 1;
        }
    }

    let enrichment = EnrichmentReport {
        attempted: total,
        enriched: total - failed - skipped,
        failed,
        skipped,
    };
    info!(
        "Enrichment finished: {} enriched, {} failed, {} skipped",
        enrichment.enriched, enrichment.failed, enrichment.skipped
    );
    enrichment
}
