//! Listing fetch stage
//!
//! Page 1 is fetched on its own because it is the only place the total page
//! count can be read from. Pages `2..=P` then go through [`map_bounded`].
//! Page 1 starts a new record set that replaces the live one in a single
//! write; until then the live set is untouched. Every later page is merged
//! into it and persisted immediately, and pages that fail are collected and
//! reported together.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::application::concurrency::map_bounded;
use crate::application::errors::{PageError, SyncError};
use crate::application::record_book::RecordBook;
use crate::domain::entity::RecordSet;
use crate::domain::progress::SyncProgress;
use crate::domain::services::ListingSource;

/// Listing stage state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ListingState {
    FetchingFirstPage,
    FetchingRemainingPages { total_pages: u32 },
    Done,
    Failed,
}

/// Result of a successful listing stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingOutcome {
    pub total_pages: u32,
    /// Records in the live set once all pages were merged
    pub records: usize,
    /// Ids that were not in the previous set
    pub new_records: usize,
}

pub struct ListingFetchStage<'a> {
    source: &'a dyn ListingSource,
    book: &'a RecordBook,
    /// Live set as it was before page 1 replaced it
    previous: RecordSet,
    concurrency: usize,
    state: ListingState,
    first_page_committed: bool,
}

impl<'a> ListingFetchStage<'a> {
    pub fn new(
        source: &'a dyn ListingSource,
        book: &'a RecordBook,
        concurrency: usize,
    ) -> Self {
        Self {
            source,
            book,
            previous: RecordSet::new(),
            concurrency,
            state: ListingState::FetchingFirstPage,
            first_page_committed: false,
        }
    }

    pub const fn state(&self) -> ListingState {
        self.state
    }

    /// Whether page 1 has replaced the live set
    pub const fn first_page_committed(&self) -> bool {
        self.first_page_committed
    }

    fn transition(&mut self, next: ListingState) {
        debug!("Listing stage: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn fail(&mut self, err: SyncError) -> SyncError {
        self.transition(ListingState::Failed);
        error!("Listing stage failed: {}", err);
        err
    }

    /// Run the stage to `Done` or `Failed`.
    ///
    /// `report` receives `"1 / P"` after page 1 and `"<k+1> / P"` after the
    /// k-th of the remaining pages completes.
    pub async fn run(
        &mut self,
        report: &(dyn Fn(SyncProgress) + Send + Sync),
    ) -> Result<ListingOutcome, SyncError> {
        info!("Fetching listing page 1");
        let first = match self.source.fetch_listing_page(1).await {
            Ok(page) => page,
            Err(failure) => return Err(self.fail(failure.into())),
        };

        let total_pages = first.total_pages.unwrap_or(1).max(1);
        match self.book.start_generation(first.records).await {
            Ok(previous) => self.previous = previous,
            Err(e) => return Err(self.fail(SyncError::storage(&e))),
        }
        self.first_page_committed = true;
        report(SyncProgress::fraction(1, total_pages));
        info!("Listing has {} pages", total_pages);

        if total_pages == 1 {
            self.transition(ListingState::Done);
            return Ok(self.outcome(total_pages).await);
        }

        self.transition(ListingState::FetchingRemainingPages { total_pages });
        let source = self.source;
        let book = self.book;
        let previous = &self.previous;
        let remaining: Vec<u32> = (2..=total_pages).collect();

        let results = map_bounded(
            remaining.clone(),
            self.concurrency,
            |page| async move {
                let listing = source.fetch_listing_page(page).await?;
                debug!("Page {} returned {} records", page, listing.records.len());
                book.mutate(|set| Some(set.merge_page(listing.records, previous)))
                    .await
                    .map_err(|e| PageError::Storage {
                        page,
                        reason: format!("{e:#}"),
                    })?;
                Ok::<(), PageError>(())
            },
            |completed| report(SyncProgress::fraction(completed + 1, total_pages)),
        )
        .await;

        let mut failed_pages = Vec::new();
        for (page, result) in remaining.into_iter().zip(results) {
            if let Err(e) = result {
                warn!("Listing page {} failed: {}", page, e);
                failed_pages.push(page);
            }
        }

        if failed_pages.is_empty() {
            self.transition(ListingState::Done);
            Ok(self.outcome(total_pages).await)
        } else {
            Err(self.fail(SyncError::PartialPageFailure {
                failed_pages,
                total_pages,
            }))
        }
    }

    async fn outcome(&self, total_pages: u32) -> ListingOutcome {
        let snapshot = self.book.snapshot().await;
        let records = snapshot.len();
        let new_records = snapshot
            .iter()
            .filter(|e| !self.previous.contains(e.id))
            .count();
        info!("Listing merged: {} records, {} new", records, new_records);
        ListingOutcome {
            total_pages,
            records,
            new_records,
        }
    }
}
