//! Run-level and item-level sync errors

use thiserror::Error;

use crate::application::concurrency::OperationPanicked;
use crate::domain::entity::EntityId;
use crate::domain::services::{ClassificationError, PageFailure};

/// Terminal failure of a sync run
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The remote session is invalid; the user has to sign in again
    #[error("not authenticated")]
    NotAuthenticated,

    /// A page arrived without the expected structure
    #[error("listing page {page} could not be parsed: {reason}")]
    UnparsablePage { page: u32, reason: String },

    /// The first page could not be fetched at all
    #[error("listing page {page} could not be fetched: {reason}")]
    Unreachable { page: u32, reason: String },

    /// Some pages after the first failed; the others were kept
    #[error("{} of {total_pages} listing pages failed", .failed_pages.len())]
    PartialPageFailure {
        failed_pages: Vec<u32>,
        total_pages: u32,
    },

    /// Persisting the record or label set failed
    #[error("storage error: {0}")]
    Storage(String),

    #[error("a sync is already running")]
    AlreadyRunning,
}

impl SyncError {
    /// Text shown to the user in the progress slot
    pub fn user_message(&self) -> String {
        match self {
            Self::NotAuthenticated => {
                "Not signed in. Sign in to the site, then sync again.".to_string()
            }
            Self::UnparsablePage { page, .. } => {
                format!("Could not read listing page {page}; the site layout may have changed.")
            }
            Self::Unreachable { page, .. } => {
                format!("Could not reach the site while loading page {page}.")
            }
            Self::PartialPageFailure {
                failed_pages,
                total_pages,
            } => format!(
                "{} of {} listing pages failed to load. Sync again to retry.",
                failed_pages.len(),
                total_pages
            ),
            Self::Storage(detail) => format!("Could not save changes: {detail}"),
            Self::AlreadyRunning => "A sync is already running.".to_string(),
        }
    }

    pub fn storage(err: &anyhow::Error) -> Self {
        Self::Storage(format!("{err:#}"))
    }
}

impl From<PageFailure> for SyncError {
    fn from(failure: PageFailure) -> Self {
        match failure {
            PageFailure::NotAuthenticated => Self::NotAuthenticated,
            PageFailure::UnparsablePage { page, reason } => Self::UnparsablePage { page, reason },
            PageFailure::Unreachable { page, reason } => Self::Unreachable { page, reason },
        }
    }
}

/// Outcome of one page in the concurrent listing pass
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageError {
    #[error(transparent)]
    Fetch(#[from] PageFailure),

    #[error("page {page} was fetched but could not be saved: {reason}")]
    Storage { page: u32, reason: String },

    #[error(transparent)]
    Panicked(#[from] OperationPanicked),
}

/// Outcome of one entity in the enrichment pass. Never fails the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnrichmentError {
    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error("classification for {id} could not be saved: {reason}")]
    Storage { id: EntityId, reason: String },

    #[error(transparent)]
    Panicked(#[from] OperationPanicked),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_messages_are_distinct() {
        let errors = [
            SyncError::NotAuthenticated,
            SyncError::UnparsablePage {
                page: 1,
                reason: "x".into(),
            },
            SyncError::Unreachable {
                page: 1,
                reason: "x".into(),
            },
            SyncError::PartialPageFailure {
                failed_pages: vec![2],
                total_pages: 3,
            },
            SyncError::Storage("disk full".into()),
            SyncError::AlreadyRunning,
        ];
        let mut messages: Vec<String> = errors.iter().map(SyncError::user_message).collect();
        messages.sort();
        messages.dedup();
        assert_eq!(messages.len(), errors.len());
    }

    #[test]
    fn partial_failure_message_counts_pages() {
        let err = SyncError::PartialPageFailure {
            failed_pages: vec![2, 5],
            total_pages: 9,
        };
        assert_eq!(
            err.user_message(),
            "2 of 9 listing pages failed to load. Sync again to retry."
        );
    }

    #[test]
    fn storage_message_fits_records_and_labels() {
        let err = SyncError::Storage("disk full".into());
        assert_eq!(err.user_message(), "Could not save changes: disk full");
    }

    #[test]
    fn page_failure_maps_to_run_error() {
        assert_eq!(
            SyncError::from(PageFailure::NotAuthenticated),
            SyncError::NotAuthenticated
        );
    }
}
