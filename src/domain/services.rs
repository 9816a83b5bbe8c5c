//! Remote source interfaces
//!
//! The sync core only sees these traits. Fetching and parsing the site's markup
//! lives behind them in the infrastructure layer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::entity::{EntityId, FetchedEntity};

/// One parsed listing page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingPage {
    pub records: Vec<FetchedEntity>,
    /// Total page count; only read from page 1
    pub total_pages: Option<u32>,
}

impl ListingPage {
    pub const fn new(records: Vec<FetchedEntity>, total_pages: Option<u32>) -> Self {
        Self {
            records,
            total_pages,
        }
    }
}

/// Why a listing page could not be turned into records
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageFailure {
    /// The remote reported no valid session
    #[error("not authenticated")]
    NotAuthenticated,

    /// The page arrived but its expected structure was missing
    #[error("page {page} could not be parsed: {reason}")]
    UnparsablePage { page: u32, reason: String },

    /// No usable response (transport error, timeout, unexpected status)
    #[error("page {page} could not be fetched: {reason}")]
    Unreachable { page: u32, reason: String },
}

/// Failure to determine one entity's classification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassificationError {
    #[error("not authenticated")]
    NotAuthenticated,

    #[error("classification for {id} could not be fetched: {reason}")]
    Fetch { id: EntityId, reason: String },

    #[error("classification for {id} could not be parsed: {reason}")]
    Parse { id: EntityId, reason: String },
}

/// Paginated listing of tracked entities
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetch and parse listing page `page` (1-based)
    async fn fetch_listing_page(&self, page: u32) -> Result<ListingPage, PageFailure>;
}

/// Derived classification of a single entity
#[async_trait]
pub trait ClassificationSource: Send + Sync {
    /// Empty string is a valid "no category" result
    async fn fetch_classification(&self, id: EntityId) -> Result<String, ClassificationError>;
}
