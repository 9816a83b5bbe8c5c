//! Application layer module
//!
//! The two sync stages, the bounded mapper they share, and the pipeline that
//! sequences them and publishes progress.

pub mod concurrency;
pub mod enrichment_stage;
pub mod errors;
pub mod listing_stage;
pub mod record_book;
pub mod sync_pipeline;

pub use concurrency::{OperationPanicked, map_bounded};
pub use enrichment_stage::EnrichmentReport;
pub use errors::SyncError;
pub use listing_stage::{ListingOutcome, ListingState};
pub use sync_pipeline::{SyncOptions, SyncPipeline, SyncSummary};
