use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Human-readable progress of the current sync run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProgress {
    pub message: String,
    pub is_error: bool,
}

impl SyncProgress {
    pub fn starting() -> Self {
        Self::info("starting")
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_error: true,
        }
    }

    /// `"<done> / <total>"`
    pub fn fraction(done: impl Display, total: impl Display) -> Self {
        Self::info(format!("{done} / {total}"))
    }
}

/// Observable snapshot published to subscribers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub in_progress: bool,
    /// `None` when idle or after a successful run
    pub progress: Option<SyncProgress>,
}
