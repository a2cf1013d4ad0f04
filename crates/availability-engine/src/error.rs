//! Error types for availability-engine operations.

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Range too large: {days} days requested, at most {max_days} allowed")]
    RangeTooLarge { days: i64, max_days: i64 },

    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    /// The candidate booking overlaps active bookings in the same scope.
    #[error("Slot conflict with {} existing booking(s)", booking_ids.len())]
    SlotConflict { booking_ids: Vec<Uuid> },

    /// A collaborator fetch failed; no partial result is produced.
    #[error("Store error: {0}")]
    Store(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
