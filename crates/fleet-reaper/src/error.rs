//! Error types for the reaper.

use fleet_inventory::InventoryError;
use thiserror::Error;

/// Result type alias for sweep operations.
pub type ReaperResult<T> = Result<T, ReaperError>;

/// Errors that cross the sweep boundary.
///
/// Per-instance failures never appear here; they are logged and counted
/// in the [`SweepReport`](crate::SweepReport).
#[derive(Debug, Error)]
pub enum ReaperError {
    #[error("inventory listing failed: {0}")]
    Listing(#[from] InventoryError),

    #[error("sweep cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    Config(String),
}
