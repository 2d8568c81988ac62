//! Coordinator broker contract.
//!
//! The write buffer makes exactly one broker call: fetching the remote
//! flush timestamp when a channel starts or resumes, to seed the advisory
//! flush watermark. Everything else the coordinator knows arrives through
//! the metadata cache.

use async_trait::async_trait;

use crate::error::SyncError;
use crate::types::Timestamp;

/// Read-only view of coordinator state.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Returns the coordinator's flush timestamp for `channel`, or
    /// [`NO_FLUSH_TS`](crate::types::NO_FLUSH_TS) when none is pending.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if the coordinator is unreachable.
    async fn remote_flush_timestamp(&self, channel: &str) -> Result<Timestamp, SyncError>;
}
