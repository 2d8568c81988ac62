//! Write-buffer error types.
//!
//! Synchronous failures are returned from `buffer_data` / `flush_segments`;
//! asynchronous sync failures flow through [`SyncHandle`](crate::sync::SyncHandle)
//! futures and the task failure callback.

use thiserror::Error;

use crate::types::SegmentId;

/// Errors returned by write-buffer operations.
#[derive(Debug, Clone, Error)]
pub enum WriteBufferError {
    /// A message carried a schema version different from the channel's.
    /// Fatal for the batch, not the channel.
    #[error("schema mismatch: message schema v{actual} != channel schema v{expected}")]
    SchemaMismatch {
        /// The channel's schema version.
        expected: u32,
        /// The version carried by the rejected message.
        actual: u32,
    },

    /// Attempt to buffer into a segment already compacted or dropped.
    #[error("segment {0} is stale (compacted or dropped)")]
    StaleSegment(SegmentId),

    /// A segment buffer would exceed its hard byte cap. The batch is
    /// rejected whole; the upstream retries after backoff.
    #[error("buffer full: segment {segment_id} at {current} bytes, {incoming} incoming, cap {limit}")]
    BufferFull {
        /// Segment whose buffer hit the cap.
        segment_id: SegmentId,
        /// Bytes already buffered for the segment.
        current: usize,
        /// Bytes the rejected batch would have added.
        incoming: usize,
        /// Configured hard cap.
        limit: usize,
    },

    /// Invalid construction-time or per-batch parameter.
    #[error("invalid parameter: {0}")]
    ParameterInvalid(String),

    /// A sync task reported failure; the channel is no longer usable.
    #[error("sync failed: {0}")]
    SyncFailed(#[from] SyncError),

    /// The channel left the Open state; writes are rejected.
    #[error("channel is closed")]
    ChannelClosed,

    /// An internal failure that does not fit other categories, e.g. id
    /// allocation running dry.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors delivered through sync-task futures.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// The sync manager reported a persistence failure.
    #[error("sync task for segment {segment_id} failed: {message}")]
    Failed {
        /// Segment the failed task was persisting.
        segment_id: SegmentId,
        /// Failure detail from the sync manager.
        message: String,
    },

    /// The sync manager dropped the task without reporting a result.
    #[error("sync task abandoned by the sync manager")]
    Abandoned,

    /// The channel drop hook failed.
    #[error("drop channel failed: {0}")]
    DropChannel(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, WriteBufferError>;
