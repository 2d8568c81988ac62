//! Pluggable segment-selection policies for the sync trigger.
//!
//! Policies are side-effect-free predicates over the live segment
//! buffers. The trigger unions their selections and dedupes by id, so a
//! segment matched by several policies syncs once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::buffer::SegmentBuffer;
use crate::meta::{MetaCache, SegmentFilter};
use crate::types::{physical_ms, SegmentId, SegmentState, Timestamp, NO_FLUSH_TS};

/// Selects segments whose buffers should be handed to the sync manager.
///
/// `channel_ts` is the timestamp of the latest position consumed on the
/// channel. Implementations must be side-effect-free and time-bounded.
pub trait SyncPolicy: Send + Sync {
    /// Returns the ids of segments to sync.
    fn select(&self, buffers: &[&SegmentBuffer], channel_ts: Timestamp) -> Vec<SegmentId>;

    /// Short human-readable label used in trigger logs.
    fn reason(&self) -> &'static str;
}

/// Syncs buffers that grew past a row-count or byte-size threshold.
#[derive(Debug)]
pub struct BufferLimitPolicy {
    size_limit: usize,
    row_limit: usize,
}

impl BufferLimitPolicy {
    /// Creates the policy with the given byte and row thresholds.
    #[must_use]
    pub fn new(size_limit: usize, row_limit: usize) -> Self {
        Self {
            size_limit,
            row_limit,
        }
    }
}

impl SyncPolicy for BufferLimitPolicy {
    fn select(&self, buffers: &[&SegmentBuffer], _channel_ts: Timestamp) -> Vec<SegmentId> {
        buffers
            .iter()
            .filter(|b| b.memory_size() >= self.size_limit || b.rows() >= self.row_limit)
            .map(|b| b.segment_id())
            .collect()
    }

    fn reason(&self) -> &'static str {
        "buffer limit reached"
    }
}

/// Syncs buffers that have been open longer than a wall-clock threshold.
#[derive(Debug)]
pub struct StaleBufferPolicy {
    max_age: Duration,
}

impl StaleBufferPolicy {
    /// Creates the policy with the given age threshold.
    #[must_use]
    pub fn new(max_age: Duration) -> Self {
        Self { max_age }
    }
}

impl SyncPolicy for StaleBufferPolicy {
    fn select(&self, buffers: &[&SegmentBuffer], _channel_ts: Timestamp) -> Vec<SegmentId> {
        buffers
            .iter()
            .filter(|b| b.opened_at().elapsed() >= self.max_age)
            .map(|b| b.segment_id())
            .collect()
    }

    fn reason(&self) -> &'static str {
        "buffer stale"
    }
}

/// Syncs buffers once ingestion has reached the advisory flush timestamp.
///
/// A segment is selected only when its data demonstrably extends to the
/// watermark (`time_range.max >= flush_ts`); segments wholly before the
/// watermark wait for ingestion to catch up.
#[derive(Debug)]
pub struct FlushTsPolicy {
    flush_ts: Arc<AtomicU64>,
}

impl FlushTsPolicy {
    /// Creates the policy over the shared flush-timestamp cell.
    #[must_use]
    pub fn new(flush_ts: Arc<AtomicU64>) -> Self {
        Self { flush_ts }
    }
}

impl SyncPolicy for FlushTsPolicy {
    fn select(&self, buffers: &[&SegmentBuffer], _channel_ts: Timestamp) -> Vec<SegmentId> {
        let flush_ts = self.flush_ts.load(Ordering::Acquire);
        if flush_ts == NO_FLUSH_TS {
            return Vec::new();
        }
        buffers
            .iter()
            .filter(|b| b.time_range().max >= flush_ts)
            .map(|b| b.segment_id())
            .collect()
    }

    fn reason(&self) -> &'static str {
        "flush timestamp reached"
    }
}

/// Syncs buffers whose segments the metadata cache reports as sealed or
/// already transitioning to Flushing.
pub struct SealedSegmentsPolicy {
    meta: Arc<dyn MetaCache>,
}

impl SealedSegmentsPolicy {
    /// Creates the policy over the shared segment registry.
    #[must_use]
    pub fn new(meta: Arc<dyn MetaCache>) -> Self {
        Self { meta }
    }
}

impl SyncPolicy for SealedSegmentsPolicy {
    fn select(&self, buffers: &[&SegmentBuffer], _channel_ts: Timestamp) -> Vec<SegmentId> {
        let buffered: Vec<SegmentId> = buffers.iter().map(|b| b.segment_id()).collect();
        let mut selected =
            self.meta
                .segment_ids_where(&[SegmentFilter::Ids(buffered.clone()), SegmentFilter::State(SegmentState::Sealed)]);
        selected.extend(self.meta.segment_ids_where(&[
            SegmentFilter::Ids(buffered),
            SegmentFilter::State(SegmentState::Flushing),
        ]));
        selected
    }

    fn reason(&self) -> &'static str {
        "segment sealed"
    }
}

/// Syncs the oldest buffer when the channel checkpoint lags too far
/// behind consumption, bounding replay work on restart.
#[derive(Debug)]
pub struct ChannelCpLagPolicy {
    lag_limit: Duration,
}

impl ChannelCpLagPolicy {
    /// Creates the policy with the given lag threshold.
    #[must_use]
    pub fn new(lag_limit: Duration) -> Self {
        Self { lag_limit }
    }
}

impl SyncPolicy for ChannelCpLagPolicy {
    fn select(&self, buffers: &[&SegmentBuffer], channel_ts: Timestamp) -> Vec<SegmentId> {
        let oldest = buffers
            .iter()
            .filter_map(|b| b.earliest_position().map(|p| (b.segment_id(), p.timestamp)))
            .min_by_key(|(_, ts)| *ts);
        match oldest {
            Some((segment_id, ts))
                if physical_ms(channel_ts).saturating_sub(physical_ms(ts))
                    >= self.lag_limit.as_millis() as u64 =>
            {
                vec![segment_id]
            }
            _ => Vec::new(),
        }
    }

    fn reason(&self) -> &'static str {
        "channel checkpoint lagging"
    }
}
