//! Core value types shared across the write buffer.
//!
//! Timestamps are hybrid-logical: the upper bits carry physical
//! milliseconds, the lower [`LOGICAL_BITS`] bits a logical counter. They
//! are strictly monotone within a channel. The zero timestamp is reserved
//! as "not set".

use std::fmt;

/// Hybrid-logical timestamp. Zero means "not set".
pub type Timestamp = u64;

/// Collection identifier.
pub type CollectionId = i64;

/// Partition identifier.
pub type PartitionId = i64;

/// Segment identifier.
pub type SegmentId = i64;

/// Number of low bits reserved for the logical counter in a [`Timestamp`].
pub const LOGICAL_BITS: u32 = 18;

/// Sentinel flush timestamp meaning "no flush requested".
pub const NO_FLUSH_TS: Timestamp = 0;

/// Composes a hybrid-logical timestamp from physical milliseconds and a
/// logical counter.
#[must_use]
pub fn compose_ts(physical_ms: u64, logical: u32) -> Timestamp {
    (physical_ms << LOGICAL_BITS) | u64::from(logical)
}

/// Returns the physical-millisecond component of a timestamp.
#[must_use]
pub fn physical_ms(ts: Timestamp) -> u64 {
    ts >> LOGICAL_BITS
}

/// A resume point in the channel's message log.
///
/// The offset is an opaque byte string owned by the message-stream layer;
/// positions within one channel are ordered by their timestamp alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Position {
    /// Opaque message-log offset.
    pub offset: Vec<u8>,
    /// Timestamp assigned to the message at this offset.
    pub timestamp: Timestamp,
}

impl Position {
    /// Creates a position from an offset and timestamp.
    #[must_use]
    pub fn new(offset: impl Into<Vec<u8>>, timestamp: Timestamp) -> Self {
        Self {
            offset: offset.into(),
            timestamp,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pos@{}", self.timestamp)
    }
}

/// Lifecycle state of a segment.
///
/// The write buffer only transitions Growing/Importing into Flushing; the
/// remaining states are observed from the metadata cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentState {
    /// Accepting new rows.
    Growing,
    /// Sealed by the coordinator; no new rows expected.
    Sealed,
    /// Flush requested; persisted on the next sync cycle.
    Flushing,
    /// Durably persisted.
    Flushed,
    /// Dropped; no longer part of the collection.
    Dropped,
    /// Replaced by compaction output.
    Compacted,
    /// Being bulk-imported.
    Importing,
}

impl SegmentState {
    /// Returns `true` if the segment can still accept buffered writes.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        !matches!(self, Self::Compacted | Self::Dropped)
    }
}

/// Storage level of a segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SegmentLevel {
    /// Delete-only delta segment, merged into L1 by compaction.
    L0,
    /// Regular data segment.
    #[default]
    L1,
}

/// A primary-key value.
///
/// Sediment collections key rows by either an `Int64` or a `VarChar`
/// column; the variant is fixed per collection schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PrimaryKey {
    /// 64-bit integer key.
    Int64(i64),
    /// Variable-length string key.
    VarChar(std::sync::Arc<str>),
}

impl PrimaryKey {
    /// Hashes the key for Bloom-filter probes.
    #[must_use]
    pub fn probe_hash(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = fxhash::FxHasher64::default();
        match self {
            Self::Int64(v) => v.hash(&mut hasher),
            Self::VarChar(s) => s.as_bytes().hash(&mut hasher),
        }
        hasher.finish()
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int64(v) => write!(f, "{v}"),
            Self::VarChar(s) => write!(f, "{s}"),
        }
    }
}

/// Inclusive timestamp range of buffered data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    /// Smallest timestamp in the range.
    pub min: Timestamp,
    /// Largest timestamp in the range.
    pub max: Timestamp,
}

impl TimeRange {
    /// Creates a range covering exactly `[min, max]`.
    #[must_use]
    pub fn new(min: Timestamp, max: Timestamp) -> Self {
        Self { min, max }
    }

    /// An empty range: `min > max` until the first expansion.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            min: Timestamp::MAX,
            max: 0,
        }
    }

    /// Returns `true` if no timestamp has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    /// Widens the range to include `ts`.
    pub fn expand(&mut self, ts: Timestamp) {
        self.min = self.min.min(ts);
        self.max = self.max.max(ts);
    }

    /// Widens the range to cover `other`.
    pub fn merge(&mut self, other: TimeRange) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_and_split_ts() {
        let ts = compose_ts(1000, 7);
        assert_eq!(physical_ms(ts), 1000);
        assert_eq!(ts & ((1 << LOGICAL_BITS) - 1), 7);
        assert!(compose_ts(1001, 0) > ts);
    }

    #[test]
    fn test_time_range_expand_merge() {
        let mut range = TimeRange::empty();
        assert!(range.is_empty());

        range.expand(20);
        range.expand(10);
        assert_eq!(range, TimeRange::new(10, 20));

        range.merge(TimeRange::new(5, 15));
        assert_eq!(range, TimeRange::new(5, 20));
    }

    #[test]
    fn test_segment_state_writable() {
        assert!(SegmentState::Growing.is_writable());
        assert!(SegmentState::Importing.is_writable());
        assert!(!SegmentState::Compacted.is_writable());
        assert!(!SegmentState::Dropped.is_writable());
    }

    #[test]
    fn test_primary_key_probe_hash_stable() {
        let a = PrimaryKey::Int64(42);
        let b = PrimaryKey::Int64(42);
        assert_eq!(a.probe_hash(), b.probe_hash());
        assert_ne!(a.probe_hash(), PrimaryKey::Int64(43).probe_hash());

        let s1 = PrimaryKey::VarChar("doc-1".into());
        let s2 = PrimaryKey::VarChar("doc-1".into());
        assert_eq!(s1.probe_hash(), s2.probe_hash());
    }
}
