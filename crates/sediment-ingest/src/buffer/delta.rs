//! Delete-tombstone staging: parallel (primary key, timestamp) arrays.

use crate::types::{PrimaryKey, TimeRange, Timestamp};

/// Estimated bytes per tombstone beyond the key payload.
const TOMBSTONE_OVERHEAD: usize = 16;

/// Immutable snapshot of staged tombstones, produced by a yield.
#[derive(Debug, Clone, Default)]
pub struct DeleteData {
    /// Deleted primary keys, paired with `timestamps`.
    pub primary_keys: Vec<PrimaryKey>,
    /// Per-tombstone timestamps.
    pub timestamps: Vec<Timestamp>,
    /// Timestamp range covered by the tombstones.
    pub time_range: TimeRange,
}

impl DeleteData {
    /// Number of tombstones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.primary_keys.len()
    }

    /// Returns `true` if there are no tombstones.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.primary_keys.is_empty()
    }
}

/// In-memory staging for one segment's tombstones.
///
/// Pairs are appended in arrival order; the (pk, ts) pairing of a batch is
/// never reordered.
#[derive(Debug, Default)]
pub struct DeltaBuffer {
    primary_keys: Vec<PrimaryKey>,
    timestamps: Vec<Timestamp>,
    size_bytes: usize,
    time_range: TimeRange,
}

impl DeltaBuffer {
    /// Creates an empty delta buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one tombstone.
    pub fn append(&mut self, pk: PrimaryKey, ts: Timestamp) {
        self.size_bytes += TOMBSTONE_OVERHEAD
            + match &pk {
                PrimaryKey::Int64(_) => 0,
                PrimaryKey::VarChar(s) => s.len(),
            };
        self.time_range.expand(ts);
        self.primary_keys.push(pk);
        self.timestamps.push(ts);
    }

    /// Number of staged tombstones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.primary_keys.len()
    }

    /// Returns `true` if nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.primary_keys.is_empty()
    }

    /// Estimated staged bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    /// Timestamp range of staged tombstones.
    #[must_use]
    pub fn time_range(&self) -> TimeRange {
        self.time_range
    }

    /// Consumes the buffer into an immutable snapshot.
    #[must_use]
    pub fn into_data(self) -> DeleteData {
        DeleteData {
            primary_keys: self.primary_keys,
            timestamps: self.timestamps,
            time_range: self.time_range,
        }
    }
}
