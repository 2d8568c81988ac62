//! Segment metadata: the authoritative per-channel segment registry.
//!
//! The write buffer never mutates entries directly; it issues declarative
//! [`SegmentAction`] updates against [`SegmentFilter`] selectors, which
//! combine by logical AND. The registry is shared with the sync manager
//! and the compaction observer, so every multi-field change goes through
//! one atomic `update_segments` call.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::bloom::BloomFilterSet;
use crate::types::{PartitionId, Position, SegmentId, SegmentLevel, SegmentState};

/// Catalog entry for one segment.
#[derive(Debug, Clone)]
pub struct SegmentInfo {
    /// Segment identifier.
    pub segment_id: SegmentId,
    /// Partition the segment belongs to.
    pub partition_id: PartitionId,
    /// Lifecycle state.
    pub state: SegmentState,
    /// Storage level.
    pub level: SegmentLevel,
    /// Position of the first row routed to this segment.
    pub start_position: Option<Position>,
    /// Rows currently buffered in the write buffer.
    pub buffered_rows: u64,
    /// Rows handed to in-flight sync tasks.
    pub syncing_rows: u64,
    /// Number of in-flight sync tasks.
    pub syncing_tasks: u32,
    /// Rows durably persisted.
    pub flushed_rows: u64,
    /// Compaction output that replaced this segment, if any.
    pub compacted_to: Option<SegmentId>,
}

impl SegmentInfo {
    /// Creates a Growing L1 entry with zeroed counters.
    #[must_use]
    pub fn growing(segment_id: SegmentId, partition_id: PartitionId) -> Self {
        Self {
            segment_id,
            partition_id,
            state: SegmentState::Growing,
            level: SegmentLevel::L1,
            start_position: None,
            buffered_rows: 0,
            syncing_rows: 0,
            syncing_tasks: 0,
            flushed_rows: 0,
            compacted_to: None,
        }
    }

    /// Sets the storage level.
    #[must_use]
    pub fn with_level(mut self, level: SegmentLevel) -> Self {
        self.level = level;
        self
    }

    /// Sets the start position.
    #[must_use]
    pub fn with_start_position(mut self, position: Position) -> Self {
        self.start_position = Some(position);
        self
    }
}

/// Declarative mutation applied by `update_segments`.
#[derive(Debug, Clone)]
pub enum SegmentAction {
    /// Replace the lifecycle state.
    SetState(SegmentState),
    /// Replace the buffered-row counter.
    SetBufferedRows(u64),
    /// Account a new in-flight sync task carrying `n` rows; buffered rows
    /// move to the syncing counter.
    StartSyncing(u64),
    /// Retire a completed sync task carrying `n` rows into the flushed
    /// counter.
    FinishSyncing(u64),
    /// Retire the segment's current Bloom-filter generation into history.
    RollStats,
    /// Record the compaction output and mark the segment Compacted.
    CompactTo(SegmentId),
}

/// Selector for `update_segments` / `segment_ids_where` / `remove_segments`.
///
/// Multiple filters AND together.
#[derive(Debug, Clone)]
pub enum SegmentFilter {
    /// Match any of the listed segment ids.
    Ids(Vec<SegmentId>),
    /// Match segments in `state`.
    State(SegmentState),
    /// Match segments at `level`.
    Level(SegmentLevel),
    /// Match segments of a partition.
    Partition(PartitionId),
    /// Match segments replaced by compaction.
    Compacted,
    /// Match segments being bulk-imported.
    Importing,
    /// Match segments with no in-flight sync task.
    NoSyncingTask,
}

impl SegmentFilter {
    /// Returns `true` if `info` satisfies this filter.
    #[must_use]
    pub fn matches(&self, info: &SegmentInfo) -> bool {
        match self {
            Self::Ids(ids) => ids.contains(&info.segment_id),
            Self::State(state) => info.state == *state,
            Self::Level(level) => info.level == *level,
            Self::Partition(partition) => info.partition_id == *partition,
            Self::Compacted => info.compacted_to.is_some() || info.state == SegmentState::Compacted,
            Self::Importing => info.state == SegmentState::Importing,
            Self::NoSyncingTask => info.syncing_tasks == 0,
        }
    }
}

/// The segment registry contract the write buffer depends on.
pub trait MetaCache: Send + Sync {
    /// Returns a snapshot of the entry for `segment_id`.
    fn get_segment(&self, segment_id: SegmentId) -> Option<SegmentInfo>;

    /// Registers a new segment. Registering an existing id is a no-op.
    fn add_segment(&self, info: SegmentInfo);

    /// Applies `actions` to every segment matching all `filters`, as one
    /// atomic update.
    fn update_segments(&self, actions: &[SegmentAction], filters: &[SegmentFilter]);

    /// Ids of segments matching all `filters`.
    fn segment_ids_where(&self, filters: &[SegmentFilter]) -> Vec<SegmentId>;

    /// Removes segments matching all `filters`; returns the removed ids.
    fn remove_segments(&self, filters: &[SegmentFilter]) -> Vec<SegmentId>;

    /// The segment's primary-key Bloom filters.
    fn bloom_filter_set(&self, segment_id: SegmentId) -> Option<Arc<BloomFilterSet>>;
}

struct Entry {
    info: SegmentInfo,
    bloom: Arc<BloomFilterSet>,
}

/// In-process [`MetaCache`] used by the ingestion node.
pub struct InMemoryMetaCache {
    bloom_capacity: usize,
    entries: RwLock<HashMap<SegmentId, Entry>>,
}

impl InMemoryMetaCache {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bloom_capacity: crate::bloom::DEFAULT_BLOOM_CAPACITY,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Overrides the per-generation Bloom capacity for new segments.
    #[must_use]
    pub fn with_bloom_capacity(mut self, capacity: usize) -> Self {
        self.bloom_capacity = capacity;
        self
    }

    fn apply(entry: &mut Entry, action: &SegmentAction) {
        match action {
            SegmentAction::SetState(state) => entry.info.state = *state,
            SegmentAction::SetBufferedRows(rows) => entry.info.buffered_rows = *rows,
            SegmentAction::StartSyncing(rows) => {
                entry.info.syncing_rows += rows;
                entry.info.buffered_rows = entry.info.buffered_rows.saturating_sub(*rows);
                entry.info.syncing_tasks += 1;
            }
            SegmentAction::FinishSyncing(rows) => {
                entry.info.syncing_rows = entry.info.syncing_rows.saturating_sub(*rows);
                entry.info.flushed_rows += rows;
                entry.info.syncing_tasks = entry.info.syncing_tasks.saturating_sub(1);
            }
            SegmentAction::RollStats => entry.bloom.roll(),
            SegmentAction::CompactTo(target) => {
                entry.info.compacted_to = Some(*target);
                entry.info.state = SegmentState::Compacted;
            }
        }
    }
}

impl Default for InMemoryMetaCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MetaCache for InMemoryMetaCache {
    fn get_segment(&self, segment_id: SegmentId) -> Option<SegmentInfo> {
        self.entries.read().get(&segment_id).map(|e| e.info.clone())
    }

    fn add_segment(&self, info: SegmentInfo) {
        let mut entries = self.entries.write();
        entries.entry(info.segment_id).or_insert_with(|| Entry {
            info,
            bloom: Arc::new(BloomFilterSet::with_capacity(self.bloom_capacity)),
        });
    }

    fn update_segments(&self, actions: &[SegmentAction], filters: &[SegmentFilter]) {
        let mut entries = self.entries.write();
        for entry in entries.values_mut() {
            if filters.iter().all(|f| f.matches(&entry.info)) {
                for action in actions {
                    Self::apply(entry, action);
                }
            }
        }
    }

    fn segment_ids_where(&self, filters: &[SegmentFilter]) -> Vec<SegmentId> {
        self.entries
            .read()
            .values()
            .filter(|e| filters.iter().all(|f| f.matches(&e.info)))
            .map(|e| e.info.segment_id)
            .collect()
    }

    fn remove_segments(&self, filters: &[SegmentFilter]) -> Vec<SegmentId> {
        let mut entries = self.entries.write();
        let removed: Vec<SegmentId> = entries
            .values()
            .filter(|e| filters.iter().all(|f| f.matches(&e.info)))
            .map(|e| e.info.segment_id)
            .collect();
        for id in &removed {
            entries.remove(id);
        }
        removed
    }

    fn bloom_filter_set(&self, segment_id: SegmentId) -> Option<Arc<BloomFilterSet>> {
        self.entries.read().get(&segment_id).map(|e| Arc::clone(&e.bloom))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with(ids: &[SegmentId]) -> InMemoryMetaCache {
        let cache = InMemoryMetaCache::new();
        for &id in ids {
            cache.add_segment(SegmentInfo::growing(id, 100));
        }
        cache
    }

    #[test]
    fn test_add_is_idempotent() {
        let cache = cache_with(&[1]);
        cache.update_segments(
            &[SegmentAction::SetBufferedRows(10)],
            &[SegmentFilter::Ids(vec![1])],
        );
        // Re-adding must not reset counters.
        cache.add_segment(SegmentInfo::growing(1, 100));
        assert_eq!(cache.get_segment(1).unwrap().buffered_rows, 10);
    }

    #[test]
    fn test_filters_and_together() {
        let cache = cache_with(&[1, 2]);
        cache.update_segments(
            &[SegmentAction::SetState(SegmentState::Sealed)],
            &[SegmentFilter::Ids(vec![1])],
        );

        // Ids(1,2) AND State(Growing) only matches 2.
        let ids = cache.segment_ids_where(&[
            SegmentFilter::Ids(vec![1, 2]),
            SegmentFilter::State(SegmentState::Growing),
        ]);
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn test_sync_counters_round_trip() {
        let cache = cache_with(&[3]);
        cache.update_segments(
            &[SegmentAction::SetBufferedRows(50)],
            &[SegmentFilter::Ids(vec![3])],
        );
        cache.update_segments(
            &[SegmentAction::StartSyncing(50), SegmentAction::RollStats],
            &[SegmentFilter::Ids(vec![3])],
        );

        let info = cache.get_segment(3).unwrap();
        assert_eq!(info.buffered_rows, 0);
        assert_eq!(info.syncing_rows, 50);
        assert_eq!(info.syncing_tasks, 1);
        assert!(cache.segment_ids_where(&[SegmentFilter::NoSyncingTask]).is_empty());

        cache.update_segments(
            &[SegmentAction::FinishSyncing(50)],
            &[SegmentFilter::Ids(vec![3])],
        );
        let info = cache.get_segment(3).unwrap();
        assert_eq!(info.syncing_rows, 0);
        assert_eq!(info.flushed_rows, 50);
        assert_eq!(info.syncing_tasks, 0);
    }

    #[test]
    fn test_remove_returns_removed_ids() {
        let cache = cache_with(&[1, 2, 3]);
        cache.update_segments(&[SegmentAction::CompactTo(9)], &[SegmentFilter::Ids(vec![1, 3])]);

        let mut removed = cache.remove_segments(&[SegmentFilter::Compacted]);
        removed.sort_unstable();
        assert_eq!(removed, vec![1, 3]);
        assert!(cache.get_segment(1).is_none());
        assert!(cache.get_segment(2).is_some());
    }
}
