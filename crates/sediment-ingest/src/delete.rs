//! Delete routing: deciding which segment's delta buffer receives each
//! tombstone.
//!
//! Exactly one strategy is active per channel. The BF-PK oracle fans a
//! tombstone out to every segment whose Bloom filters admit the key; the
//! L0 strategy funnels all tombstones of a partition into one level-zero
//! segment for compaction to apply later. Routers only produce decisions
//! (and, for L0, register new segments); the write buffer applies them so
//! the (pk, ts) pairing order of a batch is preserved.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::meta::{MetaCache, SegmentFilter, SegmentInfo};
use crate::schema::DeleteBatch;
use crate::types::{PartitionId, Position, PrimaryKey, SegmentId, SegmentLevel, SegmentState, Timestamp};

/// Mints fresh segment ids for strategy-created segments.
pub trait IdAllocator: Send + Sync {
    /// Returns a cluster-unique segment id.
    ///
    /// # Errors
    ///
    /// Returns [`Internal`](crate::error::WriteBufferError::Internal) when
    /// the id space cannot be extended (e.g. the coordinator lease ran out).
    fn alloc_id(&self) -> Result<SegmentId>;
}

/// Process-local allocator handing out ids from a counter.
///
/// Real deployments plug in the coordinator-backed allocator; this one
/// serves single-node setups and tests.
#[derive(Debug)]
pub struct CounterIdAllocator {
    next: AtomicI64,
}

impl CounterIdAllocator {
    /// Creates an allocator starting at `first`.
    #[must_use]
    pub fn new(first: SegmentId) -> Self {
        Self {
            next: AtomicI64::new(first),
        }
    }
}

impl IdAllocator for CounterIdAllocator {
    fn alloc_id(&self) -> Result<SegmentId> {
        Ok(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// One routing decision: append `(pk, ts)` to `segment_id`'s delta buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRoute {
    /// Segment receiving the tombstone.
    pub segment_id: SegmentId,
    /// Deleted primary key.
    pub pk: PrimaryKey,
    /// Tombstone timestamp.
    pub ts: Timestamp,
}

/// Routes tombstones by probing per-segment primary-key Bloom filters.
pub struct BfPkOracle {
    meta: Arc<dyn MetaCache>,
}

impl BfPkOracle {
    /// Creates the oracle over the shared segment registry.
    #[must_use]
    pub fn new(meta: Arc<dyn MetaCache>) -> Self {
        Self { meta }
    }

    /// Computes routes for `deletes`.
    ///
    /// Every L1 segment of the tombstone's partition that is not yet
    /// compacted or dropped is probed; each admitting segment receives the
    /// tombstone. Call this after the current batch's insert keys were
    /// folded into the filters, so same-batch deletes observe them.
    #[must_use]
    pub fn route(&self, deletes: &[DeleteBatch]) -> Vec<DeleteRoute> {
        let mut routes = Vec::new();
        for batch in deletes {
            let mut candidates = self.meta.segment_ids_where(&[
                SegmentFilter::Partition(batch.partition_id),
                SegmentFilter::Level(SegmentLevel::L1),
            ]);
            candidates.sort_unstable();
            let probes: Vec<_> = candidates
                .into_iter()
                .filter(|id| {
                    self.meta
                        .get_segment(*id)
                        .is_some_and(|info| info.state.is_writable())
                })
                .filter_map(|id| self.meta.bloom_filter_set(id).map(|bloom| (id, bloom)))
                .collect();

            for (pk, &ts) in batch.primary_keys.iter().zip(batch.timestamps.iter()) {
                for (segment_id, bloom) in &probes {
                    if bloom.pk_exists(pk) {
                        routes.push(DeleteRoute {
                            segment_id: *segment_id,
                            pk: pk.clone(),
                            ts,
                        });
                    }
                }
            }
        }
        routes
    }
}

/// Routes every tombstone of a partition into its live L0 segment.
pub struct L0Delta {
    meta: Arc<dyn MetaCache>,
    allocator: Arc<dyn IdAllocator>,
    l0_segments: Mutex<HashMap<PartitionId, SegmentId>>,
}

impl L0Delta {
    /// Creates the strategy over the registry and the id allocator.
    #[must_use]
    pub fn new(meta: Arc<dyn MetaCache>, allocator: Arc<dyn IdAllocator>) -> Self {
        Self {
            meta,
            allocator,
            l0_segments: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the partition's live L0 segment, minting and registering a
    /// fresh one when none exists or the previous one left Growing state.
    fn ensure_l0_segment(&self, partition_id: PartitionId, start: &Position) -> Result<SegmentId> {
        let mut map = self.l0_segments.lock();
        if let Some(&id) = map.get(&partition_id) {
            let still_growing = self
                .meta
                .get_segment(id)
                .is_some_and(|info| info.state == SegmentState::Growing);
            if still_growing {
                return Ok(id);
            }
        }

        let id = self.allocator.alloc_id()?;
        self.meta.add_segment(
            SegmentInfo::growing(id, partition_id)
                .with_level(SegmentLevel::L0)
                .with_start_position(start.clone()),
        );
        tracing::info!(partition_id, segment_id = id, "created L0 delta segment");
        map.insert(partition_id, id);
        Ok(id)
    }

    /// Computes routes for `deletes`, creating L0 segments as needed.
    ///
    /// # Errors
    ///
    /// Propagates id-allocation failures. Call this before any buffer
    /// mutation so a failure leaves the batch invisible.
    pub fn route(&self, deletes: &[DeleteBatch], start: &Position) -> Result<Vec<DeleteRoute>> {
        let mut routes = Vec::new();
        for batch in deletes {
            let segment_id = self.ensure_l0_segment(batch.partition_id, start)?;
            for (pk, &ts) in batch.primary_keys.iter().zip(batch.timestamps.iter()) {
                routes.push(DeleteRoute {
                    segment_id,
                    pk: pk.clone(),
                    ts,
                });
            }
        }
        Ok(routes)
    }
}

/// The channel's active delete strategy.
pub(crate) enum DeleteRouter {
    /// Bloom-filter primary-key oracle.
    Bf(BfPkOracle),
    /// Level-zero delta accumulation.
    L0(L0Delta),
}

#[cfg(test)]
mod tests {
    use crate::meta::{InMemoryMetaCache, SegmentAction};

    use super::*;

    fn delete(partition_id: PartitionId, pks: Vec<i64>, tss: Vec<Timestamp>) -> DeleteBatch {
        DeleteBatch {
            partition_id,
            schema_version: 1,
            primary_keys: pks.into_iter().map(PrimaryKey::Int64).collect(),
            timestamps: tss,
        }
    }

    #[test]
    fn test_bf_routes_to_admitting_segments() {
        let meta = Arc::new(InMemoryMetaCache::new());
        for id in [1, 2, 3] {
            meta.add_segment(SegmentInfo::growing(id, 100));
        }
        // pk 7 lives in segments 1 and 3.
        meta.bloom_filter_set(1).unwrap().update_pk_range(&[PrimaryKey::Int64(7)]);
        meta.bloom_filter_set(3).unwrap().update_pk_range(&[PrimaryKey::Int64(7)]);

        let oracle = BfPkOracle::new(meta);
        let routes = oracle.route(&[delete(100, vec![7], vec![50])]);

        let mut segments: Vec<SegmentId> = routes.iter().map(|r| r.segment_id).collect();
        segments.sort_unstable();
        assert_eq!(segments, vec![1, 3]);
        assert!(routes.iter().all(|r| r.pk == PrimaryKey::Int64(7) && r.ts == 50));
    }

    #[test]
    fn test_bf_skips_other_partitions_and_l0() {
        let meta = Arc::new(InMemoryMetaCache::new());
        meta.add_segment(SegmentInfo::growing(1, 100));
        meta.add_segment(SegmentInfo::growing(2, 200));
        meta.add_segment(SegmentInfo::growing(3, 100).with_level(SegmentLevel::L0));
        for id in [1, 2, 3] {
            meta.bloom_filter_set(id).unwrap().update_pk_range(&[PrimaryKey::Int64(7)]);
        }

        let oracle = BfPkOracle::new(meta);
        let routes = oracle.route(&[delete(100, vec![7], vec![50])]);
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].segment_id, 1);
    }

    #[test]
    fn test_l0_singleton_per_partition() {
        let meta = Arc::new(InMemoryMetaCache::new());
        let strategy = L0Delta::new(Arc::clone(&meta) as Arc<dyn MetaCache>, Arc::new(CounterIdAllocator::new(1000)));
        let start = Position::new(*b"s", 5);

        let first = strategy
            .route(&[delete(100, vec![1], vec![10]), delete(100, vec![2], vec![20])], &start)
            .unwrap();
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|r| r.segment_id == first[0].segment_id));

        let info = meta.get_segment(first[0].segment_id).unwrap();
        assert_eq!(info.level, SegmentLevel::L0);
        assert_eq!(info.state, SegmentState::Growing);

        // Same partition reuses the segment; another partition gets its own.
        let second = strategy.route(&[delete(100, vec![3], vec![30])], &start).unwrap();
        assert_eq!(second[0].segment_id, first[0].segment_id);
        let other = strategy.route(&[delete(200, vec![4], vec![40])], &start).unwrap();
        assert_ne!(other[0].segment_id, first[0].segment_id);
    }

    #[test]
    fn test_l0_remints_after_seal() {
        let meta = Arc::new(InMemoryMetaCache::new());
        let strategy = L0Delta::new(Arc::clone(&meta) as Arc<dyn MetaCache>, Arc::new(CounterIdAllocator::new(1000)));
        let start = Position::new(*b"s", 5);

        let first = strategy.route(&[delete(100, vec![1], vec![10])], &start).unwrap();
        meta.update_segments(
            &[SegmentAction::SetState(SegmentState::Flushing)],
            &[SegmentFilter::Ids(vec![first[0].segment_id])],
        );

        let second = strategy.route(&[delete(100, vec![2], vec![20])], &start).unwrap();
        assert_ne!(second[0].segment_id, first[0].segment_id);
    }
}
