//! The per-channel write buffer core.
//!
//! [`WriteBuffer`] owns the live segment buffers of one channel, routes
//! inserts and deletes into them, asks the sync policies which segments to
//! persist, hands immutable sync tasks to the sync manager, and publishes
//! the channel checkpoint.
//!
//! Locking: one `RwLock` guards the buffer map and channel state. Writers
//! (`buffer_data`, `flush_segments`, `close`) take write mode, readers
//! (`checkpoint`, `has_segment`) read mode. The flush timestamp is an
//! atomic cell read without the lock, and the lock is never held across a
//! sync-manager submission: tasks are built under the lock and submitted
//! after release so completion callbacks cannot deadlock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;

use crate::broker::Broker;
use crate::buffer::SegmentBuffer;
use crate::checkpoint::evaluate_checkpoint;
use crate::config::{DeletePolicy, FailureHandler, WriteBufferConfig, WriteBufferOptions};
use crate::delete::{BfPkOracle, DeleteRouter, L0Delta};
use crate::error::{Result, SyncError, WriteBufferError};
use crate::meta::{MetaCache, SegmentAction, SegmentFilter, SegmentInfo};
use crate::policy::{
    BufferLimitPolicy, ChannelCpLagPolicy, FlushTsPolicy, SealedSegmentsPolicy, StaleBufferPolicy,
    SyncPolicy,
};
use crate::schema::{ChannelSchema, DeleteBatch, InsertBatch};
use crate::sync::{MetaWriter, SyncManager, SyncTask, SyncTaskBuilder};
use crate::types::{CollectionId, Position, SegmentId, SegmentState, Timestamp, NO_FLUSH_TS};

/// Lifecycle of a channel's write buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Accepting writes.
    Open,
    /// `close(drop)` in progress; remaining buffers are being synced.
    Draining,
    /// No further writes or sync tasks are accepted.
    Closed,
}

struct Inner {
    buffers: HashMap<SegmentId, SegmentBuffer>,
    last_consumed: Position,
    state: ChannelState,
}

/// Per-channel streaming write buffer.
pub struct WriteBuffer {
    channel: Arc<str>,
    collection_id: CollectionId,
    schema: Arc<ChannelSchema>,
    meta: Arc<dyn MetaCache>,
    sync_manager: Arc<dyn SyncManager>,
    meta_writer: Arc<dyn MetaWriter>,
    config: WriteBufferConfig,
    policies: Vec<Box<dyn SyncPolicy>>,
    router: DeleteRouter,
    flush_timestamp: Arc<AtomicU64>,
    inner: RwLock<Inner>,
    published: Mutex<Option<Position>>,
    fatal: Arc<Mutex<Option<SyncError>>>,
    failure_handler: Option<FailureHandler>,
}

impl WriteBuffer {
    /// Creates the write buffer for `channel`.
    ///
    /// The baseline sync-policy set is derived from the configuration; a
    /// policy list supplied via the options replaces it, except for the
    /// flush-timestamp policy, which is always installed.
    ///
    /// # Errors
    ///
    /// Returns [`WriteBufferError::ParameterInvalid`] if the L0 delete
    /// policy is selected without an id allocator.
    pub fn new(
        channel: impl Into<Arc<str>>,
        collection_id: CollectionId,
        schema: Arc<ChannelSchema>,
        meta: Arc<dyn MetaCache>,
        sync_manager: Arc<dyn SyncManager>,
        meta_writer: Arc<dyn MetaWriter>,
        options: WriteBufferOptions,
    ) -> Result<Self> {
        let WriteBufferOptions {
            config,
            sync_policies,
            id_allocator,
            failure_handler,
        } = options;

        let router = match config.delete_policy {
            DeletePolicy::BfPkOracle => DeleteRouter::Bf(BfPkOracle::new(Arc::clone(&meta))),
            DeletePolicy::L0Delta => {
                let allocator = id_allocator.ok_or_else(|| {
                    WriteBufferError::ParameterInvalid(
                        "l0_delta delete policy requires an id allocator".into(),
                    )
                })?;
                DeleteRouter::L0(L0Delta::new(Arc::clone(&meta), allocator))
            }
        };

        let flush_timestamp = Arc::new(AtomicU64::new(NO_FLUSH_TS));
        let mut policies = sync_policies.unwrap_or_else(|| {
            vec![
                Box::new(BufferLimitPolicy::new(
                    config.buffer_size_limit,
                    config.buffer_row_limit,
                )) as Box<dyn SyncPolicy>,
                Box::new(StaleBufferPolicy::new(config.buffer_stale_duration)),
                Box::new(SealedSegmentsPolicy::new(Arc::clone(&meta))),
                Box::new(ChannelCpLagPolicy::new(config.cp_lag_limit)),
            ]
        });
        policies.push(Box::new(FlushTsPolicy::new(Arc::clone(&flush_timestamp))));

        Ok(Self {
            channel: channel.into(),
            collection_id,
            schema,
            meta,
            sync_manager,
            meta_writer,
            config,
            policies,
            router,
            flush_timestamp,
            inner: RwLock::new(Inner {
                buffers: HashMap::new(),
                last_consumed: Position::default(),
                state: ChannelState::Open,
            }),
            published: Mutex::new(None),
            fatal: Arc::new(Mutex::new(None)),
            failure_handler,
        })
    }

    /// Channel this buffer serves.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ChannelState {
        self.inner.read().state
    }

    /// Returns `true` if `segment_id` currently holds unsynced data.
    #[must_use]
    pub fn has_segment(&self, segment_id: SegmentId) -> bool {
        self.inner.read().buffers.contains_key(&segment_id)
    }

    /// Total bytes currently buffered across all segments.
    #[must_use]
    pub fn memory_usage(&self) -> usize {
        self.inner
            .read()
            .buffers
            .values()
            .map(SegmentBuffer::memory_size)
            .sum()
    }

    /// Sets the advisory flush timestamp consulted by the flush-ts policy.
    pub fn set_flush_timestamp(&self, flush_ts: Timestamp) {
        self.flush_timestamp.store(flush_ts, Ordering::Release);
    }

    /// Current advisory flush timestamp.
    #[must_use]
    pub fn flush_timestamp(&self) -> Timestamp {
        self.flush_timestamp.load(Ordering::Acquire)
    }

    /// Seeds the flush timestamp from the coordinator, called once on
    /// channel startup or resume.
    ///
    /// # Errors
    ///
    /// Propagates the broker failure.
    pub async fn seed_flush_timestamp(&self, broker: &dyn Broker) -> Result<()> {
        let flush_ts = broker.remote_flush_timestamp(&self.channel).await?;
        self.set_flush_timestamp(flush_ts);
        Ok(())
    }

    /// The first sync failure recorded for this channel, if any.
    ///
    /// A set value means the channel is unrecoverable and must be
    /// restarted by the host.
    #[must_use]
    pub fn fatal_error(&self) -> Option<SyncError> {
        self.fatal.lock().clone()
    }

    /// Buffers one upstream batch. The single write entry point.
    ///
    /// The whole batch is validated before any state changes, so either
    /// every row and tombstone becomes visible or none do. Never blocks on
    /// I/O: selected sync tasks are submitted asynchronously after the
    /// write lock is released.
    ///
    /// # Errors
    ///
    /// - [`WriteBufferError::ChannelClosed`] outside the Open state.
    /// - [`WriteBufferError::SchemaMismatch`] on a schema-version mismatch.
    /// - [`WriteBufferError::StaleSegment`] when targeting a compacted or
    ///   dropped segment.
    /// - [`WriteBufferError::BufferFull`] when the hard segment cap would
    ///   be exceeded.
    /// - [`WriteBufferError::ParameterInvalid`] on malformed batches.
    pub fn buffer_data(
        &self,
        inserts: Vec<InsertBatch>,
        deletes: Vec<DeleteBatch>,
        start_pos: &Position,
        end_pos: &Position,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.state != ChannelState::Open {
            return Err(WriteBufferError::ChannelClosed);
        }

        // Validation phase: nothing below may mutate.
        let mut pk_slices = Vec::with_capacity(inserts.len());
        let mut incoming: HashMap<SegmentId, usize> = HashMap::new();
        for batch in &inserts {
            self.check_schema_version(batch.schema_version)?;
            batch.check_aligned()?;
            pk_slices.push(self.schema.extract_pks(&batch.rows)?);
            if let Some(info) = self.meta.get_segment(batch.segment_id) {
                if !info.state.is_writable() {
                    return Err(WriteBufferError::StaleSegment(batch.segment_id));
                }
            }
            *incoming.entry(batch.segment_id).or_default() += batch.rows.get_array_memory_size();
        }
        for batch in &deletes {
            self.check_schema_version(batch.schema_version)?;
            batch.check_aligned()?;
        }
        if let Some(limit) = self.config.hard_segment_limit {
            for (&segment_id, &bytes) in &incoming {
                let current = inner
                    .buffers
                    .get(&segment_id)
                    .map_or(0, SegmentBuffer::memory_size);
                if current + bytes > limit {
                    return Err(WriteBufferError::BufferFull {
                        segment_id,
                        current,
                        incoming: bytes,
                        limit,
                    });
                }
            }
        }
        // L0 routing allocates segment ids, so it runs while the batch is
        // still invisible; BF routing must instead observe this batch's
        // inserts and runs after them.
        let pre_routes = match &self.router {
            DeleteRouter::L0(strategy) => Some(strategy.route(&deletes, start_pos)?),
            DeleteRouter::Bf(_) => None,
        };

        // Mutation phase: infallible.
        for (batch, pks) in inserts.into_iter().zip(pk_slices) {
            let InsertBatch {
                segment_id,
                partition_id,
                timestamps,
                rows,
                ..
            } = batch;
            if self.meta.get_segment(segment_id).is_none() {
                self.meta.add_segment(
                    SegmentInfo::growing(segment_id, partition_id)
                        .with_start_position(start_pos.clone()),
                );
                tracing::info!(channel = %self.channel, segment_id, "registered growing segment");
            }
            let buffer = inner
                .buffers
                .entry(segment_id)
                .or_insert_with(|| SegmentBuffer::new(segment_id, self.schema.arrow().clone()));
            buffer.insert_mut().append(rows, &timestamps);
            buffer.note_positions(start_pos, end_pos);
            let rows = buffer.rows() as u64;
            if let Some(bloom) = self.meta.bloom_filter_set(segment_id) {
                bloom.update_pk_range(&pks);
            }
            self.meta.update_segments(
                &[SegmentAction::SetBufferedRows(rows)],
                &[SegmentFilter::Ids(vec![segment_id])],
            );
        }

        let routes = match (&self.router, pre_routes) {
            (DeleteRouter::Bf(oracle), _) => oracle.route(&deletes),
            (DeleteRouter::L0(_), Some(routes)) => routes,
            (DeleteRouter::L0(_), None) => unreachable!("l0 routes computed above"),
        };
        for route in routes {
            let buffer = inner
                .buffers
                .entry(route.segment_id)
                .or_insert_with(|| SegmentBuffer::new(route.segment_id, self.schema.arrow().clone()));
            buffer.delta_mut().append(route.pk, route.ts);
            buffer.note_positions(start_pos, end_pos);
        }

        inner.last_consumed = end_pos.clone();

        let tasks = self.trigger_sync(&mut inner);
        self.cleanup_compacted_segments(&inner);
        drop(inner);

        // Results are reported through the failure callback; handles from
        // steady-state syncs are intentionally discarded.
        for task in tasks {
            let _handle = self.sync_manager.sync_data(task);
        }
        Ok(())
    }

    /// Transitions the listed Growing/Importing segments to Flushing in
    /// the metadata cache. Unknown ids are skipped; the actual sync
    /// happens on the next trigger. Idempotent.
    ///
    /// # Errors
    ///
    /// Currently infallible; the `Result` keeps the contract open for
    /// registry implementations that can fail.
    pub fn flush_segments(&self, segment_ids: &[SegmentId]) -> Result<()> {
        let _inner = self.inner.write();
        self.meta.update_segments(
            &[SegmentAction::SetState(SegmentState::Flushing)],
            &[
                SegmentFilter::Ids(segment_ids.to_vec()),
                SegmentFilter::State(SegmentState::Growing),
            ],
        );
        self.meta.update_segments(
            &[SegmentAction::SetState(SegmentState::Flushing)],
            &[
                SegmentFilter::Ids(segment_ids.to_vec()),
                SegmentFilter::Importing,
            ],
        );
        Ok(())
    }

    /// Evaluates and publishes the channel checkpoint.
    ///
    /// The published timestamp is monotone non-decreasing: a candidate
    /// below the previously published value is clamped to it.
    #[must_use]
    pub fn checkpoint(&self) -> Position {
        let candidate = {
            let inner = self.inner.read();
            let buffer_candidate = inner
                .buffers
                .values()
                .filter_map(|b| b.earliest_position().map(|p| (b.segment_id(), p.clone())))
                .min_by_key(|(_, p)| p.timestamp);
            let sync_candidate = self.sync_manager.earliest_position(&self.channel);
            evaluate_checkpoint(buffer_candidate, sync_candidate, &inner.last_consumed)
        };

        let mut published = self.published.lock();
        match &*published {
            Some(previous) if candidate.position.timestamp < previous.timestamp => previous.clone(),
            _ => {
                tracing::debug!(
                    channel = %self.channel,
                    source = ?candidate.source,
                    segment_id = ?candidate.segment_id,
                    ts = candidate.position.timestamp,
                    "checkpoint evaluated"
                );
                *published = Some(candidate.position.clone());
                candidate.position
            }
        }
    }

    /// Closes the channel.
    ///
    /// With `drop = false` the buffer simply stops accepting writes; the
    /// upstream will resume from the published checkpoint. With
    /// `drop = true` every remaining buffer is synced with the drop flag,
    /// all tasks are awaited, and the meta writer's drop-channel hook runs
    /// last.
    ///
    /// # Errors
    ///
    /// Returns the first task failure, in which case the drop-channel hook
    /// is not invoked and the channel error is recorded as fatal.
    pub async fn close(&self, drop: bool) -> Result<()> {
        if !drop {
            self.inner.write().state = ChannelState::Closed;
            return Ok(());
        }

        let tasks = {
            let mut inner = self.inner.write();
            inner.state = ChannelState::Draining;
            let ids: Vec<SegmentId> = inner.buffers.keys().copied().collect();
            tracing::info!(channel = %self.channel, buffers = ids.len(), "draining write buffer");
            ids.into_iter()
                .filter_map(|id| self.build_sync_task(&mut inner, id, true))
                .collect::<Vec<_>>()
        };

        let mut handles = Vec::with_capacity(tasks.len());
        for task in tasks {
            handles.push(self.sync_manager.sync_data(task));
        }

        let mut first_failure = None;
        for handle in handles {
            let segment_id = handle.segment_id();
            if let Err(err) = handle.wait().await {
                tracing::error!(
                    channel = %self.channel,
                    segment_id,
                    error = %err,
                    "failed to sink write buffer data"
                );
                if first_failure.is_none() {
                    first_failure = Some(err);
                }
            }
        }

        let result = match first_failure {
            Some(err) => {
                *self.fatal.lock() = Some(err.clone());
                Err(err.into())
            }
            None => self
                .meta_writer
                .drop_channel(&self.channel)
                .await
                .map_err(WriteBufferError::from),
        };
        self.inner.write().state = ChannelState::Closed;
        result
    }

    fn check_schema_version(&self, version: u32) -> Result<()> {
        if version != self.schema.version() {
            return Err(WriteBufferError::SchemaMismatch {
                expected: self.schema.version(),
                actual: version,
            });
        }
        Ok(())
    }

    /// Applies every sync policy and cuts tasks for the union of their
    /// selections. Runs under the write lock; submission happens at the
    /// call site after release.
    fn trigger_sync(&self, inner: &mut Inner) -> Vec<SyncTask> {
        let channel_ts = inner.last_consumed.timestamp;
        let mut selected: SmallVec<[SegmentId; 8]> = SmallVec::new();
        {
            let buffers: Vec<&SegmentBuffer> = inner.buffers.values().collect();
            for policy in &self.policies {
                let picks = policy.select(&buffers, channel_ts);
                if picks.is_empty() {
                    continue;
                }
                tracing::info!(
                    channel = %self.channel,
                    reason = policy.reason(),
                    segments = ?picks,
                    "sync policy selected segments"
                );
                for id in picks {
                    if !selected.contains(&id) {
                        selected.push(id);
                    }
                }
            }
        }
        selected
            .into_iter()
            .filter_map(|id| self.build_sync_task(inner, id, false))
            .collect()
    }

    /// Yields the segment's buffer into an immutable sync task and records
    /// the handoff in the metadata cache as one declarative update.
    fn build_sync_task(&self, inner: &mut Inner, segment_id: SegmentId, drop: bool) -> Option<SyncTask> {
        let Some(info) = self.meta.get_segment(segment_id) else {
            tracing::warn!(channel = %self.channel, segment_id, "segment missing from metadata cache");
            return None;
        };
        let buffer = inner.buffers.remove(&segment_id)?;
        let yielded = buffer.yield_contents();
        let batch_size = yielded.insert.as_ref().map_or(0, |d| d.row_count as u64);

        self.meta.update_segments(
            &[
                SegmentAction::RollStats,
                SegmentAction::StartSyncing(batch_size),
            ],
            &[SegmentFilter::Ids(vec![segment_id])],
        );

        let fatal = Arc::clone(&self.fatal);
        let handler = self.failure_handler.clone();
        let channel = Arc::clone(&self.channel);
        let mut builder = SyncTaskBuilder::new(Arc::clone(&self.channel), segment_id, Arc::clone(&self.schema))
            .with_collection_id(self.collection_id)
            .with_partition_id(info.partition_id)
            .with_insert_data(yielded.insert)
            .with_delete_data(yielded.delta)
            .with_time_range(yielded.time_range)
            .with_start_position(yielded.start_position)
            .with_checkpoint(inner.last_consumed.clone())
            .with_level(info.level)
            .with_failure_callback(Box::new(move |err| {
                tracing::error!(
                    %channel,
                    segment_id,
                    error = %err,
                    "sync task failed; channel is unrecoverable"
                );
                *fatal.lock() = Some(err.clone());
                if let Some(handler) = &handler {
                    handler(err);
                }
            }));
        if self.config.storage_v2_enabled {
            builder = builder.with_arrow_schema(self.schema.arrow().clone());
        }
        if info.state == SegmentState::Flushing {
            builder = builder.with_flush();
        }
        if drop {
            builder = builder.with_drop();
        }
        Some(builder.build())
    }

    /// Drops metadata entries of compacted segments that have neither a
    /// live buffer nor an in-flight sync task. Cheap; runs after every
    /// trigger.
    fn cleanup_compacted_segments(&self, inner: &Inner) {
        let compacted = self
            .meta
            .segment_ids_where(&[SegmentFilter::Compacted, SegmentFilter::NoSyncingTask]);
        let targets: Vec<SegmentId> = compacted
            .into_iter()
            .filter(|id| !inner.buffers.contains_key(id))
            .collect();
        if targets.is_empty() {
            return;
        }
        let removed = self.meta.remove_segments(&[SegmentFilter::Ids(targets)]);
        if !removed.is_empty() {
            tracing::info!(channel = %self.channel, segments = ?removed, "removed compacted segments");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{int_rows, test_channel_schema, MockMetaWriter, MockSyncManager};
    use crate::types::PrimaryKey;

    use super::*;

    fn build(options: WriteBufferOptions) -> (Arc<WriteBuffer>, Arc<MockSyncManager>) {
        let meta = Arc::new(crate::meta::InMemoryMetaCache::new());
        let sync_manager = Arc::new(MockSyncManager::new());
        let wb = WriteBuffer::new(
            "by-dev-rootcoord-dml_0",
            1,
            test_channel_schema(),
            meta,
            Arc::clone(&sync_manager) as Arc<dyn SyncManager>,
            Arc::new(MockMetaWriter::new()),
            options,
        )
        .unwrap();
        (Arc::new(wb), sync_manager)
    }

    fn insert(segment_id: SegmentId, ids: Vec<i64>, ts: Timestamp) -> InsertBatch {
        let n = ids.len();
        InsertBatch {
            segment_id,
            partition_id: 100,
            schema_version: 1,
            timestamps: vec![ts; n],
            rows: int_rows(ids),
        }
    }

    #[test]
    fn test_rejects_schema_mismatch() {
        let (wb, _) = build(WriteBufferOptions::new());
        let mut batch = insert(1, vec![1], 10);
        batch.schema_version = 9;

        let err = wb
            .buffer_data(vec![batch], Vec::new(), &Position::new(*b"s", 5), &Position::new(*b"e", 15))
            .unwrap_err();
        assert!(matches!(err, WriteBufferError::SchemaMismatch { actual: 9, .. }));
        assert!(!wb.has_segment(1));
    }

    #[test]
    fn test_rejects_after_close() {
        let (wb, _) = build(WriteBufferOptions::new());
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(wb.close(false))
            .unwrap();
        assert_eq!(wb.state(), ChannelState::Closed);

        let err = wb
            .buffer_data(
                vec![insert(1, vec![1], 10)],
                Vec::new(),
                &Position::new(*b"s", 5),
                &Position::new(*b"e", 15),
            )
            .unwrap_err();
        assert!(matches!(err, WriteBufferError::ChannelClosed));
    }

    #[test]
    fn test_stale_segment_rejected_whole_batch() {
        let (wb, _) = build(WriteBufferOptions::new());
        wb.meta.add_segment(SegmentInfo::growing(2, 100));
        wb.meta.update_segments(
            &[SegmentAction::CompactTo(9)],
            &[SegmentFilter::Ids(vec![2])],
        );

        let err = wb
            .buffer_data(
                vec![insert(1, vec![1], 10), insert(2, vec![2], 20)],
                Vec::new(),
                &Position::new(*b"s", 5),
                &Position::new(*b"e", 25),
            )
            .unwrap_err();
        assert!(matches!(err, WriteBufferError::StaleSegment(2)));
        // All-or-nothing: segment 1 must not have become visible either.
        assert!(!wb.has_segment(1));
    }

    #[test]
    fn test_buffer_full_hard_cap() {
        let config = WriteBufferConfig {
            hard_segment_limit: Some(1),
            ..WriteBufferConfig::default()
        };
        let (wb, _) = build(WriteBufferOptions::new().with_config(config));

        let err = wb
            .buffer_data(
                vec![insert(1, vec![1, 2, 3], 10)],
                Vec::new(),
                &Position::new(*b"s", 5),
                &Position::new(*b"e", 15),
            )
            .unwrap_err();
        assert!(matches!(err, WriteBufferError::BufferFull { segment_id: 1, .. }));
    }

    #[test]
    fn test_l0_policy_requires_allocator() {
        let meta = Arc::new(crate::meta::InMemoryMetaCache::new());
        let result = WriteBuffer::new(
            "ch",
            1,
            test_channel_schema(),
            meta,
            Arc::new(MockSyncManager::new()),
            Arc::new(MockMetaWriter::new()),
            WriteBufferOptions::new().with_delete_policy(DeletePolicy::L0Delta),
        );
        assert!(matches!(result, Err(WriteBufferError::ParameterInvalid(_))));
    }

    #[test]
    fn test_flush_segments_idempotent() {
        let (wb, _) = build(WriteBufferOptions::new());
        wb.buffer_data(
            vec![insert(1, vec![1], 10)],
            Vec::new(),
            &Position::new(*b"s", 5),
            &Position::new(*b"e", 15),
        )
        .unwrap();

        wb.flush_segments(&[1, 999]).unwrap();
        let state_once = wb.meta.get_segment(1).unwrap().state;
        wb.flush_segments(&[1]).unwrap();
        let state_twice = wb.meta.get_segment(1).unwrap().state;

        assert_eq!(state_once, SegmentState::Flushing);
        assert_eq!(state_twice, SegmentState::Flushing);
        assert!(wb.meta.get_segment(999).is_none());
    }

    #[test]
    fn test_delete_only_batch_creates_checkpoint_candidate() {
        let (wb, _) = build(WriteBufferOptions::new());
        // Segment 1 exists with pk 7 in its bloom filter.
        wb.buffer_data(
            vec![insert(1, vec![7], 10)],
            Vec::new(),
            &Position::new(*b"a", 5),
            &Position::new(*b"b", 15),
        )
        .unwrap();

        let delete = DeleteBatch {
            partition_id: 100,
            schema_version: 1,
            primary_keys: vec![PrimaryKey::Int64(7)],
            timestamps: vec![20],
        };
        wb.buffer_data(vec![], vec![delete], &Position::new(*b"c", 18), &Position::new(*b"d", 22))
            .unwrap();

        assert!(wb.has_segment(1));
        assert_eq!(wb.checkpoint().timestamp, 5);
    }
}
