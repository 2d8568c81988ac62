//! Sync tasks and the sync-manager contract.
//!
//! A [`SyncTask`] is the immutable snapshot of one segment's buffered data
//! plus the metadata the sync manager needs to persist it. Submission is
//! non-blocking; the result arrives through the returned [`SyncHandle`].
//! Failure escalation goes through the task's callback, which carries only
//! indices (channel + segment id), never a pointer back into the write
//! buffer.

use std::fmt;
use std::sync::Arc;

use arrow_schema::SchemaRef;
use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::buffer::{DeleteData, InsertData};
use crate::error::SyncError;
use crate::schema::ChannelSchema;
use crate::types::{CollectionId, PartitionId, Position, SegmentId, SegmentLevel, TimeRange};

/// Callback invoked by the sync manager when a task fails permanently.
pub type FailureCallback = Box<dyn Fn(&SyncError) + Send + Sync>;

/// Immutable unit of work handed to the sync manager.
pub struct SyncTask {
    /// Collection the segment belongs to.
    pub collection_id: CollectionId,
    /// Partition the segment belongs to.
    pub partition_id: PartitionId,
    /// Segment being persisted.
    pub segment_id: SegmentId,
    /// Channel the data was consumed from.
    pub channel: Arc<str>,
    /// Yielded insert rows, if any.
    pub insert: Option<InsertData>,
    /// Yielded tombstones, if any.
    pub delta: Option<DeleteData>,
    /// Timestamp range of the carried data.
    pub time_range: TimeRange,
    /// Start position of the yielded buffer.
    pub start_position: Option<Position>,
    /// Channel checkpoint at the moment the task was cut.
    pub checkpoint: Position,
    /// Schema snapshot for serialization.
    pub schema: Arc<ChannelSchema>,
    /// Rows carried by this task.
    pub batch_size: u64,
    /// Storage level of the segment.
    pub level: SegmentLevel,
    /// Whether the segment flushes (seals durably) after this task.
    pub flushed: bool,
    /// Whether the channel is being dropped.
    pub dropped: bool,
    /// Arrow schema handle carried for the V2 storage path.
    pub arrow_schema: Option<SchemaRef>,
    failure_callback: Option<FailureCallback>,
}

impl SyncTask {
    /// Runs the failure callback, if one was installed.
    ///
    /// The sync manager calls this when the task fails permanently, before
    /// resolving the handle.
    pub fn notify_failure(&self, err: &SyncError) {
        if let Some(callback) = &self.failure_callback {
            callback(err);
        }
    }
}

impl fmt::Debug for SyncTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncTask")
            .field("channel", &self.channel)
            .field("segment_id", &self.segment_id)
            .field("batch_size", &self.batch_size)
            .field("level", &self.level)
            .field("flushed", &self.flushed)
            .field("dropped", &self.dropped)
            .finish_non_exhaustive()
    }
}

/// Consuming builder for [`SyncTask`].
pub struct SyncTaskBuilder {
    task: SyncTask,
}

impl SyncTaskBuilder {
    /// Starts a task for `segment_id` on `channel` with `schema`.
    #[must_use]
    pub fn new(channel: Arc<str>, segment_id: SegmentId, schema: Arc<ChannelSchema>) -> Self {
        Self {
            task: SyncTask {
                collection_id: 0,
                partition_id: 0,
                segment_id,
                channel,
                insert: None,
                delta: None,
                time_range: TimeRange::empty(),
                start_position: None,
                checkpoint: Position::default(),
                schema,
                batch_size: 0,
                level: SegmentLevel::L1,
                flushed: false,
                dropped: false,
                arrow_schema: None,
                failure_callback: None,
            },
        }
    }

    /// Sets the collection id.
    #[must_use]
    pub fn with_collection_id(mut self, collection_id: CollectionId) -> Self {
        self.task.collection_id = collection_id;
        self
    }

    /// Sets the partition id.
    #[must_use]
    pub fn with_partition_id(mut self, partition_id: PartitionId) -> Self {
        self.task.partition_id = partition_id;
        self
    }

    /// Attaches yielded insert rows and derives the batch size.
    #[must_use]
    pub fn with_insert_data(mut self, insert: Option<InsertData>) -> Self {
        self.task.batch_size = insert.as_ref().map_or(0, |d| d.row_count as u64);
        self.task.insert = insert;
        self
    }

    /// Attaches yielded tombstones.
    #[must_use]
    pub fn with_delete_data(mut self, delta: Option<DeleteData>) -> Self {
        self.task.delta = delta;
        self
    }

    /// Sets the timestamp range.
    #[must_use]
    pub fn with_time_range(mut self, time_range: TimeRange) -> Self {
        self.task.time_range = time_range;
        self
    }

    /// Sets the yielded buffer's start position.
    #[must_use]
    pub fn with_start_position(mut self, start: Option<Position>) -> Self {
        self.task.start_position = start;
        self
    }

    /// Sets the channel checkpoint captured at task-cut time.
    #[must_use]
    pub fn with_checkpoint(mut self, checkpoint: Position) -> Self {
        self.task.checkpoint = checkpoint;
        self
    }

    /// Sets the segment's storage level.
    #[must_use]
    pub fn with_level(mut self, level: SegmentLevel) -> Self {
        self.task.level = level;
        self
    }

    /// Marks the segment as flushing after this task.
    #[must_use]
    pub fn with_flush(mut self) -> Self {
        self.task.flushed = true;
        self
    }

    /// Marks the task as part of a channel drop.
    #[must_use]
    pub fn with_drop(mut self) -> Self {
        self.task.dropped = true;
        self
    }

    /// Carries the Arrow schema handle for the V2 storage path.
    #[must_use]
    pub fn with_arrow_schema(mut self, arrow_schema: SchemaRef) -> Self {
        self.task.arrow_schema = Some(arrow_schema);
        self
    }

    /// Installs the permanent-failure callback.
    #[must_use]
    pub fn with_failure_callback(mut self, callback: FailureCallback) -> Self {
        self.task.failure_callback = Some(callback);
        self
    }

    /// Finishes the task.
    #[must_use]
    pub fn build(self) -> SyncTask {
        self.task
    }
}

/// Completion future for one submitted sync task.
#[derive(Debug)]
pub struct SyncHandle {
    segment_id: SegmentId,
    rx: oneshot::Receiver<Result<(), SyncError>>,
}

impl SyncHandle {
    /// Creates a resolver/handle pair for `segment_id`.
    ///
    /// The sync manager keeps the sender and resolves it exactly once;
    /// dropping it unresolved surfaces [`SyncError::Abandoned`].
    #[must_use]
    pub fn pair(segment_id: SegmentId) -> (oneshot::Sender<Result<(), SyncError>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { segment_id, rx })
    }

    /// Segment the underlying task persists.
    #[must_use]
    pub fn segment_id(&self) -> SegmentId {
        self.segment_id
    }

    /// Awaits the task result.
    ///
    /// # Errors
    ///
    /// Returns the task's [`SyncError`], or [`SyncError::Abandoned`] if the
    /// sync manager dropped the task without resolving it.
    pub async fn wait(self) -> Result<(), SyncError> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Abandoned),
        }
    }
}

/// Asynchronous persistence pipeline for sync tasks.
pub trait SyncManager: Send + Sync {
    /// Submits a task without blocking; the result arrives via the handle.
    fn sync_data(&self, task: SyncTask) -> SyncHandle;

    /// Earliest start position among the channel's in-flight tasks, used
    /// for checkpoint evaluation.
    fn earliest_position(&self, channel: &str) -> Option<(SegmentId, Position)>;
}

/// Writer for channel-level metadata transitions that must reach the
/// coordinator, invoked only during channel drop.
#[async_trait]
pub trait MetaWriter: Send + Sync {
    /// Drops the channel after its last buffers were persisted.
    async fn drop_channel(&self, channel: &str) -> Result<(), SyncError>;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow_schema::{DataType, Field, Schema};

    use super::*;

    fn test_schema() -> Arc<ChannelSchema> {
        let arrow = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
        Arc::new(ChannelSchema::new(1, arrow, 0).unwrap())
    }

    #[test]
    fn test_builder_defaults_and_flags() {
        let task = SyncTaskBuilder::new("ch-0".into(), 7, test_schema())
            .with_collection_id(1)
            .with_partition_id(2)
            .with_level(SegmentLevel::L0)
            .with_flush()
            .with_drop()
            .build();

        assert_eq!(task.segment_id, 7);
        assert_eq!(task.level, SegmentLevel::L0);
        assert!(task.flushed);
        assert!(task.dropped);
        assert_eq!(task.batch_size, 0);
        assert!(task.arrow_schema.is_none());
    }

    #[test]
    fn test_failure_callback_fires() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let task = SyncTaskBuilder::new("ch-0".into(), 7, test_schema())
            .with_failure_callback(Box::new(move |_err| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .build();

        task.notify_failure(&SyncError::Abandoned);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handle_resolution() {
        let (tx, handle) = SyncHandle::pair(3);
        assert_eq!(handle.segment_id(), 3);
        tx.send(Ok(())).unwrap();
        assert!(handle.wait().await.is_ok());

        let (tx, handle) = SyncHandle::pair(4);
        drop(tx);
        assert!(matches!(handle.wait().await, Err(SyncError::Abandoned)));
    }
}
