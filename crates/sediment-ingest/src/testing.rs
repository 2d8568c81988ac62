//! Testing utilities: mock collaborators and row helpers.
//!
//! Used by the crate's own unit and integration tests, and exported so
//! hosts embedding the write buffer can test their wiring without a real
//! sync pipeline.

use std::sync::Arc;

use arrow_array::{Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::broker::Broker;
use crate::error::SyncError;
use crate::schema::ChannelSchema;
use crate::sync::{MetaWriter, SyncHandle, SyncManager, SyncTask};
use crate::types::{Position, SegmentId, Timestamp};

/// Arrow schema used by the test helpers: `id` (Int64 pk) + `value` (Utf8).
#[must_use]
pub fn test_arrow_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("value", DataType::Utf8, false),
    ]))
}

/// Channel schema (version 1) over [`test_arrow_schema`].
///
/// # Panics
///
/// Never panics: the pk column is valid by construction.
#[must_use]
pub fn test_channel_schema() -> Arc<ChannelSchema> {
    Arc::new(ChannelSchema::new(1, test_arrow_schema(), 0).unwrap())
}

/// Builds a row chunk with the given ids and generated string values.
///
/// # Panics
///
/// Never panics: the arrays match the schema by construction.
#[must_use]
pub fn int_rows(ids: Vec<i64>) -> RecordBatch {
    let values: Vec<String> = ids.iter().map(|i| format!("value_{i}")).collect();
    let refs: Vec<&str> = values.iter().map(String::as_str).collect();
    RecordBatch::try_new(
        test_arrow_schema(),
        vec![Arc::new(Int64Array::from(ids)), Arc::new(StringArray::from(refs))],
    )
    .unwrap()
}

#[derive(Default)]
struct MockSyncInner {
    tasks: Vec<SyncTask>,
    pending: Vec<Option<oneshot::Sender<Result<(), SyncError>>>>,
}

/// In-memory [`SyncManager`] that records submitted tasks.
///
/// In manual mode (the default) tasks stay in flight until resolved with
/// [`complete`](Self::complete); `auto_ok` / `auto_fail` resolve every
/// submission immediately.
#[derive(Default)]
pub struct MockSyncManager {
    inner: Mutex<MockSyncInner>,
    auto_result: Option<Result<(), String>>,
}

impl MockSyncManager {
    /// Manual-resolution manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves every submission with success immediately.
    #[must_use]
    pub fn auto_ok() -> Self {
        Self {
            inner: Mutex::default(),
            auto_result: Some(Ok(())),
        }
    }

    /// Fails every submission immediately with `message`.
    #[must_use]
    pub fn auto_fail(message: impl Into<String>) -> Self {
        Self {
            inner: Mutex::default(),
            auto_result: Some(Err(message.into())),
        }
    }

    /// Number of tasks submitted so far.
    #[must_use]
    pub fn submitted_count(&self) -> usize {
        self.inner.lock().tasks.len()
    }

    /// Runs `f` over all submitted tasks, in submission order.
    pub fn inspect_tasks<R>(&self, f: impl FnOnce(&[SyncTask]) -> R) -> R {
        f(&self.inner.lock().tasks)
    }

    /// Resolves all pending tasks for `segment_id`; returns how many.
    pub fn complete(&self, segment_id: SegmentId, result: &Result<(), SyncError>) -> usize {
        let mut guard = self.inner.lock();
        let MockSyncInner { tasks, pending } = &mut *guard;
        let mut resolved = 0;
        for (task, slot) in tasks.iter().zip(pending.iter_mut()) {
            if task.segment_id != segment_id {
                continue;
            }
            if let Some(tx) = slot.take() {
                if let Err(err) = result {
                    task.notify_failure(err);
                }
                let _ = tx.send(result.clone());
                resolved += 1;
            }
        }
        resolved
    }

    /// Resolves every pending task with `result`.
    pub fn complete_all(&self, result: &Result<(), SyncError>) {
        let mut guard = self.inner.lock();
        let MockSyncInner { tasks, pending } = &mut *guard;
        for (task, slot) in tasks.iter().zip(pending.iter_mut()) {
            if let Some(tx) = slot.take() {
                if let Err(err) = result {
                    task.notify_failure(err);
                }
                let _ = tx.send(result.clone());
            }
        }
    }
}

impl SyncManager for MockSyncManager {
    fn sync_data(&self, task: SyncTask) -> SyncHandle {
        let (tx, handle) = SyncHandle::pair(task.segment_id);
        let mut guard = self.inner.lock();
        match &self.auto_result {
            Some(Ok(())) => {
                let _ = tx.send(Ok(()));
                guard.pending.push(None);
            }
            Some(Err(message)) => {
                let err = SyncError::Failed {
                    segment_id: task.segment_id,
                    message: message.clone(),
                };
                task.notify_failure(&err);
                let _ = tx.send(Err(err));
                guard.pending.push(None);
            }
            None => guard.pending.push(Some(tx)),
        }
        guard.tasks.push(task);
        handle
    }

    fn earliest_position(&self, channel: &str) -> Option<(SegmentId, Position)> {
        let guard = self.inner.lock();
        guard
            .tasks
            .iter()
            .zip(guard.pending.iter())
            .filter(|(task, slot)| slot.is_some() && &*task.channel == channel)
            .filter_map(|(task, _)| {
                task.start_position
                    .clone()
                    .map(|position| (task.segment_id, position))
            })
            .min_by_key(|(_, position)| position.timestamp)
    }
}

/// Recording [`MetaWriter`], optionally failing the drop hook.
#[derive(Default)]
pub struct MockMetaWriter {
    dropped: Mutex<Vec<String>>,
    fail: bool,
}

impl MockMetaWriter {
    /// Writer whose drop hook succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writer whose drop hook fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            dropped: Mutex::default(),
            fail: true,
        }
    }

    /// Channels dropped so far.
    #[must_use]
    pub fn dropped_channels(&self) -> Vec<String> {
        self.dropped.lock().clone()
    }
}

#[async_trait]
impl MetaWriter for MockMetaWriter {
    async fn drop_channel(&self, channel: &str) -> Result<(), SyncError> {
        if self.fail {
            return Err(SyncError::DropChannel(format!("mock failure for {channel}")));
        }
        self.dropped.lock().push(channel.to_string());
        Ok(())
    }
}

/// [`Broker`] returning a fixed flush timestamp.
#[derive(Debug, Default)]
pub struct MockBroker {
    flush_ts: Timestamp,
}

impl MockBroker {
    /// Broker answering with `flush_ts`.
    #[must_use]
    pub fn new(flush_ts: Timestamp) -> Self {
        Self { flush_ts }
    }
}

#[async_trait]
impl Broker for MockBroker {
    async fn remote_flush_timestamp(&self, _channel: &str) -> Result<Timestamp, SyncError> {
        Ok(self.flush_ts)
    }
}
