//! Per-segment accumulation of insert rows and delete tombstones.
//!
//! A [`SegmentBuffer`] exists in the write buffer's map exactly while the
//! segment holds unsynced data. Yielding is a one-shot handoff: the buffer
//! is consumed, and a later write recreates it from scratch with a fresh
//! start position.

mod delta;
mod insert;

pub use delta::{DeleteData, DeltaBuffer};
pub use insert::{InsertBuffer, InsertData};

use std::time::Instant;

use arrow_schema::SchemaRef;

use crate::types::{Position, SegmentId, TimeRange};

/// The contents a segment buffer gives up when yielded to a sync task.
#[derive(Debug)]
pub struct YieldedBuffer {
    /// Staged insert rows, `None` when the buffer was delete-only.
    pub insert: Option<InsertData>,
    /// Staged tombstones, `None` when the buffer had no deletes.
    pub delta: Option<DeleteData>,
    /// Combined timestamp range of rows and tombstones.
    pub time_range: TimeRange,
    /// Position watermark recorded at the first write.
    pub start_position: Option<Position>,
}

/// In-memory accumulator for one segment.
#[derive(Debug)]
pub struct SegmentBuffer {
    segment_id: SegmentId,
    insert: InsertBuffer,
    delta: DeltaBuffer,
    start_position: Option<Position>,
    last_position: Option<Position>,
    opened_at: Instant,
}

impl SegmentBuffer {
    /// Creates an empty buffer for `segment_id` with insert rows of `schema`.
    #[must_use]
    pub fn new(segment_id: SegmentId, schema: SchemaRef) -> Self {
        Self {
            segment_id,
            insert: InsertBuffer::new(schema),
            delta: DeltaBuffer::new(),
            start_position: None,
            last_position: None,
            opened_at: Instant::now(),
        }
    }

    /// Segment this buffer accumulates for.
    #[must_use]
    pub fn segment_id(&self) -> SegmentId {
        self.segment_id
    }

    /// Mutable access to the insert staging.
    pub fn insert_mut(&mut self) -> &mut InsertBuffer {
        &mut self.insert
    }

    /// Mutable access to the tombstone staging.
    pub fn delta_mut(&mut self) -> &mut DeltaBuffer {
        &mut self.delta
    }

    /// Records the batch positions: the start position sticks at the first
    /// write, the last position advances with every batch.
    pub fn note_positions(&mut self, start: &Position, end: &Position) {
        if self.start_position.is_none() {
            self.start_position = Some(start.clone());
        }
        self.last_position = Some(end.clone());
    }

    /// Earliest position covered by this buffer, `None` until first write.
    #[must_use]
    pub fn earliest_position(&self) -> Option<&Position> {
        self.start_position.as_ref()
    }

    /// Staged insert row count.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.insert.rows()
    }

    /// Estimated staged bytes across rows and tombstones.
    #[must_use]
    pub fn memory_size(&self) -> usize {
        self.insert.size_bytes() + self.delta.size_bytes()
    }

    /// Combined timestamp range across rows and tombstones.
    #[must_use]
    pub fn time_range(&self) -> TimeRange {
        let mut range = self.insert.time_range();
        range.merge(self.delta.time_range());
        range
    }

    /// Wall-clock instant the buffer was created.
    #[must_use]
    pub fn opened_at(&self) -> Instant {
        self.opened_at
    }

    /// Returns `true` if neither rows nor tombstones are staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.insert.is_empty() && self.delta.is_empty()
    }

    /// Consumes the buffer into an immutable snapshot for a sync task.
    #[must_use]
    pub fn yield_contents(self) -> YieldedBuffer {
        let time_range = self.time_range();
        YieldedBuffer {
            insert: (!self.insert.is_empty()).then(|| self.insert.into_data()),
            delta: (!self.delta.is_empty()).then(|| self.delta.into_data()),
            time_range,
            start_position: self.start_position,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow_array::{Int64Array, RecordBatch, StringArray};
    use arrow_schema::{DataType, Field, Schema};

    use crate::types::PrimaryKey;

    use super::*;

    fn test_schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("payload", DataType::Utf8, false),
        ]))
    }

    fn rows(ids: Vec<i64>) -> RecordBatch {
        let payloads: Vec<&str> = ids.iter().map(|_| "p").collect();
        RecordBatch::try_new(
            test_schema(),
            vec![Arc::new(Int64Array::from(ids)), Arc::new(StringArray::from(payloads))],
        )
        .unwrap()
    }

    #[test]
    fn test_start_position_sticks() {
        let mut buffer = SegmentBuffer::new(1, test_schema());
        buffer.note_positions(&Position::new(*b"a", 5), &Position::new(*b"b", 35));
        buffer.note_positions(&Position::new(*b"c", 36), &Position::new(*b"d", 50));

        assert_eq!(buffer.earliest_position().unwrap().timestamp, 5);
    }

    #[test]
    fn test_time_range_merges_insert_and_delta() {
        let mut buffer = SegmentBuffer::new(1, test_schema());
        buffer.insert_mut().append(rows(vec![1]), &[30]);
        buffer.delta_mut().append(PrimaryKey::Int64(9), 60);

        assert_eq!(buffer.time_range(), TimeRange::new(30, 60));
        assert_eq!(buffer.rows(), 1);
        assert!(buffer.memory_size() > 0);
    }

    #[test]
    fn test_yield_splits_empty_sides() {
        let mut buffer = SegmentBuffer::new(1, test_schema());
        buffer.delta_mut().append(PrimaryKey::Int64(9), 60);
        buffer.note_positions(&Position::new(*b"a", 55), &Position::new(*b"b", 61));

        let yielded = buffer.yield_contents();
        assert!(yielded.insert.is_none());
        assert_eq!(yielded.delta.unwrap().len(), 1);
        assert_eq!(yielded.start_position.unwrap().timestamp, 55);
        assert_eq!(yielded.time_range, TimeRange::new(60, 60));
    }
}
