//! Append-only columnar staging for insert rows.

use arrow_array::RecordBatch;
use arrow_schema::SchemaRef;

use crate::types::{TimeRange, Timestamp};

/// Immutable snapshot of staged insert rows, produced by a yield.
///
/// Handed to exactly one sync task; the write buffer keeps no reference
/// after the handoff.
#[derive(Debug, Clone)]
pub struct InsertData {
    /// Arrow schema of the chunks.
    pub schema: SchemaRef,
    /// Row chunks in arrival order.
    pub chunks: Vec<RecordBatch>,
    /// Per-row timestamps, concatenated across chunks.
    pub timestamps: Vec<Timestamp>,
    /// Total row count.
    pub row_count: usize,
    /// Timestamp range covered by the rows.
    pub time_range: TimeRange,
}

/// In-memory staging for one segment's insert rows.
///
/// Chunks are appended in arrival order and never reordered, so rows that
/// entered in timestamp order leave in timestamp order.
#[derive(Debug)]
pub struct InsertBuffer {
    schema: SchemaRef,
    chunks: Vec<RecordBatch>,
    timestamps: Vec<Timestamp>,
    rows: usize,
    size_bytes: usize,
    time_range: TimeRange,
}

impl InsertBuffer {
    /// Creates an empty buffer for rows of `schema`.
    #[must_use]
    pub fn new(schema: SchemaRef) -> Self {
        Self {
            schema,
            chunks: Vec::new(),
            timestamps: Vec::new(),
            rows: 0,
            size_bytes: 0,
            time_range: TimeRange::empty(),
        }
    }

    /// Appends a validated chunk.
    ///
    /// Callers have already checked schema and row/timestamp alignment;
    /// the append itself cannot fail, which keeps batch buffering
    /// all-or-nothing at the call site.
    pub fn append(&mut self, rows: RecordBatch, timestamps: &[Timestamp]) {
        debug_assert_eq!(rows.num_rows(), timestamps.len());
        self.rows += rows.num_rows();
        self.size_bytes += rows.get_array_memory_size();
        for &ts in timestamps {
            self.time_range.expand(ts);
        }
        self.timestamps.extend_from_slice(timestamps);
        self.chunks.push(rows);
    }

    /// Total staged rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Estimated staged bytes (Arrow array memory).
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    /// Timestamp range of staged rows.
    #[must_use]
    pub fn time_range(&self) -> TimeRange {
        self.time_range
    }

    /// Returns `true` if nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Consumes the buffer into an immutable snapshot.
    #[must_use]
    pub fn into_data(self) -> InsertData {
        InsertData {
            schema: self.schema,
            chunks: self.chunks,
            timestamps: self.timestamps,
            row_count: self.rows,
            time_range: self.time_range,
        }
    }
}
