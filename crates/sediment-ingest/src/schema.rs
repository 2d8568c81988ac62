//! Channel schema snapshot and the upstream message shapes.
//!
//! A batch handed to the write buffer is `(inserts, deletes, start, end)`
//! where every message carries the schema version it was produced under.
//! Insert rows travel as Arrow record batches; the primary-key column is
//! extracted eagerly because delete routing needs it.

use std::sync::Arc;

use arrow_array::cast::AsArray;
use arrow_array::types::Int64Type;
use arrow_array::RecordBatch;
use arrow_schema::{DataType, SchemaRef};

use crate::error::{Result, WriteBufferError};
use crate::types::{PartitionId, PrimaryKey, SegmentId, Timestamp};

/// Immutable schema snapshot for one channel.
#[derive(Debug, Clone)]
pub struct ChannelSchema {
    version: u32,
    arrow: SchemaRef,
    pk_column: usize,
}

impl ChannelSchema {
    /// Creates a schema snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`WriteBufferError::ParameterInvalid`] if `pk_column` is out
    /// of range or the primary-key column is neither `Int64` nor `Utf8`.
    pub fn new(version: u32, arrow: SchemaRef, pk_column: usize) -> Result<Self> {
        let field = arrow.fields().get(pk_column).ok_or_else(|| {
            WriteBufferError::ParameterInvalid(format!(
                "primary-key column index {pk_column} out of range"
            ))
        })?;
        match field.data_type() {
            DataType::Int64 | DataType::Utf8 => {}
            other => {
                return Err(WriteBufferError::ParameterInvalid(format!(
                    "unsupported primary-key type {other}"
                )))
            }
        }
        Ok(Self {
            version,
            arrow,
            pk_column,
        })
    }

    /// Schema version messages must match.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// The Arrow schema of insert rows.
    #[must_use]
    pub fn arrow(&self) -> &SchemaRef {
        &self.arrow
    }

    /// Index of the primary-key column.
    #[must_use]
    pub fn pk_column(&self) -> usize {
        self.pk_column
    }

    /// Extracts the primary-key column of `rows` as owned key values.
    ///
    /// # Errors
    ///
    /// Returns [`WriteBufferError::ParameterInvalid`] if the batch does not
    /// match this schema or the key column contains nulls.
    pub fn extract_pks(&self, rows: &RecordBatch) -> Result<Vec<PrimaryKey>> {
        if rows.schema().fields() != self.arrow.fields() {
            return Err(WriteBufferError::ParameterInvalid(
                "insert rows do not match the channel schema".into(),
            ));
        }
        let column = rows.column(self.pk_column);
        if column.null_count() > 0 {
            return Err(WriteBufferError::ParameterInvalid(
                "primary-key column contains nulls".into(),
            ));
        }
        match self.arrow.field(self.pk_column).data_type() {
            DataType::Int64 => {
                let array = column.as_primitive::<Int64Type>();
                Ok(array.values().iter().map(|v| PrimaryKey::Int64(*v)).collect())
            }
            DataType::Utf8 => {
                let array = column.as_string::<i32>();
                Ok(array
                    .iter()
                    .map(|v| PrimaryKey::VarChar(Arc::from(v.unwrap_or_default())))
                    .collect())
            }
            // Unreachable per the constructor check.
            other => Err(WriteBufferError::ParameterInvalid(format!(
                "unsupported primary-key type {other}"
            ))),
        }
    }
}

/// One insert message: rows destined for a single segment.
#[derive(Debug, Clone)]
pub struct InsertBatch {
    /// Destination segment.
    pub segment_id: SegmentId,
    /// Partition the segment belongs to.
    pub partition_id: PartitionId,
    /// Schema version the producer serialized under.
    pub schema_version: u32,
    /// Per-row timestamps, aligned with `rows`.
    pub timestamps: Vec<Timestamp>,
    /// Columnar row payload.
    pub rows: RecordBatch,
}

impl InsertBatch {
    /// Validates row/timestamp alignment.
    ///
    /// # Errors
    ///
    /// Returns [`WriteBufferError::ParameterInvalid`] if the timestamp
    /// vector length differs from the row count.
    pub fn check_aligned(&self) -> Result<()> {
        if self.timestamps.len() != self.rows.num_rows() {
            return Err(WriteBufferError::ParameterInvalid(format!(
                "insert batch for segment {}: {} timestamps for {} rows",
                self.segment_id,
                self.timestamps.len(),
                self.rows.num_rows()
            )));
        }
        Ok(())
    }
}

/// One delete message: tombstones for a partition.
#[derive(Debug, Clone)]
pub struct DeleteBatch {
    /// Partition the deletes target.
    pub partition_id: PartitionId,
    /// Schema version the producer serialized under.
    pub schema_version: u32,
    /// Deleted primary keys, paired with `timestamps`.
    pub primary_keys: Vec<PrimaryKey>,
    /// Per-tombstone timestamps.
    pub timestamps: Vec<Timestamp>,
}

impl DeleteBatch {
    /// Validates key/timestamp alignment.
    ///
    /// # Errors
    ///
    /// Returns [`WriteBufferError::ParameterInvalid`] on length mismatch.
    pub fn check_aligned(&self) -> Result<()> {
        if self.primary_keys.len() != self.timestamps.len() {
            return Err(WriteBufferError::ParameterInvalid(format!(
                "delete batch for partition {}: {} keys for {} timestamps",
                self.partition_id,
                self.primary_keys.len(),
                self.timestamps.len()
            )));
        }
        Ok(())
    }
}
