//! # Sediment Ingest
//!
//! Per-channel streaming write buffer for the Sediment ingestion node.
//!
//! Each channel carries an interleaved log of insert and delete records
//! tagged with monotone hybrid-logical timestamps. The [`WriteBuffer`]
//! accumulates them in memory per destination segment, applies pluggable
//! sync policies to pick segments for persistence, hands immutable
//! [`SyncTask`](sync::SyncTask)s to the asynchronous sync manager, and
//! continuously publishes the channel checkpoint: the earliest position
//! below which all data is either persisted or replayable.
//!
//! ## Collaborators
//!
//! The buffer performs no I/O itself. It talks to:
//! - a [`SyncManager`](sync::SyncManager), which persists yielded buffers,
//! - a [`MetaCache`](meta::MetaCache), the shared segment registry,
//! - a [`MetaWriter`](sync::MetaWriter), for the channel-drop hook,
//! - a [`Broker`](broker::Broker), read once to seed the flush watermark.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sediment_ingest::{WriteBuffer, WriteBufferOptions};
//!
//! let wb = WriteBuffer::new(channel, collection, schema, meta, sync, writer,
//!     WriteBufferOptions::new())?;
//! wb.buffer_data(inserts, deletes, &start, &end)?;
//! let checkpoint = wb.checkpoint();
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]

pub mod bloom;
pub mod broker;
pub mod buffer;
pub mod checkpoint;
pub mod config;
pub mod delete;
pub mod error;
pub mod meta;
pub mod policy;
pub mod schema;
pub mod sync;
pub mod testing;
pub mod types;
mod write_buffer;

pub use config::{DeletePolicy, WriteBufferConfig, WriteBufferOptions};
pub use error::{Result, SyncError, WriteBufferError};
pub use schema::{ChannelSchema, DeleteBatch, InsertBatch};
pub use types::{Position, PrimaryKey, SegmentId, SegmentLevel, SegmentState, TimeRange, Timestamp};
pub use write_buffer::{ChannelState, WriteBuffer};
