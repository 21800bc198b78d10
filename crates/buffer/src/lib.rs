//! Bounded, insertion-ordered, multi-column telemetry buffer.
//!
//! One ingestion loop writes rows while any number of exporters copy columns
//! out concurrently. Rows live in a fixed ring of slots addressed by a
//! monotonic write counter, guarded by a reader/writer lock: a write appends
//! and evicts as one unit, and every read copies from a single instant.

pub mod buffer;
pub mod error;
mod ring;
pub mod schema;

pub use buffer::{ColumnSnapshot, RowsSince, SequencedRow, Snapshot, TelemetryBuffer};
pub use error::BufferError;
pub use schema::{ColumnId, Schema};
