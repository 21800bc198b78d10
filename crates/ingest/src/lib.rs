//! Ground feed ingestion.
//!
//! The transport delivers one record per line, each a delimited (comma by
//! default) list of numeric fields aligned with the buffer schema. [`Ingestor`] is the producer
//! loop body: it reads a line, decodes it with [`LineDecoder`], and writes the
//! row into the shared [`TelemetryBuffer`](groundlink_buffer::TelemetryBuffer).
//! Malformed records are dropped and counted; they never stop the loop.

pub mod decoder;
pub mod error;
pub mod ingestor;
pub mod source;

pub use decoder::LineDecoder;
pub use error::{DecodeError, IngestError};
pub use ingestor::{IngestStats, Ingestor};
pub use source::{BoxedSource, STDIN_SOURCE, open_source};
