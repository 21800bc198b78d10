//! Export error types.

use groundlink_buffer::BufferError;

/// Failures reported by a sink adapter.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sink rejected batch: {0}")]
    Rejected(String),
}

/// Unrecoverable exporter failures; they end the exporter's loop.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("column {0:?} clashes with a reserved store field")]
    ReservedField(String),
}
