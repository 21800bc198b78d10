//! Buffer error types.

/// Errors produced by [`TelemetryBuffer`](crate::TelemetryBuffer) operations.
///
/// All of them reject a single operation and leave the buffer untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("schema mismatch: row has {actual} values, schema has {expected} columns")]
    SchemaMismatch { expected: usize, actual: usize },

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("column index {index} out of range ({width} columns)")]
    IndexOutOfRange { index: usize, width: usize },
}
