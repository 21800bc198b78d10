//! Ingestion error types.

/// A record that could not be turned into a row.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("field {index} is not a number: {value:?}")]
    InvalidField { index: usize, value: String },

    #[error("field {index} is not finite: {value}")]
    NonFinite { index: usize, value: f64 },
}

/// Unrecoverable producer failures. Bad records are not errors at this level.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
