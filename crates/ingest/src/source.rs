//! Opening the transport the producer reads from.

use std::path::Path;

use tokio::io::{AsyncBufRead, BufReader};

/// Source path meaning "read standard input".
pub const STDIN_SOURCE: &str = "-";

/// Boxed line source handed to [`Ingestor`](crate::Ingestor).
pub type BoxedSource = Box<dyn AsyncBufRead + Unpin + Send>;

/// Opens a record source: standard input for `"-"`, otherwise a file or
/// device node (e.g. an already-configured serial port such as
/// `/dev/ttyACM0`). Link settings like baud rate belong to the transport
/// and are configured outside this process.
pub async fn open_source(path: &str) -> std::io::Result<BoxedSource> {
    if path == STDIN_SOURCE {
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }

    let file = tokio::fs::File::open(Path::new(path)).await?;
    tracing::info!(path, "opened ingest source");
    Ok(Box::new(BufReader::new(file)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let err = open_source("/nonexistent/groundlink/feed").await.err().unwrap();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
