use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use groundlink_buffer::TelemetryBuffer;
use groundlink_task::{LoopBody, Step};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;

use crate::{IngestError, LineDecoder};

/// Record counters shared between the producer loop and observers.
#[derive(Debug, Default)]
pub struct IngestStats {
    accepted: AtomicU64,
    rejected: AtomicU64,
}

impl IngestStats {
    /// Records written into the buffer.
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Records dropped because they failed to decode or had the wrong width.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

/// Producer loop body: one record per iteration.
///
/// Owns the write side of the buffer. Reaching the end of the source finishes
/// the loop; an I/O error fails it. Cancellation is observed while waiting for
/// the next line. A partially received line is never written; it is held
/// until the rest arrives, even across a stop and restart.
pub struct Ingestor<R> {
    source: R,
    buffer: Arc<TelemetryBuffer>,
    decoder: LineDecoder,
    line: Vec<u8>,
    stats: Arc<IngestStats>,
}

impl<R> Ingestor<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn new(source: R, buffer: Arc<TelemetryBuffer>) -> Self {
        Self {
            source,
            buffer,
            decoder: LineDecoder::default(),
            line: Vec::new(),
            stats: Arc::new(IngestStats::default()),
        }
    }

    pub fn with_decoder(mut self, decoder: LineDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    /// Handle to the record counters.
    pub fn stats(&self) -> Arc<IngestStats> {
        Arc::clone(&self.stats)
    }

    /// Decodes and writes one raw record. Bad records are logged and dropped.
    fn ingest(&self, raw: &[u8]) {
        // Line noise on a serial link is not UTF-8; let it fail decoding.
        let text = String::from_utf8_lossy(raw);

        let row = match self.decoder.decode(&text) {
            Ok(Some(row)) => row,
            Ok(None) => return,
            Err(e) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, record = %text.trim_end(), "dropping undecodable record");
                return;
            }
        };

        match self.buffer.write(&row) {
            Ok(seq) => {
                self.stats.accepted.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(seq, "record ingested");
            }
            Err(e) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "dropping record");
            }
        }
    }
}

impl<R> LoopBody for Ingestor<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    type Error = IngestError;

    async fn step(&mut self, cancel: &CancellationToken) -> Result<Step, IngestError> {
        // A cancelled read leaves its bytes in `self.line`; they are kept so
        // the next step (possibly after a restart) completes the same record.
        let read = tokio::select! {
            _ = cancel.cancelled() => return Ok(Step::Continue),
            read = self.source.read_until(b'\n', &mut self.line) => read?,
        };

        if read == 0 {
            if !self.line.is_empty() {
                self.ingest(&self.line);
                self.line.clear();
            }
            tracing::info!(
                accepted = self.stats.accepted(),
                rejected = self.stats.rejected(),
                "ingest source reached end of stream"
            );
            return Ok(Step::Finished);
        }

        self.ingest(&self.line);
        self.line.clear();
        Ok(Step::Continue)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use groundlink_task::{TaskController, TaskState};
    use tokio::io::{AsyncWriteExt, BufReader};

    use super::*;

    fn buffer(capacity: usize) -> Arc<TelemetryBuffer> {
        Arc::new(TelemetryBuffer::with_columns(capacity, ["time", "altitude", "velocity"]).unwrap())
    }

    #[tokio::test]
    async fn ingests_until_end_of_stream() {
        let buf = buffer(10);
        let feed: &'static [u8] = b"0,100.0,5.0\n1,105.0,5.5\n2,111.0,6.0\n";
        let ingestor = Ingestor::new(feed, Arc::clone(&buf));
        let stats = ingestor.stats();

        let task = TaskController::new("ingest", ingestor);
        task.start();
        task.join().await.unwrap();

        assert_eq!(task.state(), TaskState::Stopped);
        assert_eq!(stats.accepted(), 3);
        assert_eq!(buf.read_column("altitude").unwrap(), vec![100.0, 105.0, 111.0]);
    }

    #[tokio::test]
    async fn bad_records_are_dropped_and_counted() {
        let buf = buffer(10);
        let feed: &'static [u8] = b"0,1,2\n\n1,2\nx,y,z\n\xff\xfe\n3,4,5";
        let ingestor = Ingestor::new(feed, Arc::clone(&buf));
        let stats = ingestor.stats();

        let task = TaskController::new("ingest", ingestor);
        task.start();
        task.join().await.unwrap();

        assert_eq!(stats.accepted(), 2);
        assert_eq!(stats.rejected(), 3);
        assert_eq!(buf.read_column("time").unwrap(), vec![0.0, 3.0]);
    }

    #[tokio::test]
    async fn stop_while_waiting_for_data() {
        let buf = buffer(10);
        let (mut tx, rx) = tokio::io::duplex(64);
        let task = TaskController::new("ingest", Ingestor::new(BufReader::new(rx), Arc::clone(&buf)));

        task.start();
        tx.write_all(b"1,2,3\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(buf.snapshot_count(), 1);

        // A half-sent record does not reach the buffer.
        tx.write_all(b"4,5").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        task.stop();
        task.join().await.unwrap();

        assert_eq!(task.state(), TaskState::Stopped);
        assert_eq!(buf.snapshot_count(), 1);
        assert_eq!(buf.written(), 1);
    }

    #[tokio::test]
    async fn restart_completes_record_split_by_stop() {
        let buf = buffer(10);
        let (mut tx, rx) = tokio::io::duplex(64);
        let ingestor = Ingestor::new(BufReader::new(rx), Arc::clone(&buf));
        let stats = ingestor.stats();
        let task = TaskController::new("ingest", ingestor);

        task.start();
        tx.write_all(b"1,2,3\n12").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        task.stop();
        task.join().await.unwrap();
        assert_eq!(buf.written(), 1);

        task.start();
        tx.write_all(b".5,3,4\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        task.stop();
        task.join().await.unwrap();

        assert_eq!(task.launches(), 2);
        assert_eq!(buf.read_column("time").unwrap(), vec![1.0, 12.5]);
        assert_eq!(buf.latest().unwrap().values, vec![12.5, 3.0, 4.0]);
        assert_eq!(stats.accepted(), 2);
        assert_eq!(stats.rejected(), 0);
    }

    #[tokio::test]
    async fn record_pending_at_end_of_stream_is_ingested() {
        let buf = buffer(10);
        let (mut tx, rx) = tokio::io::duplex(64);
        let task = TaskController::new("ingest", Ingestor::new(BufReader::new(rx), Arc::clone(&buf)));

        task.start();
        tx.write_all(b"7,8,9").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        task.stop();
        task.join().await.unwrap();
        assert_eq!(buf.written(), 0);

        // The feed closes without a trailing newline.
        drop(tx);
        task.start();
        task.join().await.unwrap();

        assert_eq!(buf.latest().unwrap().values, vec![7.0, 8.0, 9.0]);
    }

    #[tokio::test]
    async fn semicolon_feed() {
        let buf = buffer(2);
        let feed: &'static [u8] = b"1;2;3\n4;5;6\n7;8;9\n";
        let ingestor = Ingestor::new(feed, Arc::clone(&buf)).with_decoder(LineDecoder::new(';'));

        let task = TaskController::new("ingest", ingestor);
        task.start();
        task.join().await.unwrap();

        assert_eq!(buf.read_column("velocity").unwrap(), vec![6.0, 9.0]);
    }
}
