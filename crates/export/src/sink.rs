//! Narrow interfaces to the external store and dashboard, plus the thin
//! adapters shipped with the station.

use std::future::Future;
use std::path::{Path, PathBuf};

use groundlink_buffer::Snapshot;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::{Point, SinkError};

/// Receives batches of points bound for the persistent store.
///
/// Called once per export pass with every new row, oldest first. An error
/// ends the exporter loop; retry policy belongs to the sink.
pub trait PointSink: Send + 'static {
    fn write_points(
        &mut self,
        points: &[Point],
    ) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// Receives column snapshots for the live visualization surface.
pub trait SnapshotSink: Send + 'static {
    fn publish(
        &mut self,
        snapshot: &Snapshot,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// Writes points as line protocol, one per line, flushing after each batch.
pub struct LineProtocolSink<W> {
    writer: W,
}

impl<W> LineProtocolSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W> PointSink for LineProtocolSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn write_points(&mut self, points: &[Point]) -> Result<(), SinkError> {
        let mut out = String::new();
        for point in points {
            out.push_str(&point.to_line_protocol());
            out.push('\n');
        }
        self.writer.write_all(out.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// Boxed writer for a store output chosen at runtime.
pub type BoxedWriter = Box<dyn AsyncWrite + Unpin + Send>;

/// Opens the store output: standard output for `"-"`, otherwise a file
/// opened for appending (created if missing).
pub async fn open_store_output(path: &str) -> std::io::Result<LineProtocolSink<BoxedWriter>> {
    if path == "-" {
        return Ok(LineProtocolSink::new(Box::new(tokio::io::stdout())));
    }

    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    tracing::info!(path, "opened store output");
    Ok(LineProtocolSink::new(Box::new(file)))
}

/// Publishes each snapshot as a JSON document at a fixed path.
///
/// The document is written to a sibling temporary file and renamed over the
/// target, so a renderer polling the path never reads a partial file.
pub struct JsonFileSink {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        Self {
            path,
            tmp_path: PathBuf::from(tmp),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSink for JsonFileSink {
    async fn publish(&mut self, snapshot: &Snapshot) -> Result<(), SinkError> {
        let json = serde_json::to_vec(snapshot)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.tmp_path, json).await?;
        tokio::fs::rename(&self.tmp_path, &self.path).await?;
        Ok(())
    }
}

/// Delivers batches or snapshots to an in-process callback.
pub struct CallbackSink<T> {
    send_fn: Box<dyn Fn(T) + Send + Sync + 'static>,
}

impl<T> CallbackSink<T> {
    pub fn new(send_fn: impl Fn(T) + Send + Sync + 'static) -> Self {
        Self {
            send_fn: Box::new(send_fn),
        }
    }
}

impl PointSink for CallbackSink<Vec<Point>> {
    async fn write_points(&mut self, points: &[Point]) -> Result<(), SinkError> {
        (self.send_fn)(points.to_vec());
        Ok(())
    }
}

impl SnapshotSink for CallbackSink<Snapshot> {
    async fn publish(&mut self, snapshot: &Snapshot) -> Result<(), SinkError> {
        (self.send_fn)(snapshot.clone());
        Ok(())
    }
}
