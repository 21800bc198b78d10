//! Live-visualization exporter loop.

use std::sync::Arc;
use std::time::Duration;

use groundlink_buffer::{ColumnId, Snapshot, TelemetryBuffer};
use groundlink_task::{LoopBody, Step};
use tokio::time::Interval;
use tokio_util::sync::CancellationToken;

use crate::{ExportError, ExportStats, SnapshotSink};

/// Publishes a consistent multi-column snapshot to a [`SnapshotSink`] once
/// per tick.
///
/// A snapshot is only published when the buffer has accepted rows since the
/// previous one (the first tick always publishes, so a renderer gets a
/// document even before data arrives).
pub struct DashboardExporter<S> {
    buffer: Arc<TelemetryBuffer>,
    sink: S,
    columns: Vec<ColumnId>,
    period: Duration,
    ticker: Option<Interval>,
    published: Option<u64>,
    stats: Arc<ExportStats>,
}

impl<S: SnapshotSink> DashboardExporter<S> {
    /// Creates an exporter over `columns` (all columns when empty).
    ///
    /// Every identifier is checked against the buffer schema up front, so a
    /// misconfigured dashboard fails here rather than on its first tick.
    pub fn new(
        buffer: Arc<TelemetryBuffer>,
        sink: S,
        columns: Vec<ColumnId>,
        period: Duration,
    ) -> Result<Self, ExportError> {
        for id in &columns {
            buffer.schema().resolve(id)?;
        }

        Ok(Self {
            buffer,
            sink,
            columns,
            period,
            ticker: None,
            published: None,
            stats: Arc::new(ExportStats::default()),
        })
    }

    pub fn stats(&self) -> Arc<ExportStats> {
        Arc::clone(&self.stats)
    }

    fn take_snapshot(&self) -> Result<Snapshot, ExportError> {
        if self.columns.is_empty() {
            return Ok(self.buffer.snapshot());
        }
        Ok(self.buffer.read_columns(self.columns.iter().cloned())?)
    }

    async fn publish_if_changed(&mut self) -> Result<(), ExportError> {
        if self.published == Some(self.buffer.written()) {
            return Ok(());
        }

        let snapshot = self.take_snapshot()?;
        self.sink.publish(&snapshot).await?;

        self.published = Some(snapshot.written);
        self.stats.add_exported(1);
        tracing::trace!(written = snapshot.written, "published snapshot");
        Ok(())
    }
}

impl<S: SnapshotSink> LoopBody for DashboardExporter<S> {
    type Error = ExportError;

    async fn step(&mut self, cancel: &CancellationToken) -> Result<Step, ExportError> {
        let ticker = self.ticker.get_or_insert_with(|| crate::ticker(self.period));

        tokio::select! {
            _ = cancel.cancelled() => return Ok(Step::Continue),
            _ = ticker.tick() => {}
        }

        self.publish_if_changed().await?;
        Ok(Step::Continue)
    }

    async fn drain(&mut self) -> Result<(), ExportError> {
        self.publish_if_changed().await
    }
}
