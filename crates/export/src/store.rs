//! Persistent-store exporter loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use groundlink_buffer::{SequencedRow, TelemetryBuffer};
use groundlink_task::{LoopBody, Step};
use tokio::time::Interval;
use tokio_util::sync::CancellationToken;

use crate::{ExportError, ExportStats, Point, PointSink, SEQ_FIELD};

/// Exports every new row to a [`PointSink`] once per tick.
///
/// Keeps a cursor (the last exported sequence number), so each row is sent
/// exactly once and in insertion order. Rows evicted before a tick reaches
/// them are counted and logged, never fabricated. A final pass runs when the
/// loop stops.
pub struct StoreExporter<S> {
    buffer: Arc<TelemetryBuffer>,
    sink: S,
    measurement: String,
    tags: Vec<(String, String)>,
    period: Duration,
    ticker: Option<Interval>,
    cursor: u64,
    stats: Arc<ExportStats>,
}

impl<S: PointSink> StoreExporter<S> {
    /// Creates an exporter writing `measurement` points to `sink`.
    ///
    /// Fails if a schema column is named [`SEQ_FIELD`], which every point
    /// already carries.
    pub fn new(
        buffer: Arc<TelemetryBuffer>,
        sink: S,
        measurement: impl Into<String>,
        period: Duration,
    ) -> Result<Self, ExportError> {
        if buffer.schema().index_of(SEQ_FIELD).is_some() {
            return Err(ExportError::ReservedField(SEQ_FIELD.to_owned()));
        }

        Ok(Self {
            buffer,
            sink,
            measurement: measurement.into(),
            tags: Vec::new(),
            period,
            ticker: None,
            cursor: 0,
            stats: Arc::new(ExportStats::default()),
        })
    }

    /// Adds a tag attached to every exported point.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    /// Handle to the export counters.
    pub fn stats(&self) -> Arc<ExportStats> {
        Arc::clone(&self.stats)
    }

    /// Sequence number of the last exported row.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    fn to_points(&self, rows: Vec<SequencedRow>) -> Vec<Point> {
        // Rows in one pass share the export instant; offsetting by whole
        // nanoseconds keeps them distinct and ordered within a series.
        let now = Utc::now();
        let count = rows.len() as i64;
        let columns = self.buffer.schema().columns();

        rows.into_iter()
            .enumerate()
            .map(|(i, row)| Point {
                measurement: self.measurement.clone(),
                tags: self.tags.clone(),
                fields: columns.iter().cloned().zip(row.values).collect(),
                seq: row.seq,
                timestamp: now - chrono::Duration::nanoseconds(count - 1 - i as i64),
            })
            .collect()
    }

    /// One export pass: everything newer than the cursor.
    async fn export_pending(&mut self) -> Result<(), ExportError> {
        let pending = self.buffer.rows_since(self.cursor);

        if pending.missed > 0 {
            self.stats.add_missed(pending.missed);
            tracing::warn!(
                missed = pending.missed,
                cursor = self.cursor,
                "rows evicted before export; increase capacity or export more often"
            );
        }

        let Some(last) = pending.last_seq() else {
            return Ok(());
        };

        let points = self.to_points(pending.rows);
        self.sink.write_points(&points).await?;

        self.cursor = last;
        self.stats.add_exported(points.len() as u64);
        tracing::debug!(points = points.len(), cursor = last, "exported to store");
        Ok(())
    }
}

impl<S: PointSink> LoopBody for StoreExporter<S> {
    type Error = ExportError;

    async fn step(&mut self, cancel: &CancellationToken) -> Result<Step, ExportError> {
        let ticker = self.ticker.get_or_insert_with(|| crate::ticker(self.period));

        tokio::select! {
            _ = cancel.cancelled() => return Ok(Step::Continue),
            _ = ticker.tick() => {}
        }

        self.export_pending().await?;
        Ok(Step::Continue)
    }

    async fn drain(&mut self) -> Result<(), ExportError> {
        self.export_pending().await
    }
}
