//! Consumer loops that forward telemetry out of the shared buffer.
//!
//! - [`StoreExporter`] sends every row exactly once, in order, to a
//!   [`PointSink`] (the persistent time-series store).
//! - [`DashboardExporter`] publishes consistent multi-column snapshots to a
//!   [`SnapshotSink`] (the live visualization surface).
//!
//! Both are [`LoopBody`](groundlink_task::LoopBody) implementations paced by
//! a ticker; they only ever read the buffer and never signal the producer.

pub mod dashboard;
pub mod error;
pub mod point;
pub mod sink;
pub mod store;

pub use dashboard::DashboardExporter;
pub use error::{ExportError, SinkError};
pub use point::{Point, SEQ_FIELD};
pub use sink::{
    BoxedWriter, CallbackSink, JsonFileSink, LineProtocolSink, PointSink, SnapshotSink,
    open_store_output,
};
pub use store::StoreExporter;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Shortest allowed export period.
pub const MIN_EXPORT_INTERVAL: Duration = Duration::from_millis(10);

/// Counters shared between an exporter loop and observers.
#[derive(Debug, Default)]
pub struct ExportStats {
    exported: AtomicU64,
    missed: AtomicU64,
}

impl ExportStats {
    /// Points (store) or snapshots (dashboard) handed to the sink.
    pub fn exported(&self) -> u64 {
        self.exported.load(Ordering::Relaxed)
    }

    /// Rows evicted from the buffer before the exporter reached them.
    pub fn missed(&self) -> u64 {
        self.missed.load(Ordering::Relaxed)
    }

    pub(crate) fn add_exported(&self, n: u64) {
        self.exported.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_missed(&self, n: u64) {
        self.missed.fetch_add(n, Ordering::Relaxed);
    }
}

/// Builds the pacing ticker for an exporter loop.
///
/// The first tick fires one period after creation; late ticks are delayed
/// rather than bunched.
pub(crate) fn ticker(period: Duration) -> tokio::time::Interval {
    let period = period.max(MIN_EXPORT_INTERVAL);
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker
}
