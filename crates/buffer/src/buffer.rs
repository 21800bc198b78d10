use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use crate::ring::Ring;
use crate::{BufferError, ColumnId, Schema};

/// A single column copied out of the buffer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSnapshot {
    pub name: String,
    pub values: Vec<f64>,
}

/// Several columns copied out under one lock acquisition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Total rows ever written when the snapshot was taken.
    pub written: u64,
    pub columns: Vec<ColumnSnapshot>,
}

/// A copied row together with its insertion-order position.
#[derive(Debug, Clone, PartialEq)]
pub struct SequencedRow {
    pub seq: u64,
    pub values: Vec<f64>,
}

/// Result of [`TelemetryBuffer::rows_since`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowsSince {
    /// Live rows newer than the cursor, oldest to newest.
    pub rows: Vec<SequencedRow>,
    /// Rows newer than the cursor that were evicted before this read.
    pub missed: u64,
}

impl RowsSince {
    /// Sequence number of the newest returned row, if any.
    pub fn last_seq(&self) -> Option<u64> {
        self.rows.last().map(|r| r.seq)
    }
}

/// Fixed-capacity, insertion-ordered store of recent telemetry rows.
///
/// Share it behind an `Arc`. [`write`](Self::write) takes the exclusive side
/// of the lock for append-plus-eviction; every read takes the shared side and
/// copies values out, so callers never observe a half-written row or a state
/// that mixes two writes. No operation blocks on anything but the lock.
#[derive(Debug)]
pub struct TelemetryBuffer {
    schema: Schema,
    capacity: usize,
    ring: RwLock<Ring>,
}

impl TelemetryBuffer {
    /// Creates an empty buffer.
    ///
    /// A `capacity` below 1 is clamped to 1 rather than rejected.
    pub fn new(capacity: usize, schema: Schema) -> Self {
        if capacity < 1 {
            tracing::debug!(requested = capacity, "buffer capacity clamped to 1");
        }
        let capacity = capacity.max(1);
        let ring = Ring::new(capacity, schema.len());

        Self {
            schema,
            capacity,
            ring: RwLock::new(ring),
        }
    }

    /// Convenience constructor validating the column names.
    pub fn with_columns<I, S>(capacity: usize, columns: I) -> Result<Self, BufferError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self::new(capacity, Schema::new(columns)?))
    }

    // Row width is checked before the write lock is taken, so no panic can
    // happen mid-copy and a poisoned lock still guards whole rows.
    fn read_ring(&self) -> RwLockReadGuard<'_, Ring> {
        self.ring.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_ring(&self) -> RwLockWriteGuard<'_, Ring> {
        self.ring.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a row as the newest entry, evicting the oldest when full.
    ///
    /// Returns the row's sequence number. A row whose width disagrees with
    /// the schema is rejected and the buffer is left unchanged.
    pub fn write(&self, row: &[f64]) -> Result<u64, BufferError> {
        if row.len() != self.schema.len() {
            return Err(BufferError::SchemaMismatch {
                expected: self.schema.len(),
                actual: row.len(),
            });
        }
        Ok(self.write_ring().push(row))
    }

    /// Copies one column, oldest to newest, from a single consistent state.
    pub fn read_column(&self, id: impl Into<ColumnId>) -> Result<Vec<f64>, BufferError> {
        let index = self.schema.resolve(&id.into())?;
        Ok(self.read_ring().column(index))
    }

    /// Copies several columns under one lock acquisition.
    ///
    /// Fails on the first identifier the schema does not know; nothing is
    /// returned in that case.
    pub fn read_columns<I>(&self, ids: I) -> Result<Snapshot, BufferError>
    where
        I: IntoIterator,
        I::Item: Into<ColumnId>,
    {
        let indexes = ids
            .into_iter()
            .map(|id| self.schema.resolve(&id.into()))
            .collect::<Result<Vec<_>, _>>()?;

        let ring = self.read_ring();
        Ok(Snapshot {
            written: ring.written(),
            columns: indexes
                .into_iter()
                .map(|i| ColumnSnapshot {
                    name: self.schema.columns()[i].clone(),
                    values: ring.column(i),
                })
                .collect(),
        })
    }

    /// Copies every column under one lock acquisition.
    pub fn snapshot(&self) -> Snapshot {
        let ring = self.read_ring();
        Snapshot {
            written: ring.written(),
            columns: self
                .schema
                .columns()
                .iter()
                .enumerate()
                .map(|(i, name)| ColumnSnapshot {
                    name: name.clone(),
                    values: ring.column(i),
                })
                .collect(),
        }
    }

    /// The newest row, if any.
    pub fn latest(&self) -> Option<SequencedRow> {
        self.read_ring().newest().map(|e| SequencedRow {
            seq: e.seq,
            values: e.values.to_vec(),
        })
    }

    /// Every live row with a sequence number greater than `cursor`.
    ///
    /// Rows the cursor never saw but that were already evicted are counted in
    /// [`RowsSince::missed`].
    pub fn rows_since(&self, cursor: u64) -> RowsSince {
        let ring = self.read_ring();
        let Some(oldest) = ring.oldest_seq() else {
            return RowsSince::default();
        };

        let missed = oldest.saturating_sub(cursor.saturating_add(1));
        let rows = ring
            .entries()
            .filter(|e| e.seq > cursor)
            .map(|e| SequencedRow {
                seq: e.seq,
                values: e.values.to_vec(),
            })
            .collect();

        RowsSince { rows, missed }
    }

    /// The column names, in order.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Number of live entries.
    pub fn snapshot_count(&self) -> usize {
        self.read_ring().len()
    }

    /// Maximum number of live entries (after clamping).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total rows ever accepted.
    pub fn written(&self) -> u64 {
        self.read_ring().written()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    use super::*;

    fn buffer(capacity: usize) -> TelemetryBuffer {
        TelemetryBuffer::with_columns(capacity, ["time", "altitude", "velocity"]).unwrap()
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let buf = buffer(0);
        assert_eq!(buf.capacity(), 1);
        buf.write(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(buf.snapshot_count(), 1);
    }

    #[test]
    fn write_then_read_returns_newest() {
        let buf = buffer(5);
        buf.write(&[0.0, 10.0, 1.5]).unwrap();
        buf.write(&[1.0, 12.5, 2.5]).unwrap();

        assert_eq!(buf.read_column("time").unwrap().last(), Some(&1.0));
        assert_eq!(buf.read_column("altitude").unwrap().last(), Some(&12.5));
        assert_eq!(buf.read_column(2).unwrap().last(), Some(&2.5));
    }

    #[test]
    fn eviction_drops_oldest() {
        let buf = buffer(3);
        for i in 1..=4 {
            let v = i as f64;
            buf.write(&[v, v * 10.0, v * 100.0]).unwrap();
        }

        assert_eq!(buf.snapshot_count(), 3);
        assert_eq!(buf.read_column(0).unwrap(), vec![2.0, 3.0, 4.0]);
        assert_eq!(buf.read_column("altitude").unwrap(), vec![20.0, 30.0, 40.0]);
        assert_eq!(buf.read_column("velocity").unwrap(), vec![200.0, 300.0, 400.0]);
    }

    #[test]
    fn capacity_one_keeps_only_second_row() {
        let buf = TelemetryBuffer::with_columns(1, ["a", "b"]).unwrap();
        buf.write(&[1.0, 2.0]).unwrap();
        buf.write(&[3.0, 4.0]).unwrap();

        assert_eq!(buf.snapshot_count(), 1);
        assert_eq!(buf.read_column("a").unwrap(), vec![3.0]);
        assert_eq!(buf.read_column("b").unwrap(), vec![4.0]);
    }

    #[test]
    fn mismatched_row_is_rejected() {
        let buf = buffer(5);
        buf.write(&[1.0, 2.0, 3.0]).unwrap();

        let err = buf.write(&[1.0, 2.0]).unwrap_err();
        assert_eq!(
            err,
            BufferError::SchemaMismatch {
                expected: 3,
                actual: 2
            }
        );
        assert_eq!(buf.snapshot_count(), 1);
        assert_eq!(buf.written(), 1);
        assert_eq!(buf.read_column(0).unwrap(), vec![1.0]);
    }

    #[test]
    fn count_never_exceeds_capacity() {
        let buf = buffer(4);
        for i in 0..20 {
            buf.write(&[i as f64; 3]).unwrap();
            assert!(buf.snapshot_count() <= buf.capacity());
            assert_eq!(buf.snapshot_count(), (i + 1).min(4));
        }
    }

    #[test]
    fn repeated_reads_are_identical() {
        let buf = buffer(3);
        buf.write(&[1.0, 2.0, 3.0]).unwrap();
        buf.write(&[4.0, 5.0, 6.0]).unwrap();

        assert_eq!(buf.read_column("velocity"), buf.read_column("velocity"));
    }

    #[test]
    fn unknown_column_fails_cleanly() {
        let buf = buffer(3);
        buf.write(&[1.0, 2.0, 3.0]).unwrap();

        assert_eq!(
            buf.read_column("nonexistent"),
            Err(BufferError::UnknownColumn("nonexistent".into()))
        );
        assert_eq!(
            buf.read_column(3),
            Err(BufferError::IndexOutOfRange { index: 3, width: 3 })
        );
        assert!(buf.read_columns(["time", "nonexistent"]).is_err());
    }

    #[test]
    fn empty_buffer_reads() {
        let buf = buffer(3);
        assert!(buf.read_column("time").unwrap().is_empty());
        assert_eq!(buf.latest(), None);
        assert_eq!(buf.rows_since(0), RowsSince::default());
        assert_eq!(buf.snapshot().written, 0);
    }

    #[test]
    fn read_columns_selects_in_requested_order() {
        let buf = buffer(3);
        buf.write(&[1.0, 2.0, 3.0]).unwrap();

        let snap = buf.read_columns(["velocity", "time"]).unwrap();
        assert_eq!(snap.written, 1);
        assert_eq!(snap.columns[0].name, "velocity");
        assert_eq!(snap.columns[0].values, vec![3.0]);
        assert_eq!(snap.columns[1].name, "time");
    }

    #[test]
    fn latest_tracks_newest_row() {
        let buf = buffer(2);
        buf.write(&[1.0, 1.0, 1.0]).unwrap();
        buf.write(&[2.0, 2.0, 2.0]).unwrap();
        buf.write(&[3.0, 3.0, 3.0]).unwrap();

        let latest = buf.latest().unwrap();
        assert_eq!(latest.seq, 3);
        assert_eq!(latest.values, vec![3.0, 3.0, 3.0]);
    }

    #[test]
    fn rows_since_reports_gaps() {
        let buf = buffer(3);
        for i in 1..=3 {
            buf.write(&[i as f64; 3]).unwrap();
        }

        let first = buf.rows_since(0);
        assert_eq!(first.missed, 0);
        assert_eq!(first.last_seq(), Some(3));

        assert!(buf.rows_since(3).rows.is_empty());

        for i in 4..=8 {
            buf.write(&[i as f64; 3]).unwrap();
        }

        // Live rows are 6..=8; rows 4 and 5 were evicted unseen.
        let next = buf.rows_since(3);
        assert_eq!(next.missed, 2);
        let seqs: Vec<u64> = next.rows.iter().map(|r| r.seq).collect();
        assert_eq!(seqs, vec![6, 7, 8]);
        assert_eq!(next.rows[0].values, vec![6.0; 3]);
    }

    #[test]
    fn snapshot_serializes_for_dashboard() {
        let buf = TelemetryBuffer::with_columns(2, ["alt"]).unwrap();
        buf.write(&[1.5]).unwrap();

        let json = serde_json::to_value(buf.snapshot()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "written": 1,
                "columns": [{ "name": "alt", "values": [1.5] }]
            })
        );
    }

    /// One writer and several readers race; every observed column must be a
    /// contiguous run of written rows with no mixed values.
    #[test]
    fn concurrent_readers_never_see_torn_state() {
        const CAPACITY: usize = 64;
        const WRITES: usize = 5_000;
        const READERS: usize = 4;

        let buf = Arc::new(buffer(CAPACITY));
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..READERS)
            .map(|_| {
                let buf = Arc::clone(&buf);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    let mut last = Vec::new();
                    loop {
                        let finished = done.load(Ordering::Acquire);
                        let snap = buf.snapshot();
                        let time = &snap.columns[0].values;
                        let alt = &snap.columns[1].values;
                        let vel = &snap.columns[2].values;

                        assert!(time.len() <= CAPACITY);
                        for (i, t) in time.iter().enumerate() {
                            // Row k was written as [k, 2k, -k].
                            assert_eq!(alt[i], t * 2.0);
                            assert_eq!(vel[i], -t);
                            if i > 0 {
                                assert_eq!(*t, time[i - 1] + 1.0);
                            }
                        }
                        if let Some(newest) = time.last() {
                            assert_eq!(*newest as u64, snap.written);
                        }

                        last = buf.read_column("time").unwrap();
                        if finished {
                            break;
                        }
                    }
                    last
                })
            })
            .collect();

        for k in 1..=WRITES {
            let k = k as f64;
            buf.write(&[k, k * 2.0, -k]).unwrap();
        }
        done.store(true, Ordering::Release);

        let expected: Vec<f64> = ((WRITES - CAPACITY + 1)..=WRITES).map(|k| k as f64).collect();
        for reader in readers {
            let last = reader.join().unwrap();
            assert_eq!(last, expected);
        }
        assert_eq!(buf.snapshot_count(), WRITES.min(CAPACITY));
    }
}
