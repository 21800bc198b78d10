//! Slot storage behind [`TelemetryBuffer`](crate::TelemetryBuffer).
//!
//! Rows are stored row-major in one flat `Vec<f64>`. Sequence numbers start
//! at 1; the row with sequence `s` lives in slot `(s - 1) % capacity`. The
//! backing vector grows on demand until `capacity` slots exist, after which
//! every write overwrites the oldest slot in place.

/// A live row paired with its insertion-order position.
pub(crate) struct Entry<'a> {
    pub seq: u64,
    pub values: &'a [f64],
}

#[derive(Debug)]
pub(crate) struct Ring {
    width: usize,
    capacity: usize,
    slots: Vec<f64>,
    written: u64,
}

impl Ring {
    pub fn new(capacity: usize, width: usize) -> Self {
        debug_assert!(capacity > 0 && width > 0);
        Self {
            width,
            capacity,
            slots: Vec::new(),
            written: 0,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        // Bounded by `capacity`, so the narrowing cast cannot truncate.
        self.written.min(self.capacity as u64) as usize
    }

    /// Total rows ever pushed; also the newest sequence number.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Sequence number of the oldest live entry, or `None` when empty.
    pub fn oldest_seq(&self) -> Option<u64> {
        (self.written > 0).then(|| self.written - self.len() as u64 + 1)
    }

    /// Appends a row, overwriting the oldest slot when full.
    ///
    /// The caller guarantees `row.len() == width`.
    pub fn push(&mut self, row: &[f64]) -> u64 {
        debug_assert_eq!(row.len(), self.width);
        let slot = (self.written % self.capacity as u64) as usize;
        let start = slot * self.width;

        if start == self.slots.len() {
            self.slots.extend_from_slice(row);
        } else {
            self.slots[start..start + self.width].copy_from_slice(row);
        }

        self.written += 1;
        self.written
    }

    fn slot_values(&self, seq: u64) -> &[f64] {
        let slot = ((seq - 1) % self.capacity as u64) as usize;
        let start = slot * self.width;
        &self.slots[start..start + self.width]
    }

    /// Live entries from oldest to newest.
    pub fn entries(&self) -> impl Iterator<Item = Entry<'_>> {
        let first = self.oldest_seq().unwrap_or(1);
        (first..=self.written).map(move |seq| Entry {
            seq,
            values: self.slot_values(seq),
        })
    }

    /// The newest entry, if any.
    pub fn newest(&self) -> Option<Entry<'_>> {
        (self.written > 0).then(|| Entry {
            seq: self.written,
            values: self.slot_values(self.written),
        })
    }

    /// Copies one column out, oldest to newest.
    pub fn column(&self, index: usize) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.len());
        out.extend(self.entries().map(|e| e.values[index]));
        out
    }
}
