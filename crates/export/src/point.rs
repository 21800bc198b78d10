//! Store-bound data points.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Integer field carrying the row's sequence number on every point.
///
/// Reserved: a schema column with this name would collide with it.
pub const SEQ_FIELD: &str = "seq";

/// One row as the persistent store sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    pub measurement: String,
    pub tags: Vec<(String, String)>,
    /// `(column name, value)` pairs in schema order.
    pub fields: Vec<(String, f64)>,
    /// Insertion-order position of the row in the buffer.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
}

impl Point {
    /// Renders the point as one line of line protocol (no trailing newline):
    ///
    /// `measurement,tag=v field=1.5,other=2,seq=7i 1700000000000000000`
    pub fn to_line_protocol(&self) -> String {
        let mut line = escape(&self.measurement, &[',', ' ']);

        for (key, value) in &self.tags {
            line.push(',');
            line.push_str(&escape(key, &[',', '=', ' ']));
            line.push('=');
            line.push_str(&escape(value, &[',', '=', ' ']));
        }

        line.push(' ');
        for (key, value) in &self.fields {
            line.push_str(&format!("{}={value},", escape(key, &[',', '=', ' '])));
        }
        line.push_str(&format!("{SEQ_FIELD}={}i", self.seq));

        if let Some(ns) = self.timestamp.timestamp_nanos_opt() {
            line.push_str(&format!(" {ns}"));
        }
        line
    }
}

fn escape(s: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '\\' || special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
