//! Sample data model
//!
//! A [`Sample`] is one snapshot of the observed process. Fields that the
//! platform or process state cannot supply are carried as
//! [`FieldValue::Unavailable`] rather than dropped, so the row shape stays
//! fixed for the lifetime of a sink; the `nan` marker is produced only when
//! a sink renders the value.

use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};
use std::fmt;

/// Marker emitted for unavailable values in both output formats.
pub const NOT_AVAILABLE: &str = "nan";

/// Timestamp format for the `timestamp` column.
pub const TIMESTAMP_FORMAT: &str = "%m-%d-%Y %H:%M:%S%.6f";

/// One metric value, or the absence of one.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Count(u64),
    Gauge(f64),
    Text(String),
    Unavailable,
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Count(n) => write!(f, "{}", n),
            FieldValue::Gauge(g) => write!(f, "{}", g),
            FieldValue::Text(t) => write!(f, "{}", t),
            FieldValue::Unavailable => write!(f, "{}", NOT_AVAILABLE),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            FieldValue::Count(n) => serializer.serialize_u64(*n),
            // JSON has no NaN/Inf; fall back to the textual marker
            FieldValue::Gauge(g) if !g.is_finite() => serializer.serialize_str(NOT_AVAILABLE),
            FieldValue::Gauge(g) => serializer.serialize_f64(*g),
            FieldValue::Text(t) => serializer.serialize_str(t),
            FieldValue::Unavailable => serializer.serialize_str(NOT_AVAILABLE),
        }
    }
}

impl From<u64> for FieldValue {
    fn from(n: u64) -> Self {
        FieldValue::Count(n)
    }
}

impl From<f64> for FieldValue {
    fn from(g: f64) -> Self {
        FieldValue::Gauge(g)
    }
}

impl From<&str> for FieldValue {
    fn from(t: &str) -> Self {
        FieldValue::Text(t.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(t: String) -> Self {
        FieldValue::Text(t)
    }
}

fn opt(value: Option<u64>) -> FieldValue {
    value.map_or(FieldValue::Unavailable, FieldValue::Count)
}

fn opt_gauge(value: Option<f64>) -> FieldValue {
    value.map_or(FieldValue::Unavailable, FieldValue::Gauge)
}

/// One resource-usage snapshot of the observed process.
///
/// Memory sizes are in bytes, CPU times in seconds. The `Option` fields
/// depend on the platform (procfs-backed on Linux) and on permissions for
/// the target process.
#[derive(Debug, Clone)]
pub struct Sample {
    pub timestamp: DateTime<Local>,
    pub num_threads: u64,
    pub cpu_percent: f64,
    pub cpu_user_secs: Option<f64>,
    pub cpu_system_secs: Option<f64>,
    pub mem_rss: u64,
    pub mem_vms: u64,
    pub mem_shared: Option<u64>,
    pub mem_percent: f64,
    pub num_fds: Option<u64>,
    pub read_count: Option<u64>,
    pub write_count: Option<u64>,
    pub read_bytes: Option<u64>,
    pub write_bytes: Option<u64>,
}

impl Sample {
    /// Canonical column names, in the order `values` yields them.
    pub const FIELDS: [&'static str; 14] = [
        "timestamp",
        "num_threads",
        "cpu_percent",
        "cpu_user_secs",
        "cpu_system_secs",
        "mem_rss",
        "mem_vms",
        "mem_shared",
        "mem_percent",
        "num_fds",
        "read_count",
        "write_count",
        "read_bytes",
        "write_bytes",
    ];

    /// Values in [`Sample::FIELDS`] order, ready for a sink.
    pub fn values(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::Text(self.timestamp.format(TIMESTAMP_FORMAT).to_string()),
            FieldValue::Count(self.num_threads),
            FieldValue::Gauge(self.cpu_percent),
            opt_gauge(self.cpu_user_secs),
            opt_gauge(self.cpu_system_secs),
            FieldValue::Count(self.mem_rss),
            FieldValue::Count(self.mem_vms),
            opt(self.mem_shared),
            FieldValue::Gauge(self.mem_percent),
            opt(self.num_fds),
            opt(self.read_count),
            opt(self.write_count),
            opt(self.read_bytes),
            opt(self.write_bytes),
        ]
    }
}
