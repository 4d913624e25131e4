//! Hardware telemetry: the upstream node tree, the flattened sensor/reading
//! snapshot and the cache that serves it to tiles.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::Result;

pub mod cache;
pub mod fake;
pub mod http;
pub mod node;

pub use cache::SnapshotCache;
pub use fake::FakeSource;
pub use http::{endpoint_from_env, HttpSource};
pub use node::Node;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8085/data.json";
pub const ENDPOINT_ENV: &str = "LHM_ENDPOINT";
pub const UNKNOWN_SENSOR_NAME: &str = "Unknown Sensor";

/// Anything that can hand back the raw telemetry tree.
pub trait HardwareSource: Send + Sync {
    fn fetch(&self) -> Result<Node>;
}

impl<T: HardwareSource + ?Sized> HardwareSource for Box<T> {
    fn fetch(&self) -> Result<Node> {
        (**self).fetch()
    }
}

impl<T: HardwareSource + ?Sized> HardwareSource for std::sync::Arc<T> {
    fn fetch(&self) -> Result<Node> {
        (**self).fetch()
    }
}

/// Value/unit family of a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingType {
    #[default]
    None,
    Temp,
    Volt,
    Fan,
    Current,
    Power,
    Clock,
    Usage,
    Other,
}

impl ReadingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingType::None => "none",
            ReadingType::Temp => "temp",
            ReadingType::Volt => "volt",
            ReadingType::Fan => "fan",
            ReadingType::Current => "current",
            ReadingType::Power => "power",
            ReadingType::Clock => "clock",
            ReadingType::Usage => "usage",
            ReadingType::Other => "other",
        }
    }
}

impl std::fmt::Display for ReadingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One numeric reading under a sensor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub id: i32,
    pub label: String,
    pub unit: String,
    /// Upstream type string, kept verbatim.
    pub kind: String,
    pub reading_type: ReadingType,
    pub value: f64,
    pub min: f64,
    pub max: f64,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sensor {
    pub id: String,
    pub name: String,
}

/// Point-in-time capture of every sensor and reading.
#[derive(Debug, Clone)]
pub struct SensorSnapshot {
    pub poll_time: PollTime,
    pub sensors: Vec<Sensor>,
    pub readings: HashMap<String, Vec<Reading>>,
}

/// When a snapshot was taken: wall-clock nanoseconds (strictly increasing
/// across snapshots from one cache) plus a monotonic instant for age checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTime {
    pub nanos: u64,
    pub captured_at: Instant,
}

impl PollTime {
    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }
}

/// Derive the owning sensor id from a leaf reading id by dropping its last
/// two path segments (`/amdcpu/0/temperature/2` -> `/amdcpu/0`).
pub fn sensor_id_from_reading(id: &str) -> String {
    let trimmed = id.trim().trim_matches('/');
    if trimmed.is_empty() {
        return String::new();
    }
    let parts: Vec<&str> = trimmed.split('/').collect();
    if parts.len() <= 2 {
        return format!("/{}", parts[0]);
    }
    format!("/{}", parts[..parts.len() - 2].join("/"))
}

/// Stable 31-bit reading id: FNV-1a over `sensor_id` then `raw_id`.
pub fn make_reading_id(sensor_id: &str, raw_id: &str) -> i32 {
    const OFFSET: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    let mut hash = OFFSET;
    for byte in sensor_id.bytes().chain(raw_id.bytes()) {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(PRIME);
    }
    (hash & 0x7fff_ffff) as i32
}
