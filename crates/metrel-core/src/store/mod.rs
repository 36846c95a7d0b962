//! Concurrent metric storage and snapshot persistence.

mod memory;
pub mod saver;

pub use memory::MemStore;
pub use saver::{FileSaver, SaverConfig};

use std::fmt;

use crate::metric::{Metric, MetricError, MetricKind};

#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    Invalid(MetricError),
    NotFound,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Invalid(err) => write!(f, "invalid metric: {}", err),
            StoreError::NotFound => write!(f, "metric not found"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<MetricError> for StoreError {
    fn from(err: MetricError) -> Self {
        StoreError::Invalid(err)
    }
}

/// Storage abstraction over the metric map. The collector writes through it,
/// the reporter and the HTTP handlers read through it.
pub trait Storage: Send + Sync {
    /// Validates and stores one metric. Gauges overwrite, counter deltas add
    /// to any existing value. Returns the metric as stored (a counter carries
    /// its accumulated total).
    fn save(&self, metric: Metric) -> Result<Metric, StoreError>;

    /// Looks up a single metric by kind and name.
    fn get(&self, kind: MetricKind, name: &str) -> Result<Metric, StoreError>;

    /// Returns a consistent point-in-time copy of all metrics.
    fn snapshot(&self) -> Vec<Metric>;

    /// Merges a restored snapshot: gauges overwrite, counters are written as
    /// absolute totals (a restored counter is not a delta).
    fn restore(&self, metrics: Vec<Metric>);
}
