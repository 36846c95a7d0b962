//! In-memory metric store behind a single reader-writer lock.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::error;

use crate::metric::{Metric, MetricError, MetricKind, MetricValue};
use crate::store::saver::FileSaver;
use crate::store::{Storage, StoreError};

#[derive(Default)]
struct Maps {
    gauges: HashMap<String, f64>,
    counters: HashMap<String, i64>,
}

/// Thread-safe holder of all known metrics. All public methods acquire the
/// internal lock themselves; no guard ever crosses the API boundary, and no
/// file or network I/O happens while the lock is held.
pub struct MemStore {
    inner: RwLock<Maps>,
    /// Present only in write-through mode: every successful save is followed
    /// by one synchronous snapshot flush.
    saver: Option<FileSaver>,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Maps::default()),
            saver: None,
        }
    }

    /// A store that flushes the full snapshot to `saver` after every
    /// successful save. Flush failures are logged, never returned to the
    /// caller: the in-memory state stays authoritative.
    pub fn with_write_through(saver: FileSaver) -> Self {
        Self {
            inner: RwLock::new(Maps::default()),
            saver: Some(saver),
        }
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemStore {
    fn save(&self, metric: Metric) -> Result<Metric, StoreError> {
        if metric.id.is_empty() {
            return Err(MetricError::EmptyName.into());
        }

        let stored = {
            let mut maps = self.inner.write().unwrap();
            match metric.value {
                MetricValue::Gauge { value } => {
                    maps.gauges.insert(metric.id.clone(), value);
                    Metric {
                        id: metric.id,
                        value: MetricValue::Gauge { value },
                    }
                }
                MetricValue::Counter { delta } => {
                    let total = maps
                        .counters
                        .entry(metric.id.clone())
                        .and_modify(|v| *v += delta)
                        .or_insert(delta);
                    Metric {
                        id: metric.id,
                        value: MetricValue::Counter { delta: *total },
                    }
                }
            }
        };

        if let Some(saver) = &self.saver
            && let Err(e) = saver.save(&self.snapshot())
        {
            error!(error = %e, "write-through snapshot flush failed");
        }

        Ok(stored)
    }

    fn get(&self, kind: MetricKind, name: &str) -> Result<Metric, StoreError> {
        let maps = self.inner.read().unwrap();
        match kind {
            MetricKind::Gauge => maps.gauges.get(name).map(|value| Metric {
                id: name.to_string(),
                value: MetricValue::Gauge { value: *value },
            }),
            MetricKind::Counter => maps.counters.get(name).map(|delta| Metric {
                id: name.to_string(),
                value: MetricValue::Counter { delta: *delta },
            }),
        }
        .ok_or(StoreError::NotFound)
    }

    fn snapshot(&self) -> Vec<Metric> {
        let maps = self.inner.read().unwrap();
        let mut out = Vec::with_capacity(maps.gauges.len() + maps.counters.len());

        for (name, value) in &maps.gauges {
            out.push(Metric {
                id: name.clone(),
                value: MetricValue::Gauge { value: *value },
            });
        }
        for (name, delta) in &maps.counters {
            out.push(Metric {
                id: name.clone(),
                value: MetricValue::Counter { delta: *delta },
            });
        }

        out
    }

    fn restore(&self, metrics: Vec<Metric>) {
        let mut maps = self.inner.write().unwrap();
        for metric in metrics {
            match metric.value {
                MetricValue::Gauge { value } => {
                    maps.gauges.insert(metric.id, value);
                }
                MetricValue::Counter { delta } => {
                    // A restored counter is an absolute total, not a delta.
                    maps.counters.insert(metric.id, delta);
                }
            }
        }
    }
}
