//! Gauge/counter metric model and the JSON wire format shared by the agent,
//! the server, and the snapshot file.
//!
//! One record per metric: `{"id": ..., "type": "gauge", "value": ...}` or
//! `{"id": ..., "type": "counter", "delta": ...}`. Exactly one of
//! `value`/`delta` is present, matching `type`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Validation failure at the metric construction boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricError {
    EmptyName,
    UnknownKind(String),
    InvalidValue(String),
}

impl fmt::Display for MetricError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricError::EmptyName => write!(f, "metric name is empty"),
            MetricError::UnknownKind(kind) => write!(f, "unknown metric kind: {}", kind),
            MetricError::InvalidValue(raw) => write!(f, "invalid metric value: {}", raw),
        }
    }
}

impl std::error::Error for MetricError {}

/// Kind discriminant, used by URL path parameters and lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Gauge,
    Counter,
}

impl FromStr for MetricKind {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gauge" => Ok(MetricKind::Gauge),
            "counter" => Ok(MetricKind::Counter),
            other => Err(MetricError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Gauge => write!(f, "gauge"),
            MetricKind::Counter => write!(f, "counter"),
        }
    }
}

/// The typed payload of a metric. Gauges are last-write-wins; counter deltas
/// accumulate in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetricValue {
    Gauge { value: f64 },
    Counter { delta: i64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub id: String,
    #[serde(flatten)]
    pub value: MetricValue,
}

impl Metric {
    pub fn gauge(name: impl Into<String>, value: f64) -> Result<Self, MetricError> {
        let id = non_empty(name.into())?;
        Ok(Self {
            id,
            value: MetricValue::Gauge { value },
        })
    }

    pub fn counter(name: impl Into<String>, delta: i64) -> Result<Self, MetricError> {
        let id = non_empty(name.into())?;
        Ok(Self {
            id,
            value: MetricValue::Counter { delta },
        })
    }

    /// Builds a metric from the path-parameter form of the update endpoint,
    /// where kind and value arrive as raw strings.
    pub fn from_str_value(kind: &str, name: &str, raw: &str) -> Result<Self, MetricError> {
        match kind.parse::<MetricKind>()? {
            MetricKind::Gauge => {
                let value: f64 = raw
                    .parse()
                    .map_err(|_| MetricError::InvalidValue(raw.to_string()))?;
                Metric::gauge(name, value)
            }
            MetricKind::Counter => {
                let delta: i64 = raw
                    .parse()
                    .map_err(|_| MetricError::InvalidValue(raw.to_string()))?;
                Metric::counter(name, delta)
            }
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self.value {
            MetricValue::Gauge { .. } => MetricKind::Gauge,
            MetricValue::Counter { .. } => MetricKind::Counter,
        }
    }

    /// Renders the payload for the plain-text value endpoint.
    pub fn value_string(&self) -> String {
        match self.value {
            MetricValue::Gauge { value } => format!("{}", value),
            MetricValue::Counter { delta } => format!("{}", delta),
        }
    }
}

fn non_empty(name: String) -> Result<String, MetricError> {
    if name.is_empty() {
        return Err(MetricError::EmptyName);
    }
    Ok(name)
}

/// Renders all metrics as `name: value` lines, sorted by kind then name.
/// Used by the server's root endpoint.
pub fn render_listing(mut metrics: Vec<Metric>) -> String {
    metrics.sort_by(|a, b| (a.kind() as u8, &a.id).cmp(&(b.kind() as u8, &b.id)));

    let mut out = String::new();
    for metric in &metrics {
        out.push_str(&metric.id);
        out.push_str(": ");
        out.push_str(&metric.value_string());
        out.push('\n');
    }

    out
}
