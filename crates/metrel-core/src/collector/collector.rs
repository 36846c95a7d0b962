//! Runtime metrics sampler.
//!
//! Each collection cycle samples a fixed, statically declared set of gauges
//! from `/proc/self/status`, `/proc/meminfo`, and `/proc/loadavg`, draws a
//! fresh non-zero `RandomValue`, and bumps the `PollCount` counter by one.
//! A field that is missing or unparsable is skipped with a warning; the rest
//! of the cycle proceeds.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, warn};

use crate::collector::traits::FileSystem;
use crate::metric::Metric;
use crate::store::Storage;

/// Gauges sampled from `/proc/self/status`. Values with a `kB` unit are
/// converted to bytes.
const STATUS_GAUGES: &[&str] = &["VmRSS", "VmSize", "VmData", "VmStk", "Threads"];

/// Gauges sampled from `/proc/meminfo`.
const MEMINFO_GAUGES: &[&str] = &[
    "MemTotal",
    "MemFree",
    "MemAvailable",
    "Buffers",
    "Cached",
    "SwapTotal",
    "SwapFree",
];

/// Gauges from the first three fields of `/proc/loadavg`.
const LOADAVG_GAUGES: &[&str] = &["Load1", "Load5", "Load15"];

pub struct Collector<F: FileSystem, S: Storage> {
    fs: F,
    store: Arc<S>,
    proc_root: PathBuf,
}

impl<F: FileSystem, S: Storage> Collector<F, S> {
    pub fn new(fs: F, store: Arc<S>, proc_root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            store,
            proc_root: proc_root.into(),
        }
    }

    /// Runs one sampling cycle, writing every sampled value into the store.
    pub fn collect(&self) {
        self.sample_kv_file("self/status", STATUS_GAUGES);
        self.sample_kv_file("meminfo", MEMINFO_GAUGES);
        self.sample_loadavg();
        self.sample_random_value();

        self.save(Metric::counter("PollCount", 1));
    }

    fn sample_kv_file(&self, rel_path: &str, names: &[&str]) {
        let path = self.proc_root.join(rel_path);
        let content = match self.fs.read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read proc file");
                return;
            }
        };

        let values = parse_kv(&content);
        for name in names {
            match values.get(*name) {
                Some(value) => self.save(Metric::gauge(*name, *value)),
                None => warn!(field = name, path = %path.display(), "field missing; skipped"),
            }
        }
    }

    fn sample_loadavg(&self) {
        let path = self.proc_root.join("loadavg");
        let content = match self.fs.read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read proc file");
                return;
            }
        };

        match parse_loadavg(&content) {
            Some(loads) => {
                for (name, value) in LOADAVG_GAUGES.iter().zip(loads) {
                    self.save(Metric::gauge(*name, value));
                }
            }
            None => warn!(path = %path.display(), "unparsable loadavg; skipped"),
        }
    }

    /// Draws a fresh random gauge. Zero is rejected and redrawn: a zero would
    /// be indistinguishable from "not sampled".
    fn sample_random_value(&self) {
        let mut value: f64 = rand::random();
        while value == 0.0 {
            value = rand::random();
        }
        self.save(Metric::gauge("RandomValue", value));
    }

    fn save(&self, metric: Result<Metric, crate::metric::MetricError>) {
        match metric {
            Ok(metric) => {
                if let Err(e) = self.store.save(metric) {
                    error!(error = %e, "failed to store sampled metric");
                }
            }
            Err(e) => error!(error = %e, "failed to build sampled metric"),
        }
    }
}

/// Parses `Key:  value [kB]` lines as found in `/proc/self/status` and
/// `/proc/meminfo`. Values carrying a `kB` unit are scaled to bytes.
/// Unparsable lines are dropped.
fn parse_kv(content: &str) -> HashMap<String, f64> {
    let mut out = HashMap::new();

    for line in content.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let mut fields = rest.split_whitespace();
        let Some(raw) = fields.next() else {
            continue;
        };
        let Ok(mut value) = raw.parse::<f64>() else {
            continue;
        };
        if fields.next() == Some("kB") {
            value *= 1024.0;
        }
        out.insert(key.trim().to_string(), value);
    }

    out
}

/// Parses the three load averages from `/proc/loadavg`.
fn parse_loadavg(content: &str) -> Option<[f64; 3]> {
    let mut fields = content.split_whitespace();
    let one = fields.next()?.parse().ok()?;
    let five = fields.next()?.parse().ok()?;
    let fifteen = fields.next()?.parse().ok()?;
    Some([one, five, fifteen])
}
