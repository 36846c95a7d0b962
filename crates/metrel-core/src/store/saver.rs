//! Snapshot file persistence: newline-delimited JSON records, replaced
//! atomically via a `.tmp` sibling so a failed write never truncates the
//! previous snapshot.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

use crate::metric::Metric;

/// Persistence settings, supplied once at construction.
/// A zero `store_interval` selects write-through mode.
#[derive(Debug, Clone)]
pub struct SaverConfig {
    pub store_interval: Duration,
    pub path: PathBuf,
    pub restore: bool,
}

impl SaverConfig {
    pub fn write_through(&self) -> bool {
        self.store_interval.is_zero()
    }
}

/// Owns the on-disk snapshot file.
pub struct FileSaver {
    path: PathBuf,
}

impl FileSaver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the snapshot file. An absent file is a first run, not an error.
    /// Malformed records are skipped with a warning; the rest of the file
    /// still loads.
    pub fn load(&self) -> io::Result<Vec<Metric>> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut metrics = Vec::new();
        for line in data.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Metric>(line) {
                Ok(metric) if !metric.id.is_empty() => metrics.push(metric),
                Ok(_) => warn!("skipping snapshot record with empty id"),
                Err(e) => warn!(error = %e, "skipping malformed snapshot record"),
            }
        }

        Ok(metrics)
    }

    /// Serializes the snapshot and replaces the file in one rename.
    pub fn save(&self, metrics: &[Metric]) -> io::Result<()> {
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)?;
        }

        let mut buf = Vec::new();
        for metric in metrics {
            serde_json::to_writer(&mut buf, metric).map_err(io::Error::other)?;
            buf.push(b'\n');
        }

        let tmp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(&buf)?;
        file.sync_all()?;
        drop(file);

        fs::rename(tmp_path, &self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::Metric;

    #[test]
    fn load_missing_file_is_empty_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let saver = FileSaver::new(dir.path().join("absent.json"));
        assert!(saver.load().unwrap().is_empty());
    }

    #[test]
    fn snapshot_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let saver = FileSaver::new(dir.path().join("db.json"));

        let metrics = vec![
            Metric::gauge("temp", 2.75).unwrap(),
            Metric::counter("hits", 80).unwrap(),
        ];
        saver.save(&metrics).unwrap();

        assert_eq!(saver.load().unwrap(), metrics);
    }

    #[test]
    fn malformed_record_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        fs::write(
            &path,
            "{\"id\":\"temp\",\"type\":\"gauge\",\"value\":1.5}\nnot json at all{\n",
        )
        .unwrap();

        let metrics = FileSaver::new(&path).load().unwrap();
        assert_eq!(metrics, vec![Metric::gauge("temp", 1.5).unwrap()]);
    }

    #[test]
    fn save_replaces_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        let saver = FileSaver::new(&path);

        saver.save(&[Metric::gauge("old", 1.0).unwrap()]).unwrap();
        saver.save(&[Metric::gauge("new", 2.0).unwrap()]).unwrap();

        let metrics = saver.load().unwrap();
        assert_eq!(metrics, vec![Metric::gauge("new", 2.0).unwrap()]);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn save_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/db.json");
        let saver = FileSaver::new(&path);

        saver.save(&[Metric::counter("hits", 1).unwrap()]).unwrap();
        assert_eq!(saver.load().unwrap().len(), 1);
    }

    #[test]
    fn write_through_is_selected_by_zero_interval() {
        let config = SaverConfig {
            store_interval: Duration::ZERO,
            path: PathBuf::from("/tmp/metrel-db.json"),
            restore: true,
        };
        assert!(config.write_through());

        let config = SaverConfig {
            store_interval: Duration::from_secs(300),
            ..config
        };
        assert!(!config.write_through());
    }
}
