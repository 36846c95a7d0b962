//! HTTP push client: one gzip-compressed JSON record per metric, POSTed to
//! the collector's update endpoint. Delivery is best-effort, at-most-once per
//! cycle. A failed send is logged and naturally retried next cycle, since the
//! store is re-read fresh every time.

use std::fmt;
use std::io::{self, Write};

use flate2::Compression;
use flate2::write::GzEncoder;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_TYPE};
use tracing::{debug, error};

use metrel_core::metric::Metric;

#[derive(Debug)]
pub enum ReportError {
    Encode(serde_json::Error),
    Compress(io::Error),
    Transport(reqwest::Error),
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::Encode(e) => write!(f, "encode failed: {}", e),
            ReportError::Compress(e) => write!(f, "compression failed: {}", e),
            ReportError::Transport(e) => write!(f, "send failed: {}", e),
        }
    }
}

impl std::error::Error for ReportError {}

impl From<serde_json::Error> for ReportError {
    fn from(e: serde_json::Error) -> Self {
        ReportError::Encode(e)
    }
}

impl From<io::Error> for ReportError {
    fn from(e: io::Error) -> Self {
        ReportError::Compress(e)
    }
}

impl From<reqwest::Error> for ReportError {
    fn from(e: reqwest::Error) -> Self {
        ReportError::Transport(e)
    }
}

pub struct Reporter {
    client: reqwest::Client,
    endpoint: String,
}

impl Reporter {
    pub fn new(address: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("http://{}/update/", address),
        }
    }

    /// Sends every metric in the snapshot. One failed send does not abort the
    /// remaining metrics in the cycle.
    pub async fn send_all(&self, metrics: &[Metric]) {
        for metric in metrics {
            match self.send_one(metric).await {
                Ok(status) => debug!(id = %metric.id, %status, "metric reported"),
                Err(e) => error!(id = %metric.id, error = %e, "failed to report metric"),
            }
        }
    }

    async fn send_one(&self, metric: &Metric) -> Result<StatusCode, ReportError> {
        let body = serde_json::to_vec(metric)?;
        let compressed = gzip(&body)?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_ENCODING, "gzip")
            .header(ACCEPT_ENCODING, "gzip")
            .body(compressed)
            .send()
            .await?;

        Ok(response.status())
    }
}

fn gzip(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;
    use httpmock::prelude::*;

    use super::*;

    #[test]
    fn gzip_round_trips() {
        let compressed = gzip(b"{\"id\":\"temp\"}").unwrap();
        let mut decoder = GzDecoder::new(compressed.as_slice());
        let mut out = String::new();
        decoder.read_to_string(&mut out).unwrap();
        assert_eq!(out, "{\"id\":\"temp\"}");
    }

    #[tokio::test]
    async fn sends_one_compressed_record_per_metric() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/update/")
                    .header("content-type", "application/json")
                    .header("content-encoding", "gzip");
                then.status(200);
            })
            .await;

        let reporter = Reporter::new(&server.address().to_string());
        let metrics = vec![
            Metric::gauge("VmRSS", 2048.0).unwrap(),
            Metric::counter("PollCount", 3).unwrap(),
        ];
        reporter.send_all(&metrics).await;

        mock.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn server_error_does_not_abort_the_cycle() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/update/");
                then.status(500);
            })
            .await;

        let reporter = Reporter::new(&server.address().to_string());
        let metrics = vec![
            Metric::gauge("a", 1.0).unwrap(),
            Metric::gauge("b", 2.0).unwrap(),
            Metric::gauge("c", 3.0).unwrap(),
        ];
        reporter.send_all(&metrics).await;

        mock.assert_hits_async(3).await;
    }

    #[tokio::test]
    async fn unreachable_collector_is_not_fatal() {
        // Port 9 (discard) is not listening; every send fails, none panic.
        let reporter = Reporter::new("127.0.0.1:9");
        let metrics = vec![Metric::gauge("a", 1.0).unwrap()];
        reporter.send_all(&metrics).await;
    }
}
