//! HTTP adapters over the metric store. All storage semantics live in
//! metrel-core; these handlers translate between HTTP and `Storage` calls.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use tracing::warn;

use metrel_core::metric::{Metric, MetricKind, render_listing};
use metrel_core::store::{MemStore, Storage};

pub(crate) type SharedStore = Arc<MemStore>;

/// `POST /update/{kind}/{name}/{value}` — plain-text update.
pub(crate) async fn update_path(
    State(store): State<SharedStore>,
    Path((kind, name, value)): Path<(String, String, String)>,
) -> StatusCode {
    let metric = match Metric::from_str_value(&kind, &name, &value) {
        Ok(metric) => metric,
        Err(e) => {
            warn!(error = %e, "rejected update");
            return StatusCode::BAD_REQUEST;
        }
    };

    match store.save(metric) {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            warn!(error = %e, "rejected update");
            StatusCode::BAD_REQUEST
        }
    }
}

/// `POST /update/` — JSON update; echoes the metric as stored, so a counter
/// response carries the accumulated total.
pub(crate) async fn update_json(
    State(store): State<SharedStore>,
    Json(metric): Json<Metric>,
) -> Result<Json<Metric>, StatusCode> {
    match store.save(metric) {
        Ok(stored) => Ok(Json(stored)),
        Err(e) => {
            warn!(error = %e, "rejected update");
            Err(StatusCode::BAD_REQUEST)
        }
    }
}

/// `GET /value/{kind}/{name}` — plain-text current value.
pub(crate) async fn value_path(
    State(store): State<SharedStore>,
    Path((kind, name)): Path<(String, String)>,
) -> Result<String, StatusCode> {
    let kind: MetricKind = kind.parse().map_err(|_| StatusCode::NOT_FOUND)?;
    store
        .get(kind, &name)
        .map(|metric| metric.value_string())
        .map_err(|_| StatusCode::NOT_FOUND)
}

/// Lookup request body for `POST /value/`.
#[derive(Deserialize)]
pub(crate) struct MetricQuery {
    id: String,
    #[serde(rename = "type")]
    kind: MetricKind,
}

/// `POST /value/` — JSON lookup by id and kind.
pub(crate) async fn value_json(
    State(store): State<SharedStore>,
    Json(query): Json<MetricQuery>,
) -> Result<Json<Metric>, StatusCode> {
    store
        .get(query.kind, &query.id)
        .map(Json)
        .map_err(|_| StatusCode::NOT_FOUND)
}

/// `GET /` — all current metrics, one `name: value` line each.
pub(crate) async fn index(State(store): State<SharedStore>) -> String {
    render_listing(store.snapshot())
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use flate2::Compression;
    use flate2::write::GzEncoder;
    use serde_json::json;

    use metrel_core::metric::Metric;
    use metrel_core::store::{MemStore, Storage};

    /// Serves the real router on an ephemeral port.
    async fn spawn_app() -> (String, Arc<MemStore>) {
        let store = Arc::new(MemStore::new());
        let app = crate::router(store.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), store)
    }

    #[tokio::test]
    async fn gauge_update_is_last_write_wins() {
        let (base, _store) = spawn_app().await;
        let client = reqwest::Client::new();

        for value in ["1.5", "2.75"] {
            let resp = client
                .post(format!("{}/update/gauge/temp/{}", base, value))
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), 200);
        }

        let resp = client
            .get(format!("{}/value/gauge/temp", base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.text().await.unwrap(), "2.75");
    }

    #[tokio::test]
    async fn counter_update_accumulates() {
        let (base, _store) = spawn_app().await;
        let client = reqwest::Client::new();

        for _ in 0..2 {
            client
                .post(format!("{}/update/counter/hits/40", base))
                .send()
                .await
                .unwrap();
        }

        let resp = client
            .get(format!("{}/value/counter/hits", base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.text().await.unwrap(), "80");
    }

    #[tokio::test]
    async fn json_update_echoes_accumulated_total() {
        let (base, _store) = spawn_app().await;
        let client = reqwest::Client::new();
        let record = json!({"id": "hits", "type": "counter", "delta": 40});

        client
            .post(format!("{}/update/", base))
            .json(&record)
            .send()
            .await
            .unwrap();
        let resp = client
            .post(format!("{}/update/", base))
            .json(&record)
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body, json!({"id": "hits", "type": "counter", "delta": 80}));
    }

    #[tokio::test]
    async fn invalid_metric_is_rejected() {
        let (base, _store) = spawn_app().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{}/update/watermelon/x/5", base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        let resp = client
            .post(format!("{}/update/", base))
            .json(&json!({"id": "", "type": "gauge", "value": 1.0}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
    }

    #[tokio::test]
    async fn unknown_metric_is_not_found() {
        let (base, _store) = spawn_app().await;
        let client = reqwest::Client::new();

        let resp = client
            .get(format!("{}/value/gauge/nope", base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);

        let resp = client
            .post(format!("{}/value/", base))
            .json(&json!({"id": "nope", "type": "counter"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn json_value_lookup_returns_record() {
        let (base, store) = spawn_app().await;
        store.save(Metric::gauge("temp", 2.75).unwrap()).unwrap();

        let client = reqwest::Client::new();
        let resp = client
            .post(format!("{}/value/", base))
            .json(&json!({"id": "temp", "type": "gauge"}))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body, json!({"id": "temp", "type": "gauge", "value": 2.75}));
    }

    #[tokio::test]
    async fn index_lists_all_metrics() {
        let (base, store) = spawn_app().await;
        store.save(Metric::gauge("temp", 1.5).unwrap()).unwrap();
        store.save(Metric::counter("hits", 80).unwrap()).unwrap();

        let body = reqwest::get(&base).await.unwrap().text().await.unwrap();
        assert_eq!(body, "temp: 1.5\nhits: 80\n");
    }

    #[tokio::test]
    async fn gzip_request_body_is_accepted() {
        let (base, _store) = spawn_app().await;

        let record = json!({"id": "temp", "type": "gauge", "value": 1.5}).to_string();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(record.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();

        let client = reqwest::Client::new();
        let resp = client
            .post(format!("{}/update/", base))
            .header("content-type", "application/json")
            .header("content-encoding", "gzip")
            .body(compressed)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let resp = client
            .get(format!("{}/value/gauge/temp", base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.text().await.unwrap(), "1.5");
    }
}
