use crate::errors::PredictorError;
use crate::server::schema::{Admission, BatchRequest, PredictRequest};
use crate::service::{slo_violation, PredictionResult, TableSource};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use futures_util::future::join_all;
use std::sync::Arc;

impl IntoResponse for PredictorError {
    fn into_response(self) -> Response {
        let status = match self {
            PredictorError::InvalidFeatureVector(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PredictorError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Per-item batch outcome: `{"ok": {...}}` or `{"error": "..."}`.
#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchItem {
    Ok(PredictionResult),
    Error(String),
}

/// POST /predict -- one calibrated prediction
pub async fn predict(
    State(state): State<Arc<AppState>>,
    body: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictionResult>, PredictorError> {
    let request_id = uuid::Uuid::new_v4();

    let admission = match body {
        Ok(Json(req)) => Admission::admit(&req),
        Err(e) => Admission::Rejected { reason: format!("malformed request: {}", e.body_text()) },
    };

    let (features, action) = match admission {
        Admission::Accepted { features, action } => (features, action),
        Admission::Rejected { reason } => {
            state.service.counters.rejected.fetch_add(1, portable_atomic::Ordering::Relaxed);
            tracing::warn!(%request_id, %reason, "request rejected");
            return Err(PredictorError::InvalidFeatureVector(reason));
        }
    };

    let result = state.service.predict(&features, action).await.map_err(|e| {
        tracing::error!(%request_id, %action, error = %e, "prediction failed");
        e
    })?;

    tracing::debug!(
        %request_id,
        %action,
        mu = result.mu_latency_ms,
        p95 = result.p95_conformal_ms,
        slo_violation = slo_violation(&result, features.slo_p95_ms),
        "prediction served"
    );
    Ok(Json(result))
}

/// POST /predict/batch -- independent predictions, one outcome per item
pub async fn predict_batch(
    State(state): State<Arc<AppState>>,
    body: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, PredictorError> {
    let Json(batch) = body
        .map_err(|e| PredictorError::InvalidFeatureVector(format!("malformed batch: {}", e.body_text())))?;

    let request_id = uuid::Uuid::new_v4();
    let items = batch.requests.into_iter().map(|value| {
        let state = state.clone();
        async move {
            match Admission::from_json(value) {
                Admission::Accepted { features, action } => {
                    match state.service.predict(&features, action).await {
                        Ok(r) => BatchItem::Ok(r),
                        Err(e) => BatchItem::Error(e.to_string()),
                    }
                }
                Admission::Rejected { reason } => {
                    state.service.counters.rejected.fetch_add(1, portable_atomic::Ordering::Relaxed);
                    BatchItem::Error(reason)
                }
            }
        }
    });

    let results = join_all(items).await;
    let failed = results.iter().filter(|r| matches!(r, BatchItem::Error(_))).count();
    if failed > 0 {
        tracing::warn!(%request_id, total = results.len(), failed, "batch had failed items");
    }
    Ok(Json(serde_json::json!({ "results": results })))
}

/// POST /reload -- re-read the calibration table; old table stays on failure
pub async fn reload(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, PredictorError> {
    let snapshot = state.service.reload().map_err(|e| {
        tracing::warn!(error = %e, "table reload failed, keeping current snapshot");
        e
    })?;
    Ok(Json(serde_json::json!({
        "version": snapshot.version,
        "alpha": snapshot.table.alpha,
        "buckets": snapshot.table.qhat.len(),
    })))
}

/// GET /table -- current snapshot
pub async fn get_table(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let snapshot = state.service.snapshot();
    Json(serde_json::json!({
        "version": snapshot.version,
        "source": snapshot.source,
        "table": snapshot.table,
    }))
}

/// GET /counters -- service counters (lock-free reads)
pub async fn get_counters(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    use portable_atomic::Ordering::Relaxed;
    let c = &state.service.counters;
    Json(serde_json::json!({
        "requests": c.requests.load(Relaxed),
        "rejected": c.rejected.load(Relaxed),
        "model_failures": c.model_failures.load(Relaxed),
        "default_offset_used": c.default_offset_used.load(Relaxed),
        "reloads": c.reloads.load(Relaxed),
    }))
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let degraded = state.service.snapshot().source == TableSource::Fallback;
    Json(serde_json::json!({
        "status": "ok",
        "strategy": state.service.strategy(),
        "model": state.service.model_name(),
        "degraded": degraded,
        "started_at": state.started_at,
    }))
}

#[cfg(test)]
mod tests {
    use crate::base::synthetic::SyntheticBaseModel;
    use crate::calibration::ConformalTable;
    use crate::config::BoundStrategy;
    use crate::server::router;
    use crate::service::PredictionService;
    use crate::state::AppState;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(table_path: &Path) -> axum::Router {
        let service = PredictionService::new(
            Arc::new(SyntheticBaseModel::new()),
            BoundStrategy::Conformal,
            10.0,
            Duration::from_millis(500),
            table_path,
        );
        router(Arc::new(AppState::new(service)))
    }

    async fn call(app: axum::Router, method: &str, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, serde_json::Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn table_file(dir: &Path) -> std::path::PathBuf {
        let mut t = ConformalTable::empty(0.95);
        t.qhat.insert("cloud:low".into(), 0.0);
        t.qhat.insert("edge:high".into(), 5.0);
        let path = dir.join("conformal.json");
        t.save(&path).unwrap();
        path
    }

    #[tokio::test]
    async fn test_predict_ok() {
        let dir = tempfile::tempdir().unwrap();
        let body = serde_json::json!({
            "features": [50.0, 20.0, 0.01, 0.4, 0.9, 256.0, 150.0],
            "action": "edge1:high"
        });
        let (status, json) = call(app(&table_file(dir.path())), "POST", "/predict", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        for key in ["mu_latency_ms", "var_latency", "mu_energy_j", "var_energy", "p95_conformal_ms"] {
            assert!(json[key].is_f64(), "missing {key}: {json}");
        }
        let gap = json["p95_conformal_ms"].as_f64().unwrap() - json["mu_latency_ms"].as_f64().unwrap();
        assert!((gap - 5.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_predict_bad_arity_is_422() {
        let dir = tempfile::tempdir().unwrap();
        let body = serde_json::json!({ "features": [1.0, 2.0], "action": "edge:med" });
        let (status, json) = call(app(&table_file(dir.path())), "POST", "/predict", Some(body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(json["error"].as_str().unwrap().contains("expected 7"));
    }

    #[tokio::test]
    async fn test_predict_malformed_json_is_422() {
        let dir = tempfile::tempdir().unwrap();
        let body = serde_json::json!({ "features": "fast please" });
        let (status, json) = call(app(&table_file(dir.path())), "POST", "/predict", Some(body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn test_batch_items_independent() {
        let dir = tempfile::tempdir().unwrap();
        let body = serde_json::json!({ "requests": [
            { "features": [50.0, 20.0, 0.01, 0.4, 0.3, 256.0, 150.0], "action": "cloud1:low" },
            { "features": [50.0, 20.0] },
            { "features": [50.0, 20.0, 0.01, 0.4, 0.3, 256.0, 150.0] }
        ]});
        let (status, json) = call(app(&table_file(dir.path())), "POST", "/predict/batch", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        let results = json["results"].as_array().unwrap();
        assert_eq!(results.len(), 3);
        let first = &results[0]["ok"];
        assert_eq!(first["p95_conformal_ms"], first["mu_latency_ms"]);
        assert!(results[1]["error"].is_string());
        assert!(results[2]["ok"].is_object());
    }

    #[tokio::test]
    async fn test_health_reports_degraded() {
        let dir = tempfile::tempdir().unwrap();
        let (status, json) = call(app(&dir.path().join("missing.json")), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["degraded"], true);
        assert_eq!(json["strategy"], "conformal");
    }

    #[tokio::test]
    async fn test_reload_and_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = table_file(dir.path());
        let app = app(&path);

        let (status, json) = call(app.clone(), "POST", "/reload", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["version"], 2);

        let (_, json) = call(app.clone(), "GET", "/table", None).await;
        assert_eq!(json["source"], "file");
        assert_eq!(json["table"]["qhat"]["edge:high"], 5.0);

        std::fs::remove_file(&path).unwrap();
        let (status, _) = call(app.clone(), "POST", "/reload", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (_, json) = call(app, "GET", "/counters", None).await;
        assert_eq!(json["reloads"], 1);
    }
}
