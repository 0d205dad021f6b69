use crate::base::{BaseModel, BasePrediction};
use crate::errors::{PredictorError, PredictorResult};
use crate::features::FeatureVector;
use futures_util::future::{BoxFuture, FutureExt};
use reqwest::Client;
use std::time::Duration;

/// HTTP client for an out-of-process base model (e.g. an ONNX runtime sidecar).
///
/// POST {base_url}/predict_base  {"features": [7 floats]}
/// ->   {"latency_ms": f, "energy_j": f}
///
/// Every failure mode is reported as ModelUnavailable. No retries here;
/// retry policy belongs to the caller.
#[derive(Clone)]
pub struct RemoteBaseModel {
    http: Client,
    base_url: String,
}

#[derive(serde::Serialize)]
struct BaseRequest {
    features: [f64; 7],
}

impl RemoteBaseModel {
    pub fn new(base_url: &str, timeout: Duration) -> PredictorResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PredictorError::Config(format!("http client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch(&self, features: &FeatureVector) -> PredictorResult<BasePrediction> {
        let url = format!("{}/predict_base", self.base_url);

        let resp = self
            .http
            .post(&url)
            .json(&BaseRequest {
                features: features.to_array(),
            })
            .send()
            .await
            .map_err(|e| PredictorError::ModelUnavailable(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PredictorError::ModelUnavailable(format!("HTTP {status}: {body}")));
        }

        let out: BasePrediction = resp
            .json()
            .await
            .map_err(|e| PredictorError::ModelUnavailable(format!("parse: {e}")))?;

        if !out.latency_ms.is_finite() || !out.energy_j.is_finite() {
            return Err(PredictorError::ModelUnavailable(format!(
                "non-finite output: latency={} energy={}",
                out.latency_ms, out.energy_j
            )));
        }

        Ok(out)
    }
}

impl BaseModel for RemoteBaseModel {
    #[inline]
    fn name(&self) -> &'static str {
        "remote"
    }

    fn predict_base<'a>(
        &'a self,
        features: &'a FeatureVector,
    ) -> BoxFuture<'a, PredictorResult<BasePrediction>> {
        self.fetch(features).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::{Json, Router};

    fn sample() -> FeatureVector {
        FeatureVector::from_array([50.0, 20.0, 0.01, 0.4, 0.5, 256.0, 150.0])
    }

    async fn spawn_stub(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_remote_roundtrip() {
        let app = Router::new().route(
            "/predict_base",
            post(|Json(body): Json<serde_json::Value>| async move {
                let bw = body["features"][0].as_f64().unwrap_or(0.0);
                Json(serde_json::json!({ "latency_ms": bw * 2.0, "energy_j": 0.3 }))
            }),
        );
        let url = spawn_stub(app).await;

        let model = RemoteBaseModel::new(&url, Duration::from_secs(2)).unwrap();
        let out = model.predict_base(&sample()).await.unwrap();
        assert_eq!(out.latency_ms, 100.0);
        assert_eq!(out.energy_j, 0.3);
    }

    #[tokio::test]
    async fn test_server_error_is_model_unavailable() {
        let app = Router::new().route(
            "/predict_base",
            post(|| async { (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let url = spawn_stub(app).await;

        let model = RemoteBaseModel::new(&url, Duration::from_secs(2)).unwrap();
        let err = model.predict_base(&sample()).await.unwrap_err();
        assert!(matches!(err, PredictorError::ModelUnavailable(_)), "{err}");
    }

    #[tokio::test]
    async fn test_connection_refused_is_model_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let model = RemoteBaseModel::new(&format!("http://{addr}/"), Duration::from_secs(1)).unwrap();
        let err = model.predict_base(&sample()).await.unwrap_err();
        assert!(matches!(err, PredictorError::ModelUnavailable(_)), "{err}");
    }
}
