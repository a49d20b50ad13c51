//! API client for communicating with the typhoon server

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Rejection reported by the server in its `{ error, code, details }` body
#[derive(Debug, Error)]
#[error("API error ({status}){}: {message}", code_suffix(.code))]
pub struct ApiError {
    pub status: u16,
    pub code: Option<String>,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(" [{c}]")).unwrap_or_default()
}

/// API client for the typhoon server
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        Self::decode(response).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let error = match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(e) => ApiError {
                    status,
                    code: e.code,
                    message: e.error,
                    details: e.details,
                },
                Err(_) => ApiError {
                    status,
                    code: None,
                    message: body,
                    details: None,
                },
            };
            return Err(error.into());
        }

        response.json().await.context("Failed to parse response")
    }

    pub async fn cluster(&self, request: &ClusterRequest) -> Result<ClusterResponse> {
        self.post("api/cluster", request).await
    }

    pub async fn predict(&self, request: &PredictRequest) -> Result<PredictResponse> {
        self.post("api/predict", request).await
    }

    pub async fn health(&self) -> Result<HealthSummary> {
        self.get("api/health").await
    }

    pub async fn model_status(&self) -> Result<ModelStatus> {
        self.get("api/model-status").await
    }
}

// API request/response types

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TyphoonRecord {
    pub name: String,
    pub wind_speed: f64,
    pub rainfall: f64,
    pub duration: f64,
    pub casualties: f64,
    pub damage_cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterRequest {
    pub typhoon_data: Vec<TyphoonRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterCenter {
    pub wind_speed: f64,
    pub rainfall: f64,
    pub duration: f64,
    pub casualties: f64,
    pub damage_cost: f64,
    pub name_length: f64,
    #[serde(default)]
    pub province: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterResponse {
    pub cluster_assignments: Vec<usize>,
    pub cluster_centers: Vec<ClusterCenter>,
    pub silhouette_score: f64,
    #[serde(default = "default_true")]
    pub converged: bool,
    #[serde(default)]
    pub partial: bool,
    #[serde(default)]
    pub iterations: usize,
    #[serde(default)]
    pub warnings: Vec<serde_json::Value>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    pub typhoon_name: String,
    pub province: String,
    pub max_wind_speed: f64,
    pub rainfall_24hr: f64,
    pub storm_duration: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub predicted_casualties: u64,
    pub predicted_damage_cost: f64,
    pub risk_level: String,
    pub confidence: f64,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub model_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSummary {
    pub status: String,
    pub models_loaded: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStatus {
    pub loaded: bool,
    pub model_version: String,
    pub model_family: String,
    pub features_count: usize,
    pub targets_count: usize,
    pub trained_at: DateTime<Utc>,
    #[serde(default)]
    pub provinces: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> TyphoonRecord {
        TyphoonRecord {
            name: "Yolanda".to_string(),
            wind_speed: 195.0,
            rainfall: 400.0,
            duration: 48.0,
            casualties: 6300.0,
            damage_cost: 5.9e9,
            province: None,
        }
    }

    #[tokio::test]
    async fn test_cluster_posts_batch_and_parses_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/cluster")
            .match_body(mockito::Matcher::PartialJson(json!({ "k": 1 })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "cluster_assignments": [0],
                    "cluster_centers": [{
                        "wind_speed": 195.0, "rainfall": 400.0, "duration": 48.0,
                        "casualties": 6300.0, "damage_cost": 5.9e9, "name_length": 7.0,
                        "province": "unspecified"
                    }],
                    "silhouette_score": 0.0
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let response = client
            .cluster(&ClusterRequest {
                typhoon_data: vec![record()],
                k: Some(1),
                seed: None,
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.cluster_assignments, vec![0]);
        assert!(response.converged);
        assert!(response.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_error_body_surfaces_code() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/predict")
            .with_status(422)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "error": "province 'Atlantis' is not in the fitted model's category set",
                    "code": "validation_error",
                    "details": { "province": "Atlantis" }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client
            .predict(&PredictRequest {
                typhoon_name: "X".to_string(),
                province: "Atlantis".to_string(),
                max_wind_speed: 100.0,
                rainfall_24hr: 100.0,
                storm_duration: 12.0,
                population: None,
            })
            .await
            .unwrap_err();

        let api = err.downcast_ref::<ApiError>().unwrap();
        assert_eq!(api.status, 422);
        assert_eq!(api.code.as_deref(), Some("validation_error"));
        assert!(err.to_string().contains("[validation_error]"));
    }

    #[tokio::test]
    async fn test_plain_text_error_kept_verbatim() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/health")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client.health().await.unwrap_err();
        let api = err.downcast_ref::<ApiError>().unwrap();
        assert_eq!(api.status, 502);
        assert_eq!(api.message, "bad gateway");
        assert_eq!(api.code, None);
    }

    #[tokio::test]
    async fn test_model_status_parses_timestamp() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/model-status")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "loaded": true,
                    "model_version": "impact-rf-2024.06",
                    "model_family": "random_forest",
                    "features_count": 9,
                    "targets_count": 2,
                    "trained_at": "2024-06-01T00:00:00Z",
                    "provinces": ["Leyte"]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let status = client.model_status().await.unwrap();
        assert_eq!(status.model_version, "impact-rf-2024.06");
        assert_eq!(status.trained_at.to_rfc3339(), "2024-06-01T00:00:00+00:00");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
