//! Request-level prediction service behind `POST /api/predict`

use crate::error::{EngineError, Result, ValidationError};
use crate::models::{PredictionResult, RiskLevel, TyphoonParams};
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::predictor::{ImpactPredictor, Predictor, FEATURE_NAMES};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Body of `POST /api/predict`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    pub typhoon_name: String,
    pub province: String,
    pub max_wind_speed: f64,
    pub rainfall_24hr: f64,
    pub storm_duration: f64,
    /// Signed on the wire so a negative count is reported rather than
    /// rejected as malformed JSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<i64>,
}

impl PredictRequest {
    fn into_params(self) -> std::result::Result<TyphoonParams, ValidationError> {
        let population = match self.population {
            None => None,
            Some(p) if p < 0 => {
                return Err(ValidationError::NegativeValue {
                    record: 0,
                    field: "population",
                    value: p as f64,
                })
            }
            Some(p) => Some(p as u64),
        };
        Ok(TyphoonParams {
            name: self.typhoon_name,
            province: self.province,
            wind_speed: self.max_wind_speed,
            rainfall: self.rainfall_24hr,
            duration: self.storm_duration,
            population,
        })
    }
}

/// Body returned by `POST /api/predict`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub predicted_casualties: u64,
    pub predicted_damage_cost: f64,
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub severity_score: f64,
    pub recommendations: Vec<String>,
    pub model_version: String,
}

impl From<PredictionResult> for PredictResponse {
    fn from(r: PredictionResult) -> Self {
        Self {
            predicted_casualties: r.predicted_casualties,
            predicted_damage_cost: r.predicted_damage_cost,
            risk_level: r.risk_level,
            confidence: r.confidence,
            severity_score: r.severity_score,
            recommendations: r.recommendations,
            model_version: r.model_version,
        }
    }
}

/// Body returned by `GET /api/model-status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStatus {
    pub loaded: bool,
    pub model_version: String,
    pub model_family: String,
    pub features_count: usize,
    pub targets_count: usize,
    pub trained_at: DateTime<Utc>,
    pub feature_names: Vec<String>,
    pub provinces: Vec<String>,
}

/// Prediction front-end over the shared, read-only predictor
#[derive(Clone)]
pub struct PredictionService {
    predictor: Arc<ImpactPredictor>,
    metrics: EngineMetrics,
    logger: StructuredLogger,
}

impl PredictionService {
    pub fn new(predictor: Arc<ImpactPredictor>, metrics: EngineMetrics, logger: StructuredLogger) -> Self {
        Self {
            predictor,
            metrics,
            logger,
        }
    }

    pub fn model_version(&self) -> &str {
        self.predictor.model_version()
    }

    pub fn predict(&self, request: PredictRequest) -> Result<PredictResponse> {
        let start = Instant::now();
        let outcome = request
            .into_params()
            .map_err(EngineError::from)
            .and_then(|params| {
                let result = self.predictor.predict(&params)?;
                Ok((params, result))
            });

        let (params, result) = match outcome {
            Ok(ok) => ok,
            Err(e) => {
                self.metrics.inc_rejected_requests();
                self.logger
                    .log_rejection("predict", e.kind().code(), &e.to_string());
                return Err(e);
            }
        };

        self.metrics
            .observe_prediction_latency(start.elapsed().as_secs_f64());
        self.logger.log_prediction(
            &params.name,
            &params.province,
            result.predicted_casualties,
            result.predicted_damage_cost,
            result.risk_level.as_str(),
            result.confidence,
            &result.model_version,
        );

        Ok(result.into())
    }

    pub fn model_status(&self) -> ModelStatus {
        let model = self.predictor.model();
        ModelStatus {
            loaded: true,
            model_version: model.version().to_string(),
            model_family: model.family().to_string(),
            features_count: model.feature_count(),
            targets_count: model.target_count(),
            trained_at: model.trained_at(),
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            provinces: model.provinces().map(str::to_string).collect(),
        }
    }

    /// A ready-to-send predict body for a recognised province
    pub fn sample_input(&self) -> PredictRequest {
        let model = self.predictor.model();
        let province = model
            .provinces()
            .find(|p| p.eq_ignore_ascii_case("Leyte"))
            .or_else(|| model.provinces().next())
            .unwrap_or_default()
            .to_string();
        PredictRequest {
            typhoon_name: "Yolanda".to_string(),
            province,
            max_wind_speed: 195.0,
            rainfall_24hr: 400.0,
            storm_duration: 48.0,
            population: Some(2_000_000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::predictor::test_support::small_model;
    use crate::predictor::OutputFormatter;

    fn service() -> PredictionService {
        let predictor = ImpactPredictor::new(Arc::new(small_model()), OutputFormatter::new());
        PredictionService::new(Arc::new(predictor), EngineMetrics::new(), StructuredLogger::new("test"))
    }

    #[test]
    fn test_frontend_body_predicts() {
        let body = r#"{"typhoon_name":"Yolanda","province":"Leyte","max_wind_speed":195,"rainfall_24hr":400,"storm_duration":48,"population":2000000}"#;
        let request: PredictRequest = serde_json::from_str(body).unwrap();
        let response = service().predict(request).unwrap();
        assert_eq!(response.risk_level, RiskLevel::High);
        assert!((0.0..=1.0).contains(&response.confidence));
        assert_eq!(response.model_version, "test-1");
    }

    #[test]
    fn test_negative_population_rejected() {
        let mut request = service().sample_input();
        request.population = Some(-4);
        let err = service().predict(request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_zero_population_rejected() {
        let mut request = service().sample_input();
        request.population = Some(0);
        assert!(matches!(
            service().predict(request),
            Err(EngineError::Validation(ValidationError::NonPositivePopulation { .. }))
        ));
    }

    #[test]
    fn test_missing_population_uses_reference() {
        let mut request = service().sample_input();
        request.population = None;
        assert!(service().predict(request).is_ok());
    }

    #[test]
    fn test_sample_input_is_accepted() {
        let service = service();
        let sample = service.sample_input();
        assert_eq!(sample.province, "Leyte");
        assert!(service.predict(sample).is_ok());
    }

    #[test]
    fn test_model_status_reflects_model() {
        let status = service().model_status();
        assert!(status.loaded);
        assert_eq!(status.model_version, "test-1");
        assert_eq!(status.features_count, FEATURE_NAMES.len());
        assert_eq!(status.targets_count, 2);
        assert_eq!(status.provinces, vec!["Leyte".to_string(), "Manila".to_string()]);
    }
}
