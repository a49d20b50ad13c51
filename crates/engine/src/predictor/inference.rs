//! Impact inference over the fitted ensemble model

use super::features::FeatureBuilder;
use super::model::ImpactModel;
use super::output::OutputFormatter;
use super::Predictor;
use crate::error::{Result, ValidationError};
use crate::models::{PredictionResult, TyphoonParams};
use crate::normalizer::check_non_negative;
use crate::observability::EngineMetrics;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Inference latency above which a prediction counts as slow
pub const SLOW_INFERENCE: Duration = Duration::from_millis(5);

/// Predictor backed by an immutable, shared [`ImpactModel`]
pub struct ImpactPredictor {
    model: Arc<ImpactModel>,
    features: FeatureBuilder,
    output_formatter: OutputFormatter,
    slow_threshold: Duration,
    metrics: EngineMetrics,
}

impl ImpactPredictor {
    pub fn new(model: Arc<ImpactModel>, output_formatter: OutputFormatter) -> Self {
        let features = FeatureBuilder::new(model.reference_population());
        Self {
            model,
            features,
            output_formatter,
            slow_threshold: SLOW_INFERENCE,
            metrics: EngineMetrics::new(),
        }
    }

    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = threshold;
        self
    }

    pub fn model(&self) -> &ImpactModel {
        &self.model
    }

    /// Reject negative/non-finite numerics, zero population and unknown provinces.
    /// Returns the province exposure on success.
    fn validate(&self, params: &TyphoonParams) -> std::result::Result<f64, ValidationError> {
        check_non_negative(0, "wind_speed", params.wind_speed)?;
        check_non_negative(0, "rainfall", params.rainfall)?;
        check_non_negative(0, "duration", params.duration)?;
        if let Some(0) = params.population {
            return Err(ValidationError::NonPositivePopulation { value: 0 });
        }
        self.model
            .province_exposure(&params.province)
            .ok_or_else(|| ValidationError::UnknownProvince {
                province: params.province.clone(),
            })
    }
}

impl Predictor for ImpactPredictor {
    fn predict(&self, params: &TyphoonParams) -> Result<PredictionResult> {
        let start = Instant::now();

        let exposure = self.validate(params)?;
        let input = self.features.build(params, exposure);

        let casualties = self.model.predict_casualties(&input);
        let damage = self.model.predict_damage(&input);
        let result = self.output_formatter.format(
            casualties,
            damage,
            self.model.spread_ceiling(),
            self.model.version(),
        );

        let elapsed = start.elapsed();
        if elapsed >= self.slow_threshold {
            self.metrics.inc_slow_predictions();
            warn!(
                elapsed_us = elapsed.as_micros(),
                threshold_us = self.slow_threshold.as_micros(),
                "Inference exceeded latency target"
            );
        } else {
            debug!(elapsed_us = elapsed.as_micros(), "Inference completed");
        }

        Ok(result)
    }

    fn model_version(&self) -> &str {
        self.model.version()
    }
}
