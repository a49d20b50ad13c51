//! Typhoon impact prediction

mod features;
mod inference;
mod model;
mod output;

pub use features::{
    combined_threat_score, rainfall_intensity, wind_intensity_category, FeatureBuilder,
    FEATURE_NAMES,
};
pub use inference::{ImpactPredictor, SLOW_INFERENCE};
pub use model::{EnsembleOutput, ImpactModel, Tree, TreeNode, MAX_LOG_OUTPUT, TARGET_TRANSFORM};
pub use output::{confidence, recommendations, OutputFormatter, RiskConfig};

#[cfg(test)]
pub(crate) use model::test_support;

use crate::error::Result;
use crate::models::{PredictionResult, TyphoonParams};

/// Trait for prediction implementations
pub trait Predictor: Send + Sync {
    /// Estimate the impact of one event
    fn predict(&self, params: &TyphoonParams) -> Result<PredictionResult>;

    /// Version of the fitted parameters in use
    fn model_version(&self) -> &str;
}
