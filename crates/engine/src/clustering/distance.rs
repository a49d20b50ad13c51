//! Mixed numeric/categorical dissimilarity

use crate::normalizer::{FeatureVector, NormalizedBatch, CATEGORICAL_FEATURES};

/// Squared Euclidean distance on the numeric part plus `gamma` per
/// categorical mismatch.
pub fn mixed_distance(a: &FeatureVector, b: &FeatureVector, gamma: f64) -> f64 {
    let numeric: f64 = a
        .numeric()
        .iter()
        .zip(b.numeric())
        .map(|(x, y)| (x - y).powi(2))
        .sum();
    let mismatches = a
        .categorical()
        .iter()
        .zip(b.categorical())
        .filter(|(x, y)| x != y)
        .count();
    numeric + gamma * mismatches as f64
}

/// Default categorical weight: mean scaled numeric variance divided by the
/// number of categorical attributes.
pub fn default_gamma(batch: &NormalizedBatch) -> f64 {
    batch.mean_numeric_variance() / CATEGORICAL_FEATURES.len() as f64
}
