//! Silhouette scoring
//!
//! Uses the same mixed dissimilarity as the clustering run. Time is
//! quadratic in batch size; memory holds only `k` running sums per record.

use super::distance::mixed_distance;
use crate::normalizer::FeatureVector;
use rayon::prelude::*;

/// Per-record silhouette values
///
/// A record in a singleton cluster, or with no other non-empty cluster to
/// compare against, scores 0.
pub fn silhouette_samples(vectors: &[FeatureVector], labels: &[usize], k: usize, gamma: f64) -> Vec<f64> {
    let n = vectors.len();
    if n == 0 || k <= 1 {
        return vec![0.0; n];
    }

    let mut sizes = vec![0usize; k];
    for &label in labels {
        sizes[label] += 1;
    }

    (0..n)
        .into_par_iter()
        .map(|i| {
            let own = labels[i];
            if sizes[own] <= 1 {
                return 0.0;
            }

            let mut sums = vec![0.0; k];
            for (j, other) in vectors.iter().enumerate() {
                if j != i {
                    sums[labels[j]] += mixed_distance(&vectors[i], other, gamma);
                }
            }

            let a = sums[own] / (sizes[own] - 1) as f64;
            let b = (0..k)
                .filter(|&c| c != own && sizes[c] > 0)
                .map(|c| sums[c] / sizes[c] as f64)
                .fold(f64::INFINITY, f64::min);

            if !b.is_finite() {
                return 0.0;
            }
            let denom = a.max(b);
            if denom <= 0.0 {
                0.0
            } else {
                ((b - a) / denom).clamp(-1.0, 1.0)
            }
        })
        .collect()
}

/// Mean silhouette over all records
pub fn silhouette_score(vectors: &[FeatureVector], labels: &[usize], k: usize, gamma: f64) -> f64 {
    let samples = silhouette_samples(vectors, labels, k, gamma);
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: f64) -> FeatureVector {
        FeatureVector::new(vec![x], vec![0])
    }

    #[test]
    fn test_well_separated_clusters_score_high() {
        let vectors = vec![point(0.0), point(0.1), point(10.0), point(10.1)];
        let labels = vec![0, 0, 1, 1];
        let score = silhouette_score(&vectors, &labels, 2, 1.0);
        assert!(score > 0.9, "score was {score}");
    }

    #[test]
    fn test_single_cluster_scores_zero() {
        let vectors = vec![point(0.0), point(1.0), point(2.0)];
        let labels = vec![0, 0, 0];
        assert!(silhouette_samples(&vectors, &labels, 1, 1.0)
            .iter()
            .all(|&s| s == 0.0));
    }

    #[test]
    fn test_singletons_score_zero() {
        let vectors = vec![point(0.0), point(5.0), point(5.5)];
        let labels = vec![0, 1, 1];
        let samples = silhouette_samples(&vectors, &labels, 2, 1.0);
        assert_eq!(samples[0], 0.0);
        assert!(samples[1] > 0.0);
    }

    #[test]
    fn test_matches_hand_computed_values() {
        // cluster 0: {0, 2}, cluster 1: {6}
        let vectors = vec![point(0.0), point(2.0), point(6.0)];
        let labels = vec![0, 0, 1];
        let samples = silhouette_samples(&vectors, &labels, 2, 1.0);
        // record 0: a = 4, b = 36
        assert!((samples[0] - 32.0 / 36.0).abs() < 1e-12);
        // record 1: a = 4, b = 16
        assert!((samples[1] - 12.0 / 16.0).abs() < 1e-12);
        assert_eq!(samples[2], 0.0);
    }

    #[test]
    fn test_bad_assignment_scores_negative() {
        let vectors = vec![point(0.0), point(10.0), point(0.1), point(10.1)];
        let labels = vec![0, 0, 1, 1];
        let score = silhouette_score(&vectors, &labels, 2, 1.0);
        assert!(score < 0.0, "score was {score}");
        assert!(score >= -1.0);
    }
}
