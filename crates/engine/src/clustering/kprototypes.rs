//! K-Prototypes clustering.
//!
//! Generalizes k-means to mixed data. The dissimilarity between a record
//! and a prototype is
//!
//! ```text
//! d = Σ (xᵢ - pᵢ)² + γ · #{ j : labelⱼ ≠ prototype_labelⱼ }
//! ```
//!
//! Prototypes carry the numeric mean and the per-attribute categorical
//! mode of their members.
//!
//! # Runs
//!
//! 1. Seed k prototypes from k distinct records (per-run PCG stream)
//! 2. **Assign**: each record → lowest-`d` prototype, ties to lowest index
//! 3. Reseed any empty cluster with the record furthest from its own prototype
//! 4. **Update**: prototypes replaced by member means / modes
//! 5. Repeat until memberships are stable or `max_iter` is reached
//!
//! `n_init` independent runs execute on the rayon pool; the run with the
//! lowest total within-cluster distance wins, ties to the lowest run index.

use super::distance::{default_gamma, mixed_distance};
use super::silhouette::silhouette_score;
use crate::error::{EngineError, Result, ValidationError};
use crate::models::{Centroid, ClusterResult, ClusterWarning, TyphoonRecord};
use crate::normalizer::{FeatureNormalizer, FeatureVector, NormalizedBatch};
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use rayon::prelude::*;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default iteration cap per run
pub const DEFAULT_MAX_ITER: usize = 100;

/// Default number of independent restarts
pub const DEFAULT_N_INIT: usize = 10;

/// Default cap on records per call. Every iteration and the silhouette
/// are quadratic in batch size.
pub const DEFAULT_MAX_BATCH: usize = 1000;

/// Parameters of one clustering call
#[derive(Debug, Clone, PartialEq)]
pub struct KPrototypesConfig {
    pub k: usize,
    /// Categorical weight; `None` applies the batch-derived default
    pub gamma: Option<f64>,
    pub max_iter: usize,
    pub n_init: usize,
    /// Base seed; run `r` uses `seed + r`
    pub seed: Option<u64>,
    /// Checked between iterations only
    pub timeout: Option<Duration>,
    /// Larger batches are rejected before normalization
    pub max_batch: usize,
}

impl KPrototypesConfig {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            gamma: None,
            max_iter: DEFAULT_MAX_ITER,
            n_init: DEFAULT_N_INIT,
            seed: None,
            timeout: None,
            max_batch: DEFAULT_MAX_BATCH,
        }
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = Some(gamma);
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch;
        self
    }

    /// Check the parameters that do not depend on the batch.
    pub fn validate_parameters(&self) -> Result<()> {
        if self.k == 0 {
            return Err(EngineError::invalid_parameter("k", "must be at least 1"));
        }
        if self.max_batch == 0 {
            return Err(EngineError::invalid_parameter("max_batch", "must be at least 1"));
        }
        if self.max_iter == 0 {
            return Err(EngineError::invalid_parameter("max_iter", "must be at least 1"));
        }
        if self.n_init == 0 {
            return Err(EngineError::invalid_parameter("n_init", "must be at least 1"));
        }
        if let Some(g) = self.gamma {
            if !g.is_finite() || g < 0.0 {
                return Err(EngineError::invalid_parameter(
                    "gamma",
                    format!("must be a finite non-negative number, got {g}"),
                ));
            }
        }
        Ok(())
    }

    fn validate(&self, n_records: usize) -> Result<()> {
        if n_records == 0 {
            return Err(ValidationError::EmptyBatch.into());
        }
        if n_records > self.max_batch {
            return Err(ValidationError::BatchTooLarge {
                records: n_records,
                max: self.max_batch,
            }
            .into());
        }
        self.validate_parameters()?;
        if self.k > n_records {
            return Err(EngineError::invalid_parameter(
                "k",
                format!("cannot create {} clusters from {} records", self.k, n_records),
            ));
        }
        Ok(())
    }
}

/// State of one finished (or cut short) run
#[derive(Debug, Clone)]
struct RunOutcome {
    run: usize,
    labels: Vec<usize>,
    prototypes: Vec<FeatureVector>,
    cost: f64,
    iterations: usize,
    converged: bool,
    timed_out: bool,
}

/// K-Prototypes clustering engine. Holds no state between calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct KPrototypesEngine {
    normalizer: FeatureNormalizer,
}

impl KPrototypesEngine {
    pub fn new() -> Self {
        Self {
            normalizer: FeatureNormalizer::new(),
        }
    }

    /// Validate, normalize and cluster a batch of records.
    pub fn cluster(&self, records: &[TyphoonRecord], config: &KPrototypesConfig) -> Result<ClusterResult> {
        config.validate(records.len())?;
        let batch = self.normalizer.normalize(records)?;
        self.cluster_batch(&batch, config)
    }

    /// Cluster an already normalized batch.
    pub fn cluster_batch(&self, batch: &NormalizedBatch, config: &KPrototypesConfig) -> Result<ClusterResult> {
        config.validate(batch.len())?;

        let distinct = distinct_indices(&batch.vectors);
        if config.k > distinct.len() {
            return Err(EngineError::invalid_parameter(
                "k",
                format!(
                    "cannot create {} clusters from {} distinct records",
                    config.k,
                    distinct.len()
                ),
            ));
        }

        let gamma = config.gamma.unwrap_or_else(|| default_gamma(batch));
        let base_seed = config.seed.unwrap_or_else(|| rand::rng().random());
        let deadline = config.timeout.map(|t| Instant::now() + t);
        let cardinalities: Vec<usize> = batch.vocabularies.iter().map(|v| v.len()).collect();

        debug!(
            k = config.k,
            gamma = gamma,
            n_init = config.n_init,
            seed = base_seed,
            records = batch.len(),
            "Starting k-prototypes"
        );

        let outcomes: Vec<RunOutcome> = (0..config.n_init)
            .into_par_iter()
            .map(|run| {
                let ctx = RunContext {
                    vectors: &batch.vectors,
                    distinct: &distinct,
                    cardinalities: &cardinalities,
                    k: config.k,
                    gamma,
                    max_iter: config.max_iter,
                    deadline,
                };
                ctx.run(run, base_seed.wrapping_add(run as u64))
            })
            .collect();

        let timed_out_runs = outcomes.iter().filter(|o| o.timed_out).count();
        let best = outcomes
            .into_iter()
            .min_by(|a, b| a.cost.total_cmp(&b.cost).then(a.run.cmp(&b.run)))
            .ok_or_else(|| EngineError::invalid_parameter("n_init", "no runs executed"))?;

        debug!(
            run = best.run,
            cost = best.cost,
            iterations = best.iterations,
            converged = best.converged,
            "Selected best run"
        );

        let mut warnings = Vec::new();
        if timed_out_runs > 0 {
            warn!(timed_out_runs, "Clustering deadline reached, returning partial result");
            warnings.push(ClusterWarning::TimedOut {
                completed_runs: config.n_init - timed_out_runs,
            });
        }
        if !best.converged && !best.timed_out {
            warn!(max_iter = config.max_iter, "Best run did not converge");
            warnings.push(ClusterWarning::NotConverged {
                max_iter: config.max_iter,
            });
        }

        let silhouette = silhouette_score(&batch.vectors, &best.labels, config.k, gamma);
        let cluster_centers = best
            .prototypes
            .iter()
            .map(|p| Centroid {
                numeric: batch.scaler.inverse_transform(p.numeric()),
                categorical: batch.labels_for(p.categorical()),
            })
            .collect();

        Ok(ClusterResult {
            cluster_assignments: best.labels,
            cluster_centers,
            silhouette_score: silhouette,
            total_cost: best.cost,
            gamma,
            iterations: best.iterations,
            converged: best.converged,
            partial: timed_out_runs > 0,
            warnings,
        })
    }
}

/// Shared, read-only inputs of every run
struct RunContext<'a> {
    vectors: &'a [FeatureVector],
    distinct: &'a [usize],
    cardinalities: &'a [usize],
    k: usize,
    gamma: f64,
    max_iter: usize,
    deadline: Option<Instant>,
}

impl RunContext<'_> {
    fn run(&self, run: usize, seed: u64) -> RunOutcome {
        let mut rng = Pcg64::seed_from_u64(seed);
        let mut prototypes: Vec<FeatureVector> = index::sample(&mut rng, self.distinct.len(), self.k)
            .iter()
            .map(|i| self.vectors[self.distinct[i]].clone())
            .collect();

        let mut labels = vec![usize::MAX; self.vectors.len()];
        let mut iterations = 0;
        let mut converged = false;
        let mut timed_out = false;

        for iter in 0..self.max_iter {
            if iter > 0 && self.deadline.is_some_and(|d| Instant::now() >= d) {
                timed_out = true;
                break;
            }

            let mut next = self.assign(&prototypes);
            self.reseed_empty(&mut next, &prototypes);
            iterations += 1;

            let changed = next != labels;
            labels = next;
            prototypes = self.update(&labels, &prototypes);

            if !changed {
                converged = true;
                break;
            }
        }

        let cost = self.total_cost(&labels, &prototypes);
        debug!(run, seed, iterations, converged, cost, "Run finished");

        RunOutcome {
            run,
            labels,
            prototypes,
            cost,
            iterations,
            converged,
            timed_out,
        }
    }

    fn assign(&self, prototypes: &[FeatureVector]) -> Vec<usize> {
        self.vectors
            .iter()
            .map(|v| {
                let mut best = 0;
                let mut best_dist = f64::INFINITY;
                for (c, p) in prototypes.iter().enumerate() {
                    let d = mixed_distance(v, p, self.gamma);
                    if d < best_dist {
                        best_dist = d;
                        best = c;
                    }
                }
                best
            })
            .collect()
    }

    /// Move the record furthest from its own prototype into each empty cluster.
    /// Donors must keep at least one member.
    fn reseed_empty(&self, labels: &mut [usize], prototypes: &[FeatureVector]) {
        let mut sizes = vec![0usize; self.k];
        for &l in labels.iter() {
            sizes[l] += 1;
        }

        for empty in 0..self.k {
            if sizes[empty] > 0 {
                continue;
            }
            let donor = labels
                .iter()
                .enumerate()
                .filter(|(_, &l)| sizes[l] > 1)
                .map(|(i, &l)| (i, mixed_distance(&self.vectors[i], &prototypes[l], self.gamma)))
                .fold(None::<(usize, f64)>, |acc, (i, d)| match acc {
                    Some((_, best)) if best >= d => acc,
                    _ => Some((i, d)),
                });

            if let Some((i, d)) = donor {
                debug!(cluster = empty, record = i, distance = d, "Reseeding empty cluster");
                sizes[labels[i]] -= 1;
                labels[i] = empty;
                sizes[empty] += 1;
            }
        }
    }

    fn update(&self, labels: &[usize], previous: &[FeatureVector]) -> Vec<FeatureVector> {
        let dims = self.vectors.first().map(|v| v.numeric().len()).unwrap_or(0);

        (0..self.k)
            .map(|c| {
                let members: Vec<&FeatureVector> = labels
                    .iter()
                    .zip(self.vectors)
                    .filter(|(&l, _)| l == c)
                    .map(|(_, v)| v)
                    .collect();
                if members.is_empty() {
                    return previous[c].clone();
                }

                let count = members.len() as f64;
                let numeric = (0..dims)
                    .map(|j| members.iter().map(|v| v.numeric()[j]).sum::<f64>() / count)
                    .collect();

                let categorical = self
                    .cardinalities
                    .iter()
                    .enumerate()
                    .map(|(j, &cardinality)| {
                        let mut counts = vec![0usize; cardinality];
                        for v in &members {
                            counts[v.categorical()[j]] += 1;
                        }
                        // strict comparison keeps the lowest code on ties
                        let mut mode = 0;
                        for (code, &n) in counts.iter().enumerate() {
                            if n > counts[mode] {
                                mode = code;
                            }
                        }
                        mode
                    })
                    .collect();

                FeatureVector::new(numeric, categorical)
            })
            .collect()
    }

    fn total_cost(&self, labels: &[usize], prototypes: &[FeatureVector]) -> f64 {
        labels
            .iter()
            .zip(self.vectors)
            .map(|(&l, v)| mixed_distance(v, &prototypes[l], self.gamma))
            .sum()
    }
}

/// Indices of the first occurrence of each distinct feature vector
fn distinct_indices(vectors: &[FeatureVector]) -> Vec<usize> {
    let mut seen = HashSet::new();
    vectors
        .iter()
        .enumerate()
        .filter(|(_, v)| {
            let key: (Vec<u64>, Vec<usize>) = (
                v.numeric().iter().map(|x| x.to_bits()).collect(),
                v.categorical().to_vec(),
            );
            seen.insert(key)
        })
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, province: &str, wind: f64, rain: f64, casualties: f64) -> TyphoonRecord {
        TyphoonRecord {
            name: name.to_string(),
            province: province.to_string(),
            wind_speed: wind,
            rainfall: rain,
            duration: 24.0,
            casualties,
            damage_cost: 1.0e9,
            population: None,
        }
    }

    fn two_groups() -> Vec<TyphoonRecord> {
        vec![
            record("Aa", "Leyte", 200.0, 100.0, 1000.0),
            record("Ab", "Leyte", 205.0, 110.0, 1100.0),
            record("Ac", "Leyte", 198.0, 105.0, 950.0),
            record("Ba", "Manila", 80.0, 450.0, 20.0),
            record("Bb", "Manila", 85.0, 460.0, 25.0),
            record("Bc", "Manila", 90.0, 440.0, 30.0),
        ]
    }

    #[test]
    fn test_separates_obvious_groups() {
        let engine = KPrototypesEngine::new();
        let result = engine
            .cluster(&two_groups(), &KPrototypesConfig::new(2).with_seed(7))
            .unwrap();

        let a = result.cluster_assignments[0];
        let b = result.cluster_assignments[3];
        assert_ne!(a, b);
        assert!(result.cluster_assignments[..3].iter().all(|&l| l == a));
        assert!(result.cluster_assignments[3..].iter().all(|&l| l == b));
        assert!(result.converged);
        assert!(result.silhouette_score > 0.5);
        assert_eq!(result.cluster_centers[a].categorical, vec!["Leyte".to_string()]);
        assert_eq!(result.cluster_centers[b].categorical, vec!["Manila".to_string()]);
    }

    #[test]
    fn test_centers_reported_in_original_units() {
        let engine = KPrototypesEngine::new();
        let result = engine
            .cluster(&two_groups(), &KPrototypesConfig::new(2).with_seed(7))
            .unwrap();
        let a = result.cluster_assignments[0];
        let wind = result.cluster_centers[a].numeric[0];
        assert!((wind - (200.0 + 205.0 + 198.0) / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_k_zero_rejected() {
        let err = KPrototypesEngine::new()
            .cluster(&two_groups(), &KPrototypesConfig::new(0))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameter { name: "k", .. }));
    }

    #[test]
    fn test_k_above_distinct_records_rejected() {
        let mut records = two_groups();
        records.truncate(2);
        records.push(records[0].clone());
        let err = KPrototypesEngine::new()
            .cluster(&records, &KPrototypesConfig::new(3).with_seed(1))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameter { name: "k", .. }));
    }

    #[test]
    fn test_k_equal_to_records_gives_singletons() {
        let records = two_groups();
        let result = KPrototypesEngine::new()
            .cluster(&records, &KPrototypesConfig::new(records.len()).with_seed(3))
            .unwrap();
        let mut labels = result.cluster_assignments.clone();
        labels.sort_unstable();
        assert_eq!(labels, (0..records.len()).collect::<Vec<_>>());
        assert_eq!(result.silhouette_score, 0.0);
        assert!(result.total_cost.abs() < 1e-12);
    }

    #[test]
    fn test_negative_gamma_rejected() {
        let err = KPrototypesEngine::new()
            .cluster(&two_groups(), &KPrototypesConfig::new(2).with_gamma(-1.0))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameter { name: "gamma", .. }));
    }

    #[test]
    fn test_batch_above_limit_rejected_before_clustering() {
        let err = KPrototypesEngine::new()
            .cluster(&two_groups(), &KPrototypesConfig::new(2).with_max_batch(5))
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::Validation(ValidationError::BatchTooLarge { records: 6, max: 5 })
        );

        let result = KPrototypesEngine::new()
            .cluster(&two_groups(), &KPrototypesConfig::new(2).with_seed(7).with_max_batch(6))
            .unwrap();
        assert_eq!(result.cluster_assignments.len(), 6);
    }

    #[test]
    fn test_parameters_checked_without_a_batch() {
        assert!(KPrototypesConfig::new(5).validate_parameters().is_ok());
        let err = KPrototypesConfig::new(5)
            .with_gamma(f64::NAN)
            .validate_parameters()
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameter { name: "gamma", .. }));
        let err = KPrototypesConfig::new(5)
            .with_max_batch(0)
            .validate_parameters()
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameter { name: "max_batch", .. }));
    }

    #[test]
    fn test_max_iter_one_flags_not_converged() {
        let result = KPrototypesEngine::new()
            .cluster(
                &two_groups(),
                &KPrototypesConfig::new(2).with_seed(11).with_max_iter(1).with_n_init(1),
            )
            .unwrap();
        // first iteration always moves records away from the unset labels
        assert!(!result.converged);
        assert!(result
            .warnings
            .contains(&ClusterWarning::NotConverged { max_iter: 1 }));
        assert_eq!(result.cluster_assignments.len(), 6);
    }

    #[test]
    fn test_expired_deadline_returns_partial_result() {
        let result = KPrototypesEngine::new()
            .cluster(
                &two_groups(),
                &KPrototypesConfig::new(2)
                    .with_seed(5)
                    .with_timeout(Duration::ZERO),
            )
            .unwrap();
        assert!(result.partial);
        assert_eq!(result.iterations, 1);
        assert!(result
            .warnings
            .iter()
            .any(|w| matches!(w, ClusterWarning::TimedOut { .. })));
        assert!(result.cluster_assignments.iter().all(|&l| l < 2));
    }

    #[test]
    fn test_reseed_fills_empty_cluster() {
        let vectors = vec![
            FeatureVector::new(vec![0.0], vec![0]),
            FeatureVector::new(vec![0.1], vec![0]),
            FeatureVector::new(vec![5.0], vec![0]),
        ];
        let distinct = distinct_indices(&vectors);
        let ctx = RunContext {
            vectors: &vectors,
            distinct: &distinct,
            cardinalities: &[1],
            k: 2,
            gamma: 1.0,
            max_iter: 10,
            deadline: None,
        };
        let prototypes = vec![
            FeatureVector::new(vec![0.0], vec![0]),
            FeatureVector::new(vec![100.0], vec![0]),
        ];
        let mut labels = ctx.assign(&prototypes);
        assert_eq!(labels, vec![0, 0, 0]);
        ctx.reseed_empty(&mut labels, &prototypes);
        assert_eq!(labels, vec![0, 0, 1]);
    }

    #[test]
    fn test_mode_ties_pick_lowest_label() {
        let vectors = vec![
            FeatureVector::new(vec![0.0], vec![2]),
            FeatureVector::new(vec![0.0], vec![1]),
        ];
        let distinct = distinct_indices(&vectors);
        let ctx = RunContext {
            vectors: &vectors,
            distinct: &distinct,
            cardinalities: &[3],
            k: 1,
            gamma: 1.0,
            max_iter: 10,
            deadline: None,
        };
        let previous = vec![vectors[0].clone()];
        let updated = ctx.update(&[0, 0], &previous);
        assert_eq!(updated[0].categorical(), &[1]);
    }

    #[test]
    fn test_distinct_indices_skip_duplicates() {
        let vectors = vec![
            FeatureVector::new(vec![1.0], vec![0]),
            FeatureVector::new(vec![1.0], vec![0]),
            FeatureVector::new(vec![1.0], vec![1]),
        ];
        assert_eq!(distinct_indices(&vectors), vec![0, 2]);
    }
}
