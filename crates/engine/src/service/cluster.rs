//! Request-level clustering service behind `POST /api/cluster`

use crate::clustering::{
    KPrototypesConfig, KPrototypesEngine, DEFAULT_MAX_BATCH, DEFAULT_MAX_ITER, DEFAULT_N_INIT,
};
use crate::error::Result;
use crate::models::{Centroid, ClusterResult, ClusterWarning, TyphoonRecord};
use crate::observability::{EngineMetrics, StructuredLogger};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Province label used for records submitted without one
pub const UNSPECIFIED_PROVINCE: &str = "unspecified";

/// Default number of clusters; the frontend names five categories
pub const DEFAULT_K: usize = 5;

/// Default base seed for the restarts
pub const DEFAULT_SEED: u64 = 42;

/// Clustering defaults applied when a request does not override them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    pub k: usize,
    pub gamma: Option<f64>,
    pub max_iter: usize,
    pub n_init: usize,
    pub seed: Option<u64>,
    pub timeout_ms: Option<u64>,
    /// Largest batch one request may submit
    pub max_batch: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            gamma: None,
            max_iter: DEFAULT_MAX_ITER,
            n_init: DEFAULT_N_INIT,
            seed: Some(DEFAULT_SEED),
            timeout_ms: None,
            max_batch: DEFAULT_MAX_BATCH,
        }
    }
}

impl ClusteringConfig {
    pub fn validate(&self) -> Result<()> {
        self.engine_config(None, None, None).validate_parameters()
    }

    fn engine_config(&self, k: Option<usize>, gamma: Option<f64>, seed: Option<u64>) -> KPrototypesConfig {
        let mut config = KPrototypesConfig::new(k.unwrap_or(self.k))
            .with_max_iter(self.max_iter)
            .with_n_init(self.n_init)
            .with_max_batch(self.max_batch);
        if let Some(gamma) = gamma.or(self.gamma) {
            config = config.with_gamma(gamma);
        }
        if let Some(seed) = seed.or(self.seed) {
            config = config.with_seed(seed);
        }
        if let Some(ms) = self.timeout_ms {
            config = config.with_timeout(Duration::from_millis(ms));
        }
        config
    }
}

/// One record as the frontend submits it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRecordInput {
    pub name: String,
    pub wind_speed: f64,
    pub rainfall: f64,
    pub duration: f64,
    pub casualties: f64,
    pub damage_cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
}

impl ClusterRecordInput {
    fn into_record(self) -> TyphoonRecord {
        TyphoonRecord {
            name: self.name,
            province: self
                .province
                .unwrap_or_else(|| UNSPECIFIED_PROVINCE.to_string()),
            wind_speed: self.wind_speed,
            rainfall: self.rainfall,
            duration: self.duration,
            casualties: self.casualties,
            damage_cost: self.damage_cost,
            population: None,
        }
    }
}

/// Body of `POST /api/cluster`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRequest {
    pub typhoon_data: Vec<ClusterRecordInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gamma: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// Cluster centre in original units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterCenter {
    pub wind_speed: f64,
    pub rainfall: f64,
    pub duration: f64,
    pub casualties: f64,
    pub damage_cost: f64,
    pub name_length: f64,
    pub province: String,
}

impl From<&Centroid> for ClusterCenter {
    fn from(c: &Centroid) -> Self {
        let n = |i: usize| c.numeric.get(i).copied().unwrap_or(0.0);
        Self {
            wind_speed: n(0),
            rainfall: n(1),
            duration: n(2),
            casualties: n(3),
            damage_cost: n(4),
            name_length: n(5),
            province: c.categorical.first().cloned().unwrap_or_default(),
        }
    }
}

/// Body returned by `POST /api/cluster`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterResponse {
    pub cluster_assignments: Vec<usize>,
    pub cluster_centers: Vec<ClusterCenter>,
    pub silhouette_score: f64,
    pub converged: bool,
    pub partial: bool,
    pub iterations: usize,
    pub gamma: f64,
    pub warnings: Vec<ClusterWarning>,
}

impl From<ClusterResult> for ClusterResponse {
    fn from(result: ClusterResult) -> Self {
        Self {
            cluster_centers: result.cluster_centers.iter().map(ClusterCenter::from).collect(),
            cluster_assignments: result.cluster_assignments,
            silhouette_score: result.silhouette_score,
            converged: result.converged,
            partial: result.partial,
            iterations: result.iterations,
            gamma: result.gamma,
            warnings: result.warnings,
        }
    }
}

/// Stateless clustering front-end: applies defaults, runs the engine,
/// records metrics and logs the outcome.
#[derive(Clone)]
pub struct ClusterService {
    defaults: ClusteringConfig,
    engine: KPrototypesEngine,
    metrics: EngineMetrics,
    logger: StructuredLogger,
}

impl ClusterService {
    pub fn new(
        defaults: ClusteringConfig,
        metrics: EngineMetrics,
        logger: StructuredLogger,
    ) -> Result<Self> {
        defaults.validate()?;
        Ok(Self {
            defaults,
            engine: KPrototypesEngine::new(),
            metrics,
            logger,
        })
    }

    pub fn defaults(&self) -> &ClusteringConfig {
        &self.defaults
    }

    pub fn cluster(&self, request: ClusterRequest) -> Result<ClusterResponse> {
        let start = Instant::now();
        let config = self
            .defaults
            .engine_config(request.k, request.gamma, request.seed);
        let records: Vec<TyphoonRecord> = request
            .typhoon_data
            .into_iter()
            .map(ClusterRecordInput::into_record)
            .collect();

        let result = match self.engine.cluster(&records, &config) {
            Ok(result) => result,
            Err(e) => {
                self.metrics.inc_rejected_requests();
                self.logger
                    .log_rejection("cluster", e.kind().code(), &e.to_string());
                return Err(e);
            }
        };

        let elapsed = start.elapsed();
        self.metrics.observe_cluster_latency(elapsed.as_secs_f64());
        if result
            .warnings
            .iter()
            .any(|w| matches!(w, ClusterWarning::NotConverged { .. }))
        {
            self.metrics.inc_convergence_warnings();
        }
        if result.partial {
            self.metrics.inc_partial_results();
        }
        self.logger.log_cluster(
            records.len(),
            config.k,
            result.gamma,
            result.silhouette_score,
            result.iterations,
            result.converged,
            result.partial,
            elapsed.as_millis(),
        );

        Ok(result.into())
    }
}

/// The eight historical typhoons the frontend ships as its default batch.
/// The CLI carries a copy, checked against this one in its tests.
pub fn reference_typhoons() -> Vec<ClusterRecordInput> {
    let rows: [(&str, f64, f64, f64, f64, f64); 8] = [
        ("Yolanda", 195.0, 400.0, 48.0, 6300.0, 5.9e9),
        ("Ondoy", 95.0, 455.0, 24.0, 464.0, 1.1e10),
        ("Pablo", 175.0, 200.0, 36.0, 1900.0, 6.8e9),
        ("Lando", 190.0, 300.0, 72.0, 58.0, 1.5e10),
        ("Nina", 150.0, 250.0, 48.0, 12.0, 2.3e9),
        ("Ompong", 170.0, 350.0, 60.0, 81.0, 3.3e10),
        ("Ulysses", 130.0, 200.0, 36.0, 73.0, 1.8e10),
        ("Rolly", 165.0, 180.0, 24.0, 25.0, 2.0e9),
    ];
    rows.iter()
        .map(|&(name, wind_speed, rainfall, duration, casualties, damage_cost)| {
            ClusterRecordInput {
                name: name.to_string(),
                wind_speed,
                rainfall,
                duration,
                casualties,
                damage_cost,
                province: None,
            }
        })
        .collect()
}
