//! Core data models for the typhoon engine

use serde::{Deserialize, Serialize};
use std::fmt;

/// One historical or hypothetical typhoon event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TyphoonRecord {
    pub name: String,
    pub province: String,
    /// Maximum sustained wind in km/h
    pub wind_speed: f64,
    /// Rainfall in mm over the reference window
    pub rainfall: f64,
    /// Duration in hours
    pub duration: f64,
    /// Whole-number count, carried as f64 so it validates like the other numerics
    pub casualties: f64,
    pub damage_cost: f64,
    /// Only consumed by the predictor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<u64>,
}

/// Parameters for a single impact prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TyphoonParams {
    pub name: String,
    pub province: String,
    pub wind_speed: f64,
    pub rainfall: f64,
    pub duration: f64,
    #[serde(default)]
    pub population: Option<u64>,
}

/// Discrete severity category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Impact estimate for one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predicted_casualties: u64,
    pub predicted_damage_cost: f64,
    pub risk_level: RiskLevel,
    /// Ensemble agreement in [0, 1]
    pub confidence: f64,
    pub severity_score: f64,
    pub recommendations: Vec<String>,
    pub model_version: String,
}

/// Representative point of a cluster, in original units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    /// Component-wise mean of the members' numeric features
    pub numeric: Vec<f64>,
    /// Per-attribute mode of the members' categorical features
    pub categorical: Vec<String>,
}

/// Non-fatal conditions attached to a clustering result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClusterWarning {
    /// The selected run hit `max_iter` while memberships were still changing
    NotConverged { max_iter: usize },
    /// The caller's deadline expired; the result is the best found so far
    TimedOut { completed_runs: usize },
}

/// Output of one clustering call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterResult {
    /// One label per input record, in input order
    pub cluster_assignments: Vec<usize>,
    /// Indexed by cluster label
    pub cluster_centers: Vec<Centroid>,
    pub silhouette_score: f64,
    /// Total within-cluster distance of the selected run
    pub total_cost: f64,
    pub gamma: f64,
    pub iterations: usize,
    pub converged: bool,
    pub partial: bool,
    pub warnings: Vec<ClusterWarning>,
}

impl ClusterResult {
    /// Number of members per cluster label
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.cluster_centers.len()];
        for &label in &self.cluster_assignments {
            if let Some(slot) = sizes.get_mut(label) {
                *slot += 1;
            }
        }
        sizes
    }
}
