//! Fitted impact model
//!
//! A bagged ensemble of regression trees per target, trained offline and
//! shipped as JSON. Trees predict `log1p(target)`. The document is
//! validated once at load time; a model that fails validation is
//! reported as unavailable and never served.

use super::features::FEATURE_NAMES;
use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Only transform the ensembles are trained with
pub const TARGET_TRANSFORM: &str = "log1p";

/// Largest accepted leaf value in log space. `expm1(40)` is about 2.4e17,
/// finite as `f64` and representable as a `u64` casualty count.
pub const MAX_LOG_OUTPUT: f64 = 40.0;

/// One node of a flattened regression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    /// Go left when `x[feature] < threshold`
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// Regression tree stored as a node list rooted at index 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<TreeNode>,
}

impl Tree {
    pub fn evaluate(&self, features: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if features[*feature] < *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Children must point strictly forward, which rules out cycles.
    fn validate(&self, n_features: usize) -> std::result::Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Leaf { value } if !value.is_finite() => {
                    return Err(format!("node {idx}: leaf value is not finite"));
                }
                TreeNode::Leaf { value } if value.abs() > MAX_LOG_OUTPUT => {
                    return Err(format!(
                        "node {idx}: leaf value {value} outside [-{MAX_LOG_OUTPUT}, {MAX_LOG_OUTPUT}]"
                    ));
                }
                TreeNode::Leaf { .. } => {}
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(format!("node {idx}: feature index {feature} out of range"));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {idx}: threshold is not finite"));
                    }
                    for child in [*left, *right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(format!("node {idx}: child {child} is not a forward index"));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Mean and spread of an ensemble's member outputs (log space)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnsembleOutput {
    pub mean: f64,
    /// Population standard deviation of member outputs
    pub spread: f64,
}

impl EnsembleOutput {
    /// Back to original units, floored at zero
    pub fn value(&self) -> f64 {
        self.mean.min(MAX_LOG_OUTPUT).exp_m1().max(0.0)
    }
}

fn evaluate_ensemble(trees: &[Tree], features: &[f64]) -> EnsembleOutput {
    let outputs: Vec<f64> = trees.iter().map(|t| t.evaluate(features)).collect();
    let n = outputs.len().max(1) as f64;
    let mean = outputs.iter().sum::<f64>() / n;
    let spread = (outputs.iter().map(|o| (o - mean).powi(2)).sum::<f64>() / n).sqrt();
    EnsembleOutput { mean, spread }
}

/// Process-wide, read-only fitted predictor parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactModel {
    version: String,
    trained_at: DateTime<Utc>,
    family: String,
    target_transform: String,
    feature_names: Vec<String>,
    /// Substituted when a request carries no population
    reference_population: u64,
    spread_ceiling: f64,
    /// Recognised provinces and their exposure index
    provinces: BTreeMap<String, f64>,
    casualties: Vec<Tree>,
    damage_cost: Vec<Tree>,
}

impl ImpactModel {
    /// Read, checksum and validate a model file
    pub fn load(path: impl AsRef<Path>, expected_sha256: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            EngineError::model_unavailable(format!("failed to read {}: {e}", path.display()))
        })?;

        if let Some(expected) = expected_sha256 {
            verify_checksum(&bytes, expected)?;
            debug!(path = %path.display(), "Model checksum verified");
        }

        let model = Self::from_json(&bytes)?;
        info!(
            path = %path.display(),
            version = %model.version,
            provinces = model.provinces.len(),
            "Loaded impact model"
        );
        Ok(model)
    }

    /// Parse and validate a model document
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let model: ImpactModel = serde_json::from_slice(bytes)
            .map_err(|e| EngineError::model_unavailable(format!("failed to parse model: {e}")))?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        if self.target_transform != TARGET_TRANSFORM {
            return Err(EngineError::model_unavailable(format!(
                "unsupported target transform '{}'",
                self.target_transform
            )));
        }
        if self.feature_names.iter().map(String::as_str).ne(FEATURE_NAMES.iter().copied()) {
            return Err(EngineError::model_unavailable(format!(
                "feature schema mismatch: expected {:?}, found {:?}",
                FEATURE_NAMES, self.feature_names
            )));
        }
        if !(self.spread_ceiling.is_finite() && self.spread_ceiling > 0.0) {
            return Err(EngineError::model_unavailable("spread_ceiling must be positive"));
        }
        if self.reference_population == 0 {
            return Err(EngineError::model_unavailable("reference_population must be positive"));
        }
        if self.provinces.is_empty() {
            return Err(EngineError::model_unavailable("model has no provinces"));
        }
        if let Some((name, _)) = self.provinces.iter().find(|(_, e)| !e.is_finite()) {
            return Err(EngineError::model_unavailable(format!(
                "province '{name}' has a non-finite exposure"
            )));
        }

        for (target, trees) in [("casualties", &self.casualties), ("damage_cost", &self.damage_cost)] {
            if trees.is_empty() {
                return Err(EngineError::model_unavailable(format!("{target} ensemble is empty")));
            }
            for (i, tree) in trees.iter().enumerate() {
                tree.validate(FEATURE_NAMES.len()).map_err(|e| {
                    EngineError::model_unavailable(format!("{target} tree {i}: {e}"))
                })?;
            }
        }
        Ok(())
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    pub fn feature_count(&self) -> usize {
        self.feature_names.len()
    }

    /// Number of predicted targets
    pub fn target_count(&self) -> usize {
        2
    }

    pub fn reference_population(&self) -> u64 {
        self.reference_population
    }

    pub fn spread_ceiling(&self) -> f64 {
        self.spread_ceiling
    }

    pub fn provinces(&self) -> impl Iterator<Item = &str> {
        self.provinces.keys().map(String::as_str)
    }

    /// Exposure index of a recognised province, matched ignoring ASCII case
    pub fn province_exposure(&self, province: &str) -> Option<f64> {
        let wanted = province.trim();
        self.provinces
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
            .map(|(_, &exposure)| exposure)
    }

    pub fn predict_casualties(&self, features: &[f64]) -> EnsembleOutput {
        evaluate_ensemble(&self.casualties, features)
    }

    pub fn predict_damage(&self, features: &[f64]) -> EnsembleOutput {
        evaluate_ensemble(&self.damage_cost, features)
    }
}

fn verify_checksum(bytes: &[u8], expected: &str) -> Result<()> {
    let actual = hex::encode(Sha256::digest(bytes));
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(EngineError::model_unavailable(format!(
            "checksum mismatch: expected {expected}, computed {actual}"
        )))
    }
}
