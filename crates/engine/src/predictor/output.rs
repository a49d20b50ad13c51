//! Prediction output formatting and risk classification
//!
//! Converts ensemble outputs into a [`PredictionResult`]: point estimates
//! in original units, a composite severity score, the risk level derived
//! from configurable thresholds, and an ensemble-agreement confidence.

use super::model::EnsembleOutput;
use crate::error::{EngineError, Result};
use crate::models::{PredictionResult, RiskLevel};
use serde::{Deserialize, Serialize};

/// Default weight of normalized casualties in the severity score
pub const DEFAULT_CASUALTY_WEIGHT: f64 = 0.6;

/// Default weight of normalized damage in the severity score
pub const DEFAULT_DAMAGE_WEIGHT: f64 = 0.4;

/// Casualty count at which the casualty component saturates
pub const DEFAULT_CASUALTY_REFERENCE: f64 = 100.0;

/// Damage cost at which the damage component saturates
pub const DEFAULT_DAMAGE_REFERENCE: f64 = 1.0e10;

pub const DEFAULT_MEDIUM_THRESHOLD: f64 = 0.25;
pub const DEFAULT_HIGH_THRESHOLD: f64 = 0.55;

/// Severity scoring and risk thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub casualty_weight: f64,
    pub damage_weight: f64,
    pub casualty_reference: f64,
    pub damage_reference: f64,
    /// Severity at or above this is at least Medium
    pub medium_threshold: f64,
    /// Severity at or above this is High
    pub high_threshold: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            casualty_weight: DEFAULT_CASUALTY_WEIGHT,
            damage_weight: DEFAULT_DAMAGE_WEIGHT,
            casualty_reference: DEFAULT_CASUALTY_REFERENCE,
            damage_reference: DEFAULT_DAMAGE_REFERENCE,
            medium_threshold: DEFAULT_MEDIUM_THRESHOLD,
            high_threshold: DEFAULT_HIGH_THRESHOLD,
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<()> {
        let finite_non_negative = |v: f64| v.is_finite() && v >= 0.0;
        if !finite_non_negative(self.casualty_weight) || !finite_non_negative(self.damage_weight) {
            return Err(EngineError::invalid_parameter("risk", "weights must be non-negative"));
        }
        if self.casualty_weight + self.damage_weight <= 0.0 {
            return Err(EngineError::invalid_parameter("risk", "weights must not both be zero"));
        }
        if !(self.casualty_reference > 0.0 && self.damage_reference > 0.0) {
            return Err(EngineError::invalid_parameter("risk", "references must be positive"));
        }
        if !(0.0..=1.0).contains(&self.medium_threshold)
            || !(0.0..=1.0).contains(&self.high_threshold)
            || self.medium_threshold > self.high_threshold
        {
            return Err(EngineError::invalid_parameter(
                "risk",
                "thresholds must satisfy 0 <= medium <= high <= 1",
            ));
        }
        Ok(())
    }
}

/// Formats ensemble outputs into a PredictionResult
#[derive(Debug, Clone)]
pub struct OutputFormatter {
    config: RiskConfig,
}

impl OutputFormatter {
    pub fn new() -> Self {
        Self {
            config: RiskConfig::default(),
        }
    }

    pub fn with_config(config: RiskConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn format(
        &self,
        casualties: EnsembleOutput,
        damage: EnsembleOutput,
        spread_ceiling: f64,
        model_version: &str,
    ) -> PredictionResult {
        let predicted_casualties = casualties.value().round();
        let predicted_damage_cost = damage.value();
        let severity = self.severity_score(predicted_casualties, predicted_damage_cost);
        let risk_level = self.risk_level(severity);

        PredictionResult {
            predicted_casualties: predicted_casualties as u64,
            predicted_damage_cost,
            risk_level,
            confidence: confidence(casualties.spread, damage.spread, spread_ceiling),
            severity_score: severity,
            recommendations: recommendations(risk_level),
            model_version: model_version.to_string(),
        }
    }

    /// Weighted mean of the saturated casualty and damage components, in [0, 1]
    pub fn severity_score(&self, casualties: f64, damage_cost: f64) -> f64 {
        let c = (casualties / self.config.casualty_reference).clamp(0.0, 1.0);
        let d = (damage_cost / self.config.damage_reference).clamp(0.0, 1.0);
        let total_weight = self.config.casualty_weight + self.config.damage_weight;
        ((self.config.casualty_weight * c + self.config.damage_weight * d) / total_weight)
            .clamp(0.0, 1.0)
    }

    pub fn risk_level(&self, severity: f64) -> RiskLevel {
        if severity >= self.config.high_threshold {
            RiskLevel::High
        } else if severity >= self.config.medium_threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

impl Default for OutputFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// One minus the mean log-space member spread relative to the model's ceiling
pub fn confidence(casualty_spread: f64, damage_spread: f64, spread_ceiling: f64) -> f64 {
    let spread = (casualty_spread + damage_spread) / 2.0;
    (1.0 - spread / spread_ceiling).clamp(0.0, 1.0)
}

/// Preparedness actions for a risk level
pub fn recommendations(level: RiskLevel) -> Vec<String> {
    let actions: &[&str] = match level {
        RiskLevel::High => &[
            "Immediate evacuation of high-risk areas",
            "Deploy emergency response teams",
            "Alert medical facilities and prepare mass casualty response",
            "Coordinate with national emergency services",
        ],
        RiskLevel::Medium => &[
            "Issue evacuation warnings for vulnerable areas",
            "Prepare emergency shelters and supplies",
            "Monitor weather conditions closely",
        ],
        RiskLevel::Low => &[
            "Continue monitoring weather conditions",
            "Ensure emergency preparedness",
        ],
    };
    actions.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(value: f64, spread: f64) -> EnsembleOutput {
        EnsembleOutput {
            mean: value.ln_1p(),
            spread,
        }
    }

    #[test]
    fn test_severity_saturates() {
        let formatter = OutputFormatter::new();
        assert_eq!(formatter.severity_score(0.0, 0.0), 0.0);
        assert!((formatter.severity_score(1e6, 1e15) - 1.0).abs() < 1e-12);
        assert!((formatter.severity_score(50.0, 0.0) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_risk_thresholds() {
        let formatter = OutputFormatter::new();
        assert_eq!(formatter.risk_level(0.0), RiskLevel::Low);
        assert_eq!(formatter.risk_level(0.25), RiskLevel::Medium);
        assert_eq!(formatter.risk_level(0.54), RiskLevel::Medium);
        assert_eq!(formatter.risk_level(0.55), RiskLevel::High);
    }

    #[test]
    fn test_custom_thresholds_applied() {
        let config = RiskConfig {
            medium_threshold: 0.1,
            high_threshold: 0.2,
            ..RiskConfig::default()
        };
        let formatter = OutputFormatter::with_config(config).unwrap();
        assert_eq!(formatter.risk_level(0.15), RiskLevel::Medium);
        assert_eq!(formatter.risk_level(0.2), RiskLevel::High);
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let config = RiskConfig {
            medium_threshold: 0.8,
            high_threshold: 0.2,
            ..RiskConfig::default()
        };
        assert!(OutputFormatter::with_config(config).is_err());

        let config = RiskConfig {
            casualty_reference: 0.0,
            ..RiskConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_confidence_clamped() {
        assert_eq!(confidence(0.0, 0.0, 1.5), 1.0);
        assert_eq!(confidence(3.0, 3.0, 1.5), 0.0);
        assert!((confidence(0.3, 0.3, 1.5) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_format_produces_consistent_result() {
        let formatter = OutputFormatter::new();
        let result = formatter.format(output(75.0, 0.3), output(4.5e9, 0.3), 1.5, "v1");

        assert_eq!(result.predicted_casualties, 75);
        assert!((result.predicted_damage_cost - 4.5e9).abs() < 1.0);
        // 0.6 * 0.75 + 0.4 * 0.45
        assert!((result.severity_score - 0.63).abs() < 1e-6);
        assert_eq!(result.risk_level, RiskLevel::High);
        assert!(!result.recommendations.is_empty());
        assert_eq!(result.model_version, "v1");
    }

    #[test]
    fn test_negative_log_output_floors_at_zero() {
        let formatter = OutputFormatter::new();
        let below_zero = EnsembleOutput {
            mean: -0.5,
            spread: 0.0,
        };
        let result = formatter.format(below_zero, below_zero, 1.0, "v1");
        assert_eq!(result.predicted_casualties, 0);
        assert_eq!(result.predicted_damage_cost, 0.0);
        assert_eq!(result.risk_level, RiskLevel::Low);
    }
}
