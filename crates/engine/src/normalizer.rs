//! Feature normalization for clustering
//!
//! Converts a batch of raw typhoon records into standardized numeric
//! sub-vectors plus categorical label codes. The batch scaler is kept so
//! centroids can be projected back to original units for display.

use crate::error::ValidationError;
use crate::models::TyphoonRecord;
use std::collections::BTreeSet;

/// Numeric attributes, in feature-vector order
pub const NUMERIC_FEATURES: [&str; 6] = [
    "wind_speed",
    "rainfall",
    "duration",
    "casualties",
    "damage_cost",
    "name_length",
];

/// Categorical attributes, in feature-vector order
pub const CATEGORICAL_FEATURES: [&str; 1] = ["province"];

/// Scaled numeric part plus categorical label codes for one record
///
/// Label codes index into the batch's [`CategoryVocabulary`] for the same
/// attribute, so equality of codes is equality of labels.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    numeric: Vec<f64>,
    categorical: Vec<usize>,
}

impl FeatureVector {
    pub fn new(numeric: Vec<f64>, categorical: Vec<usize>) -> Self {
        Self {
            numeric,
            categorical,
        }
    }

    pub fn numeric(&self) -> &[f64] {
        &self.numeric
    }

    pub fn categorical(&self) -> &[usize] {
        &self.categorical
    }
}

/// Per-column mean and standard deviation of a batch
#[derive(Debug, Clone, PartialEq)]
pub struct NumericScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl NumericScaler {
    /// Fit on raw rows. Constant columns get a unit scale so they map to zero.
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let dims = rows.first().map(|r| r.len()).unwrap_or(0);
        let n = rows.len().max(1) as f64;

        let means: Vec<f64> = (0..dims)
            .map(|j| rows.iter().map(|r| r[j]).sum::<f64>() / n)
            .collect();
        let stds = (0..dims)
            .map(|j| {
                let var = rows.iter().map(|r| (r[j] - means[j]).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                if std > f64::EPSILON {
                    std
                } else {
                    1.0
                }
            })
            .collect();

        Self { means, stds }
    }

    pub fn transform(&self, raw: &[f64]) -> Vec<f64> {
        raw.iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(x, (mean, std))| (x - mean) / std)
            .collect()
    }

    /// Project a scaled vector back to original units
    pub fn inverse_transform(&self, scaled: &[f64]) -> Vec<f64> {
        scaled
            .iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(z, (mean, std))| z * std + mean)
            .collect()
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn stds(&self) -> &[f64] {
        &self.stds
    }
}

/// Fixed ordering of the labels observed for one categorical attribute
///
/// Labels are sorted, so the lowest code is the lexicographically lowest
/// label. Mode ties are broken on this order.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryVocabulary {
    labels: Vec<String>,
}

impl CategoryVocabulary {
    pub fn from_labels<'a>(labels: impl IntoIterator<Item = &'a str>) -> Self {
        let set: BTreeSet<&str> = labels.into_iter().collect();
        Self {
            labels: set.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn code(&self, label: &str) -> Option<usize> {
        self.labels
            .binary_search_by(|probe| probe.as_str().cmp(label))
            .ok()
    }

    pub fn label(&self, code: usize) -> Option<&str> {
        self.labels.get(code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Normalized view of a validated batch
#[derive(Debug, Clone)]
pub struct NormalizedBatch {
    pub vectors: Vec<FeatureVector>,
    pub scaler: NumericScaler,
    pub vocabularies: Vec<CategoryVocabulary>,
}

impl NormalizedBatch {
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Mean per-column variance of the scaled numeric features
    ///
    /// Non-constant columns contribute 1.0 after standardization, constant
    /// columns contribute 0.0.
    pub fn mean_numeric_variance(&self) -> f64 {
        let dims = NUMERIC_FEATURES.len();
        let n = self.vectors.len();
        if n == 0 {
            return 0.0;
        }
        let total: f64 = (0..dims)
            .map(|j| {
                let mean = self.vectors.iter().map(|v| v.numeric[j]).sum::<f64>() / n as f64;
                self.vectors
                    .iter()
                    .map(|v| (v.numeric[j] - mean).powi(2))
                    .sum::<f64>()
                    / n as f64
            })
            .sum();
        total / dims as f64
    }

    /// Resolve categorical codes back to labels
    pub fn labels_for(&self, codes: &[usize]) -> Vec<String> {
        codes
            .iter()
            .zip(&self.vocabularies)
            .map(|(&code, vocab)| vocab.label(code).unwrap_or_default().to_string())
            .collect()
    }
}

/// Converts raw records into clustering features
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureNormalizer;

impl FeatureNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Validate and normalize a whole batch. Any invalid record rejects the batch.
    pub fn normalize(&self, records: &[TyphoonRecord]) -> Result<NormalizedBatch, ValidationError> {
        if records.is_empty() {
            return Err(ValidationError::EmptyBatch);
        }
        for (idx, record) in records.iter().enumerate() {
            validate_record(idx, record)?;
        }

        let raw: Vec<Vec<f64>> = records.iter().map(raw_numeric).collect();
        let scaler = NumericScaler::fit(&raw);

        let vocabularies: Vec<CategoryVocabulary> = (0..CATEGORICAL_FEATURES.len())
            .map(|j| CategoryVocabulary::from_labels(records.iter().map(|r| raw_categorical(r)[j])))
            .collect();

        let vectors = records
            .iter()
            .zip(&raw)
            .map(|(record, numeric)| {
                let categorical = raw_categorical(record)
                    .iter()
                    .zip(&vocabularies)
                    .map(|(label, vocab)| vocab.code(label).unwrap_or(0))
                    .collect();
                FeatureVector::new(scaler.transform(numeric), categorical)
            })
            .collect();

        Ok(NormalizedBatch {
            vectors,
            scaler,
            vocabularies,
        })
    }
}

/// Check the record invariants: non-empty labels, finite non-negative numerics
pub fn validate_record(idx: usize, record: &TyphoonRecord) -> Result<(), ValidationError> {
    if record.name.trim().is_empty() {
        return Err(ValidationError::EmptyCategory {
            record: idx,
            field: "name",
        });
    }
    if record.province.trim().is_empty() {
        return Err(ValidationError::EmptyCategory {
            record: idx,
            field: "province",
        });
    }

    let numerics = [
        ("wind_speed", record.wind_speed),
        ("rainfall", record.rainfall),
        ("duration", record.duration),
        ("casualties", record.casualties),
        ("damage_cost", record.damage_cost),
    ];
    for (field, value) in numerics {
        check_non_negative(idx, field, value)?;
    }
    Ok(())
}

pub(crate) fn check_non_negative(
    idx: usize,
    field: &'static str,
    value: f64,
) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFinite { record: idx, field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue {
            record: idx,
            field,
            value,
        });
    }
    Ok(())
}

fn raw_numeric(record: &TyphoonRecord) -> Vec<f64> {
    vec![
        record.wind_speed,
        record.rainfall,
        record.duration,
        record.casualties,
        record.damage_cost,
        record.name.chars().count() as f64,
    ]
}

fn raw_categorical(record: &TyphoonRecord) -> [&str; 1] {
    [record.province.as_str()]
}
