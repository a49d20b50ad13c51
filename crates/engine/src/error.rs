//! Error taxonomy for the engine
//!
//! Every rejected request maps to exactly one [`ErrorKind`], which the
//! transport layer translates into a status code.

use thiserror::Error;

/// Result alias used across the engine.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Coarse classification of engine failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or out-of-domain input.
    Validation,
    /// Bad algorithm parameter (`k`, `gamma`, ...).
    InvalidParameter,
    /// The fitted predictor could not be loaded.
    ModelUnavailable,
}

impl ErrorKind {
    /// Stable machine-readable code for error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::InvalidParameter => "invalid_parameter",
            ErrorKind::ModelUnavailable => "model_unavailable",
        }
    }
}

/// Input that falls outside the domain the engine accepts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("batch contains no records")]
    EmptyBatch,

    #[error("batch of {records} records exceeds the limit of {max}")]
    BatchTooLarge { records: usize, max: usize },

    #[error("record {record}: field '{field}' is negative ({value})")]
    NegativeValue {
        record: usize,
        field: &'static str,
        value: f64,
    },

    #[error("record {record}: field '{field}' is not a finite number")]
    NonFinite { record: usize, field: &'static str },

    #[error("record {record}: categorical field '{field}' is empty")]
    EmptyCategory { record: usize, field: &'static str },

    #[error("province '{province}' is not in the fitted model's category set")]
    UnknownProvince { province: String },

    #[error("population must be greater than zero, got {value}")]
    NonPositivePopulation { value: u64 },
}

/// Errors returned by the engine's public operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter { name: &'static str, message: String },

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),
}

impl EngineError {
    pub fn invalid_parameter(name: &'static str, message: impl Into<String>) -> Self {
        EngineError::InvalidParameter {
            name,
            message: message.into(),
        }
    }

    pub fn model_unavailable(message: impl Into<String>) -> Self {
        EngineError::ModelUnavailable(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            EngineError::ModelUnavailable(_) => ErrorKind::ModelUnavailable,
        }
    }
}
