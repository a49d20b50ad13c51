//! Typhoon impact analysis engine
//!
//! This crate provides the core functionality for:
//! - Feature normalization of raw typhoon records
//! - K-Prototypes clustering over mixed numeric/categorical features
//! - Impact prediction from a fitted ensemble model
//! - Request-level services for the HTTP layer
//! - Health checks and observability

pub mod clustering;
pub mod error;
pub mod health;
pub mod models;
pub mod normalizer;
pub mod observability;
pub mod predictor;
pub mod service;

pub use error::{EngineError, ErrorKind, Result, ValidationError};
pub use health::{
    ClusteringOutcome, ClusteringStatus, HealthRegistry, HealthResponse, ReadinessResponse,
    ServiceStatus,
};
pub use models::*;
pub use observability::{EngineMetrics, StructuredLogger};
