//! Request-scoped services and their wire types
//!
//! The HTTP layer only deserializes a request, hands it to one of these
//! services and serializes the response.

mod cluster;
mod prediction;

pub use cluster::{
    reference_typhoons, ClusterCenter, ClusterRecordInput, ClusterRequest, ClusterResponse,
    ClusterService, ClusteringConfig, DEFAULT_K, DEFAULT_SEED, UNSPECIFIED_PROVINCE,
};
pub use prediction::{ModelStatus, PredictRequest, PredictResponse, PredictionService};
