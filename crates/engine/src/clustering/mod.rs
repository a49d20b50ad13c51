//! Mixed-type clustering

mod distance;
mod kprototypes;
mod silhouette;

pub use distance::{default_gamma, mixed_distance};
pub use kprototypes::{
    KPrototypesConfig, KPrototypesEngine, DEFAULT_MAX_BATCH, DEFAULT_MAX_ITER, DEFAULT_N_INIT,
};
pub use silhouette::{silhouette_samples, silhouette_score};
