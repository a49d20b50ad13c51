//! HTTP layer of the typhoon impact service

pub mod api;
pub mod config;

pub use api::{create_router, serve, ApiError, AppState, CorsPolicy};
pub use config::ServerConfig;
