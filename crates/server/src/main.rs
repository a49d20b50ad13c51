//! Typhoon server - clustering and impact prediction over HTTP
//!
//! Loads the fitted impact model once at startup and refuses to serve
//! if it is missing or invalid.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use typhoon_engine::{
    predictor::{ImpactModel, ImpactPredictor, OutputFormatter},
    service::{ClusterService, PredictionService},
    EngineMetrics, HealthRegistry, StructuredLogger,
};
use typhoon_server::{api, AppState, CorsPolicy, ServerConfig};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting typhoon-server");

    let config = ServerConfig::load()?;
    info!(
        instance = %config.instance_name,
        model_path = %config.model_path.display(),
        k = config.clustering.k,
        "Server configured"
    );

    let health_registry = HealthRegistry::new();

    let metrics = EngineMetrics::new();
    let logger = StructuredLogger::new(&config.instance_name);

    let model = match ImpactModel::load(&config.model_path, config.model_sha256.as_deref()) {
        Ok(model) => model,
        Err(e) => {
            error!(error = %e, path = %config.model_path.display(), "Impact model unavailable");
            return Err(e).context("refusing to start without a valid impact model");
        }
    };
    let model_version = model.version().to_string();
    logger.log_model_loaded(&model_version, model.provinces().count());
    metrics.set_model_version(&model_version);

    let formatter =
        OutputFormatter::with_config(config.risk.clone()).context("invalid risk configuration")?;
    let predictor = Arc::new(ImpactPredictor::new(Arc::new(model), formatter));
    let prediction = PredictionService::new(predictor, metrics.clone(), logger.clone());
    let cluster = ClusterService::new(config.clustering.clone(), metrics.clone(), logger.clone())
        .context("invalid clustering configuration")?;

    let state = Arc::new(AppState::new(cluster, prediction, health_registry.clone()));
    let router = api::create_router(state, CorsPolicy::new(&config.cors_allowed_origins));

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    health_registry.mark_ready(&model_version).await;
    logger.log_startup(SERVER_VERSION, &model_version);

    let shutdown_logger = logger.clone();
    api::serve(listener, router, async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
        shutdown_logger.log_shutdown("SIGINT received");
    })
    .await?;

    info!("Shutting down");
    Ok(())
}
