//! Observability infrastructure for the typhoon engine
//!
//! Provides:
//! - Prometheus metrics (clustering latency, prediction latency, request outcomes, model version)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, GaugeVec, Histogram, IntCounter,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for clustering latency (in seconds)
const CLUSTER_LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

/// Histogram buckets for prediction latency (in seconds)
const PREDICTION_LATENCY_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

struct EngineMetricsInner {
    cluster_latency_seconds: Histogram,
    prediction_latency_seconds: Histogram,
    cluster_requests: IntCounter,
    predictions: IntCounter,
    rejected_requests: IntCounter,
    convergence_warnings: IntCounter,
    partial_results: IntCounter,
    slow_predictions: IntCounter,
    model_version_info: GaugeVec,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            cluster_latency_seconds: register_histogram!(
                "typhoon_cluster_latency_seconds",
                "Time spent clustering one batch of typhoon records",
                CLUSTER_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register cluster_latency_seconds"),

            prediction_latency_seconds: register_histogram!(
                "typhoon_prediction_latency_seconds",
                "Time spent predicting the impact of one typhoon",
                PREDICTION_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            cluster_requests: register_int_counter!(
                "typhoon_cluster_requests_total",
                "Total number of completed clustering requests"
            )
            .expect("Failed to register cluster_requests"),

            predictions: register_int_counter!(
                "typhoon_predictions_total",
                "Total number of completed predictions"
            )
            .expect("Failed to register predictions"),

            rejected_requests: register_int_counter!(
                "typhoon_rejected_requests_total",
                "Total number of requests rejected with a typed error"
            )
            .expect("Failed to register rejected_requests"),

            convergence_warnings: register_int_counter!(
                "typhoon_convergence_warnings_total",
                "Clustering results returned without converging"
            )
            .expect("Failed to register convergence_warnings"),

            partial_results: register_int_counter!(
                "typhoon_partial_results_total",
                "Clustering results cut short by the deadline"
            )
            .expect("Failed to register partial_results"),

            slow_predictions: register_int_counter!(
                "typhoon_slow_predictions_total",
                "Predictions that exceeded the inference latency target"
            )
            .expect("Failed to register slow_predictions"),

            model_version_info: register_gauge_vec!(
                "typhoon_model_version_info",
                "Information about the loaded impact model",
                &["version"]
            )
            .expect("Failed to register model_version_info"),
        }
    }
}

/// Engine metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_cluster_latency(&self, duration_secs: f64) {
        self.inner().cluster_latency_seconds.observe(duration_secs);
        self.inner().cluster_requests.inc();
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
        self.inner().predictions.inc();
    }

    pub fn inc_rejected_requests(&self) {
        self.inner().rejected_requests.inc();
    }

    pub fn inc_convergence_warnings(&self) {
        self.inner().convergence_warnings.inc();
    }

    pub fn inc_partial_results(&self) {
        self.inner().partial_results.inc();
    }

    pub fn inc_slow_predictions(&self) {
        self.inner().slow_predictions.inc();
    }

    pub fn set_model_version(&self, version: &str) {
        self.inner().model_version_info.reset();
        self.inner()
            .model_version_info
            .with_label_values(&[version])
            .set(1.0);
    }
}

/// Structured logger for engine events
///
/// Emits event-tagged records so clustering runs, predictions and
/// rejections can be filtered in the JSON log stream.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn log_cluster(
        &self,
        records: usize,
        k: usize,
        gamma: f64,
        silhouette: f64,
        iterations: usize,
        converged: bool,
        partial: bool,
        elapsed_ms: u128,
    ) {
        if converged && !partial {
            info!(
                event = "cluster_completed",
                instance = %self.instance,
                records = records,
                k = k,
                gamma = gamma,
                silhouette = silhouette,
                iterations = iterations,
                elapsed_ms = elapsed_ms,
                "Clustering completed"
            );
        } else {
            warn!(
                event = "cluster_completed",
                instance = %self.instance,
                records = records,
                k = k,
                gamma = gamma,
                silhouette = silhouette,
                iterations = iterations,
                converged = converged,
                partial = partial,
                elapsed_ms = elapsed_ms,
                "Clustering returned an unconverged or partial result"
            );
        }
    }

    pub fn log_prediction(
        &self,
        typhoon_name: &str,
        province: &str,
        predicted_casualties: u64,
        predicted_damage_cost: f64,
        risk_level: &str,
        confidence: f64,
        model_version: &str,
    ) {
        info!(
            event = "prediction_generated",
            instance = %self.instance,
            typhoon_name = %typhoon_name,
            province = %province,
            predicted_casualties = predicted_casualties,
            predicted_damage_cost = predicted_damage_cost,
            risk_level = %risk_level,
            confidence = confidence,
            model_version = %model_version,
            "Generated impact prediction"
        );
    }

    pub fn log_rejection(&self, operation: &str, code: &str, reason: &str) {
        warn!(
            event = "request_rejected",
            instance = %self.instance,
            operation = %operation,
            code = %code,
            reason = %reason,
            "Request rejected"
        );
    }

    pub fn log_model_loaded(&self, version: &str, provinces: usize) {
        info!(
            event = "model_loaded",
            instance = %self.instance,
            model_version = %version,
            provinces = provinces,
            "Impact model loaded"
        );
    }

    pub fn log_startup(&self, version: &str, model_version: &str) {
        info!(
            event = "server_started",
            instance = %self.instance,
            server_version = %version,
            model_version = %model_version,
            "Typhoon server started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "server_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Typhoon server shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_metrics_creation() {
        let metrics = EngineMetrics::new();

        metrics.observe_cluster_latency(0.01);
        metrics.observe_prediction_latency(0.0001);
        metrics.inc_rejected_requests();
        metrics.inc_convergence_warnings();
        metrics.inc_partial_results();
        metrics.inc_slow_predictions();
        metrics.set_model_version("v1.0.0");

        // second handle shares the registered metrics
        let again = EngineMetrics::new();
        again.set_model_version("v1.0.1");
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-instance");
        assert_eq!(logger.instance, "test-instance");
    }
}
