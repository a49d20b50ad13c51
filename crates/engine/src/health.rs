//! Health and readiness tracking for the typhoon server
//!
//! The server is ready once an impact model is loaded and serving. Health
//! reflects the most recent clustering outcome: an unconverged or
//! timed-out result degrades the service until a later run converges.

use crate::service::ClusterResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Overall service status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Healthy,
    /// Still serving, but the last clustering result should not be trusted
    Degraded,
}

/// How the most recent clustering request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusteringOutcome {
    Converged,
    /// Hit `max_iter` on the winning run
    NotConverged,
    /// Deadline reached; the result was partial
    TimedOut,
}

impl ClusteringOutcome {
    pub fn describe(&self) -> &'static str {
        match self {
            ClusteringOutcome::Converged => "last clustering result converged",
            ClusteringOutcome::NotConverged => "last clustering result did not converge",
            ClusteringOutcome::TimedOut => "last clustering result was cut short by the deadline",
        }
    }
}

/// Summary of the most recent clustering request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringStatus {
    pub outcome: ClusteringOutcome,
    pub records: usize,
    pub iterations: usize,
    pub finished_at: DateTime<Utc>,
}

impl From<&ClusterResponse> for ClusteringStatus {
    fn from(response: &ClusterResponse) -> Self {
        let outcome = if response.partial {
            ClusteringOutcome::TimedOut
        } else if !response.converged {
            ClusteringOutcome::NotConverged
        } else {
            ClusteringOutcome::Converged
        };
        Self {
            outcome,
            records: response.cluster_assignments.len(),
            iterations: response.iterations,
            finished_at: Utc::now(),
        }
    }
}

/// Body of `GET /healthz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ServiceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_clustering: Option<ClusteringStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Body of `GET /readyz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Default)]
struct HealthState {
    model_version: Option<String>,
    last_clustering: Option<ClusteringStatus>,
}

/// Shared health state, cloned into every handler
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    state: Arc<RwLock<HealthState>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the model now being served; the server becomes ready.
    pub async fn mark_ready(&self, model_version: impl Into<String>) {
        self.state.write().await.model_version = Some(model_version.into());
    }

    pub async fn record_clustering(&self, status: ClusteringStatus) {
        self.state.write().await.last_clustering = Some(status);
    }

    pub async fn health(&self) -> HealthResponse {
        let state = self.state.read().await;
        let degraded = state
            .last_clustering
            .as_ref()
            .filter(|c| c.outcome != ClusteringOutcome::Converged);

        HealthResponse {
            status: if degraded.is_some() {
                ServiceStatus::Degraded
            } else {
                ServiceStatus::Healthy
            },
            model_version: state.model_version.clone(),
            last_clustering: state.last_clustering.clone(),
            message: degraded.map(|c| c.outcome.describe().to_string()),
        }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let state = self.state.read().await;
        match &state.model_version {
            Some(version) => ReadinessResponse {
                ready: true,
                model_version: Some(version.clone()),
                reason: None,
            },
            None => ReadinessResponse {
                ready: false,
                model_version: None,
                reason: Some("Impact model not loaded yet".to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(converged: bool, partial: bool) -> ClusterResponse {
        ClusterResponse {
            cluster_assignments: vec![0, 1, 0],
            cluster_centers: Vec::new(),
            silhouette_score: 0.4,
            converged,
            partial,
            iterations: 7,
            gamma: 0.5,
            warnings: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_initial_state_is_healthy_but_not_ready() {
        let registry = HealthRegistry::new();

        let health = registry.health().await;
        assert_eq!(health.status, ServiceStatus::Healthy);
        assert!(health.last_clustering.is_none());

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("Impact model not loaded yet"));
    }

    #[tokio::test]
    async fn test_ready_reports_model_version() {
        let registry = HealthRegistry::new();
        registry.mark_ready("impact-rf-2024.06").await;

        let readiness = registry.readiness().await;
        assert!(readiness.ready);
        assert_eq!(readiness.model_version.as_deref(), Some("impact-rf-2024.06"));
        assert_eq!(
            registry.health().await.model_version.as_deref(),
            Some("impact-rf-2024.06")
        );
    }

    #[tokio::test]
    async fn test_unconverged_clustering_degrades() {
        let registry = HealthRegistry::new();
        registry
            .record_clustering(ClusteringStatus::from(&response(false, false)))
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ServiceStatus::Degraded);
        assert_eq!(
            health.message.as_deref(),
            Some("last clustering result did not converge")
        );
    }

    #[tokio::test]
    async fn test_timed_out_clustering_reported_separately() {
        let registry = HealthRegistry::new();
        // a partial result is also unconverged; the deadline takes precedence
        registry
            .record_clustering(ClusteringStatus::from(&response(false, true)))
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ServiceStatus::Degraded);
        let last = health.last_clustering.unwrap();
        assert_eq!(last.outcome, ClusteringOutcome::TimedOut);
        assert_eq!(last.records, 3);
        assert!(health.message.unwrap().contains("deadline"));
    }

    #[tokio::test]
    async fn test_converged_run_recovers() {
        let registry = HealthRegistry::new();
        registry
            .record_clustering(ClusteringStatus::from(&response(false, false)))
            .await;
        registry
            .record_clustering(ClusteringStatus::from(&response(true, false)))
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ServiceStatus::Healthy);
        assert!(health.message.is_none());
        assert_eq!(
            health.last_clustering.map(|c| c.outcome),
            Some(ClusteringOutcome::Converged)
        );
    }
}
