use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::storage::KvBackend;

// ============================================================================
// Health Checks
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub last_check: DateTime<Utc>,
    pub latency_ms: u64,
}

/// PING the backend, bounded by `timeout`
pub async fn check_backend(backend: &dyn KvBackend, timeout: Duration) -> ComponentHealth {
    let started = std::time::Instant::now();

    let status = match tokio::time::timeout(timeout, backend.ping()).await {
        Ok(Ok(())) => HealthStatus::Healthy,
        Ok(Err(e)) => HealthStatus::Unhealthy(e.to_string()),
        Err(_) => HealthStatus::Unhealthy(format!("no reply within {:?}", timeout)),
    };

    if !status.is_healthy() {
        tracing::warn!(backend = backend.name(), status = ?status, "Backend health check failed");
    }

    ComponentHealth {
        name: backend.name().to_string(),
        status,
        last_check: Utc::now(),
        latency_ms: started.elapsed().as_millis() as u64,
    }
}
