//! Observability infrastructure: tracing setup, metrics, and health status.
//!
//! Metrics are recorded through the `metrics` facade; the embedding
//! application decides which exporter (if any) to install.

use metrics::{describe_counter, describe_gauge};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable controlling the log filter (e.g. `ROOMNET_LOG=debug`).
pub const LOG_ENV_VAR: &str = "ROOMNET_LOG";

/// Overall health status of a backend or subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Initialize the global tracing subscriber and register metric metadata.
///
/// This must be called once at application startup before any other operations.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true).with_level(true))
        .try_init()?;

    register_metrics();
    tracing::info!("Observability initialized");
    Ok(())
}

/// Register all engine metrics with descriptions.
///
/// All metrics follow Prometheus naming conventions: `_total` suffix for
/// counters, no suffix for gauges.
pub fn register_metrics() {
    // Room lifecycle metrics
    describe_counter!("roomnet_rooms_created_total", "Total number of rooms created");
    describe_counter!(
        "roomnet_rooms_deleted_total",
        "Total number of rooms disbanded, whether by leave or by sweep"
    );

    // Network lifecycle metrics
    describe_counter!(
        "roomnet_networks_created_total",
        "Total number of overlay networks provisioned (by technology)"
    );
    describe_counter!(
        "roomnet_networks_deleted_total",
        "Total number of overlay networks torn down (by technology)"
    );
    describe_gauge!(
        "roomnet_networks_active",
        "Current number of live overlay networks (by technology)"
    );

    // Address allocation metrics
    describe_counter!("roomnet_ip_assigned_total", "Total number of virtual IPs handed out");
    describe_counter!("roomnet_ip_released_total", "Total number of virtual IPs released");
    describe_counter!(
        "roomnet_allocation_exhausted_total",
        "Times allocation gave up probing and returned a conflicting address"
    );

    // Sweep metrics
    describe_counter!(
        "roomnet_sweep_networks_reclaimed_total",
        "Idle overlay networks reclaimed by the cleanup sweep"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status_display() {
        assert_eq!(HealthStatus::Healthy.to_string(), "healthy");
        assert_eq!(HealthStatus::Degraded.to_string(), "degraded");
        assert_eq!(HealthStatus::Unhealthy.to_string(), "unhealthy");
    }

    #[test]
    fn test_health_status_serializes_lowercase() {
        let json = serde_json::to_string(&HealthStatus::Degraded).unwrap();
        assert_eq!(json, "\"degraded\"");
    }
}
