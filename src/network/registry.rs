//! Registry mapping technology names to network backends.

use crate::config::Config;
use crate::error::{Result, RoomnetError};
use crate::network::{N2nBackend, NetworkBackend, ZeroTierBackend};
use crate::observability::HealthStatus;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, instrument, warn};

/// Health of a single backend, as reported by [`BackendRegistry::check_health`].
#[derive(Debug, Clone, Serialize)]
pub struct BackendHealth {
    pub technology: String,
    pub status: HealthStatus,
    pub total_networks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Outcome counts for one idle-network sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub examined: usize,
    pub reclaimed: usize,
    pub failures: usize,
}

/// Holds every configured backend, keyed case-insensitively by technology
/// name. Lookups that pass no technology fall back to the configured default.
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn NetworkBackend>>,
    default_backend: Arc<dyn NetworkBackend>,
    default_technology: String,
}

impl BackendRegistry {
    pub fn new(
        backends: Vec<Arc<dyn NetworkBackend>>,
        default_technology: &str,
    ) -> Result<Self> {
        let mut map: HashMap<String, Arc<dyn NetworkBackend>> = HashMap::new();
        for backend in backends {
            let key = backend.technology_name().to_uppercase();
            if map.contains_key(&key) {
                return Err(RoomnetError::InvalidConfig {
                    reason: format!("duplicate network backend registered for {}", key),
                });
            }
            map.insert(key, backend);
        }

        let default_backend = map
            .get(&default_technology.to_uppercase())
            .cloned()
            .ok_or_else(|| RoomnetError::UnsupportedTechnology {
                technology: default_technology.to_string(),
            })?;
        let default_technology = default_backend.technology_name().to_string();

        debug!(
            default = %default_technology,
            backends = map.len(),
            "Network backend registry ready"
        );
        Ok(Self { backends: map, default_backend, default_technology })
    }

    /// Build the standard registry from configuration: one N2N backend and
    /// one ZeroTier backend.
    pub fn from_config(config: &Config) -> Result<Self> {
        let backends: Vec<Arc<dyn NetworkBackend>> = vec![
            Arc::new(N2nBackend::new(config.n2n.clone())),
            Arc::new(ZeroTierBackend::new(config.zerotier.clone())),
        ];
        Self::new(backends, &config.default_technology)
    }

    /// Resolve a technology name to its backend. `None` and blank strings
    /// resolve to the default; the lookup itself ignores case.
    pub fn resolve(&self, technology: Option<&str>) -> Result<&Arc<dyn NetworkBackend>> {
        match technology {
            None => Ok(&self.default_backend),
            Some(name) if name.trim().is_empty() => Ok(&self.default_backend),
            Some(name) => self.backends.get(&name.trim().to_uppercase()).ok_or_else(|| {
                RoomnetError::UnsupportedTechnology { technology: name.to_string() }
            }),
        }
    }

    pub fn default_backend(&self) -> &Arc<dyn NetworkBackend> {
        &self.default_backend
    }

    pub fn default_technology(&self) -> &str {
        &self.default_technology
    }

    pub fn contains(&self, technology: &str) -> bool {
        self.backends.contains_key(&technology.trim().to_uppercase())
    }

    /// Registered technology names, sorted for stable output.
    pub fn technologies(&self) -> Vec<&str> {
        let mut names: Vec<&str> =
            self.backends.values().map(|backend| backend.technology_name()).collect();
        names.sort_unstable();
        names
    }

    pub fn backends(&self) -> impl Iterator<Item = &Arc<dyn NetworkBackend>> {
        self.backends.values()
    }

    /// Rendezvous endpoint for the given technology. Fails for technologies
    /// that rendezvous without one.
    pub fn supernode_address(&self, technology: Option<&str>) -> Result<String> {
        let backend = self.resolve(technology)?;
        backend.supernode_address().map(str::to_string).ok_or_else(|| {
            RoomnetError::UnsupportedOperation {
                operation: "supernode_address".to_string(),
                reason: format!("{} networks have no supernode", backend.technology_name()),
            }
        })
    }

    /// Probe every backend for an overview. A backend that cannot answer is
    /// reported unhealthy instead of failing the whole check.
    pub async fn check_health(&self) -> Vec<BackendHealth> {
        let mut report = Vec::with_capacity(self.backends.len());
        for backend in self.backends.values() {
            let technology = backend.technology_name().to_string();
            let health = match backend.network_info(None).await {
                Ok(info) => match info.as_overview() {
                    Some(overview) => {
                        debug!(
                            technology = %technology,
                            networks = overview.total_networks,
                            "Backend healthy"
                        );
                        BackendHealth {
                            technology,
                            status: overview.status,
                            total_networks: overview.total_networks,
                            message: None,
                        }
                    }
                    None => BackendHealth {
                        technology,
                        status: HealthStatus::Degraded,
                        total_networks: 0,
                        message: Some("backend returned a single-network answer".to_string()),
                    },
                },
                Err(e) => {
                    warn!(technology = %technology, error = %e, "Backend health check failed");
                    BackendHealth {
                        technology,
                        status: HealthStatus::Unhealthy,
                        total_networks: 0,
                        message: Some(e.to_string()),
                    }
                }
            };
            report.push(health);
        }
        report.sort_by(|a, b| a.technology.cmp(&b.technology));
        report
    }

    /// Delete networks that have no assigned addresses and have been idle for
    /// longer than `max_idle`. Failures are counted, never propagated, so one
    /// stuck network cannot stall the sweep.
    #[instrument(skip(self))]
    pub async fn cleanup_unused_networks(&self, max_idle: Duration) -> CleanupReport {
        let cutoff = SystemTime::now().checked_sub(max_idle);
        let mut report = CleanupReport::default();

        for backend in self.backends.values() {
            let overview = match backend.network_info(None).await {
                Ok(info) => match info.as_overview() {
                    Some(overview) => overview.clone(),
                    None => continue,
                },
                Err(e) => {
                    warn!(
                        technology = %backend.technology_name(),
                        error = %e,
                        "Skipping backend during network sweep"
                    );
                    report.failures += 1;
                    continue;
                }
            };

            for summary in &overview.networks {
                report.examined += 1;
                let idle = cutoff.map(|cutoff| summary.last_active < cutoff).unwrap_or(false);
                if summary.active_users > 0 || !idle {
                    continue;
                }
                match backend.delete_network(&summary.id).await {
                    Ok(true) => {
                        metrics::counter!("roomnet_sweep_networks_reclaimed_total").increment(1);
                        info!(
                            technology = %backend.technology_name(),
                            network_id = %summary.id,
                            "Reclaimed idle network"
                        );
                        report.reclaimed += 1;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!(
                            technology = %backend.technology_name(),
                            network_id = %summary.id,
                            error = %e,
                            "Failed to reclaim idle network"
                        );
                        report.failures += 1;
                    }
                }
            }
        }

        if report.reclaimed > 0 || report.failures > 0 {
            info!(
                examined = report.examined,
                reclaimed = report.reclaimed,
                failures = report.failures,
                "Network sweep complete"
            );
        } else {
            debug!(examined = report.examined, "Network sweep found nothing to reclaim");
        }
        report
    }
}
