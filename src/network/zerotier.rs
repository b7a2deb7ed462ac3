//! ZeroTier overlay backend.
//!
//! ZeroTier peers rendezvous through the public root servers, so there is no
//! supernode to probe and no rendezvous endpoint to report. Network records
//! and address assignments work the same way as for N2N.

use crate::config::ZeroTierConfig;
use crate::error::{Result, RoomnetError};
use crate::network::allocator::{AddressAllocator, Allocation};
use crate::network::store::NetworkStore;
use crate::network::{generate_network_id, NetworkBackend};
use crate::observability::HealthStatus;
use crate::types::{NetworkDetail, NetworkInfo, NetworkOverview, NetworkSummary, VirtualNetwork};
use async_trait::async_trait;
use tracing::{debug, info, instrument};

pub struct ZeroTierBackend {
    config: ZeroTierConfig,
    allocator: AddressAllocator,
    store: NetworkStore,
}

impl ZeroTierBackend {
    pub fn new(config: ZeroTierConfig) -> Self {
        let allocator = AddressAllocator::new(&config.subnet_cidr);
        Self { config, allocator, store: NetworkStore::new("zerotier") }
    }
}

#[async_trait]
impl NetworkBackend for ZeroTierBackend {
    #[instrument(skip(self))]
    async fn create_network(&self) -> Result<VirtualNetwork> {
        let network =
            VirtualNetwork::new(generate_network_id(), &self.config.subnet_cidr, None);
        self.store.insert(network.clone()).await;

        metrics::counter!("roomnet_networks_created_total", "technology" => "zerotier")
            .increment(1);
        info!(network_id = %network.id, subnet = %network.subnet, "Created ZeroTier network");
        Ok(network)
    }

    #[instrument(skip(self), fields(network_id = %network_id))]
    async fn delete_network(&self, network_id: &str) -> Result<bool> {
        match self.store.remove(network_id).await {
            Some(_) => {
                metrics::counter!("roomnet_networks_deleted_total", "technology" => "zerotier")
                    .increment(1);
                info!("Deleted ZeroTier network");
                Ok(true)
            }
            None => {
                debug!("Network already absent");
                Ok(false)
            }
        }
    }

    #[instrument(skip(self), fields(username = %username, network_id = %network_id))]
    async fn assign_address(&self, username: &str, network_id: &str) -> Result<Allocation> {
        self.store.assign(network_id, username, &self.allocator).await
    }

    #[instrument(skip(self), fields(username = %username, network_id = %network_id))]
    async fn release_address(&self, username: &str, network_id: &str) -> Result<bool> {
        Ok(self.store.release(network_id, username).await)
    }

    async fn network_info(&self, network_id: Option<&str>) -> Result<NetworkInfo> {
        match network_id {
            None => {
                let networks: Vec<NetworkSummary> = self
                    .store
                    .snapshot()
                    .await
                    .into_iter()
                    .map(|(network, active_users)| NetworkSummary {
                        id: network.id,
                        created_at: network.created_at,
                        last_active: network.last_active,
                        active_users,
                    })
                    .collect();
                Ok(NetworkInfo::Overview(NetworkOverview {
                    status: HealthStatus::Healthy,
                    technology: self.technology_name().to_string(),
                    total_networks: networks.len(),
                    networks,
                }))
            }
            Some(id) => {
                let network = self.store.get(id).await.ok_or_else(|| {
                    RoomnetError::UnknownNetwork { network_id: id.to_string() }
                })?;
                let users = self.store.assignments(id).await.unwrap_or_default();
                Ok(NetworkInfo::Detail(NetworkDetail {
                    id: network.id,
                    subnet: network.subnet,
                    supernode: None,
                    created_at: network.created_at,
                    last_active: network.last_active,
                    active_users: users.len(),
                    users,
                }))
            }
        }
    }

    fn connection_command(&self, network_name: &str, _secret: &str) -> String {
        format!("zerotier-cli join {}", network_name)
    }

    fn technology_name(&self) -> &str {
        "zerotier"
    }
}
