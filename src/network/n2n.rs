//! N2N overlay backend.
//!
//! N2N edges rendezvous through a supernode, so network creation probes the
//! configured supernode first. An unreachable supernode downgrades creation
//! rather than failing it: the network record still exists and clients may
//! reach the supernode later.

use crate::config::N2nConfig;
use crate::error::{Result, RoomnetError};
use crate::network::allocator::{AddressAllocator, Allocation};
use crate::network::store::NetworkStore;
use crate::network::{generate_network_id, NetworkBackend};
use crate::observability::HealthStatus;
use crate::types::{NetworkDetail, NetworkInfo, NetworkOverview, NetworkSummary, VirtualNetwork};
use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

/// Probe window for a supernode on this machine.
const PROBE_TIMEOUT_LOCAL: Duration = Duration::from_secs(1);

/// Probe window for a remote supernode.
const PROBE_TIMEOUT_REMOTE: Duration = Duration::from_secs(3);

pub struct N2nBackend {
    config: N2nConfig,
    allocator: AddressAllocator,
    store: NetworkStore,
}

impl N2nBackend {
    pub fn new(config: N2nConfig) -> Self {
        let allocator = AddressAllocator::new(&config.subnet_cidr);
        Self { config, allocator, store: NetworkStore::new("n2n") }
    }

    /// Check that the supernode accepts TCP connections.
    #[instrument(skip(self), fields(supernode = %self.config.supernode_address))]
    async fn probe_supernode(&self) -> Result<()> {
        let address = &self.config.supernode_address;
        let window = if is_local_address(address) {
            PROBE_TIMEOUT_LOCAL
        } else {
            PROBE_TIMEOUT_REMOTE
        };

        match timeout(window, TcpStream::connect(address)).await {
            Ok(Ok(_stream)) => {
                debug!("Supernode reachable");
                Ok(())
            }
            Ok(Err(e)) => {
                debug!(error = %e, "Supernode connection failed");
                Err(RoomnetError::SupernodeUnreachable { address: address.clone() })
            }
            Err(_) => {
                debug!(window_secs = window.as_secs(), "Supernode probe timed out");
                Err(RoomnetError::SupernodeUnreachable { address: address.clone() })
            }
        }
    }
}

#[async_trait]
impl NetworkBackend for N2nBackend {
    #[instrument(skip(self))]
    async fn create_network(&self) -> Result<VirtualNetwork> {
        if let Err(e) = self.probe_supernode().await {
            warn!(error = %e, "Creating network with unreachable supernode");
        }

        let network = VirtualNetwork::new(
            generate_network_id(),
            &self.config.subnet_cidr,
            Some(self.config.supernode_address.clone()),
        );
        self.store.insert(network.clone()).await;

        metrics::counter!("roomnet_networks_created_total", "technology" => "n2n").increment(1);
        info!(network_id = %network.id, subnet = %network.subnet, "Created N2N network");
        Ok(network)
    }

    #[instrument(skip(self), fields(network_id = %network_id))]
    async fn delete_network(&self, network_id: &str) -> Result<bool> {
        match self.store.remove(network_id).await {
            Some(_) => {
                metrics::counter!("roomnet_networks_deleted_total", "technology" => "n2n")
                    .increment(1);
                info!("Deleted N2N network");
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
                    supernode: network.supernode,
                    created_at: network.created_at,
                    last_active: network.last_active,
                    active_users: users.len(),
                    users,
                }))
            }
        }
    }

    fn connection_command(&self, network_name: &str, secret: &str) -> String {
        let mut command = format!(
            "edge -c {} -k {} -a dhcp:0.0.0.0 -l {}",
            network_name, secret, self.config.supernode_address
        );
        if self.config.auto_reconnect {
            command.push_str(" -r");
        }
        command
    }

    fn technology_name(&self) -> &str {
        "n2n"
    }

    fn supernode_address(&self) -> Option<&str> {
        Some(&self.config.supernode_address)
    }
}

/// True for supernode addresses that resolve to this machine, where a short
/// probe window is enough.
fn is_local_address(address: &str) -> bool {
    let host = address.rsplit_once(':').map(|(host, _)| host).unwrap_or(address);
    host == "localhost" || host.parse::<Ipv4Addr>().map(|ip| ip.is_loopback()).unwrap_or(false)
}
