//! Shared in-memory state for virtual networks and address assignments.

use crate::error::{Result, RoomnetError};
use crate::network::allocator::{AddressAllocator, Allocation};
use crate::types::VirtualNetwork;
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct StoreInner {
    networks: HashMap<String, VirtualNetwork>,
    assignments: HashMap<String, HashMap<String, Ipv4Addr>>,
}

/// Registry of live networks plus the per-network username to IP map.
///
/// A single lock guards both maps so an assignment can read the used set and
/// reserve its address without another writer racing in between.
#[derive(Debug, Clone)]
pub struct NetworkStore {
    /// Label for the active-network gauge, one store per technology
    technology: String,
    inner: Arc<RwLock<StoreInner>>,
}

impl NetworkStore {
    pub fn new(technology: &str) -> Self {
        Self { technology: technology.to_string(), inner: Arc::default() }
    }

    pub async fn insert(&self, network: VirtualNetwork) {
        let mut inner = self.inner.write().await;
        inner.assignments.insert(network.id.clone(), HashMap::new());
        inner.networks.insert(network.id.clone(), network);
        self.set_active_gauge(inner.networks.len());
    }

    /// Remove a network and all of its assignments in one step.
    pub async fn remove(&self, network_id: &str) -> Option<VirtualNetwork> {
        let mut inner = self.inner.write().await;
        let network = inner.networks.remove(network_id);
        inner.assignments.remove(network_id);
        self.set_active_gauge(inner.networks.len());
        network
    }

    fn set_active_gauge(&self, count: usize) {
        metrics::gauge!("roomnet_networks_active", "technology" => self.technology.clone())
            .set(count as f64);
    }

    pub async fn get(&self, network_id: &str) -> Option<VirtualNetwork> {
        self.inner.read().await.networks.get(network_id).cloned()
    }

    pub async fn contains(&self, network_id: &str) -> bool {
        self.inner.read().await.networks.contains_key(network_id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.networks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.networks.is_empty()
    }

    /// Refresh a network's activity timestamp. Returns false for unknown ids.
    pub async fn touch(&self, network_id: &str) -> bool {
        let mut inner = self.inner.write().await;
        match inner.networks.get_mut(network_id) {
            Some(network) => {
                network.last_active = SystemTime::now();
                true
            }
            None => false,
        }
    }

    /// Assign an address to `username`, idempotently. Re-assigning a user who
    /// already holds an address on this network returns that address
    /// unchanged. The allocation runs under the write lock, so concurrent
    /// joiners cannot claim the same free address.
    pub async fn assign(
        &self,
        network_id: &str,
        username: &str,
        allocator: &AddressAllocator,
    ) -> Result<Allocation> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        let network = inner.networks.get_mut(network_id).ok_or_else(|| {
            RoomnetError::UnknownNetwork { network_id: network_id.to_string() }
        })?;
        network.last_active = SystemTime::now();

        let members = inner.assignments.entry(network_id.to_string()).or_default();
        if let Some(ip) = members.get(username) {
            debug!(network_id = %network_id, username = %username, ip = %ip, "User already holds an address");
            return Ok(Allocation::Existing { ip: *ip });
        }

        let used: HashSet<Ipv4Addr> = members.values().copied().collect();
        let allocation = allocator.allocate(username, &used);
        members.insert(username.to_string(), allocation.ip());

        metrics::counter!("roomnet_ip_assigned_total").increment(1);
        debug!(
            network_id = %network_id,
            username = %username,
            ip = %allocation.ip(),
            "Assigned virtual IP"
        );
        Ok(allocation)
    }

    /// Release a user's address. Returns false when the network or the
    /// assignment does not exist; releasing is never an error.
    pub async fn release(&self, network_id: &str, username: &str) -> bool {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        let removed = inner
            .assignments
            .get_mut(network_id)
            .map(|members| members.remove(username).is_some())
            .unwrap_or(false);

        if removed {
            if let Some(network) = inner.networks.get_mut(network_id) {
                network.last_active = SystemTime::now();
            }
            metrics::counter!("roomnet_ip_released_total").increment(1);
            debug!(network_id = %network_id, username = %username, "Released virtual IP");
        }
        removed
    }

    pub async fn assigned_ip(&self, network_id: &str, username: &str) -> Option<Ipv4Addr> {
        self.inner
            .read()
            .await
            .assignments
            .get(network_id)
            .and_then(|members| members.get(username))
            .copied()
    }

    /// Current username to IP map for one network.
    pub async fn assignments(&self, network_id: &str) -> Option<HashMap<String, Ipv4Addr>> {
        self.inner.read().await.assignments.get(network_id).cloned()
    }

    /// All networks with their member counts, for overviews and sweeps.
    pub async fn snapshot(&self) -> Vec<(VirtualNetwork, usize)> {
        let inner = self.inner.read().await;
        inner
            .networks
            .values()
            .map(|network| {
                let members = inner
                    .assignments
                    .get(&network.id)
                    .map(|m| m.len())
                    .unwrap_or(0);
                (network.clone(), members)
            })
            .collect()
    }
}
