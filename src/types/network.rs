//! Overlay network domain types.

use crate::observability::HealthStatus;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::SystemTime;

/// An overlay network record owned by the backend that created it.
///
/// Room-facing naming (network name, join secret) lives on the room record;
/// this is pure backend bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualNetwork {
    /// Opaque unique identifier, immutable after creation
    pub id: String,

    /// Subnet the allocator draws addresses from, as configured (CIDR)
    pub subnet: String,

    /// Rendezvous address, for technologies that have one
    pub supernode: Option<String>,

    /// Creation timestamp
    pub created_at: SystemTime,

    /// Refreshed on every assignment or release
    pub last_active: SystemTime,
}

impl VirtualNetwork {
    pub fn new(id: String, subnet: &str, supernode: Option<String>) -> Self {
        let now = SystemTime::now();
        Self { id, subnet: subnet.to_string(), supernode, created_at: now, last_active: now }
    }
}

/// Response of a backend's info operation.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum NetworkInfo {
    Overview(NetworkOverview),
    Detail(NetworkDetail),
}

impl NetworkInfo {
    pub fn as_overview(&self) -> Option<&NetworkOverview> {
        match self {
            Self::Overview(overview) => Some(overview),
            Self::Detail(_) => None,
        }
    }

    pub fn as_detail(&self) -> Option<&NetworkDetail> {
        match self {
            Self::Detail(detail) => Some(detail),
            Self::Overview(_) => None,
        }
    }
}

/// Aggregate view over all networks a backend manages.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkOverview {
    pub status: HealthStatus,
    pub technology: String,
    pub total_networks: usize,
    pub networks: Vec<NetworkSummary>,
}

/// One network's line in the aggregate view.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkSummary {
    pub id: String,
    pub created_at: SystemTime,
    pub last_active: SystemTime,
    pub active_users: usize,
}

/// Detailed view of a single network including its members.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkDetail {
    pub id: String,
    pub subnet: String,
    pub supernode: Option<String>,
    pub created_at: SystemTime,
    pub last_active: SystemTime,
    pub users: HashMap<String, Ipv4Addr>,
    pub active_users: usize,
}
