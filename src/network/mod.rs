//! Virtual network backends and the shared allocation machinery.
//!
//! A backend owns the full lifecycle of one overlay technology: creating and
//! deleting networks, handing out virtual IPs, and describing what it is
//! running. Backends are registered in a [`BackendRegistry`] and resolved by
//! technology name at call time, so rooms created on different technologies
//! coexist.

pub mod allocator;
pub mod n2n;
pub mod registry;
pub mod store;
pub mod zerotier;

pub use allocator::{AddressAllocator, Allocation, Subnet, MAX_PROBE_ATTEMPTS};
pub use n2n::N2nBackend;
pub use registry::{BackendHealth, BackendRegistry, CleanupReport};
pub use store::NetworkStore;
pub use zerotier::ZeroTierBackend;

use crate::error::Result;
use crate::types::{NetworkInfo, VirtualNetwork};
use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

/// Random bytes behind a generated network id.
pub const NETWORK_ID_BYTES: usize = 8;

/// Random bytes behind a generated join secret.
pub const SECRET_BYTES: usize = 16;

/// One overlay network technology.
///
/// Implementations must be safe to share behind an `Arc` and call
/// concurrently. Every operation logs through `tracing` with the network id
/// attached, so callers do not add their own spans for these calls.
#[async_trait]
pub trait NetworkBackend: Send + Sync {
    /// Provision a new network on this backend's configured subnet.
    async fn create_network(&self) -> Result<VirtualNetwork>;

    /// Tear down a network and all of its address assignments. Returns false
    /// when the network was already gone.
    async fn delete_network(&self, network_id: &str) -> Result<bool>;

    /// Give `username` a virtual IP on the network. Idempotent per
    /// (user, network) pair.
    async fn assign_address(&self, username: &str, network_id: &str) -> Result<Allocation>;

    /// Drop the user's address. Returns false when nothing was held.
    async fn release_address(&self, username: &str, network_id: &str) -> Result<bool>;

    /// Describe one network, or all of them when `network_id` is `None`.
    async fn network_info(&self, network_id: Option<&str>) -> Result<NetworkInfo>;

    /// A fresh join secret for a room on this backend.
    fn generate_secret(&self) -> String {
        generate_secret()
    }

    /// Shell command a client runs to join the named network.
    fn connection_command(&self, network_name: &str, secret: &str) -> String;

    /// Lowercase technology name used for registry lookups and room stamps.
    fn technology_name(&self) -> &str;

    /// Rendezvous endpoint clients dial, for technologies that have one.
    fn supernode_address(&self) -> Option<&str> {
        None
    }
}

/// Opaque, URL-safe network id.
pub fn generate_network_id() -> String {
    let mut bytes = [0u8; NETWORK_ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Join secret handed to room members.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}
