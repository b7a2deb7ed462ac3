//! Deterministic virtual IP allocation with collision probing.
//!
//! The same user on the same subnet always gets the same candidate address
//! (stable across reconnects), derived from a digest of the username. Only a
//! conflict with another member triggers sequential probing.

use crate::error::{Result, RoomnetError};
use md5::{Digest, Md5};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use tracing::warn;

/// Probing gives up after this many candidates.
pub const MAX_PROBE_ATTEMPTS: u32 = 254;

/// A parsed IPv4 subnet in CIDR form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subnet {
    network: Ipv4Addr,
    prefix: u8,
}

impl Subnet {
    /// Parse a CIDR string. Prefixes above /30 leave no usable host space
    /// and are rejected along with malformed input.
    pub fn parse(cidr: &str) -> Result<Self> {
        let invalid = || RoomnetError::InvalidSubnet { cidr: cidr.to_string() };

        let (addr_part, prefix_part) = cidr.trim().split_once('/').ok_or_else(invalid)?;
        let addr: Ipv4Addr = addr_part.parse().map_err(|_| invalid())?;
        let prefix: u8 = prefix_part.parse().map_err(|_| invalid())?;
        if prefix > 30 {
            return Err(invalid());
        }

        let network = Ipv4Addr::from(u32::from(addr) & Self::mask_for(prefix));
        Ok(Self { network, prefix })
    }

    fn mask_for(prefix: u8) -> u32 {
        if prefix == 0 {
            0
        } else {
            u32::MAX << (32 - prefix)
        }
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn netmask(&self) -> u32 {
        Self::mask_for(self.prefix)
    }

    /// Number of assignable hosts, excluding the network and broadcast
    /// addresses.
    pub fn max_hosts(&self) -> u32 {
        let host_bits = 32 - self.prefix as u32;
        ((1u64 << host_bits) - 2) as u32
    }

    fn with_host(&self, host: u32) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.network) | host)
    }

    fn host_of(&self, ip: Ipv4Addr) -> u32 {
        u32::from(ip) & !self.netmask()
    }

    /// Next host address in cyclic order, skipping the all-zero and all-one
    /// host parts.
    fn next_host(&self, ip: Ipv4Addr) -> Ipv4Addr {
        let host = self.host_of(ip);
        let next = if host >= self.max_hosts() { 1 } else { host + 1 };
        self.with_host(next)
    }
}

impl std::fmt::Display for Subnet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

impl std::str::FromStr for Subnet {
    type Err = RoomnetError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// How an address was arrived at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allocation {
    /// The (user, network) pair already held this IP
    Existing { ip: Ipv4Addr },
    /// The deterministic candidate was free
    Deterministic { ip: Ipv4Addr },
    /// The candidate collided; probing found a free host
    Probed { ip: Ipv4Addr, attempts: u32 },
    /// Probing exhausted; the original colliding candidate is returned as a
    /// degraded last resort
    Exhausted { ip: Ipv4Addr },
}

impl Allocation {
    pub fn ip(&self) -> Ipv4Addr {
        match *self {
            Self::Existing { ip }
            | Self::Deterministic { ip }
            | Self::Probed { ip, .. }
            | Self::Exhausted { ip } => ip,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

/// Computes virtual addresses for one subnet. Holds no assignment state;
/// callers pass the current used set and reserve the result under their own
/// lock.
#[derive(Debug, Clone)]
pub struct AddressAllocator {
    subnet: Option<Subnet>,
    cidr: String,
}

impl AddressAllocator {
    /// Build an allocator for the configured CIDR. A malformed CIDR is not
    /// fatal: allocation degrades to a fixed `10.0.0.x` scheme.
    pub fn new(cidr: &str) -> Self {
        let subnet = match Subnet::parse(cidr) {
            Ok(subnet) => Some(subnet),
            Err(_) => {
                warn!(cidr = %cidr, "Malformed subnet CIDR; degrading to fixed 10.0.0.x allocation");
                None
            }
        };
        Self { subnet, cidr: cidr.to_string() }
    }

    pub fn subnet(&self) -> Option<Subnet> {
        self.subnet
    }

    pub fn cidr(&self) -> &str {
        &self.cidr
    }

    /// The address this user always maps to on this subnet, before any
    /// conflict handling.
    pub fn deterministic_candidate(&self, username: &str) -> Ipv4Addr {
        let seed = digest_seed(username);
        match self.subnet {
            Some(subnet) => subnet.with_host(seed % subnet.max_hosts() + 1),
            None => fallback_ip(seed),
        }
    }

    /// Pick an address for `username` given the set already held by other
    /// members. The caller must hold its store lock across this call and the
    /// reservation write.
    pub fn allocate(&self, username: &str, used: &HashSet<Ipv4Addr>) -> Allocation {
        let candidate = self.deterministic_candidate(username);
        if !used.contains(&candidate) {
            return Allocation::Deterministic { ip: candidate };
        }

        let Some(subnet) = self.subnet else {
            // The degraded scheme has no probe space to fall back on.
            warn!(
                username = %username,
                ip = %candidate,
                "Degraded allocation collided; returning the conflicting address"
            );
            metrics::counter!("roomnet_allocation_exhausted_total").increment(1);
            return Allocation::Exhausted { ip: candidate };
        };

        let mut current = candidate;
        for attempts in 1..=MAX_PROBE_ATTEMPTS {
            current = subnet.next_host(current);
            if !used.contains(&current) {
                return Allocation::Probed { ip: current, attempts };
            }
        }

        warn!(
            username = %username,
            ip = %candidate,
            attempts = MAX_PROBE_ATTEMPTS,
            "IP probing exhausted; returning the conflicting candidate"
        );
        metrics::counter!("roomnet_allocation_exhausted_total").increment(1);
        Allocation::Exhausted { ip: candidate }
    }
}

/// First four bytes of the username's 128-bit digest, big-endian.
fn digest_seed(username: &str) -> u32 {
    let digest = Md5::digest(username.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

fn fallback_ip(seed: u32) -> Ipv4Addr {
    Ipv4Addr::new(10, 0, 0, (seed % 250 + 1) as u8)
}
