//! Roomnet Library
//!
//! Virtual network orchestration for ephemeral multiplayer game rooms: room
//! lifecycle, deterministic overlay address allocation, and pluggable P2P
//! network backends.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod network;
pub mod observability;
pub mod repository;
pub mod types;

// Re-export commonly used items
pub use config::Config;
pub use coordinator::{LeaveOutcome, RoomCoordinator, SweepReport, MIN_PLAYERS_TO_START};
pub use error::{Result, RoomnetError};
pub use events::{RoomAction, RoomEvent, RoomEventBus, RoomEventSubscriber};
pub use network::{
    AddressAllocator, Allocation, BackendHealth, BackendRegistry, CleanupReport, N2nBackend,
    NetworkBackend, NetworkStore, ZeroTierBackend,
};
pub use observability::{init as init_observability, HealthStatus};
pub use repository::{MemoryRepository, RoomRepository, UserRepository};
pub use types::{
    NetworkDetail, NetworkInfo, NetworkOverview, NetworkSummary, Room, RoomStatus, User,
    VirtualNetwork,
};
