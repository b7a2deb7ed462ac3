//! Core domain types for roomnet.

pub mod network;
pub mod room;
pub mod user;

// Re-exports
pub use network::{NetworkDetail, NetworkInfo, NetworkOverview, NetworkSummary, VirtualNetwork};
pub use room::{Room, RoomStatus};
pub use user::User;
