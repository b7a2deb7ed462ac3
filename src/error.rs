//! Error types for roomnet.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for roomnet operations.
pub type Result<T> = std::result::Result<T, RoomnetError>;

/// Main error type for roomnet.
#[derive(Error, Debug)]
pub enum RoomnetError {
    // Network technology errors
    #[error("Unsupported network technology: {technology}")]
    UnsupportedTechnology { technology: String },

    #[error("Network not found: {network_id}")]
    UnknownNetwork { network_id: String },

    #[error("Unsupported operation: {operation}. {reason}")]
    UnsupportedOperation { operation: String, reason: String },

    #[error("Supernode unreachable: {address}")]
    SupernodeUnreachable { address: String },

    #[error("Invalid subnet CIDR: {cidr}")]
    InvalidSubnet { cidr: String },

    // Room lifecycle errors
    #[error("User not found: {username}")]
    UserNotFound { username: String },

    #[error("User is offline: {username}")]
    UserOffline { username: String },

    #[error("User {username} is already in room {room_id}")]
    AlreadyInRoom { username: String, room_id: u64 },

    #[error("User {username} is not in any room")]
    NotInRoom { username: String },

    #[error("Room not found: {room_id}")]
    RoomNotFound { room_id: u64 },

    #[error("Room name already taken: {name}")]
    RoomNameTaken { name: String },

    #[error("Room {room_id} is full ({max_players} players)")]
    RoomFull { room_id: u64, max_players: u32 },

    #[error("Room {room_id} is not joinable: status is {status}")]
    RoomNotJoinable { room_id: u64, status: String },

    #[error("User {username} is not the creator of room {room_id}")]
    NotRoomCreator { username: String, room_id: u64 },

    #[error("Room {room_id} needs at least {required} players, has {actual}")]
    NotEnoughPlayers { room_id: u64, required: usize, actual: usize },

    #[error("Room {room_id} is {actual}, expected {expected}")]
    WrongRoomStatus { room_id: u64, expected: String, actual: String },

    // Persistence errors
    #[error("Repository error: {0}")]
    RepositoryError(String),

    // Configuration errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("I/O error at {path:?}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RoomnetError {
    /// Create an Internal error from any error type.
    pub fn internal(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Internal(err.to_string())
    }
}
