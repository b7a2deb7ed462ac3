//! Room domain types.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// A multiplayer game room with its overlay network metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    /// Repository-assigned identifier (0 until first persisted)
    pub id: u64,

    /// Human-readable room name, unique among live rooms
    pub name: String,

    /// Game this room hosts
    pub game_name: String,

    /// Maximum number of players
    pub max_players: u32,

    /// Username of the current room creator
    pub creator: String,

    /// Current room status
    pub status: RoomStatus,

    /// Current members, in join order
    pub players: Vec<String>,

    /// Overlay network id, set once provisioning succeeds
    pub network_id: Option<String>,

    /// Overlay network name handed to joining clients
    pub network_name: Option<String>,

    /// Shared secret for joining the overlay
    pub network_secret: Option<String>,

    /// Technology that provisioned the network (registry key)
    pub network_technology: Option<String>,

    /// Creation timestamp
    pub created_at: SystemTime,
}

impl Room {
    /// Create a new room in the waiting state with the creator as first member.
    pub fn new(name: &str, game_name: &str, max_players: u32, creator: &str) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            game_name: game_name.to_string(),
            max_players,
            creator: creator.to_string(),
            status: RoomStatus::Waiting,
            players: vec![creator.to_string()],
            network_id: None,
            network_name: None,
            network_secret: None,
            network_technology: None,
            created_at: SystemTime::now(),
        }
    }

    pub fn has_player(&self, username: &str) -> bool {
        self.players.iter().any(|p| p == username)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players as usize
    }

    pub fn is_joinable(&self) -> bool {
        self.status == RoomStatus::Waiting && !self.is_full()
    }
}

/// Room status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    /// Room is open and waiting for players
    Waiting,

    /// A game is in progress
    Playing,

    /// The game concluded and the room is winding down
    Finished,
}

impl std::fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Playing => write!(f, "playing"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

impl std::str::FromStr for RoomStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "waiting" => Ok(Self::Waiting),
            "playing" => Ok(Self::Playing),
            "finished" => Ok(Self::Finished),
            other => Err(format!("unknown room status: {}", other)),
        }
    }
}
