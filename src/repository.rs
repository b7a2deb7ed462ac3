//! Persistence traits for rooms and users, with an in-memory implementation.
//!
//! The coordinator only talks to these traits, so deployments can plug in a
//! database-backed store without touching the orchestration logic. The
//! bundled [`MemoryRepository`] backs tests and single-node setups.

use crate::error::{Result, RoomnetError};
use crate::types::{Room, User};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Room persistence. Implementations assign ids on insert and must be safe
/// for concurrent callers.
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// Store a new room, assigning its id. Returns the stored room.
    async fn insert_room(&self, room: Room) -> Result<Room>;

    /// Replace an existing room. Fails if the id was never inserted.
    async fn update_room(&self, room: &Room) -> Result<()>;

    async fn get_room(&self, room_id: u64) -> Result<Option<Room>>;

    /// Returns false when the room was already gone.
    async fn delete_room(&self, room_id: u64) -> Result<bool>;

    async fn find_room_by_name(&self, name: &str) -> Result<Option<Room>>;

    async fn list_rooms(&self) -> Result<Vec<Room>>;

    /// Rooms whose member list contains `username`.
    async fn rooms_with_player(&self, username: &str) -> Result<Vec<Room>>;

    /// Rooms with no members left.
    async fn empty_rooms(&self) -> Result<Vec<Room>>;
}

/// User lookups and presence updates.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_user(&self, username: &str) -> Result<Option<User>>;

    async fn save_user(&self, user: &User) -> Result<()>;
}

/// In-memory repository for both rooms and users.
#[derive(Debug)]
pub struct MemoryRepository {
    rooms: RwLock<HashMap<u64, Room>>,
    users: RwLock<HashMap<String, User>>,
    next_room_id: AtomicU64,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            users: RwLock::new(HashMap::new()),
            next_room_id: AtomicU64::new(1),
        }
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoomRepository for MemoryRepository {
    async fn insert_room(&self, mut room: Room) -> Result<Room> {
        room.id = self.next_room_id.fetch_add(1, Ordering::Relaxed);
        self.rooms.write().await.insert(room.id, room.clone());
        Ok(room)
    }

    async fn update_room(&self, room: &Room) -> Result<()> {
        let mut rooms = self.rooms.write().await;
        match rooms.get_mut(&room.id) {
            Some(existing) => {
                *existing = room.clone();
                Ok(())
            }
            None => Err(RoomnetError::RoomNotFound { room_id: room.id }),
        }
    }

    async fn get_room(&self, room_id: u64) -> Result<Option<Room>> {
        Ok(self.rooms.read().await.get(&room_id).cloned())
    }

    async fn delete_room(&self, room_id: u64) -> Result<bool> {
        Ok(self.rooms.write().await.remove(&room_id).is_some())
    }

    async fn find_room_by_name(&self, name: &str) -> Result<Option<Room>> {
        Ok(self.rooms.read().await.values().find(|room| room.name == name).cloned())
    }

    async fn list_rooms(&self) -> Result<Vec<Room>> {
        let mut rooms: Vec<Room> = self.rooms.read().await.values().cloned().collect();
        rooms.sort_by_key(|room| room.id);
        Ok(rooms)
    }

    async fn rooms_with_player(&self, username: &str) -> Result<Vec<Room>> {
        let mut rooms: Vec<Room> = self
            .rooms
            .read()
            .await
            .values()
            .filter(|room| room.has_player(username))
            .cloned()
            .collect();
        rooms.sort_by_key(|room| room.id);
        Ok(rooms)
    }

    async fn empty_rooms(&self) -> Result<Vec<Room>> {
        let mut rooms: Vec<Room> =
            self.rooms.read().await.values().filter(|room| room.is_empty()).cloned().collect();
        rooms.sort_by_key(|room| room.id);
        Ok(rooms)
    }
}

#[async_trait]
impl UserRepository for MemoryRepository {
    async fn get_user(&self, username: &str) -> Result<Option<User>> {
        Ok(self.users.read().await.get(username).cloned())
    }

    async fn save_user(&self, user: &User) -> Result<()> {
        self.users.write().await.insert(user.username.clone(), user.clone());
        Ok(())
    }
}
