//! Room lifecycle orchestration.
//!
//! The coordinator owns the room state machine: create, join, leave with
//! creator handoff, game start and end, and the periodic sweeps that evict
//! silent members and disband abandoned rooms. Overlay networking is
//! best-effort throughout: a room whose network could not be provisioned
//! still works as a lobby, it just has no tunnel between its members.

use crate::config::Config;
use crate::error::{Result, RoomnetError};
use crate::events::{RoomAction, RoomEvent, RoomEventBus};
use crate::network::registry::{BackendRegistry, CleanupReport};
use crate::repository::{RoomRepository, UserRepository};
use crate::types::{Room, RoomStatus, User};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// A game cannot start below this member count.
pub const MIN_PLAYERS_TO_START: usize = 2;

/// What happened when a member left a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaveOutcome {
    pub room_id: u64,
    /// True when the leaver was the last member and the room was deleted
    pub disbanded: bool,
    /// Set when room ownership moved to the next member
    pub new_creator: Option<String>,
}

/// Outcome counts for one membership sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub members_removed: usize,
    pub rooms_disbanded: usize,
    pub failures: usize,
}

/// Orchestrates rooms, their members, and their overlay networks.
pub struct RoomCoordinator {
    rooms: Arc<dyn RoomRepository>,
    users: Arc<dyn UserRepository>,
    registry: Arc<BackendRegistry>,
    events: RoomEventBus,
    session_timeout: Duration,
    network_max_idle: Duration,
}

impl RoomCoordinator {
    pub fn new(
        rooms: Arc<dyn RoomRepository>,
        users: Arc<dyn UserRepository>,
        registry: Arc<BackendRegistry>,
        config: &Config,
    ) -> Self {
        Self {
            rooms,
            users,
            registry,
            events: RoomEventBus::new(),
            session_timeout: config.session_timeout(),
            network_max_idle: config.cleanup.max_idle(),
        }
    }

    pub fn event_bus(&self) -> &RoomEventBus {
        &self.events
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    /// Create a room with `username` as creator and sole member, then
    /// provision an overlay network for it on the default technology.
    #[instrument(skip(self), fields(username = %username, room = %name))]
    pub async fn create_room(
        &self,
        username: &str,
        name: &str,
        game_name: &str,
        max_players: u32,
    ) -> Result<Room> {
        let mut user = self.require_online_user(username).await?;
        self.ensure_not_in_room(&user).await?;

        if self.rooms.find_room_by_name(name).await?.is_some() {
            return Err(RoomnetError::RoomNameTaken { name: name.to_string() });
        }

        let mut room =
            self.rooms.insert_room(Room::new(name, game_name, max_players, username)).await?;
        metrics::counter!("roomnet_rooms_created_total").increment(1);

        let backend = self.registry.default_backend();
        match backend.create_network().await {
            Ok(network) => {
                room.network_id = Some(network.id.clone());
                room.network_name = Some(format!("room_{}", room.id));
                room.network_secret = Some(backend.generate_secret());
                room.network_technology = Some(backend.technology_name().to_string());

                match backend.assign_address(username, &network.id).await {
                    Ok(allocation) => {
                        user.virtual_ip = Some(allocation.ip());
                        user.current_room_id = Some(room.id);
                        self.users.save_user(&user).await?;
                    }
                    Err(e) => {
                        warn!(error = %e, "Creator address assignment failed; room has no overlay address for them");
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Network provisioning failed; room created without overlay");
            }
        }

        self.rooms.update_room(&room).await?;
        self.events.publish(RoomEvent::new(
            RoomAction::Created,
            &room,
            username,
            &format!("{} created room {}", username, room.name),
        ));
        info!(room_id = room.id, "Room created");
        Ok(room)
    }

    /// Join an existing waiting room and claim an overlay address on its
    /// network.
    #[instrument(skip(self), fields(username = %username, room_id = room_id))]
    pub async fn join_room(&self, username: &str, room_id: u64) -> Result<Room> {
        let mut user = self.require_online_user(username).await?;
        self.ensure_not_in_room(&user).await?;

        let mut room = self
            .rooms
            .get_room(room_id)
            .await?
            .ok_or(RoomnetError::RoomNotFound { room_id })?;
        if room.status != RoomStatus::Waiting {
            return Err(RoomnetError::RoomNotJoinable {
                room_id,
                status: room.status.to_string(),
            });
        }
        if room.is_full() {
            return Err(RoomnetError::RoomFull { room_id, max_players: room.max_players });
        }

        room.players.push(username.to_string());

        if let Some(network_id) = room.network_id.clone() {
            match self.registry.resolve(room.network_technology.as_deref()) {
                Ok(backend) => match backend.assign_address(username, &network_id).await {
                    Ok(allocation) => {
                        user.virtual_ip = Some(allocation.ip());
                        user.current_room_id = Some(room.id);
                        self.users.save_user(&user).await?;
                    }
                    Err(e) => {
                        warn!(error = %e, "Joiner address assignment failed; they have no overlay address");
                    }
                },
                Err(e) => {
                    warn!(error = %e, "Room references an unregistered technology");
                }
            }
        }

        self.rooms.update_room(&room).await?;
        self.events.publish(RoomEvent::new(
            RoomAction::Joined,
            &room,
            username,
            &format!("{} joined {}", username, room.name),
        ));
        info!(room_id = room.id, players = room.player_count(), "Member joined room");
        Ok(room)
    }

    /// Leave whatever room the user is in. Offline users may leave; the
    /// membership sweep calls this path for them. Dropping the last member
    /// disbands the room, dropping the creator hands the room to the next
    /// member in join order.
    #[instrument(skip(self), fields(username = %username))]
    pub async fn leave_room(&self, username: &str) -> Result<LeaveOutcome> {
        let user = self
            .users
            .get_user(username)
            .await?
            .ok_or_else(|| RoomnetError::UserNotFound { username: username.to_string() })?;

        let room = match self.rooms.rooms_with_player(username).await?.into_iter().next() {
            Some(room) => room,
            None => {
                // Heal a stale pointer left by an interrupted leave
                if user.current_room_id.is_some() {
                    let mut user = user;
                    user.current_room_id = None;
                    user.virtual_ip = None;
                    self.users.save_user(&user).await?;
                }
                return Err(RoomnetError::NotInRoom { username: username.to_string() });
            }
        };

        self.remove_member(room, username).await
    }

    /// Start the game. Only the creator may start, the room must be waiting,
    /// and enough members must be present.
    #[instrument(skip(self), fields(username = %username, room_id = room_id))]
    pub async fn start_game(&self, username: &str, room_id: u64) -> Result<Room> {
        let mut room = self
            .rooms
            .get_room(room_id)
            .await?
            .ok_or(RoomnetError::RoomNotFound { room_id })?;

        if room.creator != username {
            return Err(RoomnetError::NotRoomCreator { username: username.to_string(), room_id });
        }
        if room.status != RoomStatus::Waiting {
            return Err(RoomnetError::WrongRoomStatus {
                room_id,
                expected: RoomStatus::Waiting.to_string(),
                actual: room.status.to_string(),
            });
        }
        if room.player_count() < MIN_PLAYERS_TO_START {
            return Err(RoomnetError::NotEnoughPlayers {
                room_id,
                required: MIN_PLAYERS_TO_START,
                actual: room.player_count(),
            });
        }

        room.status = RoomStatus::Playing;
        self.rooms.update_room(&room).await?;
        self.events.publish(RoomEvent::new(
            RoomAction::Started,
            &room,
            username,
            &format!("Game started in {}", room.name),
        ));
        info!(room_id = room.id, players = room.player_count(), "Game started");
        Ok(room)
    }

    /// End the game and reopen the room for its next round.
    #[instrument(skip(self), fields(username = %username, room_id = room_id))]
    pub async fn end_game(&self, username: &str, room_id: u64) -> Result<Room> {
        let mut room = self
            .rooms
            .get_room(room_id)
            .await?
            .ok_or(RoomnetError::RoomNotFound { room_id })?;

        if room.creator != username {
            return Err(RoomnetError::NotRoomCreator { username: username.to_string(), room_id });
        }
        if room.status != RoomStatus::Playing {
            return Err(RoomnetError::WrongRoomStatus {
                room_id,
                expected: RoomStatus::Playing.to_string(),
                actual: room.status.to_string(),
            });
        }

        room.status = RoomStatus::Waiting;
        self.rooms.update_room(&room).await?;
        self.events.publish(RoomEvent::new(
            RoomAction::Ended,
            &room,
            username,
            &format!("Game ended in {}", room.name),
        ));
        info!(room_id = room.id, "Game ended");
        Ok(room)
    }

    pub async fn get_room(&self, room_id: u64) -> Result<Room> {
        self.rooms.get_room(room_id).await?.ok_or(RoomnetError::RoomNotFound { room_id })
    }

    /// Rooms currently accepting members.
    pub async fn joinable_rooms(&self) -> Result<Vec<Room>> {
        Ok(self.rooms.list_rooms().await?.into_iter().filter(Room::is_joinable).collect())
    }

    /// Shell command members run to join the room's overlay, if the room has
    /// one.
    pub async fn connection_command(&self, room_id: u64) -> Result<Option<String>> {
        let room = self.get_room(room_id).await?;
        match (&room.network_name, &room.network_secret) {
            (Some(name), Some(secret)) => {
                let backend = self.registry.resolve(room.network_technology.as_deref())?;
                Ok(Some(backend.connection_command(name, secret)))
            }
            _ => Ok(None),
        }
    }

    /// Evict members whose sessions went silent past the timeout. Eviction
    /// follows the normal leave path, so creator handoff and disbanding
    /// behave exactly as if the member had left on their own.
    #[instrument(skip(self))]
    pub async fn sweep_offline_members(&self) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        for room in self.rooms.list_rooms().await? {
            for username in &room.players {
                let online = match self.users.get_user(username).await {
                    Ok(Some(user)) => user.is_online(self.session_timeout),
                    Ok(None) => false,
                    Err(e) => {
                        warn!(username = %username, error = %e, "Skipping member during sweep");
                        report.failures += 1;
                        continue;
                    }
                };
                if online {
                    continue;
                }

                // Re-fetch: an earlier eviction may have disbanded the room
                // or already handed it to someone else.
                let current = match self.rooms.get_room(room.id).await {
                    Ok(Some(current)) if current.has_player(username) => current,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(room_id = room.id, error = %e, "Skipping room during sweep");
                        report.failures += 1;
                        continue;
                    }
                };

                match self.remove_member(current, username).await {
                    Ok(outcome) => {
                        report.members_removed += 1;
                        if outcome.disbanded {
                            report.rooms_disbanded += 1;
                        }
                        info!(room_id = room.id, username = %username, "Evicted offline member");
                    }
                    Err(e) => {
                        warn!(room_id = room.id, username = %username, error = %e, "Failed to evict member");
                        report.failures += 1;
                    }
                }
            }
        }

        if report.members_removed > 0 || report.failures > 0 {
            info!(
                members_removed = report.members_removed,
                rooms_disbanded = report.rooms_disbanded,
                failures = report.failures,
                "Membership sweep complete"
            );
        }
        Ok(report)
    }

    /// Delete rooms that ended up with no members, releasing their networks.
    #[instrument(skip(self))]
    pub async fn cleanup_empty_rooms(&self) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        for room in self.rooms.empty_rooms().await? {
            match self.disband(&room).await {
                Ok(()) => report.rooms_disbanded += 1,
                Err(e) => {
                    warn!(room_id = room.id, error = %e, "Failed to delete empty room");
                    report.failures += 1;
                }
            }
        }
        Ok(report)
    }

    /// Reclaim overlay networks no room is using anymore.
    pub async fn purge_orphan_networks(&self) -> CleanupReport {
        self.registry.cleanup_unused_networks(self.network_max_idle).await
    }

    async fn require_online_user(&self, username: &str) -> Result<User> {
        let user = self
            .users
            .get_user(username)
            .await?
            .ok_or_else(|| RoomnetError::UserNotFound { username: username.to_string() })?;
        if !user.is_online(self.session_timeout) {
            return Err(RoomnetError::UserOffline { username: username.to_string() });
        }
        Ok(user)
    }

    async fn ensure_not_in_room(&self, user: &User) -> Result<()> {
        if let Some(room_id) = user.current_room_id {
            return Err(RoomnetError::AlreadyInRoom {
                username: user.username.clone(),
                room_id,
            });
        }
        if let Some(room) = self.rooms.rooms_with_player(&user.username).await?.into_iter().next()
        {
            return Err(RoomnetError::AlreadyInRoom {
                username: user.username.clone(),
                room_id: room.id,
            });
        }
        Ok(())
    }

    /// Remove one member: release their overlay address, clear their record,
    /// then either disband the empty room or hand it to the next member.
    async fn remove_member(&self, mut room: Room, username: &str) -> Result<LeaveOutcome> {
        room.players.retain(|player| player != username);

        if let Some(network_id) = room.network_id.clone() {
            match self.registry.resolve(room.network_technology.as_deref()) {
                Ok(backend) => {
                    if let Err(e) = backend.release_address(username, &network_id).await {
                        warn!(error = %e, "Failed to release member address");
                    }
                }
                Err(e) => warn!(error = %e, "Room references an unregistered technology"),
            }
        }

        if let Some(mut user) = self.users.get_user(username).await? {
            user.virtual_ip = None;
            user.current_room_id = None;
            self.users.save_user(&user).await?;
        }

        let outcome = if room.is_empty() {
            self.disband(&room).await?;
            LeaveOutcome { room_id: room.id, disbanded: true, new_creator: None }
        } else {
            let mut new_creator = None;
            if room.creator == username {
                if let Some(next) = room.players.first() {
                    room.creator = next.clone();
                    new_creator = Some(next.clone());
                    info!(room_id = room.id, new_creator = %room.creator, "Transferred room ownership");
                }
            }
            self.rooms.update_room(&room).await?;
            LeaveOutcome { room_id: room.id, disbanded: false, new_creator }
        };

        self.events.publish(RoomEvent::new(
            RoomAction::Left,
            &room,
            username,
            &format!("{} left {}", username, room.name),
        ));
        Ok(outcome)
    }

    /// Delete a room and its network. The network teardown is best-effort;
    /// the idle-network sweep catches anything left behind.
    async fn disband(&self, room: &Room) -> Result<()> {
        if let Some(network_id) = room.network_id.as_deref() {
            match self.registry.resolve(room.network_technology.as_deref()) {
                Ok(backend) => {
                    if let Err(e) = backend.delete_network(network_id).await {
                        warn!(network_id = %network_id, error = %e, "Failed to delete room network");
                    }
                }
                Err(e) => warn!(error = %e, "Room references an unregistered technology"),
            }
        }

        self.rooms.delete_room(room.id).await?;
        metrics::counter!("roomnet_rooms_deleted_total").increment(1);
        info!(room_id = room.id, "Room disbanded");
        Ok(())
    }
}
