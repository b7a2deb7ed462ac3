//! Event bus for room lifecycle events.
//!
//! Provides a publish/subscribe mechanism so push channels (websocket fanout,
//! lobby list refreshes) can react to room changes without polling.
//!
//! # Example
//!
//! ```ignore
//! let bus = RoomEventBus::new();
//!
//! // Subscribe to join/leave events only
//! let mut rx = bus.subscribe(vec![RoomAction::Joined, RoomAction::Left]);
//!
//! // Publish an event
//! bus.publish(RoomEvent::new(RoomAction::Joined, &room, "alice", "alice joined lan-party"));
//!
//! // Receive events
//! while let Some(event) = rx.recv().await {
//!     println!("Received: {:?}", event);
//! }
//! ```

use crate::types::{Room, RoomStatus};
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;
use tracing::debug;

/// Maximum number of events buffered in the broadcast channel.
const EVENT_BUFFER_SIZE: usize = 256;

/// What happened to a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomAction {
    Created,
    Joined,
    Left,
    Started,
    Ended,
}

impl RoomAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomAction::Created => "created",
            RoomAction::Joined => "joined",
            RoomAction::Left => "left",
            RoomAction::Started => "started",
            RoomAction::Ended => "ended",
        }
    }
}

impl std::fmt::Display for RoomAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A room lifecycle event carrying a snapshot of the room at publish time.
#[derive(Debug, Clone, Serialize)]
pub struct RoomEvent {
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    pub room_id: u64,
    pub action: RoomAction,
    /// User whose request triggered the event
    pub username: String,
    /// Member list after the change; empty when the room was disbanded
    pub players: Vec<String>,
    pub status: RoomStatus,
    /// Human-readable message
    pub message: String,
}

impl RoomEvent {
    pub fn new(action: RoomAction, room: &Room, username: &str, message: &str) -> Self {
        Self {
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as i64,
            room_id: room.id,
            action,
            username: username.to_string(),
            players: room.players.clone(),
            status: room.status,
            message: message.to_string(),
        }
    }
}

/// Event bus for publishing and subscribing to room events.
#[derive(Clone)]
pub struct RoomEventBus {
    sender: broadcast::Sender<RoomEvent>,
}

impl RoomEventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: RoomEvent) {
        debug!(room_id = event.room_id, action = %event.action, "Publishing room event");
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to events, optionally filtered by action. An empty filter
    /// list receives everything.
    pub fn subscribe(&self, filters: Vec<RoomAction>) -> RoomEventSubscriber {
        RoomEventSubscriber { receiver: self.sender.subscribe(), filters }
    }

    /// Get the number of current subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for RoomEventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Room event subscriber with optional action filtering.
pub struct RoomEventSubscriber {
    receiver: broadcast::Receiver<RoomEvent>,
    filters: Vec<RoomAction>,
}

impl RoomEventSubscriber {
    /// Receive the next matching event. Returns `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<RoomEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(event);
                    }
                    // Event doesn't match filters, continue
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!("Room event subscriber lagged by {} events", n);
                    // Continue receiving
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return None;
                }
            }
        }
    }

    fn matches(&self, event: &RoomEvent) -> bool {
        self.filters.is_empty() || self.filters.contains(&event.action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_room() -> Room {
        let mut room = Room::new("lan-party", "fightcade", 4, "alice");
        room.id = 7;
        room
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = RoomEventBus::new();
        let mut subscriber = bus.subscribe(vec![]);

        let room = test_room();
        bus.publish(RoomEvent::new(RoomAction::Created, &room, "alice", "room created"));

        let event = tokio::time::timeout(std::time::Duration::from_millis(100), subscriber.recv())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(event.action, RoomAction::Created);
        assert_eq!(event.room_id, 7);
        assert_eq!(event.players, vec!["alice".to_string()]);
        assert_eq!(event.status, RoomStatus::Waiting);
    }

    #[tokio::test]
    async fn test_filter_match() {
        let bus = RoomEventBus::new();
        let mut subscriber = bus.subscribe(vec![RoomAction::Left]);

        let room = test_room();
        bus.publish(RoomEvent::new(RoomAction::Joined, &room, "bob", "bob joined"));
        bus.publish(RoomEvent::new(RoomAction::Left, &room, "bob", "bob left"));

        let event = tokio::time::timeout(std::time::Duration::from_millis(100), subscriber.recv())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(event.action, RoomAction::Left);
        assert_eq!(event.username, "bob");
    }

    #[test]
    fn test_action_strings() {
        assert_eq!(RoomAction::Created.as_str(), "created");
        assert_eq!(RoomAction::Ended.to_string(), "ended");
        let json = serde_json::to_string(&RoomAction::Started).unwrap();
        assert_eq!(json, "\"started\"");
    }

    #[test]
    fn test_event_serializes_with_lowercase_status() {
        let room = test_room();
        let event = RoomEvent::new(RoomAction::Created, &room, "alice", "room created");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["action"], "created");
        assert_eq!(json["status"], "waiting");
        assert_eq!(json["room_id"], 7);
    }
}
