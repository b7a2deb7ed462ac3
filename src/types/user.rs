//! User domain types.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::{Duration, SystemTime};

/// A connected user as seen by the orchestration engine.
///
/// Authentication and session transport live outside the engine; this record
/// carries only what room and network coordination need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,

    /// False once the user logs out; stale-but-active users are caught by
    /// the last-seen check instead.
    pub active: bool,

    /// Last time the external session layer saw this user
    pub last_active: SystemTime,

    /// Virtual IP inside the current room's overlay, if assigned
    pub virtual_ip: Option<Ipv4Addr>,

    /// Room the user currently belongs to
    pub current_room_id: Option<u64>,
}

impl User {
    pub fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            active: true,
            last_active: SystemTime::now(),
            virtual_ip: None,
            current_room_id: None,
        }
    }

    /// Refresh the activity timestamp and mark the user active.
    pub fn touch(&mut self) {
        self.last_active = SystemTime::now();
        self.active = true;
    }

    /// Whether the user was seen within the given window.
    pub fn seen_within(&self, window: Duration) -> bool {
        match SystemTime::now().duration_since(self.last_active) {
            Ok(elapsed) => elapsed <= window,
            // last_active in the future counts as just seen
            Err(_) => true,
        }
    }

    /// Online means logged in and recently seen.
    pub fn is_online(&self, window: Duration) -> bool {
        self.active && self.seen_within(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_is_online() {
        let user = User::new("alice");
        assert!(user.is_online(Duration::from_secs(60)));
        assert!(user.virtual_ip.is_none());
        assert!(user.current_room_id.is_none());
    }

    #[test]
    fn test_logged_out_user_is_offline() {
        let mut user = User::new("alice");
        user.active = false;
        assert!(!user.is_online(Duration::from_secs(60)));
    }

    #[test]
    fn test_stale_user_is_offline() {
        let mut user = User::new("alice");
        user.last_active = SystemTime::now() - Duration::from_secs(3600);
        assert!(!user.is_online(Duration::from_secs(60)));

        user.touch();
        assert!(user.is_online(Duration::from_secs(60)));
    }
}
