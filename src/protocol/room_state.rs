use std::collections::HashSet;

use uuid::Uuid;

use super::types::{RoomId, UserId};

// ============================================================================
// ROOM LIFECYCLE
// ============================================================================
//
// A Room here is a lightweight social grouping of connections — join, leave,
// broadcast a chat-style message — and is unrelated to a Match (see
// `matchcontrol`). Rooms have no lobby/ready-state machine: membership is the
// only state that matters, and reaping removes empty rooms past an inactivity
// window without touching member connections.

/// Room configuration and membership.
#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub max_size: Option<u32>,
    pub members: HashSet<UserId>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_activity: chrono::DateTime<chrono::Utc>,
}

impl Room {
    #[must_use]
    pub fn new(name: String, max_size: Option<u32>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            max_size,
            members: HashSet::new(),
            created_at: now,
            last_activity: now,
        }
    }

    pub fn update_activity(&mut self) {
        self.last_activity = chrono::Utc::now();
    }

    /// Empty rooms are reaped against creation time; non-empty rooms against
    /// last activity, matching the Room Registry's reaping invariant.
    #[must_use]
    pub fn is_expired(&self, empty_timeout: chrono::Duration, inactive_timeout: chrono::Duration) -> bool {
        let now = chrono::Utc::now();
        if self.members.is_empty() {
            now.signed_duration_since(self.created_at) > empty_timeout
        } else {
            now.signed_duration_since(self.last_activity) > inactive_timeout
        }
    }

    #[must_use]
    pub fn can_join(&self) -> bool {
        match self.max_size {
            Some(max) => (self.members.len() as u32) < max,
            None => true,
        }
    }

    pub fn add_member(&mut self, user_id: UserId) -> bool {
        if self.members.contains(&user_id) {
            return true;
        }
        if self.can_join() {
            self.members.insert(user_id);
            true
        } else {
            false
        }
    }

    pub fn remove_member(&mut self, user_id: &UserId) -> bool {
        self.members.remove(user_id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_respects_capacity() {
        let mut room = Room::new("lobby-chat".to_string(), Some(2));
        assert!(room.add_member("alice".to_string()));
        assert!(room.add_member("bob".to_string()));
        assert!(!room.add_member("carol".to_string()));
        assert_eq!(room.members.len(), 2);
    }

    #[test]
    fn rejoining_same_member_is_idempotent() {
        let mut room = Room::new("lobby-chat".to_string(), Some(1));
        assert!(room.add_member("alice".to_string()));
        assert!(room.add_member("alice".to_string()));
        assert_eq!(room.members.len(), 1);
    }

    #[test]
    fn unbounded_room_accepts_any_size() {
        let mut room = Room::new("open".to_string(), None);
        for i in 0..50 {
            assert!(room.add_member(format!("user-{i}")));
        }
    }

    #[test]
    fn expiry_uses_creation_time_when_empty() {
        let room = Room::new("empty".to_string(), None);
        assert!(!room.is_expired(chrono::Duration::seconds(60), chrono::Duration::seconds(60)));
        assert!(room.is_expired(chrono::Duration::seconds(-1), chrono::Duration::seconds(60)));
    }
}
