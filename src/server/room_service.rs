//! Named social rooms: join/leave, capacity, idle reaping. Grounded on
//! `connection_manager.rs`'s `DashMap` + per-entry lock idiom and on
//! `protocol::room_state::Room`'s membership model.

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::metrics::ServerMetrics;
use crate::protocol::room_state::Room;
use crate::protocol::{RoomId, UserId};

#[derive(Debug, Error)]
pub enum RoomServiceError {
    #[error("already in a room")]
    AlreadyInRoom,
    #[error("not in a room")]
    NotInRoom,
    #[error("room is full")]
    RoomFull,
}

pub struct RoomJoinResult {
    pub room_id: RoomId,
    pub room_name: String,
    pub members: Vec<UserId>,
}

pub struct RoomLeaveResult {
    pub room_id: RoomId,
    pub remaining_members: Vec<UserId>,
    pub now_empty: bool,
}

/// Process-wide name→room registry enforcing one active room per user.
pub(crate) struct RoomRegistry {
    rooms: DashMap<RoomId, RwLock<Room>>,
    by_name: DashMap<String, RoomId>,
    member_of: DashMap<UserId, RoomId>,
    metrics: Arc<ServerMetrics>,
}

impl RoomRegistry {
    pub fn new(metrics: Arc<ServerMetrics>) -> Self {
        Self {
            rooms: DashMap::new(),
            by_name: DashMap::new(),
            member_of: DashMap::new(),
            metrics,
        }
    }

    /// Joins the room named `room_name`, creating it with `max_size` if it
    /// doesn't exist yet. A user already in a room must leave it first.
    pub async fn join(
        &self,
        user_id: &UserId,
        room_name: String,
        max_size: Option<u32>,
    ) -> Result<RoomJoinResult, RoomServiceError> {
        if self.member_of.contains_key(user_id) {
            return Err(RoomServiceError::AlreadyInRoom);
        }

        let room_id = match self.by_name.get(&room_name) {
            Some(existing) => *existing,
            None => {
                let room = Room::new(room_name.clone(), max_size);
                let room_id = room.id;
                self.rooms.insert(room_id, RwLock::new(room));
                self.by_name.insert(room_name.clone(), room_id);
                self.metrics.increment_rooms_created();
                self.metrics.set_active_rooms(self.rooms.len() as u64);
                room_id
            }
        };

        let Some(entry) = self.rooms.get(&room_id) else {
            return Err(RoomServiceError::RoomFull);
        };
        let members = {
            let mut room = entry.write().await;
            if !room.add_member(user_id.clone()) {
                return Err(RoomServiceError::RoomFull);
            }
            room.update_activity();
            room.members.iter().cloned().collect::<Vec<_>>()
        };
        drop(entry);

        self.member_of.insert(user_id.clone(), room_id);
        self.metrics.increment_rooms_joined();

        Ok(RoomJoinResult {
            room_id,
            room_name,
            members,
        })
    }

    /// Removes `user_id` from whatever room it currently occupies.
    pub async fn leave(&self, user_id: &UserId) -> Result<RoomLeaveResult, RoomServiceError> {
        let Some((_, room_id)) = self.member_of.remove(user_id) else {
            return Err(RoomServiceError::NotInRoom);
        };
        self.leave_room_id(user_id, room_id).await
    }

    async fn leave_room_id(
        &self,
        user_id: &UserId,
        room_id: RoomId,
    ) -> Result<RoomLeaveResult, RoomServiceError> {
        let Some(entry) = self.rooms.get(&room_id) else {
            return Ok(RoomLeaveResult {
                room_id,
                remaining_members: Vec::new(),
                now_empty: true,
            });
        };
        let mut room = entry.write().await;
        room.remove_member(user_id);
        room.update_activity();
        let now_empty = room.is_empty();
        let remaining_members = room.members.iter().cloned().collect();
        Ok(RoomLeaveResult {
            room_id,
            remaining_members,
            now_empty,
        })
    }

    #[must_use]
    pub fn current_room(&self, user_id: &UserId) -> Option<RoomId> {
        self.member_of.get(user_id).map(|entry| *entry.value())
    }

    pub async fn members(&self, room_id: &RoomId) -> Option<Vec<UserId>> {
        let entry = self.rooms.get(room_id)?;
        let room = entry.read().await;
        Some(room.members.iter().cloned().collect())
    }

    /// Detaches `user_id` from its room (disconnect cleanup). Same as
    /// `leave` but never errors when the user wasn't in a room.
    pub async fn leave_all(&self, user_id: &UserId) -> Option<RoomLeaveResult> {
        self.leave(user_id).await.ok()
    }

    /// Removes rooms that are empty and past the reaper's idle timeout.
    /// Never touches member connections — only the room record.
    pub async fn cleanup_empty(
        &self,
        empty_timeout: chrono::Duration,
        inactive_timeout: chrono::Duration,
    ) -> usize {
        let mut expired = Vec::new();
        for entry in self.rooms.iter() {
            let room = entry.value().read().await;
            if room.is_expired(empty_timeout, inactive_timeout) && room.is_empty() {
                expired.push((*entry.key(), room.name.clone()));
            }
        }

        let removed = expired.len();
        for (room_id, room_name) in expired {
            self.rooms.remove(&room_id);
            self.by_name.remove(&room_name);
            self.metrics.increment_rooms_deleted();
        }
        self.metrics.set_active_rooms(self.rooms.len() as u64);
        removed
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
