use serde::{Deserialize, Serialize};

use super::error_codes::ErrorCode;
use super::types::{LootKind, MatchId, MatchPhase, RankingEntry, RoomId, UserId, Vec2, Weapon};

/// Messages sent from client to server. Wire envelope is `{"type": ...,
/// "payload": ...}`; variants with no fields carry a null/absent payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
    Echo {
        message: String,
    },
    #[serde(rename = "room:join")]
    RoomJoin {
        room_name: String,
        max_size: Option<u32>,
    },
    #[serde(rename = "room:leave")]
    RoomLeave,
    #[serde(rename = "room:message")]
    RoomMessage { data: serde_json::Value },
    #[serde(rename = "matchmaking:join")]
    MatchmakingJoin,
    #[serde(rename = "matchmaking:leave")]
    MatchmakingLeave,
    #[serde(rename = "match:join")]
    MatchJoin { match_id: MatchId },
    PlayerInput {
        tick: u64,
        up: bool,
        down: bool,
        left: bool,
        right: bool,
        shoot: bool,
        aim_angle: f32,
    },
    Shoot {
        aim_angle: f32,
        client_timestamp_ms: i64,
    },
    CollectLoot {
        entity_id: uuid::Uuid,
    },
    SwitchWeapon {
        weapon: Weapon,
    },
}

/// One player's state as carried in a `game:state` snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub user_id: UserId,
    pub username: String,
    pub position: Vec2,
    pub velocity: Vec2,
    pub rotation: f32,
    pub health: f32,
    pub shield: f32,
    pub kills: u32,
    pub is_alive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectileSnapshot {
    pub id: uuid::Uuid,
    pub owner: UserId,
    pub position: Vec2,
    pub weapon: Weapon,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LootSnapshot {
    pub id: uuid::Uuid,
    pub kind: LootKind,
    pub position: Vec2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrateSnapshot {
    pub id: uuid::Uuid,
    pub position: Vec2,
    pub opened: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafeZoneSnapshot {
    pub center: Vec2,
    pub current_radius: f32,
    pub target_radius: f32,
    pub next_shrink_tick: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingSnapshot {
    pub user_id: UserId,
    pub username: String,
    pub kills: u32,
    pub placement: u32,
}

/// The full per-tick world snapshot broadcast to every match member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStateSnapshot {
    pub tick: u64,
    pub players: Vec<PlayerSnapshot>,
    pub projectiles: Vec<ProjectileSnapshot>,
    pub loot: Vec<LootSnapshot>,
    pub crates: Vec<CrateSnapshot>,
    pub safe_zone: SafeZoneSnapshot,
    pub phase: MatchPhase,
    pub rankings: Vec<RankingSnapshot>,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    Pong,
    Authenticated {
        user_id: UserId,
        username: String,
    },
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_code: Option<ErrorCode>,
    },
    ForceDisconnect {
        reason: String,
    },
    #[serde(rename = "room:joined")]
    RoomJoined {
        room_id: RoomId,
        room_name: String,
        members: Vec<UserId>,
    },
    #[serde(rename = "room:left")]
    RoomLeft,
    #[serde(rename = "room:member_joined")]
    RoomMemberJoined { user_id: UserId, username: String },
    #[serde(rename = "room:member_left")]
    RoomMemberLeft { user_id: UserId },
    #[serde(rename = "room:message")]
    RoomMessage {
        from_user_id: UserId,
        data: serde_json::Value,
    },
    RoomClosed {
        room_id: RoomId,
    },
    #[serde(rename = "matchmaking:joined")]
    MatchmakingJoined { queue_position: Option<u32> },
    #[serde(rename = "matchmaking:left")]
    MatchmakingLeft,
    #[serde(rename = "matchmaking:match_found")]
    MatchmakingMatchFound { match_id: MatchId },
    #[serde(rename = "matchmaking:timeout")]
    MatchmakingTimeout,
    #[serde(rename = "matchmaking:error")]
    MatchmakingError {
        error_code: ErrorCode,
        message: String,
    },
    #[serde(rename = "match:joined")]
    MatchJoined {
        match_id: MatchId,
        expected_players: u32,
    },
    #[serde(rename = "match:started")]
    MatchStarted {
        match_id: MatchId,
        tick_rate_hz: u32,
    },
    #[serde(rename = "game:state")]
    GameState(Box<GameStateSnapshot>),
    MatchEnded {
        match_id: MatchId,
        rankings: Vec<RankingEntry>,
    },
    LatencyUpdate {
        rtt_ms: u32,
    },
}
