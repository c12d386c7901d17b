// Protocol module: message envelope, domain types, error codes, room state.

pub mod error_codes;
pub mod messages;
pub mod room_state;
pub mod types;
pub mod validation;

pub use error_codes::ErrorCode;

pub use types::{
    is_guest, Crate, EntityId, Loot, LootKind, MatchId, MatchPhase, Obstacle, ObstacleKind,
    PlayerEntity, Projectile, RankingEntry, RoomId, SafeZone, UserId, Vec2, Weapon, WeaponStats,
    BASE_MOVE_SPEED, DAMAGE_BONUS_PER_STACK, DEFAULT_GUEST_MMR, FIRE_RATE_REDUCTION_PER_STACK,
    GUEST_ID_PREFIX, LAG_COMPENSATION_WINDOW_MS, LOOT_COLLECTION_RADIUS, MATCH_ENDING_GRACE_SECS,
    MATCH_MAX_DURATION_SECS, MAP_HEIGHT, MAP_WIDTH, MAX_CRATES, MAX_HEALTH, MAX_STACKS, MIN_CRATES,
    OBSTACLE_COVERAGE_FRACTION, OBSTACLE_MIN_SEPARATION, PLAYER_RADIUS, PROJECTILE_RADIUS,
    SAFE_ZONE_DAMAGE_PER_TICK, SAFE_ZONE_FLOOR_RADIUS, SAFE_ZONE_HOLD_SECS, SAFE_ZONE_SHRINK_SECS,
    SHIELD_PER_STACK, SNAPSHOT_INTEREST_RADIUS,
};

pub use messages::{
    ClientMessage, CrateSnapshot, GameStateSnapshot, LootSnapshot, PlayerSnapshot,
    ProjectileSnapshot, RankingSnapshot, SafeZoneSnapshot, ServerMessage,
};

pub use room_state::Room;
