//! Core domain types shared across the connection, matchmaking, match and
//! engine layers: user/session identity, weapons, and simulation entities.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// External user identity. Either a persistent account id or a transient
/// guest id prefixed `guest_`. Created by the auth layer outside this crate;
/// the core only reads it.
pub type UserId = String;

/// Internal match identifier.
pub type MatchId = Uuid;

/// Internal room identifier (social rooms, distinct from matches).
pub type RoomId = Uuid;

/// Internal projectile / loot / crate / obstacle identifier.
pub type EntityId = Uuid;

pub const DEFAULT_GUEST_MMR: i32 = 1000;
pub const GUEST_ID_PREFIX: &str = "guest_";

#[must_use]
pub fn is_guest(user_id: &str) -> bool {
    user_id.starts_with(GUEST_ID_PREFIX)
}

/// A 2D vector used for position, velocity and aim direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    #[must_use]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn from_angle(angle_radians: f32) -> Self {
        Self {
            x: angle_radians.cos(),
            y: angle_radians.sin(),
        }
    }

    #[must_use]
    pub fn length(self) -> f32 {
        self.length_sq().sqrt()
    }

    #[must_use]
    pub fn length_sq(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    #[must_use]
    pub fn distance(self, other: Vec2) -> f32 {
        (self - other).length()
    }

    #[must_use]
    pub fn normalized(self) -> Vec2 {
        let len = self.length();
        if len <= f32::EPSILON {
            Vec2::ZERO
        } else {
            Vec2::new(self.x / len, self.y / len)
        }
    }

    #[must_use]
    pub fn scaled(self, factor: f32) -> Vec2 {
        Vec2::new(self.x * factor, self.y * factor)
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Authoritative weapon table (damage, cooldown, range, projectile speed,
/// projectile lifetime). Values are fixed per the simulation contract, not
/// configurable at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weapon {
    #[default]
    Pistol,
    Rifle,
    Shotgun,
    Sniper,
}

#[derive(Debug, Clone, Copy)]
pub struct WeaponStats {
    pub base_damage: f32,
    pub cooldown_ms: u64,
    pub range: f32,
    pub projectile_speed: f32,
    pub lifetime_ms: u64,
}

impl Weapon {
    #[must_use]
    pub const fn stats(self) -> WeaponStats {
        match self {
            Weapon::Pistol => WeaponStats {
                base_damage: 15.0,
                cooldown_ms: 500,
                range: 600.0,
                projectile_speed: 10.0,
                lifetime_ms: 3000,
            },
            Weapon::Rifle => WeaponStats {
                base_damage: 20.0,
                cooldown_ms: 400,
                range: 800.0,
                projectile_speed: 12.0,
                lifetime_ms: 3500,
            },
            Weapon::Shotgun => WeaponStats {
                base_damage: 35.0,
                cooldown_ms: 800,
                range: 400.0,
                projectile_speed: 8.0,
                lifetime_ms: 2000,
            },
            Weapon::Sniper => WeaponStats {
                base_damage: 50.0,
                cooldown_ms: 1200,
                range: 1200.0,
                projectile_speed: 15.0,
                lifetime_ms: 4000,
            },
        }
    }
}

/// Pickup kinds a crate or dropped loot can grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LootKind {
    Weapon(Weapon),
    Shield,
    DamageBoost,
    FireRateBoost,
}

/// Maximum stacks for shield and the two stat boosts.
pub const MAX_STACKS: u8 = 3;
pub const SHIELD_PER_STACK: f32 = 50.0;
pub const MAX_HEALTH: f32 = 100.0;
pub const PLAYER_RADIUS: f32 = 20.0;
pub const PROJECTILE_RADIUS: f32 = 5.0;
pub const BASE_MOVE_SPEED: f32 = 5.0;
pub const LOOT_COLLECTION_RADIUS: f32 = 30.0;
pub const SNAPSHOT_INTEREST_RADIUS: f32 = 800.0;
pub const SAFE_ZONE_DAMAGE_PER_TICK: f32 = 2.0;
pub const SAFE_ZONE_FLOOR_RADIUS: f32 = 200.0;
pub const LAG_COMPENSATION_WINDOW_MS: u64 = 200;

/// Square map dimensions. Obstacles/crates/spawns are all placed within
/// `[0, MAP_WIDTH] x [0, MAP_HEIGHT]`.
pub const MAP_WIDTH: f32 = 2000.0;
pub const MAP_HEIGHT: f32 = 2000.0;
/// Fraction of map area obstacles should cover.
pub const OBSTACLE_COVERAGE_FRACTION: f32 = 0.35;
/// Minimum separation enforced between obstacle centers.
pub const OBSTACLE_MIN_SEPARATION: f32 = 150.0;
pub const MIN_CRATES: u32 = 20;
pub const MAX_CRATES: u32 = 30;

/// Safe zone timing, in ticks at 30 Hz: no shrink for the first 2 minutes,
/// then interpolate toward the target over the next 3 minutes.
pub const SAFE_ZONE_HOLD_SECS: u64 = 120;
pub const SAFE_ZONE_SHRINK_SECS: u64 = 180;

/// Match lifecycle timings.
pub const MATCH_ENDING_GRACE_SECS: u64 = 5;
pub const MATCH_MAX_DURATION_SECS: u64 = 15 * 60;

/// Fire-rate stack cooldown reduction per stack (20%), and damage stack
/// bonus per stack (15%).
pub const FIRE_RATE_REDUCTION_PER_STACK: f32 = 0.20;
pub const DAMAGE_BONUS_PER_STACK: f32 = 0.15;

/// The simulated avatar of one matched player, owned by the Tick Engine.
#[derive(Debug, Clone)]
pub struct PlayerEntity {
    pub user_id: UserId,
    pub username: String,
    pub position: Vec2,
    pub velocity: Vec2,
    pub facing: f32,
    pub health: f32,
    pub shield_stacks: u8,
    pub current_shield: f32,
    pub weapon: Weapon,
    pub last_fire_tick: Option<u64>,
    pub damage_stacks: u8,
    pub fire_rate_stacks: u8,
    pub kills: u32,
    pub damage_dealt: f32,
    pub alive: bool,
    pub connected: bool,
}

impl PlayerEntity {
    #[must_use]
    pub fn spawn(user_id: UserId, username: String, position: Vec2, facing: f32) -> Self {
        Self {
            user_id,
            username,
            position,
            velocity: Vec2::ZERO,
            facing,
            health: MAX_HEALTH,
            shield_stacks: 0,
            current_shield: 0.0,
            weapon: Weapon::Pistol,
            last_fire_tick: None,
            damage_stacks: 0,
            fire_rate_stacks: 0,
            kills: 0,
            damage_dealt: 0.0,
            alive: true,
            connected: true,
        }
    }

    /// Total shield capacity granted by the stacks currently held.
    #[must_use]
    pub fn max_shield(&self) -> f32 {
        f32::from(self.shield_stacks) * SHIELD_PER_STACK
    }

    #[must_use]
    pub fn damage_multiplier(&self) -> f32 {
        1.0 + DAMAGE_BONUS_PER_STACK * f32::from(self.damage_stacks)
    }

    #[must_use]
    pub fn effective_cooldown(&self) -> u64 {
        let reduction = 1.0 - FIRE_RATE_REDUCTION_PER_STACK * f32::from(self.fire_rate_stacks);
        let reduction = reduction.max(0.05);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let cooldown = (self.weapon.stats().cooldown_ms as f32 * reduction) as u64;
        cooldown.max(1)
    }

    /// Apply damage: shield absorbs first, spilling into health. Debits the
    /// actual shield HP (a 1-stack player hit for 15 drops from 50 to 35,
    /// not back to a full stack). Returns the `(shield_delta, health_delta)`
    /// actually applied, and clamps health at zero. `alive` transitions
    /// true→false at most once.
    pub fn apply_damage(&mut self, damage: f32) -> (f32, f32) {
        let shield_delta = damage.min(self.current_shield);
        self.current_shield -= shield_delta;

        let remaining = damage - shield_delta;
        let health_delta = remaining.min(self.health);
        self.health = (self.health - health_delta).max(0.0);

        if self.health <= 0.0 && self.alive {
            self.alive = false;
        }

        (shield_delta, health_delta)
    }

    /// Grants one more shield stack (if under the stack cap) and tops up
    /// the current shield HP by a full stack's worth, capped at the new
    /// capacity.
    pub fn add_shield_stack(&mut self) -> bool {
        if self.shield_stacks < MAX_STACKS {
            self.shield_stacks += 1;
            self.current_shield = (self.current_shield + SHIELD_PER_STACK).min(self.max_shield());
            true
        } else {
            false
        }
    }

    pub fn add_damage_stack(&mut self) -> bool {
        if self.damage_stacks < MAX_STACKS {
            self.damage_stacks += 1;
            true
        } else {
            false
        }
    }

    pub fn add_fire_rate_stack(&mut self) -> bool {
        if self.fire_rate_stacks < MAX_STACKS {
            self.fire_rate_stacks += 1;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: EntityId,
    pub owner: UserId,
    pub position: Vec2,
    pub start_position: Vec2,
    pub velocity: Vec2,
    pub damage: f32,
    pub weapon: Weapon,
    pub spawned_tick: u64,
    pub client_timestamp_ms: Option<i64>,
    pub max_range: f32,
    pub lifetime_ticks: u32,
    pub ticks_alive: u32,
}

impl Projectile {
    #[must_use]
    pub fn traveled(&self) -> f32 {
        self.position.distance(self.start_position)
    }
}

#[derive(Debug, Clone)]
pub struct Loot {
    pub id: EntityId,
    pub kind: LootKind,
    pub position: Vec2,
}

#[derive(Debug, Clone)]
pub struct Crate {
    pub id: EntityId,
    pub position: Vec2,
    pub opened: bool,
    pub loot: Loot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObstacleKind {
    Rock,
    Wall,
    Barrel,
}

#[derive(Debug, Clone)]
pub struct Obstacle {
    pub id: EntityId,
    pub position: Vec2,
    pub half_extents: Vec2,
    pub kind: ObstacleKind,
    pub destructible: bool,
    pub health: f32,
}

impl Obstacle {
    #[must_use]
    pub fn contains(&self, point: Vec2) -> bool {
        (point.x - self.position.x).abs() <= self.half_extents.x
            && (point.y - self.position.y).abs() <= self.half_extents.y
    }
}

#[derive(Debug, Clone)]
pub struct SafeZone {
    pub center: Vec2,
    pub current_radius: f32,
    pub target_radius: f32,
    pub next_shrink_tick: u64,
}

/// Match lifecycle phase (component G's state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    Waiting,
    Playing,
    Ending,
    Finished,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingEntry {
    pub user_id: UserId,
    pub username: String,
    pub placement: u32,
    pub kills: u32,
    pub damage_dealt: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_shield_hit_debits_actual_hp_not_a_whole_stack() {
        let mut p = PlayerEntity::spawn("u1".into(), "Ada".into(), Vec2::ZERO, 0.0);
        p.add_shield_stack();
        assert!((p.current_shield - SHIELD_PER_STACK).abs() < 0.01);

        let (shield_delta, health_delta) = p.apply_damage(15.0);
        assert!((shield_delta - 15.0).abs() < 0.01);
        assert!((health_delta - 0.0).abs() < 0.01);
        assert!((p.current_shield - 35.0).abs() < 0.01);
        assert!((p.health - MAX_HEALTH).abs() < 0.01);
    }

    #[test]
    fn damage_spills_into_health_once_shield_is_depleted() {
        let mut p = PlayerEntity::spawn("u1".into(), "Ada".into(), Vec2::ZERO, 0.0);
        p.add_shield_stack();

        let (shield_delta, health_delta) = p.apply_damage(65.0);
        assert!((shield_delta - 50.0).abs() < 0.01);
        assert!((health_delta - 15.0).abs() < 0.01);
        assert!((p.current_shield - 0.0).abs() < 0.01);
        assert!((p.health - 85.0).abs() < 0.01);
    }

    #[test]
    fn add_shield_stack_tops_up_by_a_full_stack() {
        let mut p = PlayerEntity::spawn("u1".into(), "Ada".into(), Vec2::ZERO, 0.0);
        p.add_shield_stack();
        p.apply_damage(40.0);
        assert!((p.current_shield - 10.0).abs() < 0.01);

        p.add_shield_stack();
        assert!((p.current_shield - 60.0).abs() < 0.01);
        assert!((p.max_shield() - 100.0).abs() < 0.01);
    }
}
