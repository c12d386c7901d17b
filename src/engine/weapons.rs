//! Weapon fire resolution: cooldown gating and projectile spawning from
//! the authoritative table in `protocol::types::Weapon::stats`.

use crate::protocol::{EntityId, PlayerEntity, Projectile, Vec2};

/// Whether `player` may fire again at `current_tick`, accounting for the
/// fire-rate stack cooldown reduction.
#[must_use]
pub fn can_fire(player: &PlayerEntity, current_tick: u64, tick_rate_hz: u32) -> bool {
    let Some(last_tick) = player.last_fire_tick else {
        return true;
    };
    let cooldown_ticks = ms_to_ticks(player.effective_cooldown(), tick_rate_hz);
    current_tick.saturating_sub(last_tick) >= cooldown_ticks
}

fn ms_to_ticks(ms: u64, tick_rate_hz: u32) -> u64 {
    (ms * u64::from(tick_rate_hz)).div_ceil(1000).max(1)
}

/// Build the projectile fired by `player` at `current_tick`, aimed at
/// `aim_angle`. Damage already bakes in the player's damage stacks.
#[must_use]
pub fn spawn_projectile(
    player: &PlayerEntity,
    current_tick: u64,
    aim_angle: f32,
    client_timestamp_ms: Option<i64>,
    tick_rate_hz: u32,
) -> Projectile {
    let stats = player.weapon.stats();
    let direction = Vec2::from_angle(aim_angle);
    Projectile {
        id: EntityId::new_v4(),
        owner: player.user_id.clone(),
        position: player.position,
        start_position: player.position,
        velocity: direction.scaled(stats.projectile_speed),
        damage: stats.base_damage * player.damage_multiplier(),
        weapon: player.weapon,
        spawned_tick: current_tick,
        client_timestamp_ms,
        max_range: stats.range,
        lifetime_ticks: ms_to_ticks(stats.lifetime_ms, tick_rate_hz)
            .try_into()
            .unwrap_or(u32::MAX),
        ticks_alive: 0,
    }
}
