//! 30 Hz authoritative simulation: the sole writer of one match's world
//! state. Owns players, projectiles, the map, and the safe zone; everything
//! outside this module reads state only through the broadcast snapshot
//! channel, mirroring the single-writer discipline the teacher applies to
//! its connection registry (one lock owner, read-mostly outside).

pub mod physics;
pub mod weapons;

use crate::config::EngineConfig;
use crate::mapgen::GeneratedMap;
use crate::protocol::{
    is_guest, Crate, EntityId, GameStateSnapshot, LootKind, LootSnapshot, MatchPhase, PlayerEntity,
    PlayerSnapshot, Projectile, ProjectileSnapshot, RankingEntry, SafeZone, SafeZoneSnapshot, UserId,
    Vec2, Weapon, BASE_MOVE_SPEED, LOOT_COLLECTION_RADIUS, MAP_HEIGHT, MAP_WIDTH,
    SAFE_ZONE_DAMAGE_PER_TICK, SAFE_ZONE_FLOOR_RADIUS, SNAPSHOT_INTEREST_RADIUS,
};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

/// One player's continuously-updated movement/aim state, applied every
/// tick until a newer input replaces it.
#[derive(Debug, Clone, Copy, Default)]
struct MoveIntent {
    up: bool,
    down: bool,
    left: bool,
    right: bool,
    aim_angle: f32,
    shoot: bool,
}

/// Inputs the router forwards into a running match's engine.
#[derive(Debug, Clone)]
pub enum EngineInput {
    /// A `player_input` frame: continuous movement/aim/fire state.
    Move {
        up: bool,
        down: bool,
        left: bool,
        right: bool,
        shoot: bool,
        aim_angle: f32,
    },
    /// A `shoot` frame: one precision shot resolved with lag-compensated
    /// rewind of the target's position.
    Shoot {
        aim_angle: f32,
        client_timestamp_ms: i64,
    },
    CollectLoot {
        entity_id: EntityId,
    },
    SwitchWeapon {
        weapon: Weapon,
    },
}

/// Rewind buffer depth: `lag_compensation_window_ms` worth of ticks.
const HISTORY_CAPACITY: usize = 8;

/// Handle returned to the Match Controller to talk to a spawned engine.
/// `snapshot_tx` is kept (not just a receiver) so the controller can hand
/// out a fresh `subscribe()` to every connection that joins the match.
pub struct EngineHandle {
    pub input_tx: mpsc::Sender<(UserId, EngineInput)>,
    pub snapshot_tx: broadcast::Sender<GameStateSnapshot>,
    pub cancel: CancellationToken,
}

/// Final, per-match simulation output handed to the persistence adapter.
pub struct EngineOutcome {
    pub rankings: Vec<RankingEntry>,
    pub players: Vec<PlayerEntity>,
    pub duration_ticks: u64,
}

pub struct TickEngine {
    players: HashMap<UserId, PlayerEntity>,
    intents: HashMap<UserId, MoveIntent>,
    position_history: HashMap<UserId, VecDeque<(u64, Vec2)>>,
    death_ticks: HashMap<UserId, u64>,
    projectiles: Vec<Projectile>,
    obstacles: Vec<crate::protocol::Obstacle>,
    crates: Vec<Crate>,
    safe_zone: SafeZone,
    tick: u64,
    tick_rate_hz: u32,
    lag_compensation_ticks: u64,
    input_rx: mpsc::Receiver<(UserId, EngineInput)>,
    snapshot_tx: broadcast::Sender<GameStateSnapshot>,
    cancel: CancellationToken,
}

impl TickEngine {
    /// Build a fresh engine for a match: spawns every player evenly on the
    /// map's spawn circle, builds the full snapshot channel pair, and
    /// returns both the engine (to run) and the handle (to drive it).
    #[must_use]
    pub fn new(
        map: &GeneratedMap,
        players: Vec<(UserId, String)>,
        config: &EngineConfig,
    ) -> (Self, EngineHandle) {
        let spawn_points = map.spawn_points(players.len());
        let mut entities = HashMap::with_capacity(players.len());
        for ((user_id, username), (position, facing)) in players.into_iter().zip(spawn_points) {
            entities.insert(
                user_id.clone(),
                PlayerEntity::spawn(user_id, username, position, facing),
            );
        }

        let (input_tx, input_rx) = mpsc::channel(256);
        let (snapshot_tx, _) = broadcast::channel(64);
        let cancel = CancellationToken::new();

        let center = Vec2::new(map.width / 2.0, map.height / 2.0);
        let initial_radius = map.width / 2.0;
        let safe_zone = SafeZone {
            center,
            current_radius: initial_radius,
            target_radius: SAFE_ZONE_FLOOR_RADIUS,
            next_shrink_tick: config.tick_rate_hz as u64 * crate::protocol::SAFE_ZONE_HOLD_SECS,
        };

        let engine = Self {
            players: entities,
            intents: HashMap::new(),
            position_history: HashMap::new(),
            death_ticks: HashMap::new(),
            projectiles: Vec::new(),
            obstacles: map.obstacles.clone(),
            crates: map.crates.clone(),
            safe_zone,
            tick: 0,
            tick_rate_hz: config.tick_rate_hz,
            lag_compensation_ticks: config.lag_compensation_ticks(),
            input_rx,
            snapshot_tx: snapshot_tx.clone(),
            cancel: cancel.clone(),
        };

        let handle = EngineHandle {
            input_tx,
            snapshot_tx,
            cancel,
        };

        (engine, handle)
    }

    /// Run the tick loop until cancelled, publishing a snapshot after each
    /// tick. Returns final rankings once the loop exits.
    pub async fn run(mut self) -> EngineOutcome {
        let tick_ms = 1000 / u64::from(self.tick_rate_hz.max(1));
        let mut interval = tokio::time::interval(Duration::from_millis(tick_ms));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                _ = interval.tick() => {
                    self.step();
                    // A send error just means no receivers are currently
                    // subscribed; the simulation keeps running regardless.
                    let _ = self.snapshot_tx.send(self.build_snapshot());
                }
            }
        }

        self.finish()
    }

    /// One 30 Hz tick: drain inputs, move, fire, advance projectiles,
    /// apply damage, shrink the safe zone, resolve loot.
    fn step(&mut self) {
        self.drain_inputs();
        self.apply_movement();
        self.resolve_fire();
        self.advance_projectiles();
        self.apply_safe_zone_damage();
        self.resolve_loot_pickups();
        self.record_history();
        self.tick += 1;
    }

    fn drain_inputs(&mut self) {
        while let Ok((user_id, input)) = self.input_rx.try_recv() {
            match input {
                EngineInput::Move {
                    up,
                    down,
                    left,
                    right,
                    shoot,
                    aim_angle,
                } => {
                    self.intents.insert(
                        user_id,
                        MoveIntent {
                            up,
                            down,
                            left,
                            right,
                            aim_angle,
                            shoot,
                        },
                    );
                }
                EngineInput::Shoot {
                    aim_angle,
                    client_timestamp_ms,
                } => self.resolve_lag_compensated_shot(&user_id, aim_angle, client_timestamp_ms),
                EngineInput::CollectLoot { entity_id: _ } => {
                    // Crates and dropped loot auto-resolve by proximity
                    // each tick; an explicit collect is a no-op nudge.
                }
                EngineInput::SwitchWeapon { weapon } => {
                    if let Some(player) = self.players.get_mut(&user_id) {
                        player.weapon = weapon;
                    }
                }
            }
        }
    }

    fn apply_movement(&mut self) {
        for (user_id, player) in &mut self.players {
            if !player.alive {
                continue;
            }
            let Some(intent) = self.intents.get(user_id) else {
                continue;
            };

            let mut direction = Vec2::ZERO;
            if intent.up {
                direction.y -= 1.0;
            }
            if intent.down {
                direction.y += 1.0;
            }
            if intent.left {
                direction.x -= 1.0;
            }
            if intent.right {
                direction.x += 1.0;
            }

            player.facing = intent.aim_angle;
            if direction.length_sq() > f32::EPSILON {
                let delta = direction.normalized().scaled(BASE_MOVE_SPEED);
                player.position = physics::resolve_player_movement(
                    player.position,
                    delta,
                    &self.obstacles,
                );
                player.velocity = delta;
            } else {
                player.velocity = Vec2::ZERO;
            }
        }
    }

    fn resolve_fire(&mut self) {
        let current_tick = self.tick;
        let tick_rate = self.tick_rate_hz;
        let mut spawned = Vec::new();

        for (user_id, player) in &mut self.players {
            if !player.alive {
                continue;
            }
            let Some(intent) = self.intents.get(user_id) else {
                continue;
            };
            if intent.shoot && weapons::can_fire(player, current_tick, tick_rate) {
                player.last_fire_tick = Some(current_tick);
                spawned.push(weapons::spawn_projectile(
                    player,
                    current_tick,
                    intent.aim_angle,
                    None,
                    tick_rate,
                ));
            }
        }

        self.projectiles.extend(spawned);
    }

    /// Instant lag-compensated shot: rewinds every other living player's
    /// position to `now - lag` before hit-testing a single ray, per the
    /// 200 ms / 6-tick rewind window. Never mutates recorded history.
    fn resolve_lag_compensated_shot(
        &mut self,
        shooter_id: &UserId,
        aim_angle: f32,
        client_timestamp_ms: i64,
    ) {
        let Some(shooter) = self.players.get(shooter_id) else {
            return;
        };
        if !shooter.alive || !weapons::can_fire(shooter, self.tick, self.tick_rate_hz) {
            return;
        }

        let shooter_pos = shooter.position;
        let stats = shooter.weapon.stats();
        let damage = stats.base_damage * shooter.damage_multiplier();
        let range = stats.range;

        let lag_ticks = self.estimate_lag_ticks(client_timestamp_ms);
        let rewind_tick = self.tick.saturating_sub(lag_ticks);

        let ray = Vec2::from_angle(aim_angle);
        let mut best_hit: Option<(UserId, f32)> = None;

        for (user_id, player) in &self.players {
            if user_id == shooter_id || !player.alive {
                continue;
            }
            let rewound = self.rewound_position(user_id, rewind_tick).unwrap_or(player.position);
            let to_target = rewound - shooter_pos;
            let along = to_target.x * ray.x + to_target.y * ray.y;
            if !(0.0..=range).contains(&along) {
                continue;
            }
            let closest = Vec2::new(shooter_pos.x + ray.x * along, shooter_pos.y + ray.y * along);
            let perpendicular = closest.distance(rewound);
            if perpendicular <= crate::protocol::PLAYER_RADIUS {
                match &best_hit {
                    Some((_, best_along)) if *best_along <= along => {}
                    _ => best_hit = Some((user_id.clone(), along)),
                }
            }
        }

        if let Some((target_id, _)) = best_hit {
            self.apply_hit(shooter_id.clone(), &target_id, damage);
        }

        if let Some(shooter) = self.players.get_mut(shooter_id) {
            shooter.last_fire_tick = Some(self.tick);
        }
    }

    fn estimate_lag_ticks(&self, client_timestamp_ms: i64) -> u64 {
        let now_ms = i64::try_from(self.tick * 1000 / u64::from(self.tick_rate_hz.max(1)))
            .unwrap_or(i64::MAX);
        let lag_ms = (now_ms - client_timestamp_ms).max(0);
        let lag_ticks = (lag_ms as u64 * u64::from(self.tick_rate_hz)) / 1000;
        lag_ticks.min(self.lag_compensation_ticks)
    }

    fn rewound_position(&self, user_id: &UserId, target_tick: u64) -> Option<Vec2> {
        let history = self.position_history.get(user_id)?;
        history
            .iter()
            .min_by_key(|(tick, _)| tick.abs_diff(target_tick))
            .map(|(_, pos)| *pos)
    }

    fn advance_projectiles(&mut self) {
        let mut hits = Vec::new();
        self.projectiles.retain_mut(|projectile| {
            projectile.position = projectile.position + projectile.velocity;
            projectile.ticks_alive += 1;

            if projectile.traveled() > projectile.max_range {
                return false;
            }
            let lifetime_exceeded = u64::from(projectile.ticks_alive)
                >= (u64::from(projectile.weapon.stats().lifetime_ms) * u64::from(self.tick_rate_hz))
                    / 1000;
            if lifetime_exceeded {
                return false;
            }
            if physics::projectile_hits_obstacle(projectile.position, &self.obstacles) {
                return false;
            }

            for (user_id, player) in &self.players {
                if user_id == &projectile.owner || !player.alive {
                    continue;
                }
                if physics::projectile_hits_player(projectile.position, player.position) {
                    hits.push((projectile.owner.clone(), user_id.clone(), projectile.damage));
                    return false;
                }
            }

            true
        });

        for (shooter, target, damage) in hits {
            self.apply_hit(shooter, &target, damage);
        }
    }

    fn apply_hit(&mut self, shooter_id: UserId, target_id: &UserId, damage: f32) {
        let was_alive = self.players.get(target_id).is_some_and(|p| p.alive);
        if let Some(target) = self.players.get_mut(target_id) {
            target.apply_damage(damage);
            if was_alive && !target.alive {
                self.death_ticks.insert(target_id.clone(), self.tick);
            }
        }
        if let Some(shooter) = self.players.get_mut(&shooter_id) {
            shooter.damage_dealt += damage;
            if was_alive && !self.players.get(target_id).is_some_and(|p| p.alive) {
                shooter.kills += 1;
            }
        }
    }

    fn apply_safe_zone_damage(&mut self) {
        self.update_safe_zone();
        let center = self.safe_zone.center;
        let radius = self.safe_zone.current_radius;
        for player in self.players.values_mut() {
            if player.alive && player.position.distance(center) > radius {
                player.apply_damage(SAFE_ZONE_DAMAGE_PER_TICK);
            }
        }
    }

    fn update_safe_zone(&mut self) {
        let hold_ticks = u64::from(self.tick_rate_hz) * crate::protocol::SAFE_ZONE_HOLD_SECS;
        let shrink_ticks = u64::from(self.tick_rate_hz) * crate::protocol::SAFE_ZONE_SHRINK_SECS;
        let initial_radius = MAP_WIDTH.max(MAP_HEIGHT) / 2.0;

        if self.tick < hold_ticks {
            self.safe_zone.current_radius = initial_radius;
            self.safe_zone.next_shrink_tick = hold_ticks;
        } else {
            let elapsed = (self.tick - hold_ticks).min(shrink_ticks);
            #[allow(clippy::cast_precision_loss)]
            let progress = elapsed as f32 / shrink_ticks as f32;
            self.safe_zone.current_radius =
                initial_radius + (SAFE_ZONE_FLOOR_RADIUS - initial_radius) * progress;
            self.safe_zone.next_shrink_tick = hold_ticks + shrink_ticks;
        }
    }

    fn resolve_loot_pickups(&mut self) {
        let mut grants: Vec<(UserId, LootKind)> = Vec::new();
        for c in &mut self.crates {
            if c.opened {
                continue;
            }
            for player in self.players.values() {
                if player.alive && player.position.distance(c.position) <= LOOT_COLLECTION_RADIUS {
                    grants.push((player.user_id.clone(), c.loot.kind));
                    c.opened = true;
                    break;
                }
            }
        }

        for (user_id, kind) in grants {
            if let Some(player) = self.players.get_mut(&user_id) {
                match kind {
                    LootKind::Weapon(weapon) => player.weapon = weapon,
                    LootKind::Shield => {
                        player.add_shield_stack();
                    }
                    LootKind::DamageBoost => {
                        player.add_damage_stack();
                    }
                    LootKind::FireRateBoost => {
                        player.add_fire_rate_stack();
                    }
                }
            }
        }
    }

    fn record_history(&mut self) {
        for player in self.players.values() {
            let history = self
                .position_history
                .entry(player.user_id.clone())
                .or_insert_with(|| VecDeque::with_capacity(HISTORY_CAPACITY));
            history.push_back((self.tick, player.position));
            while history.len() > HISTORY_CAPACITY {
                history.pop_front();
            }
        }
    }

    fn build_snapshot(&self) -> GameStateSnapshot {
        let rankings = self.live_rankings();
        GameStateSnapshot {
            tick: self.tick,
            players: self
                .players
                .values()
                .map(|p| PlayerSnapshot {
                    user_id: p.user_id.clone(),
                    username: p.username.clone(),
                    position: p.position,
                    velocity: p.velocity,
                    rotation: p.facing,
                    health: p.health,
                    shield: p.current_shield,
                    kills: p.kills,
                    is_alive: p.alive,
                })
                .collect(),
            projectiles: self
                .projectiles
                .iter()
                .filter(|proj| {
                    self.players
                        .values()
                        .any(|p| p.position.distance(proj.position) <= SNAPSHOT_INTEREST_RADIUS)
                })
                .map(|proj| ProjectileSnapshot {
                    id: proj.id,
                    owner: proj.owner.clone(),
                    position: proj.position,
                    weapon: proj.weapon,
                })
                .collect(),
            loot: Vec::new(),
            crates: self
                .crates
                .iter()
                .map(|c| crate::protocol::CrateSnapshot {
                    id: c.id,
                    position: c.position,
                    opened: c.opened,
                })
                .collect(),
            safe_zone: SafeZoneSnapshot {
                center: self.safe_zone.center,
                current_radius: self.safe_zone.current_radius,
                target_radius: self.safe_zone.target_radius,
                next_shrink_tick: self.safe_zone.next_shrink_tick,
            },
            phase: MatchPhase::Playing,
            rankings,
        }
    }

    fn live_rankings(&self) -> Vec<crate::protocol::RankingSnapshot> {
        let mut entries: Vec<_> = self.players.values().collect();
        entries.sort_by_key(|p| {
            let death_tick = self.death_ticks.get(&p.user_id).copied().unwrap_or(u64::MAX);
            (std::cmp::Reverse(death_tick), std::cmp::Reverse(p.kills))
        });
        entries
            .into_iter()
            .enumerate()
            .map(|(idx, p)| crate::protocol::RankingSnapshot {
                user_id: p.user_id.clone(),
                username: p.username.clone(),
                kills: p.kills,
                placement: u32::try_from(idx + 1).unwrap_or(u32::MAX),
            })
            .collect()
    }

    /// Number of players still alive; used by the controller's
    /// end-condition check.
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.players.values().filter(|p| p.alive).count()
    }

    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    fn finish(self) -> EngineOutcome {
        let mut entries: Vec<_> = self.players.values().cloned().collect();
        entries.sort_by_key(|p| {
            let death_tick = self.death_ticks.get(&p.user_id).copied().unwrap_or(u64::MAX);
            (std::cmp::Reverse(death_tick), std::cmp::Reverse(p.kills))
        });

        let rankings = entries
            .iter()
            .enumerate()
            .map(|(idx, p)| RankingEntry {
                user_id: p.user_id.clone(),
                username: p.username.clone(),
                placement: u32::try_from(idx + 1).unwrap_or(u32::MAX),
                kills: p.kills,
                damage_dealt: p.damage_dealt,
            })
            .collect();

        EngineOutcome {
            rankings,
            players: entries,
            duration_ticks: self.tick,
        }
    }
}

/// MMR delta is computed in the persistence adapter; this helper is only
/// used there to decide whether a user id should be skipped entirely.
#[must_use]
pub fn skip_for_persistence(user_id: &UserId) -> bool {
    is_guest(user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn test_engine(player_count: usize) -> (TickEngine, EngineHandle) {
        let map = crate::mapgen::generate(1);
        let players = (0..player_count)
            .map(|i| (format!("user-{i}"), format!("Player{i}")))
            .collect();
        TickEngine::new(&map, players, &EngineConfig::default())
    }

    #[test]
    fn spawns_all_players_distinct_positions() {
        let (engine, _handle) = test_engine(4);
        assert_eq!(engine.players.len(), 4);
        assert_eq!(engine.alive_count(), 4);
    }

    #[test]
    fn movement_intent_moves_player_toward_direction() {
        let (mut engine, _handle) = test_engine(1);
        let user_id = "user-0".to_string();
        let start = engine.players[&user_id].position;
        engine.intents.insert(
            user_id.clone(),
            MoveIntent {
                right: true,
                ..Default::default()
            },
        );
        engine.apply_movement();
        let moved = engine.players[&user_id].position;
        assert!(moved.x > start.x);
    }

    #[test]
    fn safe_zone_holds_before_shrink_window() {
        let (mut engine, _handle) = test_engine(2);
        engine.tick = 10;
        engine.update_safe_zone();
        let initial_radius = MAP_WIDTH.max(MAP_HEIGHT) / 2.0;
        assert_eq!(engine.safe_zone.current_radius, initial_radius);
    }

    #[test]
    fn safe_zone_reaches_floor_after_hold_plus_shrink() {
        let (mut engine, _handle) = test_engine(2);
        let hold_ticks = u64::from(engine.tick_rate_hz) * crate::protocol::SAFE_ZONE_HOLD_SECS;
        let shrink_ticks = u64::from(engine.tick_rate_hz) * crate::protocol::SAFE_ZONE_SHRINK_SECS;
        engine.tick = hold_ticks + shrink_ticks;
        engine.update_safe_zone();
        assert!((engine.safe_zone.current_radius - SAFE_ZONE_FLOOR_RADIUS).abs() < 0.01);
    }

    #[test]
    fn final_rankings_rank_last_alive_first_then_kills() {
        let (mut engine, _handle) = test_engine(3);
        engine.death_ticks.insert("user-0".to_string(), 10);
        engine.death_ticks.insert("user-1".to_string(), 20);
        if let Some(p) = engine.players.get_mut("user-2") {
            p.kills = 5;
        }
        let outcome = engine.finish();
        assert_eq!(outcome.rankings[0].user_id, "user-2");
        assert_eq!(outcome.rankings[1].user_id, "user-1");
        assert_eq!(outcome.rankings[2].user_id, "user-0");
        assert_eq!(outcome.rankings[0].placement, 1);
    }
}
