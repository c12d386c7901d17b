//! Deterministic procedural obstacle/crate layout for a new match.
//!
//! Seeded via `rand`'s `StdRng::seed_from_u64` so tests can assert
//! reproducible layouts, the same seeding idiom used elsewhere in this
//! codebase for anything that needs reproducible randomness in tests.

use crate::protocol::{
    Crate, Loot, LootKind, Obstacle, ObstacleKind, Vec2, Weapon, MAP_HEIGHT, MAP_WIDTH, MAX_CRATES,
    MIN_CRATES, OBSTACLE_COVERAGE_FRACTION, OBSTACLE_MIN_SEPARATION,
};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

/// A freshly generated map ready to seed a new match.
#[derive(Debug, Clone)]
pub struct GeneratedMap {
    pub width: f32,
    pub height: f32,
    pub obstacles: Vec<Obstacle>,
    pub crates: Vec<Crate>,
}

impl GeneratedMap {
    /// Evenly spaced spawn points on a circle of radius 1/4 the map width,
    /// facing the map center.
    #[must_use]
    pub fn spawn_points(&self, player_count: usize) -> Vec<(Vec2, f32)> {
        let center = Vec2::new(self.width / 2.0, self.height / 2.0);
        let radius = self.width / 4.0;
        (0..player_count)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let angle = (i as f32 / player_count.max(1) as f32) * std::f32::consts::TAU;
                let position = center + Vec2::from_angle(angle).scaled(radius);
                let facing = (center - position).normalized();
                let facing_angle = facing.y.atan2(facing.x);
                (position, facing_angle)
            })
            .collect()
    }

    /// Returns true if `point` lies inside any obstacle (with `margin` padding).
    #[must_use]
    pub fn obstacle_contains(&self, point: Vec2, margin: f32) -> bool {
        self.obstacles.iter().any(|o| {
            let half_w = o.half_extents.x + margin;
            let half_h = o.half_extents.y + margin;
            (point.x - o.position.x).abs() <= half_w && (point.y - o.position.y).abs() <= half_h
        })
    }
}

/// Generate a map deterministically from `seed`. A seed of 0 means the
/// caller should randomize it upstream before calling (config default).
#[must_use]
pub fn generate(seed: u64) -> GeneratedMap {
    let mut rng = StdRng::seed_from_u64(seed);

    let obstacles = generate_obstacles(&mut rng);
    let crates = generate_crates(&mut rng, &obstacles);

    GeneratedMap {
        width: MAP_WIDTH,
        height: MAP_HEIGHT,
        obstacles,
        crates,
    }
}

fn generate_obstacles(rng: &mut StdRng) -> Vec<Obstacle> {
    let target_area = MAP_WIDTH * MAP_HEIGHT * OBSTACLE_COVERAGE_FRACTION;
    let mut covered = 0.0f32;
    let mut obstacles = Vec::new();
    let mut attempts = 0u32;

    while covered < target_area && attempts < 500 {
        attempts += 1;
        let half_w = rng.random_range(40.0..160.0);
        let half_h = rng.random_range(40.0..160.0);
        let position = Vec2::new(
            rng.random_range(half_w..(MAP_WIDTH - half_w)),
            rng.random_range(half_h..(MAP_HEIGHT - half_h)),
        );

        let overlaps = obstacles
            .iter()
            .any(|existing: &Obstacle| position.distance(existing.position) < OBSTACLE_MIN_SEPARATION);
        if overlaps {
            continue;
        }

        covered += half_w * 2.0 * half_h * 2.0;
        obstacles.push(Obstacle {
            id: uuid::Uuid::new_v4(),
            position,
            half_extents: Vec2::new(half_w, half_h),
            kind: ObstacleKind::Wall,
            destructible: false,
            health: 0.0,
        });
    }

    obstacles
}

fn generate_crates(rng: &mut StdRng, obstacles: &[Obstacle]) -> Vec<Crate> {
    let crate_count = rng.random_range(MIN_CRATES..=MAX_CRATES);
    let mut crates = Vec::with_capacity(crate_count as usize);
    let mut attempts = 0u32;

    while crates.len() < crate_count as usize && attempts < 2000 {
        attempts += 1;
        let position = Vec2::new(
            rng.random_range(0.0..MAP_WIDTH),
            rng.random_range(0.0..MAP_HEIGHT),
        );

        let blocked = obstacles.iter().any(|o| o.contains(position));
        if blocked {
            continue;
        }

        crates.push(Crate {
            id: uuid::Uuid::new_v4(),
            position,
            opened: false,
            loot: weighted_loot(rng, position),
        });
    }

    crates
}

/// Weapons drop more often than stat-boost pickups.
fn weighted_loot(rng: &mut StdRng, position: Vec2) -> Loot {
    let roll: f32 = rng.random_range(0.0..1.0);
    let kind = if roll < 0.55 {
        let weapon = match rng.random_range(0..4) {
            0 => Weapon::Pistol,
            1 => Weapon::Rifle,
            2 => Weapon::Shotgun,
            _ => Weapon::Sniper,
        };
        LootKind::Weapon(weapon)
    } else if roll < 0.70 {
        LootKind::Shield
    } else if roll < 0.85 {
        LootKind::DamageBoost
    } else {
        LootKind::FireRateBoost
    };

    Loot {
        id: uuid::Uuid::new_v4(),
        kind,
        position,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_produces_identical_layout() {
        let a = generate(42);
        let b = generate(42);
        assert_eq!(a.obstacles.len(), b.obstacles.len());
        assert_eq!(a.crates.len(), b.crates.len());
        for (oa, ob) in a.obstacles.iter().zip(b.obstacles.iter()) {
            assert_eq!(oa.position, ob.position);
        }
    }

    #[test]
    fn crate_count_within_spec_bounds() {
        let map = generate(7);
        assert!(map.crates.len() >= MIN_CRATES as usize);
        assert!(map.crates.len() <= MAX_CRATES as usize);
    }

    #[test]
    fn no_crate_intersects_an_obstacle() {
        let map = generate(11);
        for c in &map.crates {
            assert!(!map.obstacle_contains(c.position, 0.0));
        }
    }

    #[test]
    fn spawn_points_are_evenly_spaced_on_the_circle() {
        let map = generate(3);
        let points = map.spawn_points(8);
        assert_eq!(points.len(), 8);
        let center = Vec2::new(map.width / 2.0, map.height / 2.0);
        let radius = map.width / 4.0;
        for (p, _) in points {
            assert!((p.distance(center) - radius).abs() < 1.0);
        }
    }
}
