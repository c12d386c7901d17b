//! Movement and collision resolution for the tick engine: axis-separated
//! obstacle sweeps, map-bound clamping, and projectile hit testing.

use crate::protocol::{
    Obstacle, Vec2, MAP_HEIGHT, MAP_WIDTH, PLAYER_RADIUS, PROJECTILE_RADIUS,
};

/// Move `position` by `delta`, clamped to the map bounds and resolved
/// against `obstacles` one axis at a time: if moving on an axis would put
/// the player's collision circle inside an obstacle, that axis's movement
/// is discarded and the other still applies.
#[must_use]
pub fn resolve_player_movement(position: Vec2, delta: Vec2, obstacles: &[Obstacle]) -> Vec2 {
    let mut resolved = position;

    let stepped_x = clamp_to_map(Vec2::new(resolved.x + delta.x, resolved.y));
    if !collides(stepped_x, obstacles) {
        resolved.x = stepped_x.x;
    }

    let stepped_y = clamp_to_map(Vec2::new(resolved.x, resolved.y + delta.y));
    if !collides(stepped_y, obstacles) {
        resolved.y = stepped_y.y;
    }

    resolved
}

fn clamp_to_map(point: Vec2) -> Vec2 {
    Vec2::new(
        point.x.clamp(PLAYER_RADIUS, MAP_WIDTH - PLAYER_RADIUS),
        point.y.clamp(PLAYER_RADIUS, MAP_HEIGHT - PLAYER_RADIUS),
    )
}

fn collides(point: Vec2, obstacles: &[Obstacle]) -> bool {
    obstacles.iter().any(|o| {
        (point.x - o.position.x).abs() <= o.half_extents.x + PLAYER_RADIUS
            && (point.y - o.position.y).abs() <= o.half_extents.y + PLAYER_RADIUS
    })
}

/// Whether a projectile centered at `point` intersects any obstacle.
#[must_use]
pub fn projectile_hits_obstacle(point: Vec2, obstacles: &[Obstacle]) -> bool {
    obstacles.iter().any(|o| {
        (point.x - o.position.x).abs() <= o.half_extents.x + PROJECTILE_RADIUS
            && (point.y - o.position.y).abs() <= o.half_extents.y + PROJECTILE_RADIUS
    })
}

/// Circle-point hit test between a projectile and a player, combined
/// radius `PlayerRadius + ProjectileRadius`.
#[must_use]
pub fn projectile_hits_player(projectile_pos: Vec2, player_pos: Vec2) -> bool {
    projectile_pos.distance(player_pos) <= PLAYER_RADIUS + PROJECTILE_RADIUS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ObstacleKind;

    fn wall(position: Vec2) -> Obstacle {
        Obstacle {
            id: uuid::Uuid::new_v4(),
            position,
            half_extents: Vec2::new(50.0, 50.0),
            kind: ObstacleKind::Wall,
            destructible: false,
            health: 0.0,
        }
    }

    #[test]
    fn movement_clamps_to_map_bounds() {
        let moved = resolve_player_movement(Vec2::new(5.0, 5.0), Vec2::new(-100.0, -100.0), &[]);
        assert_eq!(moved.x, PLAYER_RADIUS);
        assert_eq!(moved.y, PLAYER_RADIUS);
    }

    #[test]
    fn obstacle_blocks_only_the_offending_axis() {
        let obstacles = [wall(Vec2::new(200.0, 100.0))];
        // Approaching from directly left: x-movement into the wall is
        // rejected, y-movement (which doesn't enter it) still applies.
        let moved = resolve_player_movement(
            Vec2::new(100.0, 100.0),
            Vec2::new(80.0, 10.0),
            &obstacles,
        );
        assert_eq!(moved.x, 100.0);
        assert_eq!(moved.y, 110.0);
    }

    #[test]
    fn projectile_hit_radius_is_sum_of_radii() {
        let player_pos = Vec2::new(0.0, 0.0);
        let just_inside = Vec2::new(PLAYER_RADIUS + PROJECTILE_RADIUS - 0.1, 0.0);
        let just_outside = Vec2::new(PLAYER_RADIUS + PROJECTILE_RADIUS + 0.1, 0.0);
        assert!(projectile_hits_player(just_inside, player_pos));
        assert!(!projectile_hits_player(just_outside, player_pos));
    }
}
