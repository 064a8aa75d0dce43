//! Movement system - steers enemies toward the player and integrates them.

use crate::components::*;
use crate::config::SimConfig;
use crate::pool::PassAction;
use crate::spatial::SpatialGrid;
use bevy_ecs::prelude::*;
use tracing::debug;

/// Resource containing the delta time for the current tick.
#[derive(Resource, Default)]
pub struct DeltaTime(pub f32);

/// Global simulation tick counter. Increments once per fixed update.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct SimTick(pub u64);

impl SimTick {
    pub fn increment(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }
}

/// When set, enemy positions are integrated on the offload pool and this
/// system only steers.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct OffloadedIntegration(pub bool);

/// System that steers every enemy toward the player, integrates it and
/// keeps the spatial grid current. Enemies that drift past the despawn
/// distance are recycled.
pub fn enemy_movement_system(
    dt: Res<DeltaTime>,
    config: Res<SimConfig>,
    player: Res<Player>,
    offloaded: Option<Res<OffloadedIntegration>>,
    mut enemies: ResMut<EnemyPool>,
    mut grid: ResMut<SpatialGrid>,
) {
    let delta = dt.0;
    let integrate = !offloaded.is_some_and(|o| o.0);
    let despawn_sq = config.despawn_distance * config.despawn_distance;
    let (px, py) = (player.x, player.y);

    let recycled = enemies.for_each_active_mut(|handle, enemy| {
        let dx = px - enemy.x;
        let dy = py - enemy.y;
        let dist_sq = dx * dx + dy * dy;
        if dist_sq > despawn_sq {
            grid.remove(handle);
            return PassAction::Release;
        }

        let dist = dist_sq.sqrt();
        if dist < 1.0 {
            // Arrived; contact damage handles the rest
            enemy.vx = 0.0;
            enemy.vy = 0.0;
        } else {
            enemy.vx = (dx / dist) * enemy.speed;
            enemy.vy = (dy / dist) * enemy.speed;
        }

        if integrate {
            enemy.x += enemy.vx * delta;
            enemy.y += enemy.vy * delta;
            grid.refresh(handle, enemy.x, enemy.y);
        }
        PassAction::Keep
    });

    if recycled > 0 {
        debug!(recycled, "far enemies recycled");
    }
}
