//! Wave director - time-based enemy spawning around the player.
//!
//! The spawn rate ramps linearly with elapsed time; the kind mix shifts
//! from small enemies toward large ones and elites. Spawns that hit the
//! enemy pool cap are dropped and counted, never retried.

use crate::boss::{Boss, BossSlot};
use crate::components::*;
use crate::config::{SimConfig, WaveConfig};
use crate::error::SimError;
use crate::spatial::SpatialGrid;
use crate::systems::movement::DeltaTime;
use bevy_ecs::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;
use tracing::{debug, info};

/// Seeded random source shared by spawning, crit rolls and loot.
#[derive(Resource)]
pub struct SimRng(pub StdRng);

impl SimRng {
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

#[derive(Resource, Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaveDirector {
    /// Seconds of run time.
    pub elapsed: f32,
    /// Fractional spawns carried to the next frame.
    pub accumulator: f32,
    pub spawned: u64,
    pub boss_spawned: bool,
}

impl WaveDirector {
    /// Enemies per second at the current elapsed time.
    pub fn spawn_rate(&self, config: &WaveConfig) -> f32 {
        (config.base_rate + config.rate_growth_per_minute * self.elapsed / 60.0).max(0.0)
    }

    /// Pick a kind from a uniform roll in `[0, 1)`.
    pub fn kind_for(&self, roll: f32) -> EnemyKind {
        let minutes = self.elapsed / 60.0;
        let elite = (0.01 + 0.01 * minutes).min(0.08);
        let large = (0.04 * minutes).min(0.25);
        let medium = (0.15 + 0.08 * minutes).min(0.45);
        if roll < elite {
            EnemyKind::Elite
        } else if roll < elite + large {
            EnemyKind::Large
        } else if roll < elite + large + medium {
            EnemyKind::Medium
        } else {
            EnemyKind::Small
        }
    }
}

fn ring_point(rng: &mut StdRng, cx: f32, cy: f32, config: &WaveConfig) -> (f32, f32) {
    let angle = rng.gen_range(0.0..TAU);
    let (lo, hi) = (config.spawn_radius_min, config.spawn_radius_max.max(config.spawn_radius_min));
    let r = if hi > lo { rng.gen_range(lo..hi) } else { lo };
    (cx + angle.cos() * r, cy + angle.sin() * r)
}

#[allow(clippy::too_many_arguments)]
pub fn wave_spawn_system(
    dt: Res<DeltaTime>,
    config: Res<SimConfig>,
    player: Res<Player>,
    mut director: ResMut<WaveDirector>,
    mut rng: ResMut<SimRng>,
    mut enemies: ResMut<EnemyPool>,
    mut grid: ResMut<SpatialGrid>,
    mut boss: ResMut<BossSlot>,
) {
    let waves = &config.waves;
    if !waves.enabled || !player.is_alive() {
        return;
    }
    director.elapsed += dt.0;
    let rate = director.spawn_rate(waves);
    director.accumulator += rate * dt.0;
    let count = director.accumulator.floor() as usize;
    director.accumulator -= count as f32;

    // Large bursts go in unindexed and the grid is rebuilt once at the end.
    let bulk = count >= waves.bulk_threshold;
    let mut dropped = 0;
    for _ in 0..count {
        let (x, y) = ring_point(&mut rng.0, player.x, player.y, waves);
        let kind = director.kind_for(rng.0.gen());
        match enemies.spawn(Enemy::new(kind, x, y)) {
            Ok(handle) => {
                director.spawned += 1;
                if !bulk {
                    grid.insert(handle, x, y);
                }
            }
            Err(_) => dropped += 1,
        }
    }
    if bulk {
        grid.rebuild(&*enemies, |e: &Enemy| (e.x, e.y));
        debug!(count, "bulk spawn, grid rebuilt");
    }
    if dropped > 0 {
        debug!(dropped, capacity = enemies.capacity(), "wave spawns dropped at capacity");
    }

    if waves.boss_at >= 0.0 && !director.boss_spawned && director.elapsed >= waves.boss_at {
        let (x, y) = ring_point(&mut rng.0, player.x, player.y, waves);
        match boss.spawn(Boss::new(x, y)) {
            Ok(serial) => {
                director.boss_spawned = true;
                info!(serial, elapsed = director.elapsed, "wave boss arrived");
            }
            Err(SimError::BossAlreadyActive) => director.boss_spawned = true,
            Err(err) => debug!(error = %err, "boss spawn skipped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolLimits;

    fn wave_world(enemy_cap: usize) -> World {
        let mut world = World::new();
        world.insert_resource(DeltaTime(1.0));
        world.insert_resource(SimConfig::default());
        world.insert_resource(Player::default());
        world.insert_resource(WaveDirector::default());
        world.insert_resource(SimRng::seeded(1));
        world.insert_resource(EnemyPool::new(PoolLimits {
            initial: enemy_cap,
            hard_cap: enemy_cap,
        }));
        world.insert_resource(SpatialGrid::new(60.0));
        world.insert_resource(BossSlot::default());
        world
    }

    fn run(world: &mut World, frames: usize) {
        let mut schedule = Schedule::default();
        schedule.add_systems(wave_spawn_system);
        for _ in 0..frames {
            schedule.run(world);
        }
    }

    #[test]
    fn test_rate_ramps_with_time() {
        let config = WaveConfig::default();
        let mut director = WaveDirector::default();
        let start = director.spawn_rate(&config);
        director.elapsed = 120.0;
        assert!((director.spawn_rate(&config) - (start + 12.0)).abs() < 1e-4);
    }

    #[test]
    fn test_kind_mix_shifts_over_time() {
        let mut director = WaveDirector::default();
        assert_eq!(director.kind_for(0.3), EnemyKind::Small);
        director.elapsed = 600.0;
        assert_eq!(director.kind_for(0.3), EnemyKind::Large);
        assert_eq!(director.kind_for(0.0), EnemyKind::Elite);
    }

    #[test]
    fn test_spawns_land_in_ring_and_grid() {
        let mut world = wave_world(64);
        run(&mut world, 3);

        let pool = world.resource::<EnemyPool>();
        assert!(pool.active_count() >= 6);
        assert_eq!(world.resource::<SpatialGrid>().total_count(), pool.active_count());
        let config = WaveConfig::default();
        for (_, enemy) in pool.iter_active() {
            let r = (enemy.x * enemy.x + enemy.y * enemy.y).sqrt();
            assert!(r >= config.spawn_radius_min - 0.01 && r <= config.spawn_radius_max + 0.01);
        }
    }

    #[test]
    fn test_capacity_drops_are_counted() {
        let mut world = wave_world(4);
        run(&mut world, 10);
        let pool = world.resource::<EnemyPool>();
        assert_eq!(pool.active_count(), 4);
        assert!(pool.dropped_spawns() > 0);
    }

    #[test]
    fn test_bulk_burst_rebuilds_grid() {
        let mut world = wave_world(256);
        world.resource_mut::<SimConfig>().waves.base_rate = 100.0;
        run(&mut world, 1);
        let count = world.resource::<EnemyPool>().active_count();
        assert_eq!(count, 100);
        assert_eq!(world.resource::<SpatialGrid>().total_count(), 100);
    }

    #[test]
    fn test_boss_arrives_once() {
        let mut world = wave_world(512);
        world.resource_mut::<SimConfig>().waves.boss_at = 2.0;
        run(&mut world, 5);
        let slot = world.resource::<BossSlot>();
        assert!(slot.is_active());
        assert_eq!(slot.spawned(), 1);
    }
}
