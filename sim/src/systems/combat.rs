//! Combat systems - projectiles, damage over time and contact damage.
//!
//! All damage flows through the `Resolver`; these systems only decide who
//! gets hit and for how much.
//!
//! ## Projectile hits
//!
//! 1. Move the projectile and burn down its lifetime.
//! 2. Query the grid around it, padded by the largest enemy radius.
//! 3. For each overlapping live enemy not already in `hit_ids`: roll a
//!    crit, apply single-target damage, spend one pierce.
//! 4. If pierce remains, test the boss.
//! 5. Release the projectile once pierce or lifetime runs out.

use crate::components::*;
use crate::pool::{PassAction, SlotHandle};
use crate::resolver::Combat;
use crate::spatial::{SpatialEntry, SpatialGrid};
use crate::systems::movement::{DeltaTime, SimTick};
use crate::systems::spawning::SimRng;
use bevy_ecs::prelude::*;
use rand::Rng;
use tracing::info;

/// Clear per-frame records and advance the tick counter.
pub fn frame_start_system(mut log: ResMut<DamageLog>, mut tick: ResMut<SimTick>) {
    log.clear();
    tick.increment();
}

pub fn projectile_system(
    dt: Res<DeltaTime>,
    mut rng: ResMut<SimRng>,
    mut projectiles: ResMut<ProjectilePool>,
    mut scratch: Local<Vec<SpatialEntry>>,
    mut combat: Combat,
) {
    let delta = dt.0;
    let mut resolver = combat.resolver();
    let candidates = &mut *scratch;

    projectiles.for_each_active_mut(|_, shot| {
        shot.lifetime -= delta;
        if shot.lifetime <= 0.0 || shot.pierce == 0 {
            return PassAction::Release;
        }
        shot.x += shot.vx * delta;
        shot.y += shot.vy * delta;

        let weapon = shot.weapon.unwrap_or(WeaponTag::Bolt);
        let source = shot.source.unwrap_or(DamageSource::Player);

        resolver
            .grid
            .query_into(shot.x, shot.y, shot.radius + MAX_ENEMY_RADIUS, candidates);
        for entry in candidates.iter() {
            if shot.pierce == 0 {
                break;
            }
            let Some(enemy) = resolver.enemies.get(entry.handle) else {
                continue;
            };
            if !enemy.is_alive() || shot.hit_ids.contains(&entry.handle.id()) {
                continue;
            }
            let reach = shot.radius + enemy.radius;
            let dx = enemy.x - shot.x;
            let dy = enemy.y - shot.y;
            if dx * dx + dy * dy > reach * reach {
                continue;
            }

            let crit = rng.0.gen::<f32>() < shot.crit_chance;
            let amount = if crit {
                shot.damage * shot.crit_multiplier.max(1.0)
            } else {
                shot.damage
            };
            resolver.apply_single_target_damage(entry.handle, amount, weapon, source, crit);
            shot.hit_ids.push(entry.handle.id());
            shot.pierce -= 1;
        }

        if shot.pierce > 0 && !shot.hit_boss {
            let touching = resolver.boss.get().is_some_and(|boss| {
                let reach = shot.radius + boss.radius;
                let dx = boss.x - shot.x;
                let dy = boss.y - shot.y;
                dx * dx + dy * dy <= reach * reach
            });
            if touching {
                let crit = rng.0.gen::<f32>() < shot.crit_chance;
                let amount = if crit {
                    shot.damage * shot.crit_multiplier.max(1.0)
                } else {
                    shot.damage
                };
                resolver.apply_boss_damage(amount, weapon, source, crit);
                shot.hit_boss = true;
                shot.pierce -= 1;
            }
        }

        if shot.pierce == 0 {
            PassAction::Release
        } else {
            PassAction::Keep
        }
    });
}

/// Tick burns. Timers advance in one pass; the damage is applied after it
/// through the resolver so deaths take the normal path.
pub fn burn_system(
    dt: Res<DeltaTime>,
    mut ticks: Local<Vec<(SlotHandle, f32, DamageSource)>>,
    mut combat: Combat,
) {
    let delta = dt.0;
    ticks.clear();

    combat.enemies_mut().for_each_active_mut(|handle, enemy| {
        let Some(burn) = enemy.burn.as_mut() else {
            return PassAction::Keep;
        };
        burn.remaining -= delta;
        burn.tick_timer -= delta;
        if burn.tick_timer <= 0.0 {
            burn.tick_timer += BURN_TICK_INTERVAL;
            ticks.push((handle, burn.dps * BURN_TICK_INTERVAL, burn.source));
        }
        if burn.remaining <= 0.0 {
            enemy.burn = None;
        }
        PassAction::Keep
    });

    let mut resolver = combat.resolver();
    for &(handle, amount, source) in ticks.iter() {
        resolver.apply_dot_tick(handle, amount, source);
    }
}

/// Enemies touching the player deal their contact damage. The player's
/// invulnerability window limits this to one hit per window.
pub fn contact_damage_system(
    dt: Res<DeltaTime>,
    enemies: Res<EnemyPool>,
    grid: Res<SpatialGrid>,
    mut player: ResMut<Player>,
    mut stats: ResMut<CombatStats>,
    mut scratch: Local<Vec<SpatialEntry>>,
) {
    player.invulnerable_for = (player.invulnerable_for - dt.0).max(0.0);
    if !player.is_alive() || player.invulnerable_for > 0.0 {
        return;
    }

    let (px, py, pr) = (player.x, player.y, player.radius);
    grid.query_into(px, py, pr + MAX_ENEMY_RADIUS, &mut scratch);
    let attacker = scratch.iter().find_map(|entry| {
        let enemy = enemies.get(entry.handle).filter(|e| e.is_alive())?;
        let reach = pr + enemy.radius;
        let dx = enemy.x - px;
        let dy = enemy.y - py;
        (dx * dx + dy * dy <= reach * reach).then_some(enemy.contact_damage)
    });

    let Some(damage) = attacker else {
        return;
    };
    if let Some(lost) = player.take_contact_damage(damage) {
        stats.damage_taken += lost as f64;
        if !player.is_alive() {
            info!(kills = stats.kills, "player down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::EntityId;
    use crate::resolver::tests::{combat_world, spawn_enemy};
    use rand::SeedableRng;

    fn combat_systems_world() -> World {
        let mut world = combat_world(16);
        world.insert_resource(DeltaTime(1.0 / 60.0));
        world.insert_resource(SimTick::default());
        world.insert_resource(SimRng(rand::rngs::StdRng::seed_from_u64(7)));
        world.insert_resource(ProjectilePool::with_capacity(16));
        world.insert_resource(Player::default());
        world
    }

    fn bolt(x: f32, y: f32, vx: f32, pierce: u32) -> Projectile {
        Projectile {
            x,
            y,
            vx,
            radius: 4.0,
            damage: 5.0,
            lifetime: 2.0,
            pierce,
            weapon: Some(WeaponTag::Bolt),
            crit_multiplier: 2.0,
            ..Default::default()
        }
    }

    fn run<M>(world: &mut World, frames: usize, system: impl IntoSystemConfigs<M>) {
        let mut schedule = Schedule::default();
        schedule.add_systems(system);
        for _ in 0..frames {
            schedule.run(world);
        }
    }

    #[test]
    fn test_projectile_hits_and_is_released() {
        let mut world = combat_systems_world();
        let target = spawn_enemy(&mut world, EnemyKind::Large, 20.0, 0.0);
        world.resource_mut::<ProjectilePool>().spawn(bolt(0.0, 0.0, 600.0, 1)).unwrap();

        run(&mut world, 5, projectile_system);

        assert_eq!(world.resource::<EnemyPool>().get(target).unwrap().hp, 115.0);
        assert_eq!(world.resource::<ProjectilePool>().active_count(), 0);
    }

    #[test]
    fn test_piercing_projectile_hits_each_enemy_once() {
        let mut world = combat_systems_world();
        let a = spawn_enemy(&mut world, EnemyKind::Large, 10.0, 0.0);
        let b = spawn_enemy(&mut world, EnemyKind::Large, 12.0, 0.0);
        // Slow shot that lingers over both enemies for many frames.
        world.resource_mut::<ProjectilePool>().spawn(bolt(0.0, 0.0, 30.0, 5)).unwrap();

        run(&mut world, 30, projectile_system);

        let pool = world.resource::<EnemyPool>();
        assert_eq!(pool.get(a).unwrap().hp, 115.0);
        assert_eq!(pool.get(b).unwrap().hp, 115.0);
        let (_, shot) = world.resource::<ProjectilePool>().iter_active().next().unwrap();
        assert_eq!(shot.pierce, 3);
        let mut ids: Vec<EntityId> = shot.hit_ids.clone();
        ids.sort_by_key(|id| id.0);
        ids.dedup();
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_certain_crit_doubles_damage() {
        let mut world = combat_systems_world();
        let target = spawn_enemy(&mut world, EnemyKind::Large, 5.0, 0.0);
        let mut shot = bolt(0.0, 0.0, 0.0, 1);
        shot.crit_chance = 1.0;
        world.resource_mut::<ProjectilePool>().spawn(shot).unwrap();

        run(&mut world, 1, projectile_system);

        assert_eq!(world.resource::<EnemyPool>().get(target).unwrap().hp, 110.0);
        assert!(world.resource::<DamageLog>().events[0].flags.is_crit);
    }

    #[test]
    fn test_burn_ticks_until_expired() {
        let mut world = combat_systems_world();
        world.insert_resource(DeltaTime(0.5));
        let target = spawn_enemy(&mut world, EnemyKind::Large, 0.0, 0.0);
        world.resource_mut::<EnemyPool>().get_mut(target).unwrap().burn = Some(Burn {
            dps: 4.0,
            remaining: 1.0,
            tick_timer: BURN_TICK_INTERVAL,
            source: DamageSource::Zone(1),
        });

        run(&mut world, 4, burn_system);

        let enemy = world.resource::<EnemyPool>().get(target).unwrap().clone();
        assert_eq!(enemy.hp, 116.0);
        assert!(enemy.burn.is_none());
        assert!(world.resource::<DamageLog>().events.iter().all(|e| e.flags.is_dot_tick));
    }

    #[test]
    fn test_burn_kill_goes_through_death_path() {
        let mut world = combat_systems_world();
        world.insert_resource(DeltaTime(0.5));
        let target = spawn_enemy(&mut world, EnemyKind::Small, 0.0, 0.0);
        world.resource_mut::<EnemyPool>().get_mut(target).unwrap().burn = Some(Burn {
            dps: 100.0,
            remaining: 5.0,
            tick_timer: 0.1,
            source: DamageSource::Zone(1),
        });

        run(&mut world, 3, burn_system);

        assert!(!world.resource::<EnemyPool>().is_active(target));
        let deaths = &world.resource::<DeathQueue>().records;
        assert_eq!(deaths.len(), 1);
        assert_eq!(deaths[0].weapon, WeaponTag::Burn);
    }

    #[test]
    fn test_contact_damage_respects_invulnerability() {
        let mut world = combat_systems_world();
        spawn_enemy(&mut world, EnemyKind::Small, 5.0, 0.0);
        spawn_enemy(&mut world, EnemyKind::Small, -5.0, 0.0);

        run(&mut world, 1, contact_damage_system);
        assert_eq!(world.resource::<Player>().hp, 95.0);

        // Inside the 0.5 s window: no further damage.
        run(&mut world, 10, contact_damage_system);
        assert_eq!(world.resource::<Player>().hp, 95.0);

        run(&mut world, 30, contact_damage_system);
        assert!(world.resource::<Player>().hp < 95.0);
        assert!(world.resource::<CombatStats>().damage_taken >= 10.0);
    }
}
