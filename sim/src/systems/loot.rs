//! Loot - death records become drops, drops become pickups.

use crate::components::*;
use crate::config::SimConfig;
use crate::effects::Effect;
use crate::pool::PassAction;
use crate::resolver::Combat;
use crate::systems::movement::DeltaTime;
use crate::systems::spawning::SimRng;
use bevy_ecs::prelude::*;
use rand::Rng;
use tracing::{debug, trace};

const HEAL_AMOUNT: f32 = 25.0;
const BOMB_RADIUS: f32 = 320.0;
const BOMB_DAMAGE: f32 = 250.0;

fn treasure_value(kind: EnemyKind) -> u32 {
    match kind {
        EnemyKind::Boss => 500,
        _ => 50,
    }
}

/// Drain the death queue once per frame. Every death drops a gem; a few
/// drop a special item; elites and bosses drop a treasure.
pub fn loot_system(
    config: Res<SimConfig>,
    mut deaths: ResMut<DeathQueue>,
    mut rng: ResMut<SimRng>,
    mut gems: ResMut<GemPool>,
    mut items: ResMut<ItemPool>,
    mut treasures: ResMut<TreasurePool>,
) {
    if deaths.records.is_empty() {
        return;
    }
    let mut dropped = 0u64;
    for record in deaths.records.drain(..) {
        let (x, y) = (record.x, record.y);
        let gem = Gem {
            x,
            y,
            xp: record.kind.stats().xp,
            magnetized: false,
        };
        if gems.spawn(gem).is_err() {
            dropped += 1;
        }

        if rng.0.gen::<f32>() < config.loot.special_item_chance {
            let kind = match rng.0.gen_range(0..3) {
                0 => ItemKind::Magnet,
                1 => ItemKind::Heal,
                _ => ItemKind::Bomb,
            };
            match items.spawn(SpecialItem { x, y, kind }) {
                Ok(_) => trace!(?kind, x, y, "special item dropped"),
                Err(_) => dropped += 1,
            }
        }

        if record.kind.drops_treasure() {
            let value = treasure_value(record.kind);
            if treasures.spawn(Treasure { x, y, value }).is_err() {
                dropped += 1;
            }
        }
    }
    if dropped > 0 {
        debug!(dropped, "loot dropped at capacity");
    }
}

/// Move magnetized gems and collect anything within pickup range.
#[allow(clippy::too_many_arguments)]
pub fn pickup_system(
    dt: Res<DeltaTime>,
    config: Res<SimConfig>,
    mut player: ResMut<Player>,
    mut gems: ResMut<GemPool>,
    mut items: ResMut<ItemPool>,
    mut treasures: ResMut<TreasurePool>,
    mut collected: Local<Vec<ItemKind>>,
    mut combat: Combat,
) {
    if !player.is_alive() {
        return;
    }
    let loot = &config.loot;
    let (px, py) = (player.x, player.y);
    let pickup_sq = loot.pickup_radius * loot.pickup_radius;
    let magnet_sq = loot.magnet_radius * loot.magnet_radius;
    let step = loot.magnet_speed * dt.0;

    let mut xp = 0u64;
    gems.for_each_active_mut(|_, gem| {
        let dx = px - gem.x;
        let dy = py - gem.y;
        let dist_sq = dx * dx + dy * dy;
        if dist_sq <= pickup_sq {
            xp += gem.xp as u64;
            return PassAction::Release;
        }
        if gem.magnetized || dist_sq <= magnet_sq {
            gem.magnetized = true;
            let dist = dist_sq.sqrt();
            let t = (step / dist).min(1.0);
            gem.x += dx * t;
            gem.y += dy * t;
        }
        PassAction::Keep
    });
    player.xp += xp;

    let mut gold = 0u64;
    treasures.for_each_active_mut(|_, treasure| {
        let dx = px - treasure.x;
        let dy = py - treasure.y;
        if dx * dx + dy * dy > pickup_sq {
            return PassAction::Keep;
        }
        gold += treasure.value as u64;
        PassAction::Release
    });
    player.gold += gold;

    collected.clear();
    items.for_each_active_mut(|_, item| {
        let dx = px - item.x;
        let dy = py - item.y;
        if dx * dx + dy * dy > pickup_sq {
            return PassAction::Keep;
        }
        collected.push(item.kind);
        PassAction::Release
    });

    for &kind in collected.iter() {
        debug!(?kind, "special item collected");
        match kind {
            ItemKind::Magnet => {
                gems.for_each_active_mut(|_, gem| {
                    gem.magnetized = true;
                    PassAction::Keep
                });
            }
            ItemKind::Heal => player.heal(HEAL_AMOUNT),
            ItemKind::Bomb => {
                let mut resolver = combat.resolver();
                let hit = resolver
                    .apply_area_damage(px, py, BOMB_RADIUS, BOMB_DAMAGE, WeaponTag::Bomb, DamageSource::Item)
                    .len();
                resolver.apply_area_damage_to_boss(
                    px,
                    py,
                    BOMB_RADIUS,
                    BOMB_DAMAGE,
                    WeaponTag::Bomb,
                    DamageSource::Item,
                );
                resolver.effects.emit(Effect::Shockwave {
                    x: px,
                    y: py,
                    radius: BOMB_RADIUS,
                });
                debug!(hit, "bomb detonated");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::EntityId;
    use crate::resolver::tests::{combat_world, spawn_enemy};

    fn loot_world() -> World {
        let mut world = combat_world(16);
        world.insert_resource(DeltaTime(0.1));
        world.insert_resource(SimConfig::default());
        world.insert_resource(SimRng::seeded(3));
        world.insert_resource(Player::default());
        world.insert_resource(GemPool::with_capacity(16));
        world.insert_resource(ItemPool::with_capacity(4));
        world.insert_resource(TreasurePool::with_capacity(4));
        world
    }

    fn death(kind: EnemyKind, x: f32, y: f32) -> DeathRecord {
        DeathRecord {
            target: DamageTarget::Enemy(EntityId(0)),
            kind,
            x,
            y,
            weapon: WeaponTag::Bolt,
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
    fn test_every_death_drops_a_gem() {
        let mut world = loot_world();
        {
            let mut deaths = world.resource_mut::<DeathQueue>();
            deaths.records.push(death(EnemyKind::Small, 10.0, 0.0));
            deaths.records.push(death(EnemyKind::Elite, 20.0, 0.0));
        }
        run(&mut world, 1, loot_system);

        assert!(world.resource::<DeathQueue>().records.is_empty());
        assert_eq!(world.resource::<GemPool>().active_count(), 2);
        assert_eq!(world.resource::<TreasurePool>().active_count(), 1);
        let xp: u32 = world.resource::<GemPool>().iter_active().map(|(_, g)| g.xp).sum();
        assert_eq!(xp, 26);
    }

    #[test]
    fn test_certain_item_chance_always_drops() {
        let mut world = loot_world();
        world.resource_mut::<SimConfig>().loot.special_item_chance = 1.0;
        world.resource_mut::<DeathQueue>().records.push(death(EnemyKind::Small, 0.0, 0.0));
        run(&mut world, 1, loot_system);
        assert_eq!(world.resource::<ItemPool>().active_count(), 1);
    }

    #[test]
    fn test_gems_are_magnetized_and_collected() {
        let mut world = loot_world();
        {
            let mut gems = world.resource_mut::<GemPool>();
            gems.spawn(Gem { x: 100.0, y: 0.0, xp: 3, magnetized: false }).unwrap();
            gems.spawn(Gem { x: 1000.0, y: 0.0, xp: 5, magnetized: false }).unwrap();
        }
        run(&mut world, 10, pickup_system);

        assert_eq!(world.resource::<Player>().xp, 3);
        let gems = world.resource::<GemPool>();
        assert_eq!(gems.active_count(), 1);
        let (_, far) = gems.iter_active().next().unwrap();
        assert!(!far.magnetized);
        assert_eq!(far.x, 1000.0);
    }

    #[test]
    fn test_bomb_pickup_clears_nearby_enemies() {
        let mut world = loot_world();
        let near = spawn_enemy(&mut world, EnemyKind::Medium, 100.0, 0.0);
        let far = spawn_enemy(&mut world, EnemyKind::Medium, 900.0, 0.0);
        world
            .resource_mut::<ItemPool>()
            .spawn(SpecialItem { x: 5.0, y: 0.0, kind: ItemKind::Bomb })
            .unwrap();

        run(&mut world, 1, pickup_system);

        let enemies = world.resource::<EnemyPool>();
        assert!(!enemies.is_active(near));
        assert!(enemies.is_active(far));
        assert_eq!(world.resource::<ItemPool>().active_count(), 0);
        assert_eq!(world.resource::<DeathQueue>().records.len(), 1);
    }

    #[test]
    fn test_treasure_adds_gold() {
        let mut world = loot_world();
        world
            .resource_mut::<TreasurePool>()
            .spawn(Treasure { x: 0.0, y: 5.0, value: 50 })
            .unwrap();
        run(&mut world, 1, pickup_system);
        assert_eq!(world.resource::<Player>().gold, 50);
    }
}
