//! Damage and targeting resolution.
//!
//! Every hit in the simulation (projectiles, zones, turrets, burns, bombs)
//! goes through `Resolver`, which guarantees:
//!
//! - **Liveness re-check.** A target is hit only if its slot is active and
//!   `hp > 0` at the moment of application. A handle that died between query
//!   and use is an empty result, not an error.
//! - **Exactly-once death.** The death path (grid removal, slot release,
//!   loot record, particles) runs on the hit that takes `hp` to zero. Later
//!   hits on the same handle are no-ops.
//! - **Deterministic targeting.** Nearest-target ties keep the first
//!   candidate found (strict `<` on squared distance) in grid scan order.
//!
//! The boss is resolved through `BossSlot` rather than the grid.
//!
//! ## Complexity
//! Area damage is O(k) in grid candidates; each candidate is rejected by a
//! bounding box before the exact squared-radius test.

use crate::boss::BossSlot;
use crate::components::*;
use crate::effects::{Effect, Effects};
use crate::pool::{EntityId, SlotHandle};
use crate::spatial::{SpatialEntry, SpatialGrid};
use bevy_ecs::prelude::*;
use bevy_ecs::system::SystemParam;
use tracing::{debug, info};

/// Result of a single damage application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    /// Damage landed; the target survived.
    Alive,
    /// Damage landed and killed the target.
    Killed,
    /// Target inactive, already dead, or absent. Nothing happened.
    Ignored,
}

/// What a targeting query settled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRef {
    Enemy(SlotHandle),
    Boss,
}

/// A resolved target with its position at query time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub target: TargetRef,
    pub x: f32,
    pub y: f32,
}

/// Borrowed view over everything damage resolution touches.
pub struct Resolver<'a> {
    pub enemies: &'a mut EnemyPool,
    pub grid: &'a mut SpatialGrid,
    pub boss: &'a mut BossSlot,
    pub deaths: &'a mut DeathQueue,
    pub log: &'a mut DamageLog,
    pub stats: &'a mut CombatStats,
    pub effects: &'a mut Effects,
    /// Reused candidate buffer.
    pub scratch: &'a mut Vec<SpatialEntry>,
}

impl<'a> Resolver<'a> {
    /// Damage every live enemy whose body overlaps the circle of `radius`
    /// around `(cx, cy)`. Returns the ids of the enemies hit.
    pub fn apply_area_damage(
        &mut self,
        cx: f32,
        cy: f32,
        radius: f32,
        amount: f32,
        weapon: WeaponTag,
        source: DamageSource,
    ) -> Vec<EntityId> {
        let mut affected = Vec::new();
        self.apply_area_damage_into(cx, cy, radius, amount, weapon, source, &mut affected);
        affected
    }

    /// Allocation-free form of `apply_area_damage`. `affected` is cleared
    /// first; returns the number of enemies hit.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_area_damage_into(
        &mut self,
        cx: f32,
        cy: f32,
        radius: f32,
        amount: f32,
        weapon: WeaponTag,
        source: DamageSource,
        affected: &mut Vec<EntityId>,
    ) -> usize {
        affected.clear();
        if !(amount > 0.0) || !(radius > 0.0) {
            return 0;
        }

        let mut candidates = std::mem::take(self.scratch);
        self.grid.query_into(cx, cy, radius + MAX_ENEMY_RADIUS, &mut candidates);
        let flags = DamageFlags {
            is_aoe: true,
            ..Default::default()
        };

        for entry in &candidates {
            let Some(enemy) = self.enemies.get(entry.handle) else {
                continue;
            };
            if !enemy.is_alive() {
                continue;
            }
            let reach = radius + enemy.radius;
            let dx = enemy.x - cx;
            let dy = enemy.y - cy;
            if dx.abs() > reach || dy.abs() > reach {
                continue;
            }
            if dx * dx + dy * dy > reach * reach {
                continue;
            }
            if self.hit(entry.handle, amount, weapon, source, flags) != DamageOutcome::Ignored {
                affected.push(entry.handle.id());
            }
        }

        *self.scratch = candidates;
        affected.len()
    }

    /// Damage one enemy.
    pub fn apply_single_target_damage(
        &mut self,
        handle: SlotHandle,
        amount: f32,
        weapon: WeaponTag,
        source: DamageSource,
        is_crit: bool,
    ) -> DamageOutcome {
        let flags = DamageFlags {
            is_crit,
            ..Default::default()
        };
        self.hit(handle, amount, weapon, source, flags)
    }

    /// Damage one enemy as a damage-over-time tick.
    pub fn apply_dot_tick(
        &mut self,
        handle: SlotHandle,
        amount: f32,
        source: DamageSource,
    ) -> DamageOutcome {
        let flags = DamageFlags {
            is_dot_tick: true,
            ..Default::default()
        };
        self.hit(handle, amount, WeaponTag::Burn, source, flags)
    }

    /// Set a burn on every live enemy whose body overlaps the circle. An
    /// existing burn is refreshed; the stronger dps wins.
    pub fn ignite_area(
        &mut self,
        cx: f32,
        cy: f32,
        radius: f32,
        dps: f32,
        duration: f32,
        source: DamageSource,
    ) -> usize {
        if !(dps > 0.0) || !(duration > 0.0) || !(radius > 0.0) {
            return 0;
        }
        let mut candidates = std::mem::take(self.scratch);
        self.grid.query_into(cx, cy, radius + MAX_ENEMY_RADIUS, &mut candidates);
        let mut ignited = 0;

        for entry in &candidates {
            let Some(enemy) = self.enemies.get_mut(entry.handle) else {
                continue;
            };
            let reach = radius + enemy.radius;
            let dx = enemy.x - cx;
            let dy = enemy.y - cy;
            if !enemy.is_alive() || dx * dx + dy * dy > reach * reach {
                continue;
            }
            let dps = enemy.burn.map_or(dps, |b| b.dps.max(dps));
            let tick_timer = enemy.burn.map_or(BURN_TICK_INTERVAL, |b| b.tick_timer);
            enemy.burn = Some(Burn {
                dps,
                remaining: duration,
                tick_timer,
                source,
            });
            ignited += 1;
        }

        *self.scratch = candidates;
        ignited
    }

    fn hit(
        &mut self,
        handle: SlotHandle,
        amount: f32,
        weapon: WeaponTag,
        source: DamageSource,
        flags: DamageFlags,
    ) -> DamageOutcome {
        let Some(enemy) = self.enemies.get_mut(handle) else {
            return DamageOutcome::Ignored;
        };
        // Also rejects NaN, which would otherwise zero hp below.
        if !enemy.is_alive() || !(amount > 0.0) {
            return DamageOutcome::Ignored;
        }

        let dealt = amount.min(enemy.hp);
        enemy.hp = (enemy.hp - amount).max(0.0);
        enemy.last_hit_by = Some(weapon);
        let (x, y, kind, dead) = (enemy.x, enemy.y, enemy.kind, !enemy.is_alive());

        self.log.events.push(DamageEvent {
            source,
            weapon,
            target: DamageTarget::Enemy(handle.id()),
            amount,
            x,
            y,
            flags,
        });
        self.stats.damage_dealt += dealt as f64;
        if flags.is_crit {
            self.effects.emit(Effect::HitSpark { x, y, crit: true });
        }

        if !dead {
            return DamageOutcome::Alive;
        }
        self.kill_enemy(handle, kind, x, y, weapon);
        DamageOutcome::Killed
    }

    fn kill_enemy(&mut self, handle: SlotHandle, kind: EnemyKind, x: f32, y: f32, weapon: WeaponTag) {
        self.grid.remove(handle);
        self.enemies.release(handle);
        self.deaths.records.push(DeathRecord {
            target: DamageTarget::Enemy(handle.id()),
            kind,
            x,
            y,
            weapon,
        });
        self.stats.record_kill(weapon);
        self.effects.emit(Effect::DeathBurst { x, y, kind });
    }

    /// Damage the boss, after its resistance curve.
    pub fn apply_boss_damage(
        &mut self,
        amount: f32,
        weapon: WeaponTag,
        source: DamageSource,
        is_crit: bool,
    ) -> DamageOutcome {
        let flags = DamageFlags {
            is_crit,
            ..Default::default()
        };
        self.hit_boss(amount, weapon, source, flags)
    }

    /// Damage the boss if its body overlaps the circle.
    pub fn apply_area_damage_to_boss(
        &mut self,
        cx: f32,
        cy: f32,
        radius: f32,
        amount: f32,
        weapon: WeaponTag,
        source: DamageSource,
    ) -> DamageOutcome {
        let Some(boss) = self.boss.get() else {
            return DamageOutcome::Ignored;
        };
        let reach = radius + boss.radius;
        let dx = boss.x - cx;
        let dy = boss.y - cy;
        if dx * dx + dy * dy > reach * reach {
            return DamageOutcome::Ignored;
        }
        let flags = DamageFlags {
            is_aoe: true,
            ..Default::default()
        };
        self.hit_boss(amount, weapon, source, flags)
    }

    fn hit_boss(
        &mut self,
        amount: f32,
        weapon: WeaponTag,
        source: DamageSource,
        flags: DamageFlags,
    ) -> DamageOutcome {
        let Some(boss) = self.boss.get_mut() else {
            return DamageOutcome::Ignored;
        };
        if !(amount > 0.0) {
            return DamageOutcome::Ignored;
        }

        let mitigated = boss.mitigate(amount);
        let dealt = mitigated.min(boss.hp);
        boss.hp = (boss.hp - mitigated).max(0.0);
        boss.last_hit_by = Some(weapon);
        if let Some(phase) = boss.update_phase() {
            info!(serial = boss.serial, ?phase, "boss phase changed");
        }
        let (x, y, alive) = (boss.x, boss.y, boss.is_alive());

        self.log.events.push(DamageEvent {
            source,
            weapon,
            target: DamageTarget::Boss,
            amount: mitigated,
            x,
            y,
            flags,
        });
        self.stats.damage_dealt += dealt as f64;

        if alive {
            return DamageOutcome::Alive;
        }
        if let Some(boss) = self.boss.take() {
            info!(serial = boss.serial, ?weapon, "boss defeated");
        }
        self.deaths.records.push(DeathRecord {
            target: DamageTarget::Boss,
            kind: EnemyKind::Boss,
            x,
            y,
            weapon,
        });
        self.stats.record_kill(weapon);
        self.effects.emit(Effect::DeathBurst {
            x,
            y,
            kind: EnemyKind::Boss,
        });
        DamageOutcome::Killed
    }

    /// Nearest live enemy within `radius`, with its squared distance.
    pub fn nearest_enemy(&mut self, x: f32, y: f32, radius: f32) -> Option<(SlotHandle, f32)> {
        self.nearest_enemy_excluding(x, y, radius, &[])
    }

    /// Nearest live enemy within `radius` whose id is not in `exclude`.
    pub fn nearest_enemy_excluding(
        &mut self,
        x: f32,
        y: f32,
        radius: f32,
        exclude: &[EntityId],
    ) -> Option<(SlotHandle, f32)> {
        let mut candidates = std::mem::take(self.scratch);
        self.grid.query_into(x, y, radius, &mut candidates);
        let r_sq = radius * radius;
        let mut best: Option<(SlotHandle, f32)> = None;

        for entry in &candidates {
            let Some(enemy) = self.enemies.get(entry.handle) else {
                continue;
            };
            if !enemy.is_alive() || exclude.contains(&entry.handle.id()) {
                continue;
            }
            let dx = enemy.x - x;
            let dy = enemy.y - y;
            let d_sq = dx * dx + dy * dy;
            if d_sq <= r_sq && best.map_or(true, |(_, b)| d_sq < b) {
                best = Some((entry.handle, d_sq));
            }
        }

        *self.scratch = candidates;
        best
    }

    /// Nearest live enemy in range, otherwise the boss if one is alive.
    /// With `boss_in_range_only`, the boss must also be within `radius`.
    pub fn nearest_target(
        &mut self,
        x: f32,
        y: f32,
        radius: f32,
        boss_in_range_only: bool,
    ) -> Option<Target> {
        if let Some((handle, _)) = self.nearest_enemy(x, y, radius) {
            let enemy = self.enemies.get(handle)?;
            return Some(Target {
                target: TargetRef::Enemy(handle),
                x: enemy.x,
                y: enemy.y,
            });
        }
        let boss = self.boss.get()?;
        if boss_in_range_only {
            let reach = radius + boss.radius;
            let dx = boss.x - x;
            let dy = boss.y - y;
            if dx * dx + dy * dy > reach * reach {
                return None;
            }
        }
        Some(Target {
            target: TargetRef::Boss,
            x: boss.x,
            y: boss.y,
        })
    }

    /// Current position of a target, if it is still alive.
    pub fn target_position(&self, target: TargetRef) -> Option<(f32, f32)> {
        match target {
            TargetRef::Enemy(handle) => self
                .enemies
                .get(handle)
                .filter(|e| e.is_alive())
                .map(|e| (e.x, e.y)),
            TargetRef::Boss => self.boss.get().map(|b| (b.x, b.y)),
        }
    }

    /// Remove an enemy without a kill (despawn, recycle). No loot.
    pub fn despawn_enemy(&mut self, handle: SlotHandle) -> bool {
        if !self.enemies.is_active(handle) {
            return false;
        }
        self.grid.remove(handle);
        self.enemies.release(handle);
        debug!(index = handle.index(), "enemy despawned");
        true
    }
}

/// System parameter bundling the resources a `Resolver` borrows.
#[derive(SystemParam)]
pub struct Combat<'w, 's> {
    enemies: ResMut<'w, EnemyPool>,
    grid: ResMut<'w, SpatialGrid>,
    boss: ResMut<'w, BossSlot>,
    deaths: ResMut<'w, DeathQueue>,
    log: ResMut<'w, DamageLog>,
    stats: ResMut<'w, CombatStats>,
    effects: ResMut<'w, Effects>,
    scratch: Local<'s, Vec<SpatialEntry>>,
}

impl<'w, 's> Combat<'w, 's> {
    pub fn resolver(&mut self) -> Resolver<'_> {
        Resolver {
            enemies: &mut *self.enemies,
            grid: &mut *self.grid,
            boss: &mut *self.boss,
            deaths: &mut *self.deaths,
            log: &mut *self.log,
            stats: &mut *self.stats,
            effects: &mut *self.effects,
            scratch: &mut *self.scratch,
        }
    }

    pub fn enemies(&self) -> &EnemyPool {
        &*self.enemies
    }

    pub fn enemies_mut(&mut self) -> &mut EnemyPool {
        &mut *self.enemies
    }

    pub fn grid(&self) -> &SpatialGrid {
        &*self.grid
    }

    pub fn boss(&self) -> &BossSlot {
        &*self.boss
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::boss::Boss;
    use crate::effects::EffectRecorder;
    use bevy_ecs::system::SystemState;

    pub(crate) fn combat_world(capacity: usize) -> World {
        let mut world = World::new();
        world.insert_resource(EnemyPool::with_capacity(capacity));
        world.insert_resource(SpatialGrid::new(64.0));
        world.insert_resource(BossSlot::default());
        world.insert_resource(DeathQueue::default());
        world.insert_resource(DamageLog::default());
        world.insert_resource(CombatStats::default());
        world.insert_resource(Effects::default());
        world
    }

    pub(crate) fn spawn_enemy(world: &mut World, kind: EnemyKind, x: f32, y: f32) -> SlotHandle {
        let handle = world
            .resource_mut::<EnemyPool>()
            .spawn(Enemy::new(kind, x, y))
            .unwrap();
        world.resource_mut::<SpatialGrid>().insert(handle, x, y);
        handle
    }

    fn with_resolver<R>(world: &mut World, f: impl FnOnce(&mut Resolver) -> R) -> R {
        let mut state = SystemState::<Combat>::new(world);
        let mut combat = state.get_mut(world);
        let mut resolver = combat.resolver();
        f(&mut resolver)
    }

    #[test]
    fn test_area_damage_kills_cluster_exactly_once() {
        let mut world = combat_world(32);
        for i in 0..10 {
            let h = spawn_enemy(&mut world, EnemyKind::Small, 100.0 + i as f32 * 3.0, 100.0);
            world.resource_mut::<EnemyPool>().get_mut(h).unwrap().hp = 50.0;
        }

        let first = with_resolver(&mut world, |r| {
            r.apply_area_damage(110.0, 100.0, 60.0, 1000.0, WeaponTag::Bomb, DamageSource::Item)
        });
        assert_eq!(first.len(), 10);
        assert_eq!(world.resource::<EnemyPool>().active_count(), 0);
        assert_eq!(world.resource::<DeathQueue>().records.len(), 10);
        assert_eq!(world.resource::<CombatStats>().kills, 10);

        let second = with_resolver(&mut world, |r| {
            r.apply_area_damage(110.0, 100.0, 60.0, 1000.0, WeaponTag::Bomb, DamageSource::Item)
        });
        assert!(second.is_empty());
        assert_eq!(world.resource::<DeathQueue>().records.len(), 10, "death path re-fired");
        assert_eq!(world.resource::<SpatialGrid>().total_count(), 0);
    }

    #[test]
    fn test_area_damage_respects_exact_radius() {
        let mut world = combat_world(8);
        let inside = spawn_enemy(&mut world, EnemyKind::Large, 0.0, 0.0);
        // Inside the padded bounding box, but the body (radius 26) stays
        // clear of the 50-unit circle.
        let corner = spawn_enemy(&mut world, EnemyKind::Large, 60.0, 60.0);

        let hit = with_resolver(&mut world, |r| {
            r.apply_area_damage(0.0, 0.0, 50.0, 5.0, WeaponTag::Zone, DamageSource::Zone(1))
        });
        assert_eq!(hit, vec![inside.id()]);
        let pool = world.resource::<EnemyPool>();
        assert_eq!(pool.get(inside).unwrap().last_hit_by, Some(WeaponTag::Zone));
        assert_eq!(pool.get(corner).unwrap().hp, 120.0);
    }

    #[test]
    fn test_area_damage_hits_overlapping_body() {
        let mut world = combat_world(8);
        // Centre 60 away, body radius 26: overlaps a 50-unit blast.
        let large = spawn_enemy(&mut world, EnemyKind::Large, 60.0, 0.0);
        // Centre 70 away, body radius 12: just clear of it.
        let small = spawn_enemy(&mut world, EnemyKind::Small, 0.0, -70.0);

        let hit = with_resolver(&mut world, |r| {
            r.apply_area_damage(0.0, 0.0, 50.0, 5.0, WeaponTag::Bomb, DamageSource::Item)
        });
        assert_eq!(hit, vec![large.id()]);

        let ignited = with_resolver(&mut world, |r| {
            r.ignite_area(0.0, 0.0, 50.0, 4.0, 1.0, DamageSource::Zone(1))
        });
        assert_eq!(ignited, 1);
        let pool = world.resource::<EnemyPool>();
        assert!(pool.get(large).unwrap().burn.is_some());
        assert!(pool.get(small).unwrap().burn.is_none());
        assert_eq!(pool.get(small).unwrap().hp, 10.0);
    }

    #[test]
    fn test_nan_damage_is_ignored() {
        let mut world = combat_world(4);
        let h = spawn_enemy(&mut world, EnemyKind::Small, 0.0, 0.0);
        world
            .resource_mut::<BossSlot>()
            .spawn(Boss::new(0.0, 0.0))
            .unwrap();

        let (single, area, boss) = with_resolver(&mut world, |r| {
            (
                r.apply_single_target_damage(h, f32::NAN, WeaponTag::Bolt, DamageSource::Player, false),
                r.apply_area_damage(0.0, 0.0, 50.0, f32::NAN, WeaponTag::Bomb, DamageSource::Item),
                r.apply_boss_damage(f32::NAN, WeaponTag::Bolt, DamageSource::Player, false),
            )
        });
        assert_eq!(single, DamageOutcome::Ignored);
        assert!(area.is_empty());
        assert_eq!(boss, DamageOutcome::Ignored);
        assert_eq!(world.resource::<EnemyPool>().get(h).unwrap().hp, 10.0);
        assert!(world.resource::<BossSlot>().is_active());
        assert_eq!(world.resource::<CombatStats>().kills, 0);
    }

    #[test]
    fn test_single_target_damage_is_idempotent_after_death() {
        let mut world = combat_world(4);
        let h = spawn_enemy(&mut world, EnemyKind::Small, 0.0, 0.0);

        let outcome = with_resolver(&mut world, |r| {
            r.apply_single_target_damage(h, 4.0, WeaponTag::Bolt, DamageSource::Player, false)
        });
        assert_eq!(outcome, DamageOutcome::Alive);

        let outcome = with_resolver(&mut world, |r| {
            r.apply_single_target_damage(h, 100.0, WeaponTag::Bolt, DamageSource::Player, true)
        });
        assert_eq!(outcome, DamageOutcome::Killed);

        for _ in 0..3 {
            let outcome = with_resolver(&mut world, |r| {
                r.apply_single_target_damage(h, 100.0, WeaponTag::Bolt, DamageSource::Player, false)
            });
            assert_eq!(outcome, DamageOutcome::Ignored);
        }
        assert_eq!(world.resource::<DeathQueue>().records.len(), 1);
        assert_eq!(world.resource::<CombatStats>().kills, 1);
        // Damage dealt counts only health actually removed.
        assert_eq!(world.resource::<CombatStats>().damage_dealt, 10.0);
    }

    #[test]
    fn test_kill_during_deferred_pass_excludes_enemy() {
        let mut world = combat_world(4);
        let h = spawn_enemy(&mut world, EnemyKind::Small, 0.0, 0.0);
        world.resource_mut::<EnemyPool>().begin_deferred();

        let outcome = with_resolver(&mut world, |r| {
            r.apply_single_target_damage(h, 100.0, WeaponTag::Bolt, DamageSource::Player, false)
        });
        assert_eq!(outcome, DamageOutcome::Killed);
        let pool = world.resource::<EnemyPool>();
        assert!(!pool.is_active(h));
        assert_eq!(pool.iter_active().count(), 0);
        assert!(world.resource::<SpatialGrid>().query(0.0, 0.0, 100.0).is_empty());

        assert_eq!(world.resource_mut::<EnemyPool>().end_deferred(), 1);
    }

    #[test]
    fn test_nearest_enemy_tie_keeps_first_found() {
        let mut world = combat_world(8);
        let first = spawn_enemy(&mut world, EnemyKind::Small, 10.0, 0.0);
        let twin = spawn_enemy(&mut world, EnemyKind::Small, 10.0, 0.0);
        let far = spawn_enemy(&mut world, EnemyKind::Small, 30.0, 0.0);

        let nearest = with_resolver(&mut world, |r| r.nearest_enemy(0.0, 0.0, 100.0));
        assert_eq!(nearest.map(|(h, _)| h), Some(first));

        let excluded = with_resolver(&mut world, |r| {
            r.nearest_enemy_excluding(0.0, 0.0, 100.0, &[first.id(), twin.id()])
        });
        assert_eq!(excluded.map(|(h, _)| h), Some(far));
    }

    #[test]
    fn test_nearest_target_falls_back_to_boss() {
        let mut world = combat_world(4);
        world
            .resource_mut::<BossSlot>()
            .spawn(Boss::new(1000.0, 0.0))
            .unwrap();

        let target = with_resolver(&mut world, |r| r.nearest_target(0.0, 0.0, 200.0, false));
        assert_eq!(target.map(|t| t.target), Some(TargetRef::Boss));

        let in_range = with_resolver(&mut world, |r| r.nearest_target(0.0, 0.0, 200.0, true));
        assert!(in_range.is_none());
    }

    #[test]
    fn test_boss_damage_uses_resistance_and_dies_once() {
        let mut world = combat_world(4);
        world
            .resource_mut::<BossSlot>()
            .spawn(Boss::new(0.0, 0.0))
            .unwrap();
        let recorder = EffectRecorder::new();
        world.insert_resource(Effects::new(Box::new(recorder.clone())));

        let outcome = with_resolver(&mut world, |r| {
            r.apply_boss_damage(100.0, WeaponTag::Bolt, DamageSource::Player, false)
        });
        assert_eq!(outcome, DamageOutcome::Alive);
        let boss_hp = world.resource::<BossSlot>().get().unwrap().hp;
        assert!(boss_hp > 4900.0, "resistance should absorb part of the hit");

        let outcome = with_resolver(&mut world, |r| {
            r.apply_area_damage_to_boss(10.0, 0.0, 20.0, 1.0e9, WeaponTag::Bomb, DamageSource::Item)
        });
        assert_eq!(outcome, DamageOutcome::Killed);
        assert!(!world.resource::<BossSlot>().is_active());

        let outcome = with_resolver(&mut world, |r| {
            r.apply_boss_damage(100.0, WeaponTag::Bolt, DamageSource::Player, false)
        });
        assert_eq!(outcome, DamageOutcome::Ignored);
        assert_eq!(world.resource::<DeathQueue>().records.len(), 1);
        assert!(recorder
            .drain()
            .iter()
            .any(|e| matches!(e, Effect::DeathBurst { kind: EnemyKind::Boss, .. })));
    }

    #[test]
    fn test_ignite_area_keeps_stronger_burn() {
        let mut world = combat_world(4);
        let near = spawn_enemy(&mut world, EnemyKind::Large, 5.0, 0.0);
        let far = spawn_enemy(&mut world, EnemyKind::Large, 500.0, 0.0);

        let n = with_resolver(&mut world, |r| {
            r.ignite_area(0.0, 0.0, 40.0, 8.0, 2.0, DamageSource::Zone(1));
            r.ignite_area(0.0, 0.0, 40.0, 3.0, 4.0, DamageSource::Zone(2))
        });
        assert_eq!(n, 1);
        let pool = world.resource::<EnemyPool>();
        let burn = pool.get(near).unwrap().burn.unwrap();
        assert_eq!(burn.dps, 8.0);
        assert_eq!(burn.remaining, 4.0);
        assert!(pool.get(far).unwrap().burn.is_none());
    }

    #[test]
    fn test_damage_log_records_flags() {
        let mut world = combat_world(4);
        let h = spawn_enemy(&mut world, EnemyKind::Large, 0.0, 0.0);
        with_resolver(&mut world, |r| {
            r.apply_dot_tick(h, 3.0, DamageSource::Zone(7));
            r.apply_single_target_damage(h, 5.0, WeaponTag::Bolt, DamageSource::Player, true);
        });
        let events = &world.resource::<DamageLog>().events;
        assert_eq!(events.len(), 2);
        assert!(events[0].flags.is_dot_tick);
        assert_eq!(events[0].weapon, WeaponTag::Burn);
        assert!(events[1].flags.is_crit);
    }
}
