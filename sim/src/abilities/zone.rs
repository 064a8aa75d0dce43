//! Chasing damage zones.
//!
//! A zone is a circle that hunts the nearest enemy, deals area damage on a
//! fixed interval, and expires after its lifetime. Zones keep no direct
//! references to enemies: the current target is a `TargetRef` that is
//! re-validated through the resolver every update.

use crate::components::{DamageSource, Player, WeaponTag};
use crate::config::{SimConfig, ZoneBounds};
use crate::effects::Effect;
use crate::pool::EntityId;
use crate::resolver::{Combat, DamageOutcome, Resolver, TargetRef};
use crate::systems::movement::DeltaTime;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Zone lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZonePhase {
    Inactive,
    Active,
    Expired,
}

/// Base values for a zone, before the owner's multipliers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneSpec {
    pub radius: f32,
    pub damage: f32,
    pub tick_interval: f32,
    pub speed: f32,
    /// Distance within which enemies are considered as targets.
    pub chase_radius: f32,
    pub lifetime: f32,
}

/// Effective zone parameters after multipliers and bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZoneParams {
    pub radius: f32,
    pub damage: f32,
    pub tick_interval: f32,
    pub speed: f32,
    pub chase_radius: f32,
    pub lifetime: f32,
}

impl ZoneParams {
    /// `base x multiplier`, clamped to the designer bounds. Damage never
    /// drops below `min_damage`; the chase radius never exceeds
    /// `max_chase_radius`.
    pub fn derive(spec: &ZoneSpec, area_multiplier: f32, damage_multiplier: f32, bounds: &ZoneBounds) -> Self {
        let area = area_multiplier.max(0.0);
        Self {
            radius: (spec.radius * area).clamp(bounds.min_radius, bounds.max_radius),
            damage: (spec.damage * damage_multiplier.max(0.0)).clamp(bounds.min_damage, bounds.max_damage),
            tick_interval: spec.tick_interval.max(bounds.min_tick_interval),
            speed: spec.speed.clamp(bounds.min_speed, bounds.max_speed),
            chase_radius: (spec.chase_radius * area).clamp(0.0, bounds.max_chase_radius),
            lifetime: spec.lifetime.clamp(0.0, bounds.max_lifetime),
        }
    }
}

/// What a zone is currently chasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneTarget {
    Combat(TargetRef),
    /// Nothing to hunt; orbit the owner.
    Player,
}

/// Result of one zone update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZoneUpdate {
    pub enemies_hit: usize,
    pub boss_hit: bool,
    pub expired: bool,
}

#[derive(Debug, Clone)]
pub struct ChasingZone {
    pub id: u32,
    pub phase: ZonePhase,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub params: ZoneParams,
    pub age: f32,
    pub target: ZoneTarget,
    tick_timer: f32,
    retarget_timer: f32,
}

impl ChasingZone {
    pub fn new(id: u32, x: f32, y: f32, params: ZoneParams) -> Self {
        Self {
            id,
            phase: ZonePhase::Inactive,
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            params,
            age: 0.0,
            target: ZoneTarget::Player,
            tick_timer: params.tick_interval,
            retarget_timer: 0.0,
        }
    }

    pub fn activate(&mut self) {
        if self.phase == ZonePhase::Inactive {
            self.phase = ZonePhase::Active;
        }
    }

    pub fn expire(&mut self) {
        self.phase = ZonePhase::Expired;
    }

    pub fn is_active(&self) -> bool {
        self.phase == ZonePhase::Active
    }

    /// Advance the zone by `dt`. `affected` is scratch for hit ids.
    pub fn update(
        &mut self,
        dt: f32,
        resolver: &mut Resolver,
        owner: (f32, f32),
        bounds: &ZoneBounds,
        affected: &mut Vec<EntityId>,
    ) -> ZoneUpdate {
        let mut out = ZoneUpdate::default();
        if self.phase != ZonePhase::Active {
            out.expired = self.phase == ZonePhase::Expired;
            return out;
        }

        self.age += dt;
        if self.age >= self.params.lifetime {
            self.expire();
            out.expired = true;
            return out;
        }

        // Retarget on cadence, or immediately if the target died.
        self.retarget_timer -= dt;
        let goal = self.goal_position(resolver, owner);
        let goal = match goal {
            Some(goal) if self.retarget_timer > 0.0 => goal,
            _ => {
                self.retarget(resolver);
                self.retarget_timer = bounds.retarget_interval;
                self.goal_position(resolver, owner).unwrap_or(owner)
            }
        };

        self.steer(goal, dt, bounds);

        self.tick_timer -= dt;
        if self.tick_timer <= 0.0 {
            self.tick_timer = (self.tick_timer + self.params.tick_interval).max(0.0);
            self.pulse(resolver, bounds, affected, &mut out);
        }
        out
    }

    fn retarget(&mut self, resolver: &mut Resolver) {
        self.target = match resolver.nearest_target(self.x, self.y, self.params.chase_radius, false) {
            Some(found) => ZoneTarget::Combat(found.target),
            None => ZoneTarget::Player,
        };
    }

    fn goal_position(&self, resolver: &Resolver, owner: (f32, f32)) -> Option<(f32, f32)> {
        match self.target {
            ZoneTarget::Combat(target) => resolver.target_position(target),
            ZoneTarget::Player => Some(owner),
        }
    }

    /// Bounded-acceleration steering with a per-update displacement cap.
    fn steer(&mut self, (gx, gy): (f32, f32), dt: f32, bounds: &ZoneBounds) {
        let dx = gx - self.x;
        let dy = gy - self.y;
        let dist = (dx * dx + dy * dy).sqrt();
        let speed = self.params.speed;
        let (want_vx, want_vy) = if dist > 1.0 {
            // Ease in over the last stretch instead of overshooting.
            let s = speed.min(dist / dt.max(1e-4));
            (dx / dist * s, dy / dist * s)
        } else {
            (0.0, 0.0)
        };

        let mut dvx = want_vx - self.vx;
        let mut dvy = want_vy - self.vy;
        let dv = (dvx * dvx + dvy * dvy).sqrt();
        let max_dv = bounds.acceleration * dt;
        if dv > max_dv && dv > 0.0 {
            dvx *= max_dv / dv;
            dvy *= max_dv / dv;
        }
        self.vx += dvx;
        self.vy += dvy;

        let v = (self.vx * self.vx + self.vy * self.vy).sqrt();
        if v > speed && v > 0.0 {
            self.vx *= speed / v;
            self.vy *= speed / v;
        }

        let mut step_x = self.vx * dt;
        let mut step_y = self.vy * dt;
        let step = (step_x * step_x + step_y * step_y).sqrt();
        if step > bounds.max_step && step > 0.0 {
            step_x *= bounds.max_step / step;
            step_y *= bounds.max_step / step;
        }
        self.x += step_x;
        self.y += step_y;
    }

    fn pulse(
        &mut self,
        resolver: &mut Resolver,
        bounds: &ZoneBounds,
        affected: &mut Vec<EntityId>,
        out: &mut ZoneUpdate,
    ) {
        let source = DamageSource::Zone(self.id);
        let ZoneParams { radius, damage, .. } = self.params;

        out.enemies_hit =
            resolver.apply_area_damage_into(self.x, self.y, radius, damage, WeaponTag::Zone, source, affected);
        if bounds.burn_dps > 0.0 {
            resolver.ignite_area(self.x, self.y, radius, bounds.burn_dps, bounds.burn_duration, source);
        }
        out.boss_hit = resolver
            .apply_area_damage_to_boss(self.x, self.y, radius, damage, WeaponTag::Zone, source)
            != DamageOutcome::Ignored;

        resolver.effects.emit(Effect::Shockwave {
            x: self.x,
            y: self.y,
            radius,
        });
    }
}

/// Owner of all chasing zones.
#[derive(Resource, Debug, Default)]
pub struct ZoneController {
    zones: Vec<ChasingZone>,
    next_id: u32,
    affected: Vec<EntityId>,
}

impl ZoneController {
    /// Create and activate a zone owned by `owner`.
    pub fn spawn(&mut self, x: f32, y: f32, spec: ZoneSpec, owner: &Player, bounds: &ZoneBounds) -> u32 {
        self.next_id += 1;
        let params = ZoneParams::derive(&spec, owner.area_multiplier, owner.damage_multiplier, bounds);
        let mut zone = ChasingZone::new(self.next_id, x, y, params);
        zone.activate();
        debug!(id = zone.id, radius = params.radius, damage = params.damage, "zone spawned");
        self.zones.push(zone);
        self.next_id
    }

    pub fn zones(&self) -> &[ChasingZone] {
        &self.zones
    }

    pub fn get(&self, id: u32) -> Option<&ChasingZone> {
        self.zones.iter().find(|z| z.id == id)
    }

    pub fn active_count(&self) -> usize {
        self.zones.iter().filter(|z| z.is_active()).count()
    }

    /// Expire every zone (owner despawned).
    pub fn expire_all(&mut self) {
        if !self.zones.is_empty() {
            debug!(count = self.zones.len(), "owner gone, zones expired");
            self.zones.clear();
        }
    }

    /// Update every zone and drop the expired ones.
    pub fn update(&mut self, dt: f32, resolver: &mut Resolver, owner: (f32, f32), bounds: &ZoneBounds) {
        let affected = &mut self.affected;
        self.zones.retain_mut(|zone| {
            let result = zone.update(dt, resolver, owner, bounds, affected);
            if result.expired {
                debug!(id = zone.id, age = zone.age, "zone expired");
            }
            !result.expired
        });
    }
}

pub fn zone_system(
    dt: Res<DeltaTime>,
    config: Res<SimConfig>,
    player: Res<Player>,
    mut zones: ResMut<ZoneController>,
    mut combat: Combat,
) {
    if !player.is_alive() {
        zones.expire_all();
        return;
    }
    let mut resolver = combat.resolver();
    zones.update(dt.0, &mut resolver, (player.x, player.y), &config.zone);
}
