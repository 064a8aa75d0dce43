//! Turret emplacements.
//!
//! Turrets are stationary, acquire the nearest target in range on a
//! cooldown and fire pooled projectiles. Hits are resolved later by the
//! projectile system, so a turret never touches enemy health directly.

use crate::components::{DamageSource, Player, Projectile, ProjectilePool, WeaponTag};
use crate::config::{SimConfig, TurretConfig};
use crate::error::PoolError;
use crate::resolver::{Combat, Resolver};
use crate::systems::movement::DeltaTime;
use bevy_ecs::prelude::*;
use serde::Serialize;
use tracing::{debug, trace};

/// Turrets allowed at once.
pub const MAX_TURRETS: usize = 4;

#[derive(Debug, Clone, Serialize)]
pub struct Turret {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub cooldown_left: f32,
    /// Seconds until the emplacement is removed.
    pub lifetime_left: f32,
    pub shots_fired: u32,
}

#[derive(Resource, Debug, Default)]
pub struct TurretController {
    turrets: Vec<Turret>,
    next_id: u32,
}

impl TurretController {
    pub fn has_room(&self) -> bool {
        self.turrets.len() < MAX_TURRETS
    }

    /// Place a turret. When full, the oldest emplacement is replaced.
    pub fn place(&mut self, x: f32, y: f32, lifetime: f32) -> u32 {
        if !self.has_room() {
            let old = self.turrets.remove(0);
            debug!(id = old.id, "oldest turret replaced");
        }
        self.next_id += 1;
        self.turrets.push(Turret {
            id: self.next_id,
            x,
            y,
            cooldown_left: 0.0,
            lifetime_left: lifetime,
            shots_fired: 0,
        });
        self.next_id
    }

    pub fn turrets(&self) -> &[Turret] {
        &self.turrets
    }

    pub fn clear(&mut self) {
        self.turrets.clear();
    }

    /// Tick cooldowns and fire. Returns the number of projectiles spawned.
    pub fn update(
        &mut self,
        dt: f32,
        resolver: &mut Resolver,
        projectiles: &mut ProjectilePool,
        config: &TurretConfig,
        damage_multiplier: f32,
    ) -> usize {
        let mut fired = 0;
        self.turrets.retain_mut(|turret| {
            turret.lifetime_left -= dt;
            if turret.lifetime_left <= 0.0 {
                debug!(id = turret.id, shots = turret.shots_fired, "turret expired");
                return false;
            }
            turret.cooldown_left -= dt;
            if turret.cooldown_left > 0.0 {
                return true;
            }
            let Some(target) = resolver.nearest_target(turret.x, turret.y, config.range, true) else {
                return true;
            };

            match projectiles.spawn(aimed_projectile(turret, target.x, target.y, config, damage_multiplier)) {
                Ok(_) => {
                    turret.shots_fired += 1;
                    fired += 1;
                }
                Err(PoolError::AtCapacity { capacity }) => {
                    trace!(id = turret.id, capacity, "turret shot dropped");
                }
            }
            turret.cooldown_left = config.cooldown;
            true
        });
        fired
    }
}

fn aimed_projectile(turret: &Turret, tx: f32, ty: f32, config: &TurretConfig, damage_multiplier: f32) -> Projectile {
    let dx = tx - turret.x;
    let dy = ty - turret.y;
    let dist = (dx * dx + dy * dy).sqrt().max(1e-3);
    Projectile {
        x: turret.x,
        y: turret.y,
        vx: dx / dist * config.projectile_speed,
        vy: dy / dist * config.projectile_speed,
        radius: config.projectile_radius,
        damage: config.damage * damage_multiplier,
        lifetime: config.projectile_lifetime,
        pierce: config.pierce,
        weapon: Some(WeaponTag::Turret),
        source: Some(DamageSource::Turret(turret.id)),
        crit_chance: config.crit_chance,
        crit_multiplier: config.crit_multiplier,
        ..Default::default()
    }
}

pub fn turret_system(
    dt: Res<DeltaTime>,
    config: Res<SimConfig>,
    player: Res<Player>,
    mut turrets: ResMut<TurretController>,
    mut projectiles: ResMut<ProjectilePool>,
    mut combat: Combat,
) {
    if !player.is_alive() {
        turrets.clear();
        return;
    }
    let mut resolver = combat.resolver();
    turrets.update(
        dt.0,
        &mut resolver,
        &mut projectiles,
        &config.turret,
        player.damage_multiplier,
    );
}
