//! Snapshot types.
//!
//! The `Snapshot` struct is a serializable view of one frame of the
//! simulation, for renderers and the HUD.

use crate::abilities::{AbilityState, ChasingZone, TurretController, ZoneController, ZonePhase};
use crate::boss::{BossPhase, BossSlot};
use crate::components::*;
use crate::pool::EntityId;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub x: f32,
    pub y: f32,
    pub hp: f32,
    pub max_hp: f32,
    pub xp: u64,
    pub gold: u64,
    pub ability: AbilityState,
    /// Ability meter fill, 0..=1.
    pub meter: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnemySnapshot {
    pub id: EntityId,
    pub kind: EnemyKind,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub health: f32,
    pub burning: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupSnapshot {
    pub x: f32,
    pub y: f32,
    /// `"gem"`, `"treasure"`, or the special item kind.
    pub kind: String,
    pub value: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BossSnapshot {
    pub serial: u32,
    pub x: f32,
    pub y: f32,
    pub hp: f32,
    pub max_hp: f32,
    pub phase: BossPhase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneSnapshot {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub phase: ZonePhase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurretSnapshot {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub shots_fired: u32,
}

/// Complete frame snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Fixed ticks run so far.
    pub tick: u64,
    /// Elapsed simulation time in seconds.
    pub time: f32,
    pub player: Option<PlayerSnapshot>,
    pub enemies: Vec<EnemySnapshot>,
    pub pickups: Vec<PickupSnapshot>,
    pub projectiles: usize,
    pub boss: Option<BossSnapshot>,
    pub zones: Vec<ZoneSnapshot>,
    pub turrets: Vec<TurretSnapshot>,
    pub stats: CombatStats,
    /// Hits applied during the last tick.
    pub damage_events: Vec<DamageEvent>,
}

impl Snapshot {
    /// Create a snapshot from the ECS world. Missing resources leave their
    /// section empty.
    pub fn from_world(world: &World, tick: u64, time: f32) -> Self {
        let player = world.get_resource::<Player>().map(|p| PlayerSnapshot {
            x: p.x,
            y: p.y,
            hp: p.hp,
            max_hp: p.max_hp,
            xp: p.xp,
            gold: p.gold,
            ability: p.ability.clone(),
            meter: p.ability.meter().fraction(),
        });

        let enemies = world
            .get_resource::<EnemyPool>()
            .map(|pool| {
                pool.iter_active()
                    .filter(|(_, e)| e.is_alive())
                    .map(|(handle, e)| EnemySnapshot {
                        id: handle.id(),
                        kind: e.kind,
                        x: e.x,
                        y: e.y,
                        radius: e.radius,
                        health: e.health_fraction(),
                        burning: e.burn.is_some(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut pickups = Vec::new();
        if let Some(gems) = world.get_resource::<GemPool>() {
            pickups.extend(gems.iter_active().map(|(_, g)| PickupSnapshot {
                x: g.x,
                y: g.y,
                kind: "gem".to_string(),
                value: g.xp,
            }));
        }
        if let Some(items) = world.get_resource::<ItemPool>() {
            pickups.extend(items.iter_active().map(|(_, i)| PickupSnapshot {
                x: i.x,
                y: i.y,
                kind: format!("{:?}", i.kind),
                value: 0,
            }));
        }
        if let Some(treasures) = world.get_resource::<TreasurePool>() {
            pickups.extend(treasures.iter_active().map(|(_, t)| PickupSnapshot {
                x: t.x,
                y: t.y,
                kind: "treasure".to_string(),
                value: t.value,
            }));
        }

        let boss = world
            .get_resource::<BossSlot>()
            .and_then(|slot| slot.get())
            .map(|b| BossSnapshot {
                serial: b.serial,
                x: b.x,
                y: b.y,
                hp: b.hp,
                max_hp: b.max_hp,
                phase: b.phase,
            });

        let zones = world
            .get_resource::<ZoneController>()
            .map(|c| c.zones().iter().map(zone_snapshot).collect())
            .unwrap_or_default();

        let turrets = world
            .get_resource::<TurretController>()
            .map(|c| {
                c.turrets()
                    .iter()
                    .map(|t| TurretSnapshot {
                        id: t.id,
                        x: t.x,
                        y: t.y,
                        shots_fired: t.shots_fired,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            tick,
            time,
            player,
            enemies,
            pickups,
            projectiles: world
                .get_resource::<ProjectilePool>()
                .map_or(0, |p| p.active_count()),
            boss,
            zones,
            turrets,
            stats: world.get_resource::<CombatStats>().cloned().unwrap_or_default(),
            damage_events: world
                .get_resource::<DamageLog>()
                .map(|log| log.events.clone())
                .unwrap_or_default(),
        }
    }

    /// Serialize snapshot to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize snapshot to pretty JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn zone_snapshot(zone: &ChasingZone) -> ZoneSnapshot {
    ZoneSnapshot {
        id: zone.id,
        x: zone.x,
        y: zone.y,
        radius: zone.params.radius,
        phase: zone.phase,
    }
}
