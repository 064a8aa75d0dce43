//! Per-character ability meters.
//!
//! Each character has its own resource to manage (heat, turret charges,
//! ward). The state is a tagged union keyed by `CharacterId`; every reader
//! goes through one exhaustive `match`, so adding a character is a compile
//! error everywhere it is not handled yet.

use crate::abilities::turret::TurretController;
use crate::abilities::zone::{ZoneController, ZoneSpec};
use crate::components::{CombatStats, Player};
use crate::config::SimConfig;
use crate::systems::movement::DeltaTime;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CharacterId {
    /// Builds heat from kills; a full meter releases a chasing fire zone.
    #[default]
    Pyromancer,
    /// Stores charges over time and spends them on turret emplacements.
    Engineer,
    /// Carries a regenerating ward that absorbs contact damage.
    Warden,
}

const PYRO_MAX_HEAT: f32 = 100.0;
const PYRO_HEAT_PER_KILL: f32 = 4.0;
const PYRO_HEAT_DECAY: f32 = 2.0;

const ENGINEER_MAX_CHARGES: u32 = 3;
const ENGINEER_RECHARGE: f32 = 8.0;
const ENGINEER_TURRET_LIFETIME: f32 = 20.0;

const WARDEN_MAX_WARD: f32 = 40.0;
const WARDEN_WARD_REGEN: f32 = 4.0;

/// Ability state, one variant per character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "character", rename_all = "snake_case")]
pub enum AbilityState {
    Pyromancer { heat: f32 },
    Engineer { charges: u32, recharge_left: f32 },
    Warden { ward: f32 },
}

/// Uniform HUD view of an ability meter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Meter {
    pub label: &'static str,
    pub value: f32,
    pub max: f32,
}

impl Meter {
    pub fn fraction(&self) -> f32 {
        if self.max <= 0.0 {
            0.0
        } else {
            (self.value / self.max).clamp(0.0, 1.0)
        }
    }
}

impl AbilityState {
    pub fn for_character(id: CharacterId) -> Self {
        match id {
            CharacterId::Pyromancer => AbilityState::Pyromancer { heat: 0.0 },
            CharacterId::Engineer => AbilityState::Engineer {
                charges: 1,
                recharge_left: ENGINEER_RECHARGE,
            },
            CharacterId::Warden => AbilityState::Warden {
                ward: WARDEN_MAX_WARD,
            },
        }
    }

    pub fn character(&self) -> CharacterId {
        match self {
            AbilityState::Pyromancer { .. } => CharacterId::Pyromancer,
            AbilityState::Engineer { .. } => CharacterId::Engineer,
            AbilityState::Warden { .. } => CharacterId::Warden,
        }
    }

    pub fn meter(&self) -> Meter {
        match *self {
            AbilityState::Pyromancer { heat } => Meter {
                label: "heat",
                value: heat,
                max: PYRO_MAX_HEAT,
            },
            AbilityState::Engineer { charges, .. } => Meter {
                label: "charges",
                value: charges as f32,
                max: ENGINEER_MAX_CHARGES as f32,
            },
            AbilityState::Warden { ward } => Meter {
                label: "ward",
                value: ward,
                max: WARDEN_MAX_WARD,
            },
        }
    }

    /// Passive regeneration and decay.
    pub fn tick(&mut self, dt: f32) {
        match self {
            AbilityState::Pyromancer { heat } => {
                *heat = (*heat - PYRO_HEAT_DECAY * dt).max(0.0);
            }
            AbilityState::Engineer {
                charges,
                recharge_left,
            } => {
                if *charges >= ENGINEER_MAX_CHARGES {
                    *recharge_left = ENGINEER_RECHARGE;
                    return;
                }
                *recharge_left -= dt;
                if *recharge_left <= 0.0 {
                    *charges += 1;
                    *recharge_left += ENGINEER_RECHARGE;
                }
            }
            AbilityState::Warden { ward } => {
                *ward = (*ward + WARDEN_WARD_REGEN * dt).min(WARDEN_MAX_WARD);
            }
        }
    }

    pub fn on_kills(&mut self, kills: u64) {
        if let AbilityState::Pyromancer { heat } = self {
            *heat = (*heat + PYRO_HEAT_PER_KILL * kills as f32).min(PYRO_MAX_HEAT);
        }
    }

    /// Soak incoming contact damage. Returns what gets through.
    pub fn absorb(&mut self, amount: f32) -> f32 {
        match self {
            AbilityState::Warden { ward } => {
                let soaked = amount.min(*ward);
                *ward -= soaked;
                amount - soaked
            }
            AbilityState::Pyromancer { .. } | AbilityState::Engineer { .. } => amount,
        }
    }

    /// Consume a full meter. Returns true if the ability fires this frame.
    fn try_trigger(&mut self) -> bool {
        match self {
            AbilityState::Pyromancer { heat } if *heat >= PYRO_MAX_HEAT => {
                *heat = 0.0;
                true
            }
            AbilityState::Engineer { charges, .. } if *charges > 0 => {
                *charges -= 1;
                true
            }
            _ => false,
        }
    }
}

/// Base zone released by a full heat meter.
pub const PYRO_ZONE: ZoneSpec = ZoneSpec {
    radius: 90.0,
    damage: 18.0,
    tick_interval: 0.25,
    speed: 260.0,
    chase_radius: 400.0,
    lifetime: 6.0,
};

/// Advance the player's ability meter and fire the ability when ready.
pub fn ability_system(
    dt: Res<DeltaTime>,
    config: Res<SimConfig>,
    stats: Res<CombatStats>,
    mut seen_kills: Local<u64>,
    mut player: ResMut<Player>,
    mut zones: ResMut<ZoneController>,
    mut turrets: ResMut<TurretController>,
) {
    let new_kills = stats.kills.saturating_sub(*seen_kills);
    *seen_kills = stats.kills;
    if !player.is_alive() {
        return;
    }

    player.ability.tick(dt.0);
    player.ability.on_kills(new_kills);

    match player.ability.character() {
        CharacterId::Pyromancer => {
            if player.ability.try_trigger() {
                let id = zones.spawn(player.x, player.y, PYRO_ZONE, &*player, &config.zone);
                debug!(zone = id, "heat released");
            }
        }
        CharacterId::Engineer => {
            if turrets.has_room() && player.ability.try_trigger() {
                let id = turrets.place(player.x, player.y, ENGINEER_TURRET_LIFETIME);
                debug!(turret = id, "turret deployed");
            }
        }
        CharacterId::Warden => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_matches_character() {
        for id in [CharacterId::Pyromancer, CharacterId::Engineer, CharacterId::Warden] {
            assert_eq!(AbilityState::for_character(id).character(), id);
        }
    }

    #[test]
    fn test_heat_fills_and_triggers_once() {
        let mut state = AbilityState::for_character(CharacterId::Pyromancer);
        state.on_kills(1000);
        assert_eq!(state.meter().fraction(), 1.0);
        assert!(state.try_trigger());
        assert!(!state.try_trigger());
        assert_eq!(state.meter().value, 0.0);
    }

    #[test]
    fn test_engineer_recharges_to_cap() {
        let mut state = AbilityState::for_character(CharacterId::Engineer);
        for _ in 0..100 {
            state.tick(1.0);
        }
        assert_eq!(state.meter().value, ENGINEER_MAX_CHARGES as f32);
    }

    #[test]
    fn test_ward_absorbs_then_passes_through() {
        let mut state = AbilityState::for_character(CharacterId::Warden);
        assert_eq!(state.absorb(30.0), 0.0);
        assert_eq!(state.absorb(30.0), 20.0);
        assert_eq!(state.absorb(5.0), 5.0);

        let mut pyro = AbilityState::for_character(CharacterId::Pyromancer);
        assert_eq!(pyro.absorb(7.0), 7.0);
    }

    #[test]
    fn test_state_serializes_with_tag() {
        let json = serde_json::to_string(&AbilityState::Warden { ward: 1.5 }).unwrap();
        assert_eq!(json, r#"{"character":"warden","ward":1.5}"#);
    }

    #[test]
    fn test_full_heat_spawns_zone() {
        let mut world = World::new();
        world.insert_resource(DeltaTime(1.0 / 60.0));
        world.insert_resource(SimConfig::default());
        world.insert_resource(CombatStats {
            kills: 50,
            ..Default::default()
        });
        world.insert_resource(Player::new(CharacterId::Pyromancer));
        world.insert_resource(ZoneController::default());
        world.insert_resource(TurretController::default());

        let mut schedule = Schedule::default();
        schedule.add_systems(ability_system);
        schedule.run(&mut world);

        assert_eq!(world.resource::<ZoneController>().active_count(), 1);
        assert!(world.resource::<Player>().ability.meter().value < PYRO_MAX_HEAT);
    }
}
