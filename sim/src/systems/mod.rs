//! ECS systems for the horde simulation.
//!
//! Every system is a plain function over resources. One fixed tick runs the
//! whole schedule once, strictly in this order:
//!
//! **Frame start**
//! - `frame_start_system` - clears the damage log, advances the tick
//!
//! **Population**
//! - `wave_spawn_system` - spawn ring around the player, boss arrival
//! - `boss_system` - boss phases, chase and contact
//! - `enemy_movement_system` - steer, integrate, recycle far enemies
//!
//! **Damage**
//! - `ability_system` - meters, zone and turret triggers
//! - `projectile_system` - moves shots, resolves hits
//! - `burn_system` - damage over time
//! - `zone_system` - chasing zones
//! - `turret_system` - emplacements fire
//! - `contact_damage_system` - enemies touching the player
//!
//! **Aftermath**
//! - `loot_system` - death records become drops
//! - `pickup_system` - magnet and collection

pub mod combat;
pub mod loot;
pub mod movement;
pub mod spawning;

pub use combat::*;
pub use loot::*;
pub use movement::*;
pub use spawning::*;

use crate::abilities::{ability_system, turret_system, zone_system};
use crate::boss::boss_system;
use bevy_ecs::prelude::*;

/// The per-tick schedule, chained in the order listed above.
pub fn build_schedule() -> Schedule {
    let mut schedule = Schedule::default();

    schedule.add_systems(
        (
            frame_start_system,
            wave_spawn_system,
            boss_system,
            enemy_movement_system,
        )
            .chain(),
    );

    schedule.add_systems(
        (
            ability_system,
            projectile_system,
            burn_system,
            zone_system,
            turret_system,
            contact_damage_system,
        )
            .chain()
            .after(enemy_movement_system),
    );

    schedule.add_systems((loot_system, pickup_system).chain().after(contact_damage_system));

    schedule
}
