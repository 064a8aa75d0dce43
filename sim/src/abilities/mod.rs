//! Ability and zone controllers.
//!
//! Each controller owns its instances outright and talks to the rest of the
//! simulation only through the `Resolver`, the spatial grid and the pools.
//!
//! - `zone` - chasing damage zones (`Inactive -> Active -> Expired`)
//! - `turret` - stationary emplacements firing pooled projectiles
//! - `character` - per-character ability meters as one tagged union

pub mod character;
pub mod turret;
pub mod zone;

pub use character::{ability_system, AbilityState, CharacterId, Meter};
pub use turret::{turret_system, Turret, TurretController};
pub use zone::{zone_system, ChasingZone, ZoneController, ZoneParams, ZonePhase, ZoneSpec, ZoneTarget};
