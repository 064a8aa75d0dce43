//! Horde Sim - Simulation Core
//!
//! A fixed-timestep simulation for horde survival games: pooled entities,
//! a uniform spatial grid, one damage resolver every weapon goes through,
//! ability controllers, and a worker pool for off-thread integration.
//! Uses `bevy_ecs` resources and systems for state and scheduling.

pub mod abilities;
pub mod api;
pub mod boss;
pub mod components;
pub mod config;
pub mod effects;
pub mod error;
pub mod offload;
pub mod paths;
pub mod physics;
pub mod pool;
pub mod profiler;
pub mod resolver;
pub mod spatial;
pub mod systems;
pub mod world;

pub use abilities::{AbilityState, CharacterId, ChasingZone, Meter, Turret, ZonePhase, ZoneSpec};
pub use api::SimWorld;
pub use boss::{Boss, BossPhase, BossSlot};
pub use components::*;
pub use config::SimConfig;
pub use effects::{Effect, EffectRecorder, EffectSink};
pub use error::{ConfigError, EffectError, OffloadError, PoolError, SimError};
pub use offload::{JobHandle, OffloadPool};
pub use paths::normalize_path;
pub use pool::{EntityId, Pool, Poolable, SlotHandle};
pub use profiler::FrameProfiler;
pub use resolver::{DamageOutcome, Resolver, Target, TargetRef};
pub use spatial::{SpatialEntry, SpatialGrid};
pub use world::Snapshot;
