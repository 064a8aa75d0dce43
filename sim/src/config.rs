//! Simulation configuration.
//!
//! Every tuning constant that is not a correctness constraint lives here so
//! it can be loaded from JSON and adjusted without a rebuild.

use crate::error::ConfigError;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Top-level configuration, inserted into the world as a resource.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed timestep in seconds (e.g., 1/60 for 60 Hz).
    pub fixed_timestep: f32,
    /// Frame budget used by the profiler to count overruns.
    pub frame_budget_ms: f32,
    /// Seed for spawn placement and loot rolls.
    pub seed: u64,
    /// Enemies farther than this from the player are recycled.
    pub despawn_distance: f32,
    pub grid: GridConfig,
    pub pools: PoolConfig,
    pub zone: ZoneBounds,
    pub turret: TurretConfig,
    pub waves: WaveConfig,
    pub loot: LootConfig,
    pub offload: OffloadConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: 1.0 / 60.0,
            frame_budget_ms: 16.0,
            seed: 0x5eed,
            despawn_distance: 1600.0,
            grid: GridConfig::default(),
            pools: PoolConfig::default(),
            zone: ZoneBounds::default(),
            turret: TurretConfig::default(),
            waves: WaveConfig::default(),
            loot: LootConfig::default(),
            offload: OffloadConfig::default(),
        }
    }
}

impl SimConfig {
    /// Parse and validate a JSON configuration document.
    /// Missing fields take their default values.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Check ranges that would otherwise produce degenerate behaviour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.fixed_timestep > 0.0) {
            return Err(invalid("fixed_timestep", "must be positive"));
        }
        if !(self.grid.cell_size() > 0.0) {
            return Err(invalid("grid", "cell size must be positive"));
        }
        if self.grid.query_pad < 0.0 {
            return Err(invalid("grid.query_pad", "must not be negative"));
        }
        for (field, limits) in [
            ("pools.enemies", self.pools.enemies),
            ("pools.projectiles", self.pools.projectiles),
            ("pools.gems", self.pools.gems),
            ("pools.items", self.pools.items),
            ("pools.treasures", self.pools.treasures),
        ] {
            if limits.initial == 0 || limits.hard_cap < limits.initial {
                return Err(invalid(field, "need 0 < initial <= hard_cap"));
            }
        }
        self.zone.validate()?;
        if self.offload.min_workers == 0 || self.offload.min_workers > self.offload.max_workers {
            return Err(invalid("offload", "need 0 < min_workers <= max_workers"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

/// Spatial grid tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Radius of a typical (small) enemy.
    pub typical_enemy_radius: f32,
    /// Cell size = typical radius x scale. Smaller cells mean fewer false
    /// positives per query but more cell changes per movement.
    pub cell_scale: f32,
    /// Extra distance added to every query's bounding box.
    pub query_pad: f32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            typical_enemy_radius: 12.0,
            cell_scale: 5.0,
            query_pad: 0.0,
        }
    }
}

impl GridConfig {
    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.typical_enemy_radius * self.cell_scale
    }
}

/// Initial slot count and hard cap for one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolLimits {
    pub initial: usize,
    pub hard_cap: usize,
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            initial: 256,
            hard_cap: 4096,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub enemies: PoolLimits,
    pub projectiles: PoolLimits,
    pub gems: PoolLimits,
    pub items: PoolLimits,
    pub treasures: PoolLimits,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            enemies: PoolLimits {
                initial: 512,
                hard_cap: 4096,
            },
            projectiles: PoolLimits {
                initial: 256,
                hard_cap: 2048,
            },
            gems: PoolLimits {
                initial: 512,
                hard_cap: 4096,
            },
            items: PoolLimits {
                initial: 16,
                hard_cap: 128,
            },
            treasures: PoolLimits {
                initial: 8,
                hard_cap: 64,
            },
        }
    }
}

/// Designer bounds applied to chasing zones after multipliers are applied.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneBounds {
    pub min_radius: f32,
    pub max_radius: f32,
    /// Ceiling on the target search radius after the area multiplier.
    pub max_chase_radius: f32,
    pub min_damage: f32,
    pub max_damage: f32,
    pub min_speed: f32,
    pub max_speed: f32,
    pub min_tick_interval: f32,
    pub max_lifetime: f32,
    /// Seconds between target re-acquisitions.
    pub retarget_interval: f32,
    /// Steering acceleration in units/s^2.
    pub acceleration: f32,
    /// Largest displacement allowed in a single update.
    pub max_step: f32,
    /// Burn applied to enemies caught in a zone tick (damage per second).
    pub burn_dps: f32,
    pub burn_duration: f32,
}

impl Default for ZoneBounds {
    fn default() -> Self {
        Self {
            min_radius: 24.0,
            max_radius: 220.0,
            max_chase_radius: 900.0,
            min_damage: 1.0,
            max_damage: 500.0,
            min_speed: 20.0,
            max_speed: 420.0,
            min_tick_interval: 0.1,
            max_lifetime: 30.0,
            retarget_interval: 0.18,
            acceleration: 900.0,
            max_step: 24.0,
            burn_dps: 0.0,
            burn_duration: 2.0,
        }
    }
}

impl ZoneBounds {
    /// Every bound is finite and each min/max pair is ordered, so clamping
    /// against them cannot panic.
    fn validate(&self) -> Result<(), ConfigError> {
        for (field, min, max) in [
            ("zone.radius", self.min_radius, self.max_radius),
            ("zone.damage", self.min_damage, self.max_damage),
            ("zone.speed", self.min_speed, self.max_speed),
        ] {
            if !(min.is_finite() && max.is_finite() && min <= max) {
                return Err(invalid(field, "need finite min <= max"));
            }
        }
        if !(self.min_damage > 0.0) {
            return Err(invalid("zone.min_damage", "damage floor must be positive"));
        }
        for (field, value) in [
            ("zone.max_chase_radius", self.max_chase_radius),
            ("zone.acceleration", self.acceleration),
            ("zone.max_step", self.max_step),
        ] {
            if !(value > 0.0) {
                return Err(invalid(field, "must be positive"));
            }
        }
        for (field, value) in [
            ("zone.max_lifetime", self.max_lifetime),
            ("zone.retarget_interval", self.retarget_interval),
            ("zone.min_tick_interval", self.min_tick_interval),
            ("zone.burn_dps", self.burn_dps),
            ("zone.burn_duration", self.burn_duration),
        ] {
            if !(value >= 0.0) {
                return Err(invalid(field, "must not be negative"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TurretConfig {
    pub range: f32,
    pub cooldown: f32,
    pub projectile_speed: f32,
    pub projectile_lifetime: f32,
    pub projectile_radius: f32,
    pub damage: f32,
    pub pierce: u32,
    pub crit_chance: f32,
    pub crit_multiplier: f32,
}

impl Default for TurretConfig {
    fn default() -> Self {
        Self {
            range: 320.0,
            cooldown: 0.5,
            projectile_speed: 600.0,
            projectile_lifetime: 1.2,
            projectile_radius: 6.0,
            damage: 12.0,
            pierce: 1,
            crit_chance: 0.1,
            crit_multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveConfig {
    pub enabled: bool,
    /// Enemies per second at t = 0.
    pub base_rate: f32,
    /// Added to the rate every minute.
    pub rate_growth_per_minute: f32,
    /// Ring around the player where enemies appear.
    pub spawn_radius_min: f32,
    pub spawn_radius_max: f32,
    /// Elapsed seconds after which the boss spawns (negative = never).
    pub boss_at: f32,
    /// Spawns per frame above which the grid is rebuilt in bulk.
    pub bulk_threshold: usize,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_rate: 2.0,
            rate_growth_per_minute: 6.0,
            spawn_radius_min: 700.0,
            spawn_radius_max: 900.0,
            boss_at: 300.0,
            bulk_threshold: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LootConfig {
    pub special_item_chance: f32,
    pub magnet_radius: f32,
    pub pickup_radius: f32,
    pub magnet_speed: f32,
}

impl Default for LootConfig {
    fn default() -> Self {
        Self {
            special_item_chance: 0.01,
            magnet_radius: 120.0,
            pickup_radius: 18.0,
            magnet_speed: 420.0,
        }
    }
}

/// Offload worker pool sizing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct OffloadConfig {
    /// Run enemy integration on the offload pool instead of the main step.
    pub integrate_enemies: bool,
    /// Fixed worker count; `None` derives it from available parallelism.
    pub workers: Option<usize>,
    pub min_workers: usize,
    pub max_workers: usize,
}

impl Default for OffloadConfig {
    fn default() -> Self {
        Self {
            integrate_enemies: false,
            workers: None,
            min_workers: 2,
            max_workers: 8,
        }
    }
}

impl OffloadConfig {
    /// Worker count: explicit value or CPU count, clamped to the configured range.
    pub fn worker_count(&self) -> usize {
        let wanted = self
            .workers
            .unwrap_or_else(|| num_cpus::get().saturating_sub(1));
        wanted.clamp(self.min_workers, self.max_workers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = SimConfig::from_json(r#"{ "seed": 42, "grid": { "query_pad": 8.0 } }"#).unwrap();
        assert_eq!(config.seed, 42);
        assert_eq!(config.grid.query_pad, 8.0);
        assert_eq!(config.grid.typical_enemy_radius, 12.0);
        assert_eq!(config.pools.enemies.hard_cap, 4096);
    }

    #[test]
    fn test_rejects_inverted_pool_limits() {
        let err = SimConfig::from_json(r#"{ "pools": { "gems": { "initial": 64, "hard_cap": 8 } } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "pools.gems", .. }));
    }

    #[test]
    fn test_rejects_negative_zone_lifetime() {
        let err = SimConfig::from_json(r#"{ "zone": { "max_lifetime": -1.0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "zone.max_lifetime", .. }));
    }

    #[test]
    fn test_rejects_non_positive_zone_acceleration() {
        let err = SimConfig::from_json(r#"{ "zone": { "acceleration": -900.0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "zone.acceleration", .. }));
        let err = SimConfig::from_json(r#"{ "zone": { "acceleration": 0.0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "zone.acceleration", .. }));
    }

    #[test]
    fn test_rejects_non_positive_zone_step() {
        let err = SimConfig::from_json(r#"{ "zone": { "max_step": 0.0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "zone.max_step", .. }));
    }

    #[test]
    fn test_rejects_inverted_zone_bounds() {
        let err = SimConfig::from_json(r#"{ "zone": { "min_speed": 500.0, "max_speed": 100.0 } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "zone.speed", .. }));
        let err = SimConfig::from_json(r#"{ "zone": { "retarget_interval": -0.5 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "zone.retarget_interval", .. }));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(SimConfig::from_json("{ nope"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_worker_count_is_clamped() {
        let config = OffloadConfig {
            workers: Some(64),
            ..Default::default()
        };
        assert_eq!(config.worker_count(), 8);
        let config = OffloadConfig {
            workers: Some(0),
            ..Default::default()
        };
        assert_eq!(config.worker_count(), 2);
    }
}
