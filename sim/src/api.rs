//! Public API for the simulation.
//!
//! `SimWorld` is the interface a game client drives: it owns the ECS world
//! and schedule, exposes spawn and damage commands, read-only views for
//! renderers and the HUD, and JSON snapshots.
//!
//! ## Fixed Timestep
//!
//! The simulation uses a fixed timestep internally (default 60 Hz). When
//! `step(dt)` is called, the simulation accumulates time and runs fixed
//! updates as needed. A paused world skips the whole step.
//!
//! ## Offloaded Integration
//!
//! With `offload.integrate_enemies` set, enemy positions are integrated on
//! the offload worker pool. Each tick applies the batch cut on an earlier
//! tick, runs the schedule (which then only steers), and cuts the next
//! batch. Rows for enemies that died in between are skipped.

use crate::abilities::{AbilityState, CharacterId, TurretController, ZoneController, ZoneSpec};
use crate::boss::{Boss, BossSlot};
use crate::components::*;
use crate::config::SimConfig;
use crate::effects::{EffectSink, Effects};
use crate::error::SimError;
use crate::physics::{EnemyIntegrator, IntegrationStats};
use crate::pool::SlotHandle;
use crate::profiler::FrameProfiler;
use crate::resolver::Combat;
use crate::spatial::SpatialGrid;
use crate::systems::*;
use crate::world::Snapshot;
use bevy_ecs::prelude::*;
use bevy_ecs::system::SystemState;
use std::time::Instant;
use tracing::{debug, info, warn};

/// The main simulation world container.
pub struct SimWorld {
    world: World,
    schedule: Schedule,
    tick: u64,
    time: f32,
    /// Accumulated time for fixed timestep.
    time_accumulator: f32,
    fixed_dt: f32,
    paused: bool,
    integrator: Option<EnemyIntegrator>,
    profiler: FrameProfiler,
    /// Resolver access for commands issued between ticks.
    combat: SystemState<Combat<'static, 'static>>,
}

impl SimWorld {
    /// Create a simulation world with the default configuration.
    pub fn new() -> Self {
        Self::assemble(SimConfig::default(), None)
    }

    /// Create a simulation world with a custom configuration. Fails if the
    /// configuration is invalid or the offload pool cannot start.
    pub fn with_config(config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;
        let integrator = if config.offload.integrate_enemies {
            let integrator = EnemyIntegrator::new(&config.offload).inspect_err(|err| {
                warn!(error = %err, "offload pool failed to start");
            })?;
            Some(integrator)
        } else {
            None
        };
        Ok(Self::assemble(config, integrator))
    }

    /// Parse, validate and build from a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        Self::with_config(SimConfig::from_json(json)?)
    }

    fn assemble(config: SimConfig, integrator: Option<EnemyIntegrator>) -> Self {
        let mut world = World::new();
        let pools = config.pools;

        // Core resources
        world.insert_resource(DeltaTime(config.fixed_timestep));
        world.insert_resource(SimTick::default());
        world.insert_resource(SimRng::seeded(config.seed));
        world.insert_resource(SpatialGrid::from_config(&config.grid));
        world.insert_resource(OffloadedIntegration(integrator.is_some()));

        // Pools
        world.insert_resource(EnemyPool::new(pools.enemies));
        world.insert_resource(ProjectilePool::new(pools.projectiles));
        world.insert_resource(GemPool::new(pools.gems));
        world.insert_resource(ItemPool::new(pools.items));
        world.insert_resource(TreasurePool::new(pools.treasures));

        // Actors and controllers
        world.insert_resource(Player::default());
        world.insert_resource(BossSlot::default());
        world.insert_resource(WaveDirector::default());
        world.insert_resource(ZoneController::default());
        world.insert_resource(TurretController::default());

        // Per-frame records
        world.insert_resource(DamageLog::default());
        world.insert_resource(DeathQueue::default());
        world.insert_resource(CombatStats::default());
        world.insert_resource(Effects::default());

        info!(
            fixed_timestep = config.fixed_timestep,
            seed = config.seed,
            enemy_cap = pools.enemies.hard_cap,
            offloaded = integrator.is_some(),
            "simulation world created"
        );
        let fixed_dt = config.fixed_timestep;
        let profiler = FrameProfiler::new(config.frame_budget_ms);
        world.insert_resource(config);

        let combat = SystemState::new(&mut world);
        Self {
            world,
            schedule: build_schedule(),
            tick: 0,
            time: 0.0,
            time_accumulator: 0.0,
            fixed_dt,
            paused: false,
            integrator,
            profiler,
            combat,
        }
    }

    /// Step the simulation forward by `dt` seconds. Returns the number of
    /// fixed ticks that ran.
    pub fn step(&mut self, dt: f32) -> u32 {
        if self.paused {
            return 0;
        }
        self.time_accumulator += dt.max(0.0);

        let mut ran = 0;
        while self.time_accumulator >= self.fixed_dt {
            self.fixed_update(self.fixed_dt);
            self.time_accumulator -= self.fixed_dt;
            ran += 1;
        }
        ran
    }

    /// Run a single fixed timestep update.
    fn fixed_update(&mut self, dt: f32) {
        let frame_start = Instant::now();
        if let Some(mut dt_res) = self.world.get_resource_mut::<DeltaTime>() {
            dt_res.0 = dt;
        }

        let started = Instant::now();
        if let Some(integrator) = self.integrator.as_mut() {
            self.world.resource_scope(|world, mut enemies: Mut<EnemyPool>| {
                let mut grid = world.resource_mut::<SpatialGrid>();
                integrator.poll(&mut enemies, &mut grid);
            });
        }
        self.record("integrate_apply", started);

        let started = Instant::now();
        self.schedule.run(&mut self.world);
        self.record("schedule", started);

        let started = Instant::now();
        if let Some(integrator) = self.integrator.as_mut() {
            integrator.submit(self.world.resource::<EnemyPool>(), dt);
        }
        self.record("integrate_submit", started);

        self.sync_dropped_spawns();
        self.tick += 1;
        self.time += dt;
        self.profiler.end_frame(frame_start.elapsed());
    }

    #[inline]
    fn record(&mut self, name: &'static str, since: Instant) {
        #[cfg(feature = "profile")]
        self.profiler.record_section(name, since.elapsed());
        #[cfg(not(feature = "profile"))]
        let _ = (name, since);
    }

    fn sync_dropped_spawns(&mut self) {
        let dropped = self.dropped_spawns();
        self.world.resource_mut::<CombatStats>().dropped_spawns = dropped;
    }

    /// Spawns refused at a pool cap, across every pool.
    pub fn dropped_spawns(&self) -> u64 {
        let w = &self.world;
        w.resource::<EnemyPool>().dropped_spawns()
            + w.resource::<ProjectilePool>().dropped_spawns()
            + w.resource::<GemPool>().dropped_spawns()
            + w.resource::<ItemPool>().dropped_spawns()
            + w.resource::<TreasurePool>().dropped_spawns()
    }

    /// Block until any in-flight integration batch is applied. Returns the
    /// rows applied.
    pub fn finish_integration(&mut self) -> usize {
        let Some(integrator) = self.integrator.as_mut() else {
            return 0;
        };
        self.world.resource_scope(|world, mut enemies: Mut<EnemyPool>| {
            let mut grid = world.resource_mut::<SpatialGrid>();
            integrator.finish(&mut enemies, &mut grid)
        })
    }

    pub fn integration_stats(&self) -> Option<IntegrationStats> {
        self.integrator.as_ref().map(|i| i.stats())
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Spawn a pooled enemy and index it. Fails at the pool cap.
    pub fn spawn_enemy(&mut self, kind: EnemyKind, x: f32, y: f32) -> Result<SlotHandle, SimError> {
        if kind == EnemyKind::Boss {
            return Err(SimError::NotPoolable(kind));
        }
        let handle = self.world.resource_mut::<EnemyPool>().spawn(Enemy::new(kind, x, y))?;
        self.world.resource_mut::<SpatialGrid>().insert(handle, x, y);
        Ok(handle)
    }

    /// Spawn the boss. At most one may be alive.
    pub fn spawn_boss(&mut self, x: f32, y: f32) -> Result<u32, SimError> {
        self.world.resource_mut::<BossSlot>().spawn(Boss::new(x, y))
    }

    /// Spawn a chasing zone owned by the player.
    pub fn spawn_zone(&mut self, x: f32, y: f32, spec: ZoneSpec) -> u32 {
        let bounds = self.world.resource::<SimConfig>().zone;
        self.world.resource_scope(|world, mut zones: Mut<ZoneController>| {
            zones.spawn(x, y, spec, world.resource::<Player>(), &bounds)
        })
    }

    /// Place a turret. When all emplacements are taken the oldest goes.
    pub fn place_turret(&mut self, x: f32, y: f32, lifetime: f32) -> u32 {
        self.world.resource_mut::<TurretController>().place(x, y, lifetime)
    }

    pub fn fire_projectile(&mut self, projectile: Projectile) -> Result<SlotHandle, SimError> {
        Ok(self.world.resource_mut::<ProjectilePool>().spawn(projectile)?)
    }

    /// Area damage from outside the simulation (scripted hazards, debug
    /// tools). Hits enemies and the boss. Returns the enemies hit.
    pub fn apply_area_damage(&mut self, x: f32, y: f32, radius: f32, amount: f32) -> usize {
        let mut combat = self.combat.get_mut(&mut self.world);
        let mut resolver = combat.resolver();
        let hit = resolver
            .apply_area_damage(x, y, radius, amount, WeaponTag::External, DamageSource::External)
            .len();
        resolver.apply_area_damage_to_boss(x, y, radius, amount, WeaponTag::External, DamageSource::External);
        hit
    }

    /// Re-index every live enemy from scratch.
    pub fn rebuild_grid(&mut self) {
        self.world.resource_scope(|world, mut grid: Mut<SpatialGrid>| {
            grid.rebuild(world.resource::<EnemyPool>(), |e: &Enemy| (e.x, e.y));
        });
        debug!("spatial grid rebuilt");
    }

    pub fn set_player_position(&mut self, x: f32, y: f32) {
        let mut player = self.world.resource_mut::<Player>();
        player.x = x;
        player.y = y;
    }

    /// Switch character. The ability meter starts over.
    pub fn set_character(&mut self, character: CharacterId) {
        let mut player = self.world.resource_mut::<Player>();
        player.character = character;
        player.ability = AbilityState::for_character(character);
    }

    pub fn set_effect_sink(&mut self, sink: Option<Box<dyn EffectSink>>) {
        self.world.resource_mut::<Effects>().set_sink(sink);
    }

    pub fn set_paused(&mut self, paused: bool) {
        if self.paused != paused {
            debug!(paused, tick = self.tick, "pause toggled");
        }
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    // ------------------------------------------------------------------
    // Read-only views
    // ------------------------------------------------------------------

    /// Visit every live enemy.
    pub fn for_each_active_enemy<F>(&self, mut visit: F)
    where
        F: FnMut(SlotHandle, &Enemy),
    {
        for (handle, enemy) in self.world.resource::<EnemyPool>().iter_active() {
            if enemy.is_alive() {
                visit(handle, enemy);
            }
        }
    }

    pub fn active_gems(&self) -> impl Iterator<Item = &Gem> + '_ {
        self.world.resource::<GemPool>().iter_active().map(|(_, g)| g)
    }

    pub fn special_items(&self) -> impl Iterator<Item = &SpecialItem> + '_ {
        self.world.resource::<ItemPool>().iter_active().map(|(_, i)| i)
    }

    pub fn treasures(&self) -> impl Iterator<Item = &Treasure> + '_ {
        self.world.resource::<TreasurePool>().iter_active().map(|(_, t)| t)
    }

    pub fn boss(&self) -> Option<&Boss> {
        self.world.resource::<BossSlot>().get()
    }

    pub fn player(&self) -> &Player {
        self.world.resource::<Player>()
    }

    pub fn stats(&self) -> &CombatStats {
        self.world.resource::<CombatStats>()
    }

    pub fn enemy_count(&self) -> usize {
        self.world.resource::<EnemyPool>().active_count()
    }

    /// Get the spatial grid reference (for debugging/visualization).
    pub fn spatial_grid(&self) -> &SpatialGrid {
        self.world.resource::<SpatialGrid>()
    }

    pub fn profiler(&self) -> &FrameProfiler {
        &self.profiler
    }

    /// Get a snapshot of the current simulation state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from_world(&self.world, self.tick, self.time)
    }

    /// Get the snapshot as a JSON string.
    pub fn snapshot_json(&self) -> String {
        self.snapshot().to_json().unwrap_or_else(|_| "{}".to_string())
    }

    /// Get the current tick number.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Get the elapsed simulation time.
    pub fn current_time(&self) -> f32 {
        self.time
    }

    /// Get direct access to the ECS world (for advanced usage).
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Get mutable access to the ECS world (for advanced usage).
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}
