//! Off-thread enemy integration.
//!
//! Enemy positions are gathered into a structure-of-arrays batch, integrated
//! on the offload pool and written back on a later frame. Each batch carries
//! the epoch it was cut in; a result whose epoch no longer matches is
//! discarded whole, and a result row whose handle went stale in the meantime
//! is skipped.
//!
//! ## Parallel Feature
//!
//! With `--features parallel` the kernel itself splits the batch across the
//! rayon pool.

use crate::components::EnemyPool;
use crate::config::OffloadConfig;
use crate::error::OffloadError;
use crate::offload::{JobHandle, OffloadPool};
use crate::pool::SlotHandle;
use crate::spatial::SpatialGrid;
use tracing::{debug, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Positions and velocities of every live enemy at gather time.
#[derive(Debug, Clone, Default)]
pub struct IntegrationBatch {
    pub epoch: u64,
    pub dt: f32,
    pub handles: Vec<SlotHandle>,
    pub xs: Vec<f32>,
    pub ys: Vec<f32>,
    pub vxs: Vec<f32>,
    pub vys: Vec<f32>,
}

impl IntegrationBatch {
    pub fn gather(enemies: &EnemyPool, epoch: u64, dt: f32) -> Self {
        let n = enemies.active_count();
        let mut batch = Self {
            epoch,
            dt,
            handles: Vec::with_capacity(n),
            xs: Vec::with_capacity(n),
            ys: Vec::with_capacity(n),
            vxs: Vec::with_capacity(n),
            vys: Vec::with_capacity(n),
        };
        for (handle, enemy) in enemies.iter_active() {
            batch.handles.push(handle);
            batch.xs.push(enemy.x);
            batch.ys.push(enemy.y);
            batch.vxs.push(enemy.vx);
            batch.vys.push(enemy.vy);
        }
        batch
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Integrated positions, row-aligned with the batch handles.
#[derive(Debug, Clone, Default)]
pub struct IntegrationResult {
    pub epoch: u64,
    pub handles: Vec<SlotHandle>,
    pub xs: Vec<f32>,
    pub ys: Vec<f32>,
}

/// Explicit Euler step over the whole batch.
pub fn integrate_batch(batch: IntegrationBatch) -> IntegrationResult {
    let IntegrationBatch {
        epoch,
        dt,
        handles,
        mut xs,
        mut ys,
        vxs,
        vys,
    } = batch;

    #[cfg(feature = "parallel")]
    {
        xs.par_iter_mut().zip(vxs.par_iter()).for_each(|(x, vx)| *x += vx * dt);
        ys.par_iter_mut().zip(vys.par_iter()).for_each(|(y, vy)| *y += vy * dt);
    }

    #[cfg(not(feature = "parallel"))]
    {
        for (x, vx) in xs.iter_mut().zip(&vxs) {
            *x += vx * dt;
        }
        for (y, vy) in ys.iter_mut().zip(&vys) {
            *y += vy * dt;
        }
    }

    IntegrationResult { epoch, handles, xs, ys }
}

/// Counters for what happened to returned results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntegrationStats {
    pub batches_applied: u64,
    pub batches_discarded: u64,
    pub rows_applied: u64,
    pub stale_rows: u64,
    pub faults: u64,
}

/// Write a result back. Returns the rows applied, or `None` when the whole
/// result was discarded for a stale epoch.
pub fn apply_result(
    result: &IntegrationResult,
    current_epoch: u64,
    enemies: &mut EnemyPool,
    grid: &mut SpatialGrid,
) -> Option<(usize, usize)> {
    if result.epoch != current_epoch {
        debug!(epoch = result.epoch, current_epoch, "stale integration result dropped");
        return None;
    }
    let mut applied = 0;
    let mut stale = 0;
    for ((&handle, &x), &y) in result.handles.iter().zip(&result.xs).zip(&result.ys) {
        let Some(enemy) = enemies.get_mut(handle) else {
            stale += 1;
            continue;
        };
        if !enemy.is_alive() {
            stale += 1;
            continue;
        }
        enemy.x = x;
        enemy.y = y;
        grid.refresh(handle, x, y);
        applied += 1;
    }
    Some((applied, stale))
}

/// Drives one in-flight integration job at a time.
pub struct EnemyIntegrator {
    pool: OffloadPool<IntegrationBatch, IntegrationResult>,
    in_flight: Option<JobHandle<IntegrationResult>>,
    epoch: u64,
    stats: IntegrationStats,
}

impl EnemyIntegrator {
    pub fn new(config: &OffloadConfig) -> Result<Self, OffloadError> {
        Ok(Self {
            pool: OffloadPool::from_config(config, integrate_batch)?,
            in_flight: None,
            epoch: 0,
            stats: IntegrationStats::default(),
        })
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn stats(&self) -> IntegrationStats {
        self.stats
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Invalidate whatever is in flight. Its result will be discarded.
    pub fn invalidate(&mut self) {
        self.epoch += 1;
    }

    /// Apply a finished result, if any. Returns rows applied.
    pub fn poll(&mut self, enemies: &mut EnemyPool, grid: &mut SpatialGrid) -> usize {
        let Some(handle) = self.in_flight.as_mut() else {
            return 0;
        };
        let Some(result) = handle.try_take() else {
            return 0;
        };
        self.in_flight = None;
        self.apply(result, enemies, grid)
    }

    /// Block on the in-flight job, then apply it.
    pub fn finish(&mut self, enemies: &mut EnemyPool, grid: &mut SpatialGrid) -> usize {
        match self.in_flight.take() {
            Some(handle) => self.apply(handle.wait(), enemies, grid),
            None => 0,
        }
    }

    fn apply(
        &mut self,
        result: Result<IntegrationResult, OffloadError>,
        enemies: &mut EnemyPool,
        grid: &mut SpatialGrid,
    ) -> usize {
        let result = match result {
            Ok(result) => result,
            Err(err) => {
                self.stats.faults += 1;
                warn!(error = %err, "enemy integration job failed");
                return 0;
            }
        };
        match apply_result(&result, self.epoch, enemies, grid) {
            Some((applied, stale)) => {
                self.stats.batches_applied += 1;
                self.stats.rows_applied += applied as u64;
                self.stats.stale_rows += stale as u64;
                applied
            }
            None => {
                self.stats.batches_discarded += 1;
                0
            }
        }
    }

    /// Cut a new batch unless one is already in flight.
    pub fn submit(&mut self, enemies: &EnemyPool, dt: f32) -> bool {
        if self.in_flight.is_some() {
            return false;
        }
        self.epoch += 1;
        let batch = IntegrationBatch::gather(enemies, self.epoch, dt);
        if batch.is_empty() {
            return false;
        }
        self.in_flight = Some(self.pool.submit(batch));
        true
    }
}
