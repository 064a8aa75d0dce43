//! Spatial partitioning for proximity queries.
//!
//! Provides O(1) cell lookup and O(k) neighbor queries where k is the number
//! of entities in nearby cells, rather than O(n) for brute force.
//!
//! Queries return *candidates*: every entry in the cells covering the
//! query's bounding box. There is no geometric pre-filter; callers do the
//! exact `dx*dx + dy*dy <= r*r` check against the entity's live position.
//!
//! The grid is updated incrementally as entities move (remove from the old
//! cell, append to the new one, both O(1) via swap-remove and a per-slot
//! placement table). `rebuild` is reserved for bulk spawn/despawn.

use crate::config::GridConfig;
use crate::pool::{Pool, Poolable, SlotHandle};
use bevy_ecs::prelude::*;
use rustc_hash::FxHashMap;

/// Integer cell coordinates.
pub type CellKey = (i32, i32);

/// Entry in a spatial cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialEntry {
    pub handle: SlotHandle,
    /// Position at the time of the last refresh.
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy)]
struct Placement {
    cell: CellKey,
    /// Index inside the cell's entry list.
    slot: usize,
}

/// Uniform grid over world space, keyed by pool slot.
#[derive(Resource, Debug)]
pub struct SpatialGrid {
    cell_size: f32,
    inv_cell_size: f32,
    /// Added to every query's half-extent.
    query_pad: f32,
    cells: FxHashMap<CellKey, Vec<SpatialEntry>>,
    /// Reverse lookup by slot index.
    placements: Vec<Option<Placement>>,
    count: usize,
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::from_config(&GridConfig::default())
    }
}

impl SpatialGrid {
    /// Create a new spatial grid with the given cell size.
    pub fn new(cell_size: f32) -> Self {
        Self::with_pad(cell_size, 0.0)
    }

    pub fn with_pad(cell_size: f32, query_pad: f32) -> Self {
        Self {
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            query_pad,
            cells: FxHashMap::default(),
            placements: Vec::new(),
            count: 0,
        }
    }

    pub fn from_config(config: &GridConfig) -> Self {
        Self::with_pad(config.cell_size(), config.query_pad)
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Convert world coordinates to cell coordinates.
    #[inline]
    pub fn world_to_cell(&self, x: f32, y: f32) -> CellKey {
        (
            (x * self.inv_cell_size).floor() as i32,
            (y * self.inv_cell_size).floor() as i32,
        )
    }

    /// Remove every entry. Cell buffers keep their capacity.
    pub fn clear(&mut self) {
        for entries in self.cells.values_mut() {
            entries.clear();
        }
        self.placements.iter_mut().for_each(|p| *p = None);
        self.count = 0;
    }

    /// Insert an entity, or refresh it if already present.
    pub fn insert(&mut self, handle: SlotHandle, x: f32, y: f32) {
        let cell = self.world_to_cell(x, y);
        let index = handle.index();
        if index >= self.placements.len() {
            self.placements.resize(index + 1, None);
        }

        if let Some(placement) = self.placements[index] {
            let same_entity = self
                .cells
                .get(&placement.cell)
                .and_then(|entries| entries.get(placement.slot))
                .is_some_and(|entry| entry.handle == handle);
            if same_entity && placement.cell == cell {
                if let Some(entry) = self
                    .cells
                    .get_mut(&cell)
                    .and_then(|entries| entries.get_mut(placement.slot))
                {
                    entry.x = x;
                    entry.y = y;
                }
                return;
            }
            // Moved cell, or the slot was reused by a new occupant.
            self.remove_index(index);
        }

        let entries = self.cells.entry(cell).or_default();
        self.placements[index] = Some(Placement {
            cell,
            slot: entries.len(),
        });
        entries.push(SpatialEntry { handle, x, y });
        self.count += 1;
    }

    /// Alias of `insert`, used on movement.
    #[inline]
    pub fn refresh(&mut self, handle: SlotHandle, x: f32, y: f32) {
        self.insert(handle, x, y);
    }

    /// Remove an entity from the grid. Stale handles are ignored.
    pub fn remove(&mut self, handle: SlotHandle) -> bool {
        let Some(Some(placement)) = self.placements.get(handle.index()).copied() else {
            return false;
        };
        let matches = self
            .cells
            .get(&placement.cell)
            .and_then(|entries| entries.get(placement.slot))
            .is_some_and(|entry| entry.handle == handle);
        if matches {
            self.remove_index(handle.index());
        }
        matches
    }

    fn remove_index(&mut self, index: usize) {
        let Some(placement) = self.placements[index].take() else {
            return;
        };
        if let Some(entries) = self.cells.get_mut(&placement.cell) {
            entries.swap_remove(placement.slot);
            if let Some(moved) = entries.get(placement.slot) {
                self.placements[moved.handle.index()] = Some(placement);
            }
            self.count -= 1;
        }
    }

    /// Whether the grid currently holds this exact handle.
    pub fn contains(&self, handle: SlotHandle) -> bool {
        self.placements
            .get(handle.index())
            .copied()
            .flatten()
            .and_then(|p| self.cells.get(&p.cell).and_then(|e| e.get(p.slot)))
            .is_some_and(|entry| entry.handle == handle)
    }

    /// Collect candidates near a circle into `out` (cleared first).
    pub fn query_into(&self, x: f32, y: f32, radius: f32, out: &mut Vec<SpatialEntry>) {
        let r = radius.max(0.0) + self.query_pad;
        self.collect_block(
            self.world_to_cell(x - r, y - r),
            self.world_to_cell(x + r, y + r),
            out,
        );
    }

    /// Candidates near a circle. Callers must re-check exact distance.
    pub fn query(&self, x: f32, y: f32, radius: f32) -> Vec<SpatialEntry> {
        let mut out = Vec::new();
        self.query_into(x, y, radius, &mut out);
        out
    }

    /// Collect candidates overlapping a rectangle into `out` (cleared first).
    pub fn query_rect_into(
        &self,
        min_x: f32,
        min_y: f32,
        max_x: f32,
        max_y: f32,
        out: &mut Vec<SpatialEntry>,
    ) {
        let pad = self.query_pad;
        self.collect_block(
            self.world_to_cell(min_x.min(max_x) - pad, min_y.min(max_y) - pad),
            self.world_to_cell(max_x.max(min_x) + pad, max_y.max(min_y) + pad),
            out,
        );
    }

    pub fn query_rect(&self, min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Vec<SpatialEntry> {
        let mut out = Vec::new();
        self.query_rect_into(min_x, min_y, max_x, max_y, &mut out);
        out
    }

    fn collect_block(&self, min: CellKey, max: CellKey, out: &mut Vec<SpatialEntry>) {
        out.clear();
        for cy in min.1..=max.1 {
            for cx in min.0..=max.0 {
                if let Some(entries) = self.cells.get(&(cx, cy)) {
                    out.extend_from_slice(entries);
                }
            }
        }
    }

    /// Rebuild from scratch from every active entity in a pool.
    pub fn rebuild<T, F>(&mut self, pool: &Pool<T>, position: F)
    where
        T: Poolable,
        F: Fn(&T) -> (f32, f32),
    {
        self.clear();
        for (handle, value) in pool.iter_active() {
            let (x, y) = position(value);
            self.insert(handle, x, y);
        }
    }

    /// Get count of entities in a cell.
    pub fn cell_count(&self, cell: CellKey) -> usize {
        self.cells.get(&cell).map(|v| v.len()).unwrap_or(0)
    }

    /// Get total entity count.
    pub fn total_count(&self) -> usize {
        self.count
    }

    /// Get all non-empty cells (for debugging/visualization).
    pub fn all_cells(&self) -> impl Iterator<Item = (&CellKey, &Vec<SpatialEntry>)> {
        self.cells.iter().filter(|(_, entries)| !entries.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Enemy, EnemyKind, EnemyPool};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;

    fn exact_within(grid: &SpatialGrid, pool: &EnemyPool, x: f32, y: f32, r: f32) -> HashSet<SlotHandle> {
        grid.query(x, y, r)
            .into_iter()
            .filter(|entry| {
                pool.get(entry.handle).is_some_and(|e| {
                    let dx = e.x - x;
                    let dy = e.y - y;
                    dx * dx + dy * dy <= r * r
                })
            })
            .map(|entry| entry.handle)
            .collect()
    }

    #[test]
    fn test_spatial_grid_insert_query() {
        let mut pool = EnemyPool::with_capacity(8);
        let mut grid = SpatialGrid::new(10.0);

        for (x, y) in [(5.0, 5.0), (15.0, 5.0), (100.0, 100.0)] {
            let h = pool.spawn(Enemy::new(EnemyKind::Small, x, y)).unwrap();
            grid.insert(h, x, y);
        }

        assert_eq!(exact_within(&grid, &pool, 5.0, 5.0, 15.0).len(), 2);
        assert_eq!(exact_within(&grid, &pool, 5.0, 5.0, 5.0).len(), 1);
        assert_eq!(exact_within(&grid, &pool, 100.0, 100.0, 10.0).len(), 1);
        assert_eq!(grid.total_count(), 3);
    }

    #[test]
    fn test_refresh_moves_between_cells() {
        let mut pool = EnemyPool::with_capacity(4);
        let mut grid = SpatialGrid::new(10.0);
        let a = pool.spawn(Enemy::new(EnemyKind::Small, 1.0, 1.0)).unwrap();
        let b = pool.spawn(Enemy::new(EnemyKind::Small, 2.0, 2.0)).unwrap();
        grid.insert(a, 1.0, 1.0);
        grid.insert(b, 2.0, 2.0);
        assert_eq!(grid.cell_count((0, 0)), 2);

        grid.refresh(a, 55.0, 1.0);
        assert_eq!(grid.cell_count((0, 0)), 1);
        assert_eq!(grid.cell_count((5, 0)), 1);
        assert!(grid.contains(a));
        assert!(grid.contains(b));
        assert_eq!(grid.total_count(), 2);

        // Swap-remove must keep the moved entry's placement correct.
        assert!(grid.remove(b));
        assert!(!grid.contains(b));
        assert!(grid.contains(a));
    }

    #[test]
    fn test_stale_handle_does_not_remove_new_occupant() {
        let mut pool = EnemyPool::with_capacity(1);
        let mut grid = SpatialGrid::new(10.0);
        let old = pool.spawn(Enemy::new(EnemyKind::Small, 0.0, 0.0)).unwrap();
        grid.insert(old, 0.0, 0.0);
        grid.remove(old);
        pool.release(old);

        let new = pool.spawn(Enemy::new(EnemyKind::Small, 0.0, 0.0)).unwrap();
        grid.insert(new, 0.0, 0.0);
        assert!(!grid.remove(old));
        assert!(grid.contains(new));
    }

    #[test]
    fn test_negative_coordinates_use_floor() {
        let grid = SpatialGrid::new(10.0);
        assert_eq!(grid.world_to_cell(-0.5, -10.0), (-1, -1));
        assert_eq!(grid.world_to_cell(9.99, 10.0), (0, 1));
    }

    #[test]
    fn test_query_rect() {
        let mut pool = EnemyPool::with_capacity(4);
        let mut grid = SpatialGrid::new(16.0);
        let inside = pool.spawn(Enemy::new(EnemyKind::Small, 40.0, 40.0)).unwrap();
        let outside = pool.spawn(Enemy::new(EnemyKind::Small, 400.0, 40.0)).unwrap();
        grid.insert(inside, 40.0, 40.0);
        grid.insert(outside, 400.0, 40.0);

        let found: Vec<_> = grid.query_rect(0.0, 0.0, 64.0, 64.0).iter().map(|e| e.handle).collect();
        assert!(found.contains(&inside));
        assert!(!found.contains(&outside));
    }

    #[test]
    fn test_query_pad_widens_candidates() {
        let mut pool = EnemyPool::with_capacity(2);
        let mut tight = SpatialGrid::with_pad(10.0, 0.0);
        let mut padded = SpatialGrid::with_pad(10.0, 30.0);
        let h = pool.spawn(Enemy::new(EnemyKind::Small, 45.0, 5.0)).unwrap();
        tight.insert(h, 45.0, 5.0);
        padded.insert(h, 45.0, 5.0);

        assert!(tight.query(5.0, 5.0, 5.0).is_empty());
        assert_eq!(padded.query(5.0, 5.0, 5.0).len(), 1);
    }

    #[test]
    fn test_removed_entity_never_returned() {
        let mut pool = EnemyPool::with_capacity(16);
        let mut grid = SpatialGrid::new(32.0);
        let mut handles = Vec::new();
        for i in 0..16 {
            let x = i as f32 * 4.0;
            let h = pool.spawn(Enemy::new(EnemyKind::Small, x, 0.0)).unwrap();
            grid.insert(h, x, 0.0);
            handles.push(h);
        }
        for h in handles.iter().step_by(2) {
            grid.remove(*h);
            pool.release(*h);
        }
        let results = grid.query(30.0, 0.0, 100.0);
        assert_eq!(results.len(), 8);
        assert!(results.iter().all(|e| pool.is_active(e.handle)));
    }

    /// 500 enemies over a 4000x4000 world, 1000 randomized layouts:
    /// filtered `query(2000, 2000, 200)` must equal brute force exactly.
    #[test]
    fn test_query_has_no_false_negatives_fuzz() {
        let mut rng = StdRng::seed_from_u64(0xA11CE);
        let mut pool = EnemyPool::with_capacity(500);
        let mut grid = SpatialGrid::from_config(&GridConfig::default());
        let (qx, qy, r) = (2000.0_f32, 2000.0_f32, 200.0_f32);

        for trial in 0..1000 {
            pool.clear();
            grid.clear();
            for _ in 0..500 {
                // Bias every other trial toward the query area so it is never empty.
                let (x, y) = if trial % 2 == 0 {
                    (rng.gen_range(0.0..4000.0), rng.gen_range(0.0..4000.0))
                } else {
                    (rng.gen_range(1700.0..2300.0), rng.gen_range(1700.0..2300.0))
                };
                let h = pool.spawn(Enemy::new(EnemyKind::Small, x, y)).unwrap();
                grid.insert(h, x, y);
            }

            let truth: HashSet<SlotHandle> = pool
                .iter_active()
                .filter(|(_, e)| {
                    let dx = e.x - qx;
                    let dy = e.y - qy;
                    dx * dx + dy * dy <= r * r
                })
                .map(|(h, _)| h)
                .collect();

            let found = exact_within(&grid, &pool, qx, qy, r);
            assert_eq!(found, truth, "trial {trial}: grid query disagrees with brute force");
        }
    }
}
