//! Fixed-capacity entity pools.
//!
//! Every pooled entity type (enemies, projectiles, gems, special items,
//! treasures) lives in a `Pool<T>`: a pre-sized array of slots, a free-list
//! stack of reusable indices, and a packed list of active indices that
//! gives a deterministic iteration order.
//!
//! ## Slot lifecycle
//!
//! ```text
//! Free --acquire--> Live --release--> Free
//!                     \--release during a pass--> PendingRelease --drain--> Free
//! ```
//!
//! Slots are never deallocated. When the free list runs dry the pool doubles
//! its slot count, up to a hard cap; beyond the cap the spawn is dropped and
//! counted. Releasing a slot resets its value and bumps its generation, so a
//! `SlotHandle` held across a release is detected as stale instead of
//! silently aliasing the next occupant.
//!
//! ## Deferred release
//!
//! While a pass over the active set is running (`for_each_active_mut`, or an
//! explicit `begin_deferred`/`end_deferred` bracket) releases are queued and
//! the slot is flagged `PendingRelease`: it is no longer active and cannot be
//! reused, but the packed active list is left untouched until the pass ends.

use crate::config::PoolLimits;
use crate::error::PoolError;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

const NOT_ACTIVE: u32 = u32::MAX;

/// A value that can live in a pool slot.
pub trait Poolable: Default + Send + Sync + 'static {
    /// Restore neutral defaults before the slot is reused.
    ///
    /// Types holding buffers should clear them here instead of reallocating.
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Stable identity of a pooled entity.
///
/// Unique for the lifetime of its pool: a reused slot carries a new
/// generation and therefore a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

/// Reference to a pool slot at a specific generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotHandle {
    index: u32,
    generation: u32,
}

impl SlotHandle {
    #[inline]
    pub fn index(&self) -> usize {
        self.index as usize
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Stable identity derived from slot index and generation.
    #[inline]
    pub fn id(&self) -> EntityId {
        EntityId(((self.generation as u64) << 32) | self.index as u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Free,
    Live,
    PendingRelease,
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    state: SlotState,
    value: T,
}

/// Result of a `release` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The slot was reset and returned to the free list.
    ReleasedNow,
    /// A pass is running; the slot is inactive and will be freed when it ends.
    ReleasePending,
    /// The handle did not refer to a live slot. Nothing was changed.
    Stale,
}

/// Returned by the `for_each_active_mut` visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassAction {
    Keep,
    Release,
}

/// Fixed-capacity object pool with a packed active set.
#[derive(Debug)]
pub struct Pool<T: Poolable> {
    slots: Vec<Slot<T>>,
    /// Stack of free slot indices. Lowest index pops first after growth.
    free: Vec<u32>,
    /// Packed indices of live and pending-release slots.
    active: Vec<u32>,
    /// Position of each slot inside `active`, or `NOT_ACTIVE`.
    active_pos: Vec<u32>,
    pending: Vec<SlotHandle>,
    deferring: u32,
    hard_cap: usize,
    dropped_spawns: u64,
}

impl<T: Poolable> Resource for Pool<T> {}

impl<T: Poolable> Default for Pool<T> {
    fn default() -> Self {
        Self::new(PoolLimits::default())
    }
}

impl<T: Poolable> Pool<T> {
    /// Create a pool pre-sized to `limits.initial` slots.
    pub fn new(limits: PoolLimits) -> Self {
        let initial = limits.initial.max(1);
        let hard_cap = limits.hard_cap.max(initial);
        let mut pool = Self {
            slots: Vec::with_capacity(initial),
            free: Vec::with_capacity(initial),
            active: Vec::with_capacity(initial),
            active_pos: Vec::with_capacity(initial),
            pending: Vec::new(),
            deferring: 0,
            hard_cap,
            dropped_spawns: 0,
        };
        pool.extend_to(initial);
        pool
    }

    /// Create a pool that never grows past `capacity`.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(PoolLimits {
            initial: capacity,
            hard_cap: capacity,
        })
    }

    fn extend_to(&mut self, new_len: usize) {
        let old_len = self.slots.len();
        for _ in old_len..new_len {
            self.slots.push(Slot {
                generation: 0,
                state: SlotState::Free,
                value: T::default(),
            });
            self.active_pos.push(NOT_ACTIVE);
        }
        for index in (old_len..new_len).rev() {
            self.free.push(index as u32);
        }
    }

    /// Double the slot count, bounded by the hard cap.
    fn grow(&mut self) -> bool {
        let old_len = self.slots.len();
        let new_len = (old_len * 2).min(self.hard_cap);
        if new_len <= old_len {
            return false;
        }
        self.extend_to(new_len);
        debug!(
            pool = std::any::type_name::<T>(),
            from = old_len,
            to = new_len,
            "pool grew"
        );
        true
    }

    /// Bind a free slot and return its handle.
    ///
    /// The slot holds neutral defaults. Fails with `AtCapacity` once the hard
    /// cap is reached; the failed request is counted in `dropped_spawns`.
    pub fn acquire(&mut self) -> Result<SlotHandle, PoolError> {
        if self.free.is_empty() && !self.grow() {
            self.dropped_spawns += 1;
            trace!(
                pool = std::any::type_name::<T>(),
                dropped = self.dropped_spawns,
                "spawn dropped at capacity"
            );
            return Err(PoolError::AtCapacity {
                capacity: self.slots.len(),
            });
        }
        let Some(index) = self.free.pop() else {
            return Err(PoolError::AtCapacity {
                capacity: self.slots.len(),
            });
        };
        let slot = &mut self.slots[index as usize];
        debug_assert_eq!(slot.state, SlotState::Free, "free list held a bound slot");
        slot.state = SlotState::Live;
        self.active_pos[index as usize] = self.active.len() as u32;
        self.active.push(index);
        Ok(SlotHandle {
            index,
            generation: slot.generation,
        })
    }

    /// Acquire a slot and move `value` into it.
    pub fn spawn(&mut self, value: T) -> Result<SlotHandle, PoolError> {
        let handle = self.acquire()?;
        self.slots[handle.index()].value = value;
        Ok(handle)
    }

    /// Return a slot to the pool.
    ///
    /// Releasing a handle that is not live (double release, or a handle from
    /// a previous generation) is a programming error: it panics in debug
    /// builds and is a logged no-op in release builds.
    pub fn release(&mut self, handle: SlotHandle) -> ReleaseOutcome {
        let live = self
            .slots
            .get(handle.index())
            .is_some_and(|slot| slot.generation == handle.generation && slot.state == SlotState::Live);
        if !live {
            warn!(
                pool = std::any::type_name::<T>(),
                index = handle.index,
                generation = handle.generation,
                "release of a slot that is not live"
            );
            if cfg!(debug_assertions) {
                panic!("double release of pool slot {handle:?}");
            }
            return ReleaseOutcome::Stale;
        }

        if self.deferring > 0 {
            self.slots[handle.index()].state = SlotState::PendingRelease;
            self.pending.push(handle);
            return ReleaseOutcome::ReleasePending;
        }

        self.release_now(handle.index);
        ReleaseOutcome::ReleasedNow
    }

    fn release_now(&mut self, index: u32) {
        let slot = &mut self.slots[index as usize];
        slot.value.reset();
        slot.state = SlotState::Free;
        slot.generation = slot.generation.wrapping_add(1);

        let pos = self.active_pos[index as usize] as usize;
        self.active.swap_remove(pos);
        if let Some(&moved) = self.active.get(pos) {
            self.active_pos[moved as usize] = pos as u32;
        }
        self.active_pos[index as usize] = NOT_ACTIVE;
        self.free.push(index);
    }

    /// Start a pass during which releases are deferred. Passes may nest.
    pub fn begin_deferred(&mut self) {
        self.deferring += 1;
    }

    /// End a deferred pass. The outermost end drains the pending queue and
    /// returns how many slots were freed.
    pub fn end_deferred(&mut self) -> usize {
        self.deferring = self.deferring.saturating_sub(1);
        if self.deferring > 0 {
            return 0;
        }
        let mut pending = std::mem::take(&mut self.pending);
        let drained = pending.len();
        for handle in pending.drain(..) {
            self.release_now(handle.index);
        }
        self.pending = pending;
        drained
    }

    /// Visit every active slot mutably. Slots for which the visitor returns
    /// `PassAction::Release` are freed after the pass completes.
    ///
    /// Returns the number of slots freed by this pass.
    pub fn for_each_active_mut<F>(&mut self, mut visit: F) -> usize
    where
        F: FnMut(SlotHandle, &mut T) -> PassAction,
    {
        self.begin_deferred();
        for pos in 0..self.active.len() {
            let index = self.active[pos];
            let slot = &mut self.slots[index as usize];
            if slot.state != SlotState::Live {
                continue;
            }
            let handle = SlotHandle {
                index,
                generation: slot.generation,
            };
            if visit(handle, &mut slot.value) == PassAction::Release {
                slot.state = SlotState::PendingRelease;
                self.pending.push(handle);
            }
        }
        self.end_deferred()
    }

    /// Visit every active slot in packed order.
    pub fn for_each_active<F>(&self, mut visit: F)
    where
        F: FnMut(SlotHandle, &T),
    {
        for (handle, value) in self.iter_active() {
            visit(handle, value);
        }
    }

    /// Iterate active slots in packed order.
    pub fn iter_active(&self) -> impl Iterator<Item = (SlotHandle, &T)> + '_ {
        self.active.iter().filter_map(move |&index| {
            let slot = &self.slots[index as usize];
            (slot.state == SlotState::Live).then_some((
                SlotHandle {
                    index,
                    generation: slot.generation,
                },
                &slot.value,
            ))
        })
    }

    /// Copy the active handles into `out` (cleared first).
    pub fn active_handles_into(&self, out: &mut Vec<SlotHandle>) {
        out.clear();
        out.extend(self.iter_active().map(|(handle, _)| handle));
    }

    /// Get a live slot's value. Returns `None` for stale or inactive handles.
    #[inline]
    pub fn get(&self, handle: SlotHandle) -> Option<&T> {
        self.slots
            .get(handle.index())
            .filter(|slot| slot.generation == handle.generation && slot.state == SlotState::Live)
            .map(|slot| &slot.value)
    }

    #[inline]
    pub fn get_mut(&mut self, handle: SlotHandle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index())
            .filter(|slot| slot.generation == handle.generation && slot.state == SlotState::Live)
            .map(|slot| &mut slot.value)
    }

    #[inline]
    pub fn is_active(&self, handle: SlotHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Number of live slots (pending releases excluded).
    pub fn active_count(&self) -> usize {
        self.active.len() - self.pending.len()
    }

    /// Current number of slots (grows by doubling).
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn hard_cap(&self) -> usize {
        self.hard_cap
    }

    /// Spawn requests dropped because the pool was at its hard cap.
    pub fn dropped_spawns(&self) -> u64 {
        self.dropped_spawns
    }

    /// Release every active slot.
    pub fn clear(&mut self) {
        self.begin_deferred();
        let mut handles = Vec::with_capacity(self.active.len());
        self.active_handles_into(&mut handles);
        for handle in handles {
            self.release(handle);
        }
        self.end_deferred();
    }
}
