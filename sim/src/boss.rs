//! The boss singleton.
//!
//! At most one boss is alive at a time. It is not pooled and not indexed by
//! the spatial grid; the resolver and the ability controllers reach it
//! through the `BossSlot` resource they are handed explicitly.

use crate::components::{CombatStats, EnemyKind, Player, WeaponTag};
use crate::error::SimError;
use crate::systems::movement::DeltaTime;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Upper bound on boss damage reduction, whatever the phase.
const MAX_BOSS_REDUCTION: f32 = 0.75;
const BOSS_BASE_ARMOR: f32 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BossPhase {
    /// Above 66% health.
    Opening,
    /// 33% - 66% health.
    Enraged,
    /// Below 33% health.
    Desperate,
}

impl BossPhase {
    fn for_fraction(fraction: f32) -> Self {
        if fraction > 0.66 {
            BossPhase::Opening
        } else if fraction > 0.33 {
            BossPhase::Enraged
        } else {
            BossPhase::Desperate
        }
    }

    fn resistance_scale(self) -> f32 {
        match self {
            BossPhase::Opening => 1.0,
            BossPhase::Enraged => 1.25,
            BossPhase::Desperate => 1.5,
        }
    }

    fn speed_scale(self) -> f32 {
        match self {
            BossPhase::Opening => 1.0,
            BossPhase::Enraged => 1.2,
            BossPhase::Desperate => 1.45,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Boss {
    /// Spawn serial; unique per run.
    pub serial: u32,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub radius: f32,
    pub speed: f32,
    pub hp: f32,
    pub max_hp: f32,
    pub armor: f32,
    pub contact_damage: f32,
    pub phase: BossPhase,
    pub last_hit_by: Option<WeaponTag>,
}

impl Boss {
    pub fn new(x: f32, y: f32) -> Self {
        let stats = EnemyKind::Boss.stats();
        Self {
            serial: 0,
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            radius: stats.radius,
            speed: stats.speed,
            hp: stats.max_hp,
            max_hp: stats.max_hp,
            armor: BOSS_BASE_ARMOR,
            contact_damage: stats.contact_damage,
            phase: BossPhase::Opening,
            last_hit_by: None,
        }
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.hp > 0.0
    }

    /// Fraction of incoming damage absorbed: `armor / (armor + 100)`, scaled
    /// up in later phases and capped.
    pub fn damage_reduction(&self) -> f32 {
        let base = self.armor.max(0.0) / (self.armor.max(0.0) + 100.0);
        (base * self.phase.resistance_scale()).min(MAX_BOSS_REDUCTION)
    }

    pub fn mitigate(&self, amount: f32) -> f32 {
        amount * (1.0 - self.damage_reduction())
    }

    /// Recompute the phase from current health. Returns the new phase on a
    /// transition.
    pub fn update_phase(&mut self) -> Option<BossPhase> {
        let fraction = if self.max_hp > 0.0 { self.hp / self.max_hp } else { 0.0 };
        let phase = BossPhase::for_fraction(fraction);
        (phase != self.phase).then(|| {
            self.phase = phase;
            phase
        })
    }
}

/// Holder of the optional boss. Passed explicitly to the resolver and
/// ability controllers.
#[derive(Resource, Debug, Default)]
pub struct BossSlot {
    boss: Option<Boss>,
    spawned: u32,
}

impl BossSlot {
    /// Install a boss. Fails if one is already alive.
    pub fn spawn(&mut self, mut boss: Boss) -> Result<u32, SimError> {
        if self.boss.is_some() {
            return Err(SimError::BossAlreadyActive);
        }
        self.spawned += 1;
        boss.serial = self.spawned;
        info!(serial = boss.serial, x = boss.x, y = boss.y, "boss spawned");
        self.boss = Some(boss);
        Ok(self.spawned)
    }

    /// The boss, if alive.
    pub fn get(&self) -> Option<&Boss> {
        self.boss.as_ref().filter(|b| b.is_alive())
    }

    pub fn get_mut(&mut self) -> Option<&mut Boss> {
        self.boss.as_mut().filter(|b| b.is_alive())
    }

    pub fn is_active(&self) -> bool {
        self.get().is_some()
    }

    /// Remove the boss (death or despawn).
    pub fn take(&mut self) -> Option<Boss> {
        self.boss.take()
    }

    /// Bosses spawned so far this run.
    pub fn spawned(&self) -> u32 {
        self.spawned
    }
}

/// Boss pursuit and contact damage.
pub fn boss_system(
    dt: Res<DeltaTime>,
    mut slot: ResMut<BossSlot>,
    mut player: ResMut<Player>,
    mut stats: ResMut<CombatStats>,
) {
    let delta = dt.0;
    let Some(boss) = slot.get_mut() else {
        return;
    };

    let dx = player.x - boss.x;
    let dy = player.y - boss.y;
    let dist = (dx * dx + dy * dy).sqrt();
    let speed = boss.speed * boss.phase.speed_scale();
    if dist > 1.0 {
        boss.vx = dx / dist * speed;
        boss.vy = dy / dist * speed;
    } else {
        boss.vx = 0.0;
        boss.vy = 0.0;
    }
    boss.x += boss.vx * delta;
    boss.y += boss.vy * delta;

    if dist <= boss.radius + player.radius {
        if let Some(lost) = player.take_contact_damage(boss.contact_damage) {
            stats.damage_taken += lost as f64;
        }
    }
}
