//! Entity data for the horde simulation.
//!
//! Pooled entities are plain structs stored in `Pool<T>` slots; the pool
//! owns liveness and identity (`SlotHandle::id`).
//! World-wide singletons (player, logs, stats) are `bevy_ecs` resources.

use crate::abilities::character::{AbilityState, CharacterId};
use crate::pool::{EntityId, Pool, Poolable};
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// CLASSIFICATION
// ============================================================================

/// Enemy classification tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EnemyKind {
    #[default]
    Small,
    Medium,
    Large,
    Elite,
    Boss,
}

/// Base stats per enemy kind.
#[derive(Debug, Clone, Copy)]
pub struct EnemyStats {
    pub max_hp: f32,
    pub radius: f32,
    pub speed: f32,
    pub contact_damage: f32,
    pub xp: u32,
}

impl EnemyKind {
    pub fn stats(self) -> EnemyStats {
        match self {
            EnemyKind::Small => EnemyStats { max_hp: 10.0, radius: 12.0, speed: 70.0, contact_damage: 5.0, xp: 1 },
            EnemyKind::Medium => EnemyStats { max_hp: 30.0, radius: 16.0, speed: 60.0, contact_damage: 8.0, xp: 3 },
            EnemyKind::Large => EnemyStats { max_hp: 120.0, radius: 26.0, speed: 40.0, contact_damage: 15.0, xp: 8 },
            EnemyKind::Elite => EnemyStats { max_hp: 400.0, radius: 22.0, speed: 80.0, contact_damage: 20.0, xp: 25 },
            EnemyKind::Boss => EnemyStats { max_hp: 5000.0, radius: 48.0, speed: 55.0, contact_damage: 30.0, xp: 200 },
        }
    }

    /// Elites and bosses drop a treasure on death.
    pub fn drops_treasure(self) -> bool {
        matches!(self, EnemyKind::Elite | EnemyKind::Boss)
    }
}

/// Largest body radius among kinds that live in the enemy pool. Overlap
/// queries pad by this much so no touching enemy is missed.
pub const MAX_ENEMY_RADIUS: f32 = 26.0;

/// Weapon or ability that dealt a hit. Used for UI and kill analytics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WeaponTag {
    Bolt,
    Turret,
    Zone,
    Burn,
    Bomb,
    External,
}

/// Who caused a damage event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DamageSource {
    Player,
    Zone(u32),
    Turret(u32),
    Item,
    External,
}

// ============================================================================
// POOLED ENTITIES
// ============================================================================

/// Damage-over-time effect carried by an enemy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Burn {
    pub dps: f32,
    pub remaining: f32,
    pub tick_timer: f32,
    pub source: DamageSource,
}

/// Interval between burn damage ticks.
pub const BURN_TICK_INTERVAL: f32 = 0.5;

#[derive(Debug, Clone, Default)]
pub struct Enemy {
    pub kind: EnemyKind,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub radius: f32,
    pub speed: f32,
    pub hp: f32,
    pub max_hp: f32,
    pub contact_damage: f32,
    pub last_hit_by: Option<WeaponTag>,
    pub burn: Option<Burn>,
}

impl Enemy {
    pub fn new(kind: EnemyKind, x: f32, y: f32) -> Self {
        let stats = kind.stats();
        Self {
            kind,
            x,
            y,
            radius: stats.radius,
            speed: stats.speed,
            hp: stats.max_hp,
            max_hp: stats.max_hp,
            contact_damage: stats.contact_damage,
            ..Default::default()
        }
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.hp > 0.0
    }

    pub fn health_fraction(&self) -> f32 {
        if self.max_hp <= 0.0 {
            0.0
        } else {
            (self.hp / self.max_hp).clamp(0.0, 1.0)
        }
    }
}

impl Poolable for Enemy {}

#[derive(Debug, Clone, Default)]
pub struct Projectile {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub radius: f32,
    pub damage: f32,
    pub lifetime: f32,
    /// Remaining enemies this projectile may hit.
    pub pierce: u32,
    pub weapon: Option<WeaponTag>,
    pub source: Option<DamageSource>,
    pub crit_chance: f32,
    pub crit_multiplier: f32,
    pub hit_boss: bool,
    /// Entities already hit, so a piercing projectile never hits twice.
    pub hit_ids: Vec<EntityId>,
}

impl Poolable for Projectile {
    fn reset(&mut self) {
        let mut hit_ids = std::mem::take(&mut self.hit_ids);
        hit_ids.clear();
        *self = Self {
            hit_ids,
            ..Default::default()
        };
    }
}

/// Experience gem dropped by a dead enemy.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Gem {
    pub x: f32,
    pub y: f32,
    pub xp: u32,
    pub magnetized: bool,
}

impl Poolable for Gem {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    #[default]
    Magnet,
    Heal,
    Bomb,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SpecialItem {
    pub x: f32,
    pub y: f32,
    pub kind: ItemKind,
}

impl Poolable for SpecialItem {}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Treasure {
    pub x: f32,
    pub y: f32,
    pub value: u32,
}

impl Poolable for Treasure {}

pub type EnemyPool = Pool<Enemy>;
pub type ProjectilePool = Pool<Projectile>;
pub type GemPool = Pool<Gem>;
pub type ItemPool = Pool<SpecialItem>;
pub type TreasurePool = Pool<Treasure>;

// ============================================================================
// PLAYER
// ============================================================================

/// The single player character. Owner of zones and turrets.
#[derive(Resource, Debug, Clone)]
pub struct Player {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub hp: f32,
    pub max_hp: f32,
    pub area_multiplier: f32,
    pub damage_multiplier: f32,
    pub xp: u64,
    pub gold: u64,
    /// Seconds of contact-damage immunity left.
    pub invulnerable_for: f32,
    pub character: CharacterId,
    pub ability: AbilityState,
}

/// Contact-damage immunity granted after each hit.
pub const PLAYER_INVULNERABILITY: f32 = 0.5;

impl Default for Player {
    fn default() -> Self {
        Self::new(CharacterId::Pyromancer)
    }
}

impl Player {
    pub fn new(character: CharacterId) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            radius: 14.0,
            hp: 100.0,
            max_hp: 100.0,
            area_multiplier: 1.0,
            damage_multiplier: 1.0,
            xp: 0,
            gold: 0,
            invulnerable_for: 0.0,
            character,
            ability: AbilityState::for_character(character),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0.0
    }

    /// Apply contact damage unless invulnerable. The character's ability may
    /// soak part of it. Returns the health actually lost, `None` if ignored.
    pub fn take_contact_damage(&mut self, amount: f32) -> Option<f32> {
        if self.invulnerable_for > 0.0 || !self.is_alive() {
            return None;
        }
        let lost = self.ability.absorb(amount).min(self.hp);
        self.hp -= lost;
        self.invulnerable_for = PLAYER_INVULNERABILITY;
        Some(lost)
    }

    pub fn heal(&mut self, amount: f32) {
        self.hp = (self.hp + amount).min(self.max_hp);
    }
}

// ============================================================================
// COMBAT RECORDS
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageFlags {
    pub is_crit: bool,
    pub is_aoe: bool,
    pub is_dot_tick: bool,
}

/// Target of a damage event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DamageTarget {
    Enemy(EntityId),
    Boss,
}

/// One applied hit. Transient: the log is cleared every frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DamageEvent {
    pub source: DamageSource,
    pub weapon: WeaponTag,
    pub target: DamageTarget,
    pub amount: f32,
    pub x: f32,
    pub y: f32,
    pub flags: DamageFlags,
}

/// Damage events applied during the current frame.
#[derive(Resource, Debug, Default)]
pub struct DamageLog {
    pub events: Vec<DamageEvent>,
}

impl DamageLog {
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

/// A death awaiting its loot roll.
#[derive(Debug, Clone, Copy)]
pub struct DeathRecord {
    pub target: DamageTarget,
    pub kind: EnemyKind,
    pub x: f32,
    pub y: f32,
    pub weapon: WeaponTag,
}

/// Deaths recorded by the resolver, drained by the loot system.
#[derive(Resource, Debug, Default)]
pub struct DeathQueue {
    pub records: Vec<DeathRecord>,
}

/// Running totals for analytics and the HUD.
#[derive(Resource, Debug, Clone, Default, Serialize, Deserialize)]
pub struct CombatStats {
    pub kills: u64,
    pub kills_by_weapon: BTreeMap<WeaponTag, u64>,
    pub damage_dealt: f64,
    pub dropped_spawns: u64,
    pub damage_taken: f64,
}

impl CombatStats {
    pub fn record_kill(&mut self, weapon: WeaponTag) {
        self.kills += 1;
        *self.kills_by_weapon.entry(weapon).or_insert(0) += 1;
    }
}
