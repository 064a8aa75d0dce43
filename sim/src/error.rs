//! Error types for the simulation core.
//!
//! None of these surface to the player: capacity exhaustion drops a spawn,
//! worker faults reject a single job, configuration errors are reported
//! once at startup.

use crate::components::EnemyKind;

/// Errors raised by an entity pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// The pool is at its hard cap and cannot grow further.
    #[error("pool at capacity ({capacity} slots)")]
    AtCapacity { capacity: usize },
}

/// Errors raised by the offload worker pool.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OffloadError {
    /// The job panicked inside its worker. Only this job is affected.
    #[error("worker fault: {0}")]
    WorkerFault(String),

    /// The result channel closed before a result was delivered.
    #[error("offload pool shut down before the job resolved")]
    Disconnected,

    /// A worker thread could not be started.
    #[error("failed to spawn offload worker: {0}")]
    Spawn(String),
}

/// A visual effect could not be triggered. Always best-effort.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("effect failed: {0}")]
pub struct EffectError(pub String);

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration document could not be parsed.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value was outside its allowed range.
    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Errors raised by `SimWorld` commands.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// A spawn request hit a pool cap.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// A boss is already active; at most one may exist.
    #[error("a boss is already active")]
    BossAlreadyActive,

    /// The boss lives in its own slot, never in the enemy pool.
    #[error("{0:?} cannot be spawned into the enemy pool")]
    NotPoolable(EnemyKind),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The offload pool could not start.
    #[error(transparent)]
    Offload(#[from] OffloadError),
}
