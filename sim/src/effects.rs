//! Optional visual-effect capability.
//!
//! The core never depends on effects succeeding. A world without a sink
//! simply skips them; a sink that fails is counted and ignored.

use crate::components::EnemyKind;
use crate::error::EffectError;
use bevy_ecs::prelude::*;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::trace;

/// A visual side effect requested by the simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    DeathBurst { x: f32, y: f32, kind: EnemyKind },
    Shockwave { x: f32, y: f32, radius: f32 },
    HitSpark { x: f32, y: f32, crit: bool },
}

/// Implemented by the presentation layer.
pub trait EffectSink: Send + Sync {
    fn emit(&mut self, effect: &Effect) -> Result<(), EffectError>;
}

/// Resource wrapping the optional sink.
#[derive(Resource, Default)]
pub struct Effects {
    sink: Option<Box<dyn EffectSink>>,
    failures: u64,
}

impl Effects {
    pub fn new(sink: Box<dyn EffectSink>) -> Self {
        Self {
            sink: Some(sink),
            failures: 0,
        }
    }

    pub fn set_sink(&mut self, sink: Option<Box<dyn EffectSink>>) {
        self.sink = sink;
    }

    /// Best-effort: absence of a sink and sink failures are both fine.
    pub fn emit(&mut self, effect: Effect) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        if let Err(err) = sink.emit(&effect) {
            self.failures += 1;
            trace!(%err, ?effect, "effect dropped");
        }
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }
}

/// Sink that records effects in a shared buffer. Useful for renderers that
/// drain effects once per frame, and for tests.
#[derive(Debug, Clone, Default)]
pub struct EffectRecorder {
    effects: Arc<Mutex<Vec<Effect>>>,
}

impl EffectRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take everything recorded so far.
    pub fn drain(&self) -> Vec<Effect> {
        std::mem::take(&mut *self.effects.lock())
    }
}

impl EffectSink for EffectRecorder {
    fn emit(&mut self, effect: &Effect) -> Result<(), EffectError> {
        self.effects.lock().push(*effect);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl EffectSink for Broken {
        fn emit(&mut self, _: &Effect) -> Result<(), EffectError> {
            Err(EffectError("no particle budget".into()))
        }
    }

    #[test]
    fn test_missing_sink_is_noop() {
        let mut effects = Effects::default();
        effects.emit(Effect::Shockwave { x: 0.0, y: 0.0, radius: 10.0 });
        assert_eq!(effects.failures(), 0);
    }

    #[test]
    fn test_failing_sink_is_counted_not_fatal() {
        let mut effects = Effects::new(Box::new(Broken));
        effects.emit(Effect::HitSpark { x: 0.0, y: 0.0, crit: true });
        effects.emit(Effect::HitSpark { x: 0.0, y: 0.0, crit: false });
        assert_eq!(effects.failures(), 2);
    }

    #[test]
    fn test_recorder_drains() {
        let recorder = EffectRecorder::new();
        let mut effects = Effects::new(Box::new(recorder.clone()));
        effects.emit(Effect::Shockwave { x: 1.0, y: 2.0, radius: 3.0 });
        assert_eq!(recorder.drain().len(), 1);
        assert!(recorder.drain().is_empty());
    }
}
