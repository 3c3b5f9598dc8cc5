//! Sub-emitters: rules that turn particle lifecycle events into spawn
//! requests for child emitters.
//!
//! Evaluation never touches a pool. Matching rules push `SpawnRequest`s onto
//! a queue which the owning `ParticleSystem` drains into its child systems
//! after its own update pass has finished.

use crate::emitter::EmitterConfig;
use crate::particle::Particle;
use ember_core::ParticleRng;
use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Interval periods shorter than this are clamped to it
pub const MIN_INTERVAL_PERIOD: f32 = 1e-3;

/// When a rule fires
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubEmitterTrigger {
    Birth,
    Death,
    /// Every `period` seconds of the particle's age (at least
    /// `MIN_INTERVAL_PERIOD`)
    Interval { period: f32 },
}

/// Lifecycle event raised by the simulation for one particle
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LifecycleEvent {
    Birth,
    Death,
    /// The particle aged from `previous_age` to `age` this step
    Tick { previous_age: f32, age: f32 },
}

/// Which parent properties a child inherits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InheritFlags {
    pub position: bool,
    pub velocity: bool,
    pub color: bool,
}

impl Default for InheritFlags {
    fn default() -> Self {
        Self {
            position: true,
            velocity: false,
            color: false,
        }
    }
}

/// One trigger → child emitter mapping
#[derive(Debug, Clone)]
pub struct SubEmitterRule {
    pub trigger: SubEmitterTrigger,
    /// Child configuration. Shared ownership means a resolved rule graph is
    /// always a finite tree.
    pub emitter: Arc<EmitterConfig>,
    /// Particles spawned each time the rule fires
    pub count: u32,
    /// Chance in [0, 1] that a firing actually spawns
    pub probability: f32,
    pub inherit: InheritFlags,
    /// Fraction of the parent velocity added to children when inherited
    pub velocity_blend: f32,
}

impl SubEmitterRule {
    pub fn new(trigger: SubEmitterTrigger, emitter: Arc<EmitterConfig>) -> Self {
        Self {
            trigger,
            emitter,
            count: 1,
            probability: 1.0,
            inherit: InheritFlags::default(),
            velocity_blend: 1.0,
        }
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn with_probability(mut self, probability: f32) -> Self {
        self.probability = probability;
        self
    }

    pub fn with_inherit(mut self, inherit: InheritFlags) -> Self {
        self.inherit = inherit;
        self
    }

    pub fn with_velocity_blend(mut self, blend: f32) -> Self {
        self.velocity_blend = blend;
        self
    }

    /// How many times this rule fires for `event`
    fn firings(&self, event: LifecycleEvent) -> u32 {
        match (self.trigger, event) {
            (SubEmitterTrigger::Birth, LifecycleEvent::Birth) => 1,
            (SubEmitterTrigger::Death, LifecycleEvent::Death) => 1,
            (SubEmitterTrigger::Interval { period }, LifecycleEvent::Tick { previous_age, age })
                if period > 0.0 =>
            {
                let period = period.max(MIN_INTERVAL_PERIOD);
                let crossed = (age / period).floor() - (previous_age / period).floor();
                crossed.max(0.0) as u32
            }
            _ => 0,
        }
    }
}

/// Parent state captured when an event fires
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleSnapshot {
    pub position: Vec3,
    pub velocity: Vec3,
    pub color: Vec4,
}

impl From<&Particle> for ParticleSnapshot {
    fn from(p: &Particle) -> Self {
        Self {
            position: p.position,
            velocity: p.velocity,
            color: p.color,
        }
    }
}

/// Deferred child emission
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnRequest {
    /// Index of the rule (and of the child system it owns)
    pub rule: usize,
    pub count: u32,
    /// Spawn origin, when position is inherited
    pub position: Option<Vec3>,
    /// Added to each child's sampled velocity
    pub velocity: Vec3,
    /// Replaces the child's start color, when color is inherited
    pub color: Option<Vec4>,
}

/// The sub-emitter rules of one emitter
#[derive(Debug, Clone, Default)]
pub struct SubEmitterTable {
    rules: Vec<SubEmitterRule>,
}

impl SubEmitterTable {
    pub fn new(rules: Vec<SubEmitterRule>) -> Self {
        Self { rules }
    }

    pub fn push(&mut self, rule: SubEmitterRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[SubEmitterRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn has_birth_rules(&self) -> bool {
        self.rules
            .iter()
            .any(|r| r.trigger == SubEmitterTrigger::Birth)
    }

    pub fn has_interval_rules(&self) -> bool {
        self.rules
            .iter()
            .any(|r| matches!(r.trigger, SubEmitterTrigger::Interval { .. }))
    }

    /// Queue a spawn request for every rule matching `event` that passes its
    /// probability check. Returns the number of requests queued.
    pub fn evaluate(
        &self,
        event: LifecycleEvent,
        particle: ParticleSnapshot,
        rng: &mut ParticleRng,
        queue: &mut Vec<SpawnRequest>,
    ) -> usize {
        let mut queued = 0;
        for (index, rule) in self.rules.iter().enumerate() {
            let firings = rule.firings(event);
            if firings == 0 || rule.count == 0 {
                continue;
            }
            let count = if rule.probability >= 1.0 {
                firings
            } else if rule.probability <= 0.0 {
                0
            } else {
                (0..firings).filter(|_| rng.chance(rule.probability)).count() as u32
            };
            if count == 0 {
                continue;
            }
            queue.push(SpawnRequest {
                rule: index,
                count: rule.count.saturating_mul(count),
                position: rule.inherit.position.then_some(particle.position),
                velocity: if rule.inherit.velocity {
                    particle.velocity * rule.velocity_blend
                } else {
                    Vec3::ZERO
                },
                color: rule.inherit.color.then_some(particle.color),
            });
            queued += 1;
        }
        queued
    }
}
