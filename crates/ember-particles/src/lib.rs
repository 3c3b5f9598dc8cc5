//! Ember Particles - CPU-side particle simulation
//!
//! Provides pooled per-emitter particle simulation with:
//! - Rate, burst and sub-emitter driven spawning into a fixed-capacity pool
//! - Emission shapes, force fields and semi-implicit Euler integration
//! - Size, color, alpha and speed curves over normalized lifetime
//! - Per-particle ribbon trails
//! - Packed instance and trail vertex records for instanced rendering

pub mod emitter;
pub mod forces;
pub mod library;
pub mod particle;
pub mod shape;
pub mod sub_emitter;
pub mod system;
pub mod trail;

pub use emitter::{BlendMode, BurstConfig, EmitterConfig, LodSettings, RenderMode};
pub use forces::{Attractor, ExternalForces, ForceFieldSet, Turbulence, Vortex, Wind};
pub use library::EmitterLibrary;
pub use particle::{Particle, ParticleInstance, ParticlePool};
pub use shape::{EmissionShape, ShapeSettings};
pub use sub_emitter::{InheritFlags, SubEmitterRule, SubEmitterTrigger};
pub use system::{EmitterStats, ParticleSystem, MAX_FRAME_DT, MAX_SUB_EMITTER_DEPTH};
pub use trail::{TrailSettings, TrailStrip, TrailVertex};
