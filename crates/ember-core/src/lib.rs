//! Ember Core - Foundational types for the Ember particle engine
//!
//! This crate provides the renderer-agnostic building blocks that the
//! simulation crate depends on:
//! - `EmberError` and the `Result` alias
//! - `ParticleRng` - seedable random stream owned by each particle system
//! - `ValueRange` - min/max randomization ranges
//! - `ParticleCurve` - piecewise-linear keyframe curves over normalized lifetime
//! - `noise` - deterministic 3D value noise for turbulence

pub mod curve;
mod error;
pub mod noise;
pub mod range;
pub mod rng;

pub use curve::{Keyframe, Lerp, ParticleCurve};
pub use error::{EmberError, Result};
pub use range::ValueRange;
pub use rng::ParticleRng;
