//! Force modules combined per particle per step.
//!
//! `ForceFieldSet` is a struct of optionals: each module is either configured
//! (`Some`) or skipped, so evaluation only sums what is enabled and never goes
//! through dynamic dispatch.

use crate::particle::Particle;
use ember_core::noise;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Standard gravity, scaled by `ForceFieldSet::gravity_multiplier`
pub const DEFAULT_GRAVITY: Vec3 = Vec3::new(0.0, -9.81, 0.0);

/// Constant wind with optional gusting
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Wind {
    /// Acceleration applied to every particle
    pub velocity: Vec3,
    /// Fractional gust strength: the wind is scaled by
    /// `1 + turbulence * noise(position, time)`
    pub turbulence: f32,
}

impl Default for Wind {
    fn default() -> Self {
        Self {
            velocity: Vec3::ZERO,
            turbulence: 0.0,
        }
    }
}

/// Noise-driven jitter sampled at `position * frequency + time * speed`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Turbulence {
    pub strength: f32,
    pub frequency: f32,
    pub speed: f32,
}

impl Default for Turbulence {
    fn default() -> Self {
        Self {
            strength: 1.0,
            frequency: 1.0,
            speed: 1.0,
        }
    }
}

/// Swirl around an axis through `center`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vortex {
    pub axis: Vec3,
    pub center: Vec3,
    /// Tangential acceleration at the axis; falls off as `1 / (1 + distance)`
    pub strength: f32,
}

impl Default for Vortex {
    fn default() -> Self {
        Self {
            axis: Vec3::Y,
            center: Vec3::ZERO,
            strength: 1.0,
        }
    }
}

/// Pull towards a point. Negative strength repels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attractor {
    pub position: Vec3,
    pub strength: f32,
    /// Influence radius; `0` means unlimited range with no falloff
    pub radius: f32,
}

impl Default for Attractor {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            strength: 1.0,
            radius: 0.0,
        }
    }
}

impl Attractor {
    pub fn acceleration(&self, position: Vec3) -> Vec3 {
        let offset = self.position - position;
        let distance = offset.length();
        if distance <= f32::EPSILON {
            return Vec3::ZERO;
        }
        let falloff = if self.radius > 0.0 {
            (1.0 - distance / self.radius).clamp(0.0, 1.0)
        } else {
            1.0
        };
        offset / distance * self.strength * falloff
    }
}

/// Emitter-local force configuration. Stateless: evaluated from the current
/// particle position, velocity and simulation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceFieldSet {
    pub gravity: Vec3,
    pub gravity_multiplier: f32,
    /// Linear drag coefficient (1/s)
    pub drag: f32,
    pub wind: Option<Wind>,
    pub turbulence: Option<Turbulence>,
    pub vortex: Option<Vortex>,
    pub attractor: Option<Attractor>,
}

impl Default for ForceFieldSet {
    fn default() -> Self {
        Self {
            gravity: DEFAULT_GRAVITY,
            gravity_multiplier: 0.0,
            drag: 0.0,
            wind: None,
            turbulence: None,
            vortex: None,
            attractor: None,
        }
    }
}

/// Force fields owned by the caller (global wind, level attractors) and
/// passed into every update. Never mutated by the simulation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExternalForces<'a> {
    pub wind: Vec3,
    pub attractors: &'a [Attractor],
}

impl ExternalForces<'static> {
    pub const NONE: Self = ExternalForces {
        wind: Vec3::ZERO,
        attractors: &[],
    };
}

impl ExternalForces<'_> {
    fn acceleration(&self, position: Vec3) -> Vec3 {
        self.attractors
            .iter()
            .fold(self.wind, |acc, a| acc + a.acceleration(position))
    }
}

impl ForceFieldSet {
    /// True when no module contributes anything
    pub fn is_inert(&self) -> bool {
        (self.gravity_multiplier == 0.0 || self.gravity == Vec3::ZERO)
            && self.drag <= 0.0
            && self.wind.is_none()
            && self.turbulence.is_none()
            && self.vortex.is_none()
            && self.attractor.is_none()
    }

    /// Net acceleration at a particle from every enabled module.
    ///
    /// `jitter` offsets the noise lookup so particles sharing a position do not
    /// move in lockstep. Drag is included as `-velocity * drag`.
    pub fn evaluate(
        &self,
        position: Vec3,
        velocity: Vec3,
        time: f32,
        jitter: f32,
        external: &ExternalForces,
    ) -> Vec3 {
        let accel = self.field_acceleration(position, time, jitter, external);
        if self.drag > 0.0 {
            accel - velocity * self.drag
        } else {
            accel
        }
    }

    /// Semi-implicit Euler step: velocity first, then position with the new
    /// velocity. Drag is applied as a damping factor clamped so one step can
    /// at most bring the particle to rest, never reverse it.
    pub fn integrate(
        &self,
        particle: &mut Particle,
        speed_scale: f32,
        time: f32,
        external: &ExternalForces,
        dt: f32,
    ) {
        let accel = self.field_acceleration(particle.position, time, particle.variance, external);
        particle.velocity += accel * dt;
        if self.drag > 0.0 {
            particle.velocity *= 1.0 - (self.drag * dt).min(1.0);
        }
        particle.position += particle.velocity * speed_scale * dt;
    }

    /// Everything except drag
    fn field_acceleration(
        &self,
        position: Vec3,
        time: f32,
        jitter: f32,
        external: &ExternalForces,
    ) -> Vec3 {
        let mut accel = self.gravity * self.gravity_multiplier;

        if let Some(wind) = &self.wind {
            let gust = if wind.turbulence != 0.0 {
                noise::value_noise3(position * 0.1 + Vec3::splat(time + jitter))
            } else {
                0.0
            };
            accel += wind.velocity * (1.0 + wind.turbulence * gust);
        }

        if let Some(turb) = &self.turbulence {
            let sample = position * turb.frequency + Vec3::splat(time * turb.speed + jitter);
            accel += noise::noise_vector(sample) * turb.strength;
        }

        if let Some(vortex) = &self.vortex {
            accel += vortex_acceleration(vortex, position);
        }

        if let Some(attractor) = &self.attractor {
            accel += attractor.acceleration(position);
        }

        accel + external.acceleration(position)
    }
}

fn vortex_acceleration(vortex: &Vortex, position: Vec3) -> Vec3 {
    let axis = vortex.axis.normalize_or_zero();
    if axis == Vec3::ZERO {
        return Vec3::ZERO;
    }
    let offset = position - vortex.center;
    let radial = offset - axis * offset.dot(axis);
    let distance = radial.length();
    if distance <= f32::EPSILON {
        return Vec3::ZERO;
    }
    let tangent = axis.cross(radial) / distance;
    tangent * (vortex.strength / (1.0 + distance))
}
