//! Seedable random stream for particle sampling
//!
//! Every particle system owns one `ParticleRng` and passes it explicitly into
//! the samplers, so a simulation seeded with the same value replays exactly.

use glam::{Quat, Vec2, Vec3};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;

#[derive(Debug, Clone)]
pub struct ParticleRng {
    inner: SmallRng,
}

impl ParticleRng {
    pub fn new(seed: u64) -> Self {
        Self {
            inner: SmallRng::seed_from_u64(seed),
        }
    }

    /// Derive an independent stream from this one (used to seed child systems)
    pub fn fork(&mut self) -> Self {
        Self::new(self.inner.random::<u64>())
    }

    /// Returns a float in [0, 1)
    pub fn next_f32(&mut self) -> f32 {
        self.inner.random::<f32>()
    }

    /// Returns a float between `min` and `max`. Inverted bounds are allowed;
    /// the result always lies between the two.
    pub fn range(&mut self, min: f32, max: f32) -> f32 {
        min + self.next_f32() * (max - min)
    }

    /// True with the given probability. `1.0` always succeeds, `0.0` never does.
    pub fn chance(&mut self, probability: f32) -> bool {
        self.next_f32() < probability
    }

    /// Returns a random unit direction vector (uniformly on sphere surface)
    pub fn random_direction(&mut self) -> Vec3 {
        // Marsaglia method for uniform sphere sampling
        loop {
            let x = self.range(-1.0, 1.0);
            let y = self.range(-1.0, 1.0);
            let s = x * x + y * y;
            if s < 1.0 {
                let factor = 2.0 * (1.0 - s).sqrt();
                return Vec3::new(x * factor, y * factor, 1.0 - 2.0 * s);
            }
        }
    }

    /// Uniform point inside the unit disc, restricted to the first `arc`
    /// radians of azimuth. Returned as (x, z) in the XZ plane.
    pub fn in_disc(&mut self, arc: f32) -> Vec2 {
        let r = self.next_f32().sqrt();
        let phi = self.next_f32() * arc;
        Vec2::new(r * phi.cos(), r * phi.sin())
    }

    /// Returns a direction within a cone around `axis` with half-angle
    /// `half_angle` (radians)
    pub fn cone_direction(&mut self, axis: Vec3, half_angle: f32) -> Vec3 {
        let axis = axis.normalize_or(Vec3::Y);
        if half_angle <= 0.0 {
            return axis;
        }
        if half_angle >= std::f32::consts::PI {
            return self.random_direction();
        }

        // Uniform cos_theta in [cos_angle, 1], uniform phi in [0, 2pi]
        let cos_theta = self.range(half_angle.cos(), 1.0);
        let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
        let phi = self.range(0.0, TAU);
        let local = Vec3::new(sin_theta * phi.cos(), cos_theta, sin_theta * phi.sin());

        Quat::from_rotation_arc(Vec3::Y, axis) * local
    }
}
