//! Particle types: CPU simulation state and GPU instance data

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};

/// CPU-side particle state (not sent to GPU)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Seconds since spawn
    pub age: f32,
    /// Seconds, sampled at spawn
    pub lifetime: f32,
    /// Current size after curves
    pub size: Vec2,
    pub start_size: Vec2,
    /// Radians
    pub rotation: f32,
    /// Radians per second
    pub rotation_speed: f32,
    /// Current color after curves
    pub color: Vec4,
    pub start_color: Vec4,
    /// Per-particle jitter in [0, 1), drawn at spawn
    pub variance: f32,
    /// Slot in the owning system's `TrailRecorder`
    pub trail: Option<u32>,
}

impl Particle {
    pub const DEAD: Self = Self {
        position: Vec3::ZERO,
        velocity: Vec3::ZERO,
        age: 0.0,
        lifetime: 0.0,
        size: Vec2::ZERO,
        start_size: Vec2::ZERO,
        rotation: 0.0,
        rotation_speed: 0.0,
        color: Vec4::ZERO,
        start_color: Vec4::ZERO,
        variance: 0.0,
        trail: None,
    };

    /// Normalized age in [0, 1]
    pub fn age_ratio(&self) -> f32 {
        if self.lifetime <= 0.0 {
            1.0
        } else {
            (self.age / self.lifetime).min(1.0)
        }
    }

    pub fn is_expired(&self) -> bool {
        self.age >= self.lifetime
    }
}

impl Default for Particle {
    fn default() -> Self {
        Self::DEAD
    }
}

/// Per-particle render record consumed by the billboard renderer.
///
/// 28 bytes, field order fixed: position, size, packed RGBA8 color, rotation.
/// Must match the renderer's vertex-instance layout.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct ParticleInstance {
    pub position: [f32; 3],
    pub size: [f32; 2],
    pub color: [u8; 4],
    pub rotation: f32,
}

impl ParticleInstance {
    pub fn from_particle(p: &Particle) -> Self {
        Self {
            position: p.position.to_array(),
            size: p.size.to_array(),
            color: pack_color(p.color),
            rotation: p.rotation,
        }
    }
}

/// Quantize a linear RGBA color into normalized u8 channels
pub fn pack_color(color: Vec4) -> [u8; 4] {
    let c = color.clamp(Vec4::ZERO, Vec4::ONE) * 255.0;
    [
        c.x.round() as u8,
        c.y.round() as u8,
        c.z.round() as u8,
        c.w.round() as u8,
    ]
}

/// Fixed-capacity pool with the alive particles packed at the front.
///
/// Killing a particle swaps the last alive particle into its slot, so kill is
/// O(1) and iteration is contiguous, but order is not stable across frames.
pub struct ParticlePool {
    particles: Vec<Particle>,
    alive_count: usize,
}

impl ParticlePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            particles: vec![Particle::DEAD; capacity],
            alive_count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.particles.len()
    }

    pub fn alive_count(&self) -> usize {
        self.alive_count
    }

    pub fn remaining(&self) -> usize {
        self.particles.len() - self.alive_count
    }

    pub fn is_full(&self) -> bool {
        self.alive_count >= self.particles.len()
    }

    /// Spawn one particle, returning a mutable ref to initialize it.
    /// Returns None if pool is full.
    pub fn spawn(&mut self) -> Option<&mut Particle> {
        if self.is_full() {
            return None;
        }
        let idx = self.alive_count;
        self.alive_count += 1;
        let slot = &mut self.particles[idx];
        *slot = Particle::DEAD;
        Some(slot)
    }

    /// Remove every expired particle via swap-remove, handing each one to
    /// `on_death` before its slot is reused. Returns the number removed.
    pub fn compact(&mut self, mut on_death: impl FnMut(&Particle)) -> usize {
        let mut removed = 0;
        let mut i = 0;
        while i < self.alive_count {
            if self.particles[i].is_expired() {
                on_death(&self.particles[i]);
                self.alive_count -= 1;
                if i < self.alive_count {
                    self.particles.swap(i, self.alive_count);
                }
                removed += 1;
                // Re-check slot i, it now holds the swapped-in particle
            } else {
                i += 1;
            }
        }
        removed
    }

    /// Kill every particle at once
    pub fn clear(&mut self) {
        self.alive_count = 0;
    }

    /// Sort alive particles by descending squared distance to `camera`
    pub fn sort_back_to_front(&mut self, camera: Vec3) {
        self.particles[..self.alive_count].sort_unstable_by(|a, b| {
            let da = a.position.distance_squared(camera);
            let db = b.position.distance_squared(camera);
            db.total_cmp(&da)
        });
    }

    /// Access alive particles slice for reading (first `alive_count` elements)
    pub fn alive_slice(&self) -> &[Particle] {
        &self.particles[..self.alive_count]
    }

    /// Access alive particles mutably
    pub fn alive_slice_mut(&mut self) -> &mut [Particle] {
        &mut self.particles[..self.alive_count]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_with(pool: &mut ParticlePool, x: f32, lifetime: f32) {
        let p = pool.spawn().unwrap();
        p.lifetime = lifetime;
        p.position.x = x;
    }

    #[test]
    fn pool_spawn_and_kill() {
        let mut pool = ParticlePool::new(4);
        assert_eq!(pool.alive_count(), 0);

        for i in 0..3 {
            spawn_with(&mut pool, i as f32, 1.0);
        }
        assert_eq!(pool.alive_count(), 3);

        // Kill the middle one by aging it past lifetime
        pool.alive_slice_mut()[1].age = 2.0;
        let mut dead = Vec::new();
        let removed = pool.compact(|p| dead.push(p.position.x));
        assert_eq!(removed, 1);
        assert_eq!(dead, vec![1.0]);
        assert_eq!(pool.alive_count(), 2);
        assert!(pool.alive_slice().iter().all(|p| p.position.x != 1.0));

        // Capacity 4: the fifth spawn fails
        pool.spawn().unwrap();
        pool.spawn().unwrap();
        assert!(pool.spawn().is_none());
        assert_eq!(pool.remaining(), 0);
    }

    #[test]
    fn compact_checks_swapped_in_particle() {
        let mut pool = ParticlePool::new(3);
        for i in 0..3 {
            spawn_with(&mut pool, i as f32, 1.0);
        }
        // Expire the first and last: the last is swapped into slot 0 and must
        // be removed in the same pass
        pool.alive_slice_mut()[0].age = 1.0;
        pool.alive_slice_mut()[2].age = 5.0;
        assert_eq!(pool.compact(|_| {}), 2);
        assert_eq!(pool.alive_count(), 1);
        assert_eq!(pool.alive_slice()[0].position.x, 1.0);
    }

    #[test]
    fn spawn_resets_reused_slot() {
        let mut pool = ParticlePool::new(1);
        {
            let p = pool.spawn().unwrap();
            p.age = 3.0;
            p.lifetime = 1.0;
            p.trail = Some(4);
        }
        pool.compact(|_| {});
        let p = pool.spawn().unwrap();
        assert_eq!(*p, Particle::DEAD);
    }

    #[test]
    fn sort_orders_far_to_near() {
        let mut pool = ParticlePool::new(3);
        for x in [1.0, 5.0, 3.0] {
            spawn_with(&mut pool, x, 1.0);
        }
        pool.sort_back_to_front(Vec3::ZERO);
        let xs: Vec<f32> = pool.alive_slice().iter().map(|p| p.position.x).collect();
        assert_eq!(xs, vec![5.0, 3.0, 1.0]);
    }

    #[test]
    fn particle_instance_layout() {
        assert_eq!(std::mem::size_of::<ParticleInstance>(), 28);
        assert_eq!(std::mem::align_of::<ParticleInstance>(), 4);
    }

    #[test]
    fn color_packing_clamps_and_rounds() {
        assert_eq!(pack_color(Vec4::new(1.0, 0.5, 0.0, 2.0)), [255, 128, 0, 255]);
        assert_eq!(pack_color(Vec4::splat(-1.0)), [0, 0, 0, 0]);
    }
}
