//! The particle simulation engine for one emitter and its sub-emitter tree

use crate::emitter::{EmitterConfig, RenderMode};
use crate::forces::ExternalForces;
use crate::particle::{Particle, ParticleInstance, ParticlePool};
use crate::shape;
use crate::sub_emitter::{LifecycleEvent, ParticleSnapshot, SpawnRequest};
use crate::trail::{TrailRecorder, TrailStrip, TrailVertex};
use ember_core::ParticleRng;
use glam::{Affine3A, Vec3};
use std::sync::Arc;

/// Largest timestep a single update will simulate. Longer frames (stalls,
/// breakpoints) are clamped rather than replayed.
pub const MAX_FRAME_DT: f32 = 0.25;

/// Sub-emitters nested deeper than this are not instantiated
pub const MAX_SUB_EMITTER_DEPTH: usize = 8;

/// Shortest repeat interval honoured for bursts
const MIN_BURST_INTERVAL: f32 = 1e-3;

/// Counters for one system (or, from `tree_stats`, a whole sub-emitter tree)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitterStats {
    pub alive: usize,
    pub capacity: usize,
    pub spawned_total: u64,
    pub dropped_total: u64,
    pub deaths_total: u64,
    pub trail_vertices: usize,
}

impl std::ops::Add for EmitterStats {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            alive: self.alive + other.alive,
            capacity: self.capacity + other.capacity,
            spawned_total: self.spawned_total + other.spawned_total,
            dropped_total: self.dropped_total + other.dropped_total,
            deaths_total: self.deaths_total + other.deaths_total,
            trail_vertices: self.trail_vertices + other.trail_vertices,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct BurstState {
    next_time: f64,
    fired: u32,
}

/// Stateful simulation of one emitter.
///
/// Owns a fixed-capacity pool, its RNG stream, trail buffers and one child
/// system per sub-emitter rule. Steady-state updates do not allocate.
pub struct ParticleSystem {
    config: Arc<EmitterConfig>,
    pool: ParticlePool,
    rng: ParticleRng,
    trails: TrailRecorder,
    /// Aligned with `config.sub_emitters`; `None` past the depth limit
    children: Vec<Option<ParticleSystem>>,
    spawn_queue: Vec<SpawnRequest>,
    instances: Vec<ParticleInstance>,
    emitting: bool,
    accumulator: f32,
    /// Seconds into the current emitter cycle. Kept in f64 so the burst
    /// schedule still advances after hours of infinite-duration emission.
    emitter_time: f64,
    /// Total simulated seconds
    time: f32,
    bursts: Vec<BurstState>,
    transform: Affine3A,
    camera: Vec3,
    spawned_total: u64,
    dropped_total: u64,
    deaths_total: u64,
}

impl ParticleSystem {
    pub fn new(config: Arc<EmitterConfig>, capacity: usize, seed: u64) -> Self {
        let mut rng = ParticleRng::new(seed);
        let system = Self::build(config, capacity, &mut rng, 0);
        log::debug!(
            "particle system created: capacity {}, {} sub-emitter(s)",
            system.capacity(),
            system.config.sub_emitters.len()
        );
        system
    }

    /// Create a system sized by the config's own `max_particles`
    pub fn from_config(config: Arc<EmitterConfig>, seed: u64) -> Self {
        let capacity = config.max_particles;
        Self::new(config, capacity, seed)
    }

    fn build(config: Arc<EmitterConfig>, capacity: usize, rng: &mut ParticleRng, depth: usize) -> Self {
        let children = config
            .sub_emitters
            .rules()
            .iter()
            .map(|rule| {
                if depth + 1 > MAX_SUB_EMITTER_DEPTH {
                    log::warn!(
                        "sub-emitter nesting exceeds {MAX_SUB_EMITTER_DEPTH} levels; child not created"
                    );
                    return None;
                }
                let child_config = Arc::clone(&rule.emitter);
                let child_capacity = child_config.max_particles;
                Some(Self::build(child_config, child_capacity, rng, depth + 1))
            })
            .collect();

        let queue_capacity = if config.sub_emitters.is_empty() {
            0
        } else {
            capacity.min(1024)
        };

        Self {
            pool: ParticlePool::new(capacity),
            rng: rng.fork(),
            trails: TrailRecorder::new(capacity, config.trail),
            children,
            spawn_queue: Vec::with_capacity(queue_capacity),
            instances: Vec::with_capacity(capacity),
            emitting: config.autoplay,
            accumulator: 0.0,
            emitter_time: 0.0,
            time: 0.0,
            bursts: config
                .bursts
                .iter()
                .map(|b| BurstState {
                    next_time: f64::from(b.time),
                    fired: 0,
                })
                .collect(),
            transform: Affine3A::IDENTITY,
            camera: Vec3::ZERO,
            spawned_total: 0,
            dropped_total: 0,
            deaths_total: 0,
            config,
        }
    }

    // ── Frame update ──

    /// Advance the simulation by `dt` seconds with no external force fields
    pub fn update(&mut self, dt: f32, emitter_transform: Affine3A, camera_position: Vec3) {
        self.update_with_forces(dt, emitter_transform, camera_position, &ExternalForces::NONE);
    }

    /// Advance the simulation by `dt` seconds.
    ///
    /// Order: emission, spawn, integrate + curves + trails, deaths, child
    /// systems, sub-emitter flush, sort, output packing. Particles spawned by
    /// the flush are first integrated on the next call.
    pub fn update_with_forces(
        &mut self,
        dt: f32,
        emitter_transform: Affine3A,
        camera_position: Vec3,
        external: &ExternalForces,
    ) {
        self.step(sanitize_dt(dt), emitter_transform, camera_position, external);
        self.finish_frame();
    }

    fn step(&mut self, dt: f32, transform: Affine3A, camera: Vec3, external: &ExternalForces) {
        self.transform = transform;
        self.camera = camera;
        self.time += dt;

        let emit_count = self.advance_emission(dt);
        self.spawn(emit_count, None);
        self.simulate(dt, external);
        self.retire_dead();

        for child in self.children.iter_mut().flatten() {
            child.step(dt, transform, camera, external);
        }
        self.flush_spawn_queue();
    }

    /// Sort and pack render output for this system and its children
    fn finish_frame(&mut self) {
        if self.config.sorts_particles() {
            self.pool.sort_back_to_front(self.camera);
        }

        let stretch = (self.config.render_mode == RenderMode::StretchedBillboard)
            .then_some(self.config.velocity_stretch);
        self.instances.clear();
        self.instances
            .extend(self.pool.alive_slice().iter().map(|p| {
                let mut instance = ParticleInstance::from_particle(p);
                if let Some(stretch) = stretch {
                    instance.size[1] *= 1.0 + p.velocity.length() * stretch;
                }
                instance
            }));

        if self.trails.is_enabled() {
            self.trails.mark_dirty();
        }

        for child in self.children.iter_mut().flatten() {
            child.finish_frame();
        }
    }

    /// Continuous rate accounting, burst schedule and emitter cycle.
    /// Returns how many particles to spawn this frame.
    fn advance_emission(&mut self, dt: f32) -> u32 {
        if !self.emitting {
            return 0;
        }
        let config = &*self.config;

        let lod_scale = config.lod.as_ref().map_or(1.0, |lod| {
            let origin = Vec3::from(self.transform.translation);
            lod.rate_scale(origin.distance(self.camera))
        });
        self.accumulator += config.rate.max(0.0) * lod_scale * dt;
        let whole = self.accumulator.floor();
        self.accumulator -= whole;
        let mut count = whole as u32;

        self.emitter_time += f64::from(dt);
        for (burst, state) in config.bursts.iter().zip(self.bursts.iter_mut()) {
            let interval = f64::from(burst.interval.max(MIN_BURST_INTERVAL));
            // At most one frame's worth of firings; a schedule that is further
            // behind skips ahead instead of replaying
            let max_firings = (f64::from(dt) / interval).ceil() as u32 + 1;
            let mut firings = 0;
            loop {
                let pending = if burst.interval <= 0.0 {
                    state.fired == 0
                } else {
                    burst.cycles == 0 || state.fired < burst.cycles
                };
                if !pending || self.emitter_time < state.next_time {
                    break;
                }
                if firings == max_firings {
                    state.next_time = self.emitter_time + interval;
                    break;
                }
                firings += 1;
                state.fired = state.fired.saturating_add(1);
                state.next_time += interval;
                if self.rng.chance(burst.probability) {
                    count = count.saturating_add(burst.count);
                }
            }
        }

        let duration = f64::from(config.duration);
        if config.duration > 0.0 && self.emitter_time >= duration {
            if config.looping {
                self.emitter_time = (self.emitter_time - duration).min(duration);
                for (burst, state) in config.bursts.iter().zip(self.bursts.iter_mut()) {
                    state.next_time = f64::from(burst.time);
                    state.fired = 0;
                }
            } else {
                log::debug!("emitter finished its {}s cycle", config.duration);
                self.emitting = false;
            }
        }

        count
    }

    /// Spawn up to `count` particles, optionally shaped by a sub-emitter
    /// request. Spawns beyond capacity are dropped, not deferred.
    fn spawn(&mut self, count: u32, request: Option<&SpawnRequest>) -> u32 {
        let mut spawned = 0;
        while spawned < count {
            if self.pool.is_full() {
                let dropped = count - spawned;
                self.dropped_total += u64::from(dropped);
                log::trace!("pool full ({}), dropped {dropped} spawn(s)", self.pool.capacity());
                break;
            }
            let particle = self.new_particle(request);
            if let Some(slot) = self.pool.spawn() {
                *slot = particle;
            }
            if self.config.sub_emitters.has_birth_rules() {
                self.config.sub_emitters.evaluate(
                    LifecycleEvent::Birth,
                    ParticleSnapshot::from(&particle),
                    &mut self.rng,
                    &mut self.spawn_queue,
                );
            }
            spawned += 1;
        }
        self.spawned_total += u64::from(spawned);
        spawned
    }

    fn new_particle(&mut self, request: Option<&SpawnRequest>) -> Particle {
        let config = &*self.config;
        let rng = &mut self.rng;

        let sample = shape::sample(&config.shape, rng);
        let mut direction = self.transform.transform_vector3(sample.direction);
        let position = match request.and_then(|r| r.position) {
            Some(origin) => origin + self.transform.transform_vector3(sample.position),
            None => self.transform.transform_point3(sample.position),
        };
        if config.velocity_randomness > 0.0 {
            let random = rng.random_direction();
            direction = direction.lerp(random, config.velocity_randomness.clamp(0.0, 1.0));
        }
        let direction = direction.normalize_or(Vec3::Y);

        let speed = config.speed.sample(rng);
        let mut velocity = direction * speed;
        if let Some(request) = request {
            velocity += request.velocity;
        }

        let start_size = config.start_size.sample(rng);
        let variance = rng.next_f32();
        let start_color = match request.and_then(|r| r.color) {
            Some(color) => color,
            None => config.start_color.sample(rng),
        };

        let mut particle = Particle {
            position,
            velocity,
            age: 0.0,
            lifetime: config.lifetime.sample(rng),
            size: start_size,
            start_size,
            rotation: config.start_rotation.sample(rng).to_radians(),
            rotation_speed: config.rotation_speed.sample(rng).to_radians(),
            color: start_color,
            start_color,
            variance,
            trail: None,
        };
        apply_curves(config, &mut particle);

        if let Some(slot) = self.trails.acquire() {
            self.trails
                .record(slot, particle.position, particle.size.x, particle.color, self.time);
            particle.trail = Some(slot);
        }
        particle
    }

    /// Integrate, evaluate curves, record trails and raise interval events
    fn simulate(&mut self, dt: f32, external: &ExternalForces) {
        let Self {
            config,
            pool,
            rng,
            trails,
            spawn_queue,
            time,
            ..
        } = self;
        let config = &**config;
        let time = *time;
        let has_intervals = config.sub_emitters.has_interval_rules();

        for p in pool.alive_slice_mut() {
            let previous_age = p.age;
            let speed_scale = config.speed_scale_at(p.age_ratio());
            config.forces.integrate(p, speed_scale, time, external, dt);
            p.age += dt;
            p.rotation += p.rotation_speed * dt;
            apply_curves(config, p);

            if let Some(slot) = p.trail {
                trails.record(slot, p.position, p.size.x, p.color, time);
            }

            if has_intervals && !p.is_expired() {
                config.sub_emitters.evaluate(
                    LifecycleEvent::Tick {
                        previous_age,
                        age: p.age,
                    },
                    ParticleSnapshot::from(&*p),
                    rng,
                    spawn_queue,
                );
            }
        }
    }

    /// Remove expired particles, raising death events and freeing trails
    fn retire_dead(&mut self) {
        let Self {
            config,
            pool,
            rng,
            trails,
            spawn_queue,
            ..
        } = self;
        let rules = &config.sub_emitters;
        let removed = pool.compact(|p| {
            if let Some(slot) = p.trail {
                trails.release(slot);
            }
            rules.evaluate(LifecycleEvent::Death, ParticleSnapshot::from(p), rng, spawn_queue);
        });
        self.deaths_total += removed as u64;
    }

    /// Apply queued sub-emitter requests to the child systems. Children that
    /// raise birth events of their own flush them recursively.
    fn flush_spawn_queue(&mut self) {
        for i in 0..self.spawn_queue.len() {
            let request = self.spawn_queue[i];
            if let Some(Some(child)) = self.children.get_mut(request.rule) {
                child.spawn(request.count, Some(&request));
                child.flush_spawn_queue();
            }
        }
        self.spawn_queue.clear();
    }

    // ── Control ──

    /// Spawn up to `count` particles right now. Returns the number actually
    /// spawned (never more than the remaining capacity).
    pub fn burst(&mut self, count: u32) -> u32 {
        let spawned = self.spawn(count, None);
        self.flush_spawn_queue();
        self.finish_frame();
        spawned
    }

    /// Kill every particle in this system and its sub-emitters and drop all
    /// trails. Emission state is left alone.
    pub fn clear(&mut self) {
        self.pool.clear();
        self.trails.clear();
        self.spawn_queue.clear();
        self.instances.clear();
        for child in self.children.iter_mut().flatten() {
            child.clear();
        }
    }

    /// Toggle continuous emission and bursts. Live particles are unaffected.
    pub fn set_emitting(&mut self, emitting: bool) {
        self.emitting = emitting;
    }

    pub fn is_emitting(&self) -> bool {
        self.emitting
    }

    /// Rewind the emitter cycle and burst schedule and resume emitting
    pub fn restart(&mut self) {
        self.emitter_time = 0.0;
        self.accumulator = 0.0;
        for (burst, state) in self.config.bursts.iter().zip(self.bursts.iter_mut()) {
            state.next_time = f64::from(burst.time);
            state.fired = 0;
        }
        self.emitting = true;
    }

    /// Not emitting and nothing alive anywhere in the tree
    pub fn is_finished(&self) -> bool {
        !self.emitting
            && self.pool.alive_count() == 0
            && self.children.iter().flatten().all(|c| c.is_finished())
    }

    // ── Read access ──

    pub fn config(&self) -> &Arc<EmitterConfig> {
        &self.config
    }

    pub fn alive_count(&self) -> usize {
        self.pool.alive_count()
    }

    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Simulation seconds since creation
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Seconds into the current emitter cycle
    pub fn emitter_time(&self) -> f32 {
        self.emitter_time as f32
    }

    /// Alive particles, in render order after an update
    pub fn particles(&self) -> &[Particle] {
        self.pool.alive_slice()
    }

    /// Packed render records, one per alive particle
    pub fn instances(&self) -> &[ParticleInstance] {
        &self.instances
    }

    /// Render records as raw bytes for buffer upload
    pub fn instance_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.instances)
    }

    /// Trail ribbon vertices, rebuilt only if something changed since the
    /// last call
    pub fn trail_vertices(&mut self) -> &[TrailVertex] {
        self.rebuild_trails();
        self.trails.vertices()
    }

    /// Per-trail triangle strip ranges into `trail_vertices`
    pub fn trail_strips(&mut self) -> &[TrailStrip] {
        self.rebuild_trails();
        self.trails.strips()
    }

    /// Rebuild trail geometry for this system and every sub-emitter below it
    pub fn refresh_trails(&mut self) {
        self.rebuild_trails();
        for child in self.children.iter_mut().flatten() {
            child.refresh_trails();
        }
    }

    fn rebuild_trails(&mut self) {
        let slots = self.pool.alive_slice().iter().filter_map(|p| p.trail);
        self.trails.rebuild(slots, self.camera, self.time);
    }

    /// Child system owned by sub-emitter rule `rule`
    pub fn sub_system(&self, rule: usize) -> Option<&ParticleSystem> {
        self.children.get(rule).and_then(Option::as_ref)
    }

    pub fn sub_system_mut(&mut self, rule: usize) -> Option<&mut ParticleSystem> {
        self.children.get_mut(rule).and_then(Option::as_mut)
    }

    pub fn stats(&self) -> EmitterStats {
        EmitterStats {
            alive: self.pool.alive_count(),
            capacity: self.pool.capacity(),
            spawned_total: self.spawned_total,
            dropped_total: self.dropped_total,
            deaths_total: self.deaths_total,
            trail_vertices: self.trails.vertices().len(),
        }
    }

    /// Stats summed over this system and every sub-emitter below it
    pub fn tree_stats(&self) -> EmitterStats {
        self.children
            .iter()
            .flatten()
            .fold(self.stats(), |acc, child| acc + child.tree_stats())
    }
}

/// Write curve-driven size and color for the particle's current age
fn apply_curves(config: &EmitterConfig, p: &mut Particle) {
    let t = p.age_ratio();
    let jitter = 1.0 + (p.variance * 2.0 - 1.0) * config.size_variance;
    p.size = config.size_at(p.start_size, t) * jitter;
    p.color = config.color_at(p.start_color, t);
}

/// Clamp into [0, MAX_FRAME_DT]; non-finite input counts as no time passing
fn sanitize_dt(dt: f32) -> f32 {
    if dt.is_finite() && dt > 0.0 {
        dt.min(MAX_FRAME_DT)
    } else {
        0.0
    }
}
