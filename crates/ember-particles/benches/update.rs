use criterion::{Criterion, criterion_group, criterion_main};
use ember_core::ValueRange;
use ember_particles::{
    EmissionShape, EmitterConfig, ForceFieldSet, ParticleSystem, ShapeSettings, SubEmitterRule,
    SubEmitterTrigger, TrailSettings, Turbulence,
};
use glam::{Affine3A, Vec3};
use std::hint::black_box;
use std::sync::Arc;

const DT: f32 = 1.0 / 60.0;

fn fountain() -> EmitterConfig {
    EmitterConfig {
        rate: 2000.0,
        max_particles: 4096,
        lifetime: ValueRange::new(1.0, 2.0),
        speed: ValueRange::new(3.0, 6.0),
        shape: ShapeSettings::new(EmissionShape::Cone {
            radius: 0.5,
            angle: 25.0,
        }),
        forces: ForceFieldSet {
            gravity_multiplier: 1.0,
            drag: 0.2,
            turbulence: Some(Turbulence::default()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Run enough frames for the pool to reach steady state
fn warmed(config: EmitterConfig) -> ParticleSystem {
    let mut system = ParticleSystem::from_config(Arc::new(config), 1);
    for _ in 0..180 {
        system.update(DT, Affine3A::IDENTITY, Vec3::new(0.0, 2.0, 10.0));
    }
    system
}

fn update_benchmark(c: &mut Criterion) {
    let camera = Vec3::new(0.0, 2.0, 10.0);

    let mut system = warmed(fountain());
    c.bench_function("update_fountain", |b| {
        b.iter(|| {
            system.update(black_box(DT), Affine3A::IDENTITY, camera);
            black_box(system.instances().len());
        })
    });

    let mut trails = warmed(EmitterConfig {
        rate: 300.0,
        max_particles: 512,
        trail: TrailSettings {
            enabled: true,
            max_points: 24,
            ..Default::default()
        },
        ..fountain()
    });
    c.bench_function("update_with_trails", |b| {
        b.iter(|| {
            trails.update(black_box(DT), Affine3A::IDENTITY, camera);
            black_box(trails.trail_vertices().len());
        })
    });

    let sparks = Arc::new(EmitterConfig {
        rate: 0.0,
        max_particles: 4096,
        lifetime: ValueRange::new(0.3, 0.8),
        ..Default::default()
    });
    let mut fireworks = warmed(
        EmitterConfig {
            rate: 40.0,
            max_particles: 256,
            lifetime: ValueRange::new(0.5, 1.0),
            ..fountain()
        }
        .with_sub_emitter(
            SubEmitterRule::new(SubEmitterTrigger::Death, sparks).with_count(30),
        ),
    );
    c.bench_function("update_sub_emitters", |b| {
        b.iter(|| {
            fireworks.update(black_box(DT), Affine3A::IDENTITY, camera);
            black_box(fireworks.tree_stats());
        })
    });
}

criterion_group!(benches, update_benchmark);
criterion_main!(benches);
