//! Headless simulation command

use anyhow::{bail, Context, Result};
use ember_particles::{EmitterLibrary, ParticleSystem};
use glam::{Affine3A, Vec3};
use std::sync::Arc;

pub struct SimulateArgs {
    pub library: String,
    pub emitter: String,
    pub frames: u32,
    pub dt: f32,
    pub seed: u64,
    pub camera: [f32; 3],
    pub every: u32,
}

pub fn run(args: SimulateArgs) -> Result<()> {
    let library = EmitterLibrary::load(&args.library)
        .with_context(|| format!("failed to load library {}", args.library))?;

    let Some(config) = library.get(&args.emitter) else {
        let known: Vec<&str> = library.names().collect();
        bail!(
            "no emitter '{}' in {} (available: {})",
            args.emitter,
            args.library,
            known.join(", ")
        );
    };

    for warning in config.validate() {
        log::warn!("{}: {warning}", args.emitter);
    }

    let mut system = ParticleSystem::from_config(Arc::clone(config), args.seed);
    let camera = Vec3::from_array(args.camera);
    let every = args.every.max(1);

    println!(
        "{:>6} {:>8} {:>8} {:>10} {:>10} {:>10} {:>8}",
        "frame", "time", "alive", "spawned", "dropped", "deaths", "trail_v"
    );
    for frame in 1..=args.frames {
        system.update(args.dt, Affine3A::IDENTITY, camera);
        if frame % every == 0 || frame == args.frames {
            system.refresh_trails();
            let stats = system.tree_stats();
            println!(
                "{:>6} {:>8.3} {:>8} {:>10} {:>10} {:>10} {:>8}",
                frame,
                system.time(),
                stats.alive,
                stats.spawned_total,
                stats.dropped_total,
                stats.deaths_total,
                stats.trail_vertices
            );
        }
        if system.is_finished() {
            println!("Emitter finished after {frame} frame(s).");
            break;
        }
    }

    let totals = system.tree_stats();
    println!(
        "\nTotals: {} spawned, {} dropped, {} died, {} alive of {} capacity",
        totals.spawned_total, totals.dropped_total, totals.deaths_total, totals.alive, totals.capacity
    );
    Ok(())
}
