//! Ember CLI - inspect and dry-run particle emitter libraries

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{check, simulate};

#[derive(Parser)]
#[command(name = "ember")]
#[command(about = "Check and simulate particle emitter libraries", long_about = None)]
#[command(version)]
struct Cli {
    /// Log at debug level (RUST_LOG still overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a library, resolve sub-emitters and report config warnings
    Check {
        /// Path to emitter library (TOML)
        library: String,
    },

    /// Run one emitter headless and print per-frame stats
    Simulate {
        /// Path to emitter library (TOML)
        library: String,

        /// Emitter name within the library
        #[arg(long)]
        emitter: String,

        /// Number of frames to simulate
        #[arg(long, default_value = "120")]
        frames: u32,

        /// Timestep per frame in seconds
        #[arg(long, default_value = "0.016666668")]
        dt: f32,

        /// RNG seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Camera position as x,y,z
        #[arg(long, value_parser = parse_vec3, default_value = "0,0,10")]
        camera: [f32; 3],

        /// Print a stats line every N frames
        #[arg(long, default_value = "10")]
        every: u32,
    },
}

fn parse_vec3(s: &str) -> Result<[f32; 3], String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 3 {
        return Err(format!("expected 3 comma-separated values, got {}", parts.len()));
    }
    let x: f32 = parts[0].trim().parse().map_err(|e| format!("invalid x: {}", e))?;
    let y: f32 = parts[1].trim().parse().map_err(|e| format!("invalid y: {}", e))?;
    let z: f32 = parts[2].trim().parse().map_err(|e| format!("invalid z: {}", e))?;
    Ok([x, y, z])
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match cli.command {
        Commands::Check { library } => check::run(&library),
        Commands::Simulate {
            library,
            emitter,
            frames,
            dt,
            seed,
            camera,
            every,
        } => simulate::run(simulate::SimulateArgs {
            library,
            emitter,
            frames,
            dt,
            seed,
            camera,
            every,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_vec3_accepts_spaces() {
        assert_eq!(parse_vec3("1, 2.5 ,-3").unwrap(), [1.0, 2.5, -3.0]);
    }

    #[test]
    fn parse_vec3_rejects_wrong_arity() {
        assert!(parse_vec3("1,2").is_err());
        assert!(parse_vec3("1,2,x").is_err());
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::try_parse_from(["ember", "check", "fx.toml", "-v"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn simulate_args_parse() {
        let cli = Cli::try_parse_from([
            "ember", "simulate", "fx.toml", "--emitter", "rocket", "--frames", "30", "--camera",
            "0,5,20",
        ])
        .unwrap();
        match cli.command {
            Commands::Simulate {
                emitter,
                frames,
                camera,
                every,
                ..
            } => {
                assert_eq!(emitter, "rocket");
                assert_eq!(frames, 30);
                assert_eq!(camera, [0.0, 5.0, 20.0]);
                assert_eq!(every, 10);
            }
            _ => panic!("expected simulate"),
        }
    }
}
