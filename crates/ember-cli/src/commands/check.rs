//! Library check command

use anyhow::{Context, Result};
use ember_particles::{EmitterConfig, EmitterLibrary};

pub fn run(path: &str) -> Result<()> {
    let library =
        EmitterLibrary::load(path).with_context(|| format!("failed to load library {path}"))?;

    if library.is_empty() {
        println!("No emitters found in {path}");
        return Ok(());
    }

    println!("{} emitter(s) in {path}:", library.len());
    for name in library.names() {
        if let Some(config) = library.get(name) {
            println!("  {name} (max {} particles)", config.max_particles);
            print_sub_emitters(config, 2);
        }
    }

    let warnings = library.validate();
    if warnings.is_empty() {
        println!("No warnings.");
    } else {
        println!("\n{} warning(s):", warnings.len());
        for warning in &warnings {
            println!("  {warning}");
        }
    }
    Ok(())
}

/// Print the resolved rule tree below `config`, one level per indent
fn print_sub_emitters(config: &EmitterConfig, depth: usize) {
    let indent = "  ".repeat(depth);
    for rule in config.sub_emitters.rules() {
        println!(
            "{indent}└ {:?} x{} (p={}) -> max {} particles",
            rule.trigger, rule.count, rule.probability, rule.emitter.max_particles
        );
        print_sub_emitters(&rule.emitter, depth + 1);
    }
}
