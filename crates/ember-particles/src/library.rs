//! Named emitter collections loaded from TOML
//!
//! A library file holds one `[emitters.<name>]` table per emitter. Sub-emitter
//! rules refer to other emitters by name and are resolved into shared
//! `Arc<EmitterConfig>` trees at load time, so a loaded library can never
//! contain a reference cycle.

use crate::emitter::EmitterConfig;
use crate::sub_emitter::{InheritFlags, SubEmitterRule, SubEmitterTrigger};
use ember_core::{EmberError, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct LibraryFile {
    #[serde(default)]
    emitters: BTreeMap<String, EmitterDef>,
}

#[derive(Debug, Deserialize)]
struct EmitterDef {
    #[serde(flatten)]
    config: EmitterConfig,
    #[serde(default)]
    sub_emitters: Vec<SubEmitterDef>,
}

#[derive(Debug, Deserialize)]
struct SubEmitterDef {
    trigger: SubEmitterTrigger,
    emitter: String,
    #[serde(default = "default_count")]
    count: u32,
    #[serde(default = "default_one")]
    probability: f32,
    #[serde(default)]
    inherit: InheritFlags,
    #[serde(default = "default_one")]
    velocity_blend: f32,
}

fn default_count() -> u32 {
    1
}

fn default_one() -> f32 {
    1.0
}

/// Resolved emitter configurations, addressable by name
#[derive(Debug, Default)]
pub struct EmitterLibrary {
    emitters: BTreeMap<String, Arc<EmitterConfig>>,
}

impl EmitterLibrary {
    /// Load a library from a TOML file on disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let library = Self::from_toml_str(&content)?;
        log::debug!("loaded {} emitter(s) from {}", library.len(), path.display());
        Ok(library)
    }

    /// Parse and resolve a library. Fails on unknown sub-emitter references
    /// and on reference cycles.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let file: LibraryFile = toml::from_str(source)?;
        let mut resolved = HashMap::new();
        let mut stack = Vec::new();
        for name in file.emitters.keys() {
            resolve(name, &file.emitters, &mut resolved, &mut stack)?;
        }
        Ok(Self {
            emitters: resolved.into_iter().collect(),
        })
    }

    pub fn get(&self, name: &str) -> Option<&Arc<EmitterConfig>> {
        self.emitters.get(name)
    }

    /// Emitter names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.emitters.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.emitters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emitters.is_empty()
    }

    /// Configuration warnings for every emitter, prefixed with its name
    pub fn validate(&self) -> Vec<String> {
        self.emitters
            .iter()
            .flat_map(|(name, config)| {
                config
                    .validate()
                    .into_iter()
                    .map(move |warning| format!("{name}: {warning}"))
            })
            .collect()
    }
}

/// Depth-first resolution. `stack` holds the names currently being resolved;
/// meeting one of them again means a cycle.
fn resolve(
    name: &str,
    defs: &BTreeMap<String, EmitterDef>,
    resolved: &mut HashMap<String, Arc<EmitterConfig>>,
    stack: &mut Vec<String>,
) -> Result<Arc<EmitterConfig>> {
    if let Some(config) = resolved.get(name) {
        return Ok(Arc::clone(config));
    }
    if let Some(start) = stack.iter().position(|n| n == name) {
        let mut path: Vec<&str> = stack[start..].iter().map(String::as_str).collect();
        path.push(name);
        return Err(EmberError::SubEmitterCycle(path.join(" -> ")));
    }
    let def = defs
        .get(name)
        .ok_or_else(|| EmberError::InvalidConfig(format!("no emitter named '{name}'")))?;

    stack.push(name.to_string());
    let mut config = def.config.clone();
    for sub in &def.sub_emitters {
        if !defs.contains_key(&sub.emitter) {
            return Err(EmberError::UnknownEmitter {
                parent: name.to_string(),
                child: sub.emitter.clone(),
            });
        }
        let child = resolve(&sub.emitter, defs, resolved, stack)?;
        config.sub_emitters.push(
            SubEmitterRule::new(sub.trigger, child)
                .with_count(sub.count)
                .with_probability(sub.probability)
                .with_inherit(sub.inherit)
                .with_velocity_blend(sub.velocity_blend),
        );
    }
    stack.pop();

    let config = Arc::new(config);
    resolved.insert(name.to_string(), Arc::clone(&config));
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::EmissionShape;

    const FIREWORKS: &str = r#"
[emitters.rocket]
rate = 0.0
lifetime = 1.5
speed = { min = 8.0, max = 10.0 }
bursts = [{ time = 0.0, count = 1 }]

[emitters.rocket.forces]
gravity_multiplier = 1.0

[[emitters.rocket.sub_emitters]]
trigger = { kind = "death" }
emitter = "sparks"
count = 20
inherit = { position = true, velocity = true }
velocity_blend = 0.5

[emitters.sparks]
rate = 0
max_particles = 200
lifetime = { min = 0.5, max = 1 }
end_color = [1.0, 0.3, 0.0, 0.0]
blend_mode = "additive"

[emitters.sparks.shape]
type = "sphere"
radius = 0.2
"#;

    #[test]
    fn resolves_named_sub_emitters() {
        let library = EmitterLibrary::from_toml_str(FIREWORKS).unwrap();
        assert_eq!(library.names().collect::<Vec<_>>(), vec!["rocket", "sparks"]);

        let rocket = library.get("rocket").unwrap();
        assert_eq!(rocket.sub_emitters.len(), 1);
        let rule = &rocket.sub_emitters.rules()[0];
        assert_eq!(rule.trigger, SubEmitterTrigger::Death);
        assert_eq!(rule.count, 20);
        assert!(rule.inherit.velocity);
        assert!(!rule.inherit.color);
        assert_eq!(rule.velocity_blend, 0.5);

        let sparks = library.get("sparks").unwrap();
        assert!(Arc::ptr_eq(&rule.emitter, sparks));
        assert_eq!(sparks.max_particles, 200);
        assert_eq!(sparks.shape.shape, EmissionShape::Sphere { radius: 0.2 });
    }

    #[test]
    fn unknown_reference_is_rejected() {
        let source = r#"
[emitters.a]
[[emitters.a.sub_emitters]]
trigger = { kind = "birth" }
emitter = "missing"
"#;
        let err = EmitterLibrary::from_toml_str(source).unwrap_err();
        match err {
            EmberError::UnknownEmitter { parent, child } => {
                assert_eq!(parent, "a");
                assert_eq!(child, "missing");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn cycles_are_rejected() {
        let source = r#"
[emitters.a]
[[emitters.a.sub_emitters]]
trigger = { kind = "death" }
emitter = "b"

[emitters.b]
[[emitters.b.sub_emitters]]
trigger = { kind = "birth" }
emitter = "a"
"#;
        let err = EmitterLibrary::from_toml_str(source).unwrap_err();
        match err {
            EmberError::SubEmitterCycle(path) => assert_eq!(path, "a -> b -> a"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let source = r#"
[emitters.loop]
[[emitters.loop.sub_emitters]]
trigger = { kind = "interval", period = 0.1 }
emitter = "loop"
"#;
        assert!(matches!(
            EmitterLibrary::from_toml_str(source),
            Err(EmberError::SubEmitterCycle(_))
        ));
    }

    #[test]
    fn shared_children_resolve_once() {
        let source = r#"
[emitters.smoke]
[emitters.left]
[[emitters.left.sub_emitters]]
trigger = { kind = "death" }
emitter = "smoke"
[emitters.right]
[[emitters.right.sub_emitters]]
trigger = { kind = "death" }
emitter = "smoke"
"#;
        let library = EmitterLibrary::from_toml_str(source).unwrap();
        let left = &library.get("left").unwrap().sub_emitters.rules()[0].emitter;
        let right = &library.get("right").unwrap().sub_emitters.rules()[0].emitter;
        assert!(Arc::ptr_eq(left, right));
    }

    #[test]
    fn bad_field_type_is_a_parse_error() {
        let source = "[emitters.a]\nrate = \"fast\"\n";
        assert!(matches!(
            EmitterLibrary::from_toml_str(source),
            Err(EmberError::TomlParseError(_))
        ));
    }

    #[test]
    fn validate_prefixes_emitter_name() {
        let source = "[emitters.broken]\nrate = -1.0\nlifetime = { min = 2.0, max = 1.0 }\n";
        let library = EmitterLibrary::from_toml_str(source).unwrap();
        let warnings = library.validate();
        assert!(warnings.len() >= 2);
        assert!(warnings.iter().all(|w| w.starts_with("broken: ")));
    }

    #[test]
    fn empty_library_loads() {
        let library = EmitterLibrary::from_toml_str("").unwrap();
        assert!(library.is_empty());
    }

    #[test]
    fn load_reads_from_disk() {
        let path = std::env::temp_dir().join(format!("ember-library-{}.toml", std::process::id()));
        fs::write(&path, FIREWORKS).unwrap();
        let library = EmitterLibrary::load(&path).unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(library.len(), 2);

        let missing = EmitterLibrary::load(path.with_extension("absent"));
        assert!(matches!(missing, Err(EmberError::IoError(_))));
    }
}
