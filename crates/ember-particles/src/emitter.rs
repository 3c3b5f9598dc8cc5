//! Emitter configuration (parsed from TOML or built in code)

use crate::forces::ForceFieldSet;
use crate::shape::ShapeSettings;
use crate::sub_emitter::{
    SubEmitterRule, SubEmitterTable, SubEmitterTrigger, MIN_INTERVAL_PERIOD,
};
use crate::trail::TrailSettings;
use ember_core::{ParticleCurve, Result, ValueRange};
use glam::{Vec2, Vec4};
use serde::{Deserialize, Serialize};

/// Blend mode for particle rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    #[default]
    AlphaBlend,
    Additive,
    Multiply,
    Premultiplied,
}

impl BlendMode {
    /// Whether correct output depends on drawing back-to-front
    pub fn requires_sorting(self) -> bool {
        matches!(self, BlendMode::AlphaBlend | BlendMode::Premultiplied)
    }
}

/// How the renderer orients each particle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    #[default]
    Billboard,
    /// Billboard lengthened along the velocity
    StretchedBillboard,
    /// Flat in the XZ plane
    HorizontalBillboard,
    /// Upright, rotating only around Y
    VerticalBillboard,
    /// Only the trail ribbons are drawn
    Trail,
}

/// A timed burst, optionally repeating
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BurstConfig {
    /// Emitter time of the first firing (seconds)
    pub time: f32,
    pub count: u32,
    /// Seconds between repeats; `<= 0` fires once
    pub interval: f32,
    /// Number of firings; `0` repeats forever
    pub cycles: u32,
    pub probability: f32,
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self {
            time: 0.0,
            count: 10,
            interval: 0.0,
            cycles: 1,
            probability: 1.0,
        }
    }
}

/// Distance-based emission rate scaling
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodSettings {
    /// Full rate at or inside this distance
    pub near: f32,
    /// `min_rate_scale` at or beyond this distance
    pub far: f32,
    pub min_rate_scale: f32,
}

impl Default for LodSettings {
    fn default() -> Self {
        Self {
            near: 20.0,
            far: 100.0,
            min_rate_scale: 0.0,
        }
    }
}

impl LodSettings {
    pub fn rate_scale(&self, distance: f32) -> f32 {
        if distance <= self.near {
            return 1.0;
        }
        if distance >= self.far || self.far <= self.near {
            return self.min_rate_scale;
        }
        let t = (distance - self.near) / (self.far - self.near);
        1.0 + (self.min_rate_scale - 1.0) * t
    }
}

/// Full declarative description of an emitter.
///
/// Read-only to the simulation: a `ParticleSystem` shares it through an `Arc`
/// and never mutates it. Every field has a default, so a TOML table only
/// names what it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    /// Continuous emission, particles per second
    pub rate: f32,
    pub bursts: Vec<BurstConfig>,
    /// Emitter cycle length in seconds; `0` runs forever
    pub duration: f32,
    pub looping: bool,
    /// Start emitting as soon as the system is created
    pub autoplay: bool,
    /// Pool capacity used when this config is instantiated as a sub-emitter
    /// or through `ParticleSystem::from_config`
    pub max_particles: usize,

    pub lifetime: ValueRange<f32>,
    pub speed: ValueRange<f32>,
    /// 0 keeps the shape direction, 1 replaces it with a uniform random one
    pub velocity_randomness: f32,
    pub start_size: ValueRange<Vec2>,
    /// Size at end of life when no size curve is set
    pub end_size: Option<Vec2>,
    /// Fractional per-particle size jitter
    pub size_variance: f32,
    /// Degrees
    pub start_rotation: ValueRange<f32>,
    /// Degrees per second
    pub rotation_speed: ValueRange<f32>,
    pub start_color: ValueRange<Vec4>,
    /// Color at end of life when no color curve is set
    pub end_color: Option<Vec4>,

    /// Multiplies the start size
    pub size_over_lifetime: ParticleCurve<Vec2>,
    /// Multiplies the start color
    pub color_over_lifetime: ParticleCurve<Vec4>,
    /// Multiplies alpha after the color curve
    pub alpha_over_lifetime: ParticleCurve<f32>,
    /// Multiplies velocity when integrating position
    pub speed_over_lifetime: ParticleCurve<f32>,

    pub shape: ShapeSettings,
    pub forces: ForceFieldSet,
    pub trail: TrailSettings,
    pub blend_mode: BlendMode,
    pub render_mode: RenderMode,
    /// Extra billboard length per unit speed in stretched mode
    pub velocity_stretch: f32,
    pub lod: Option<LodSettings>,

    /// Resolved sub-emitter rules. Built in code or by `EmitterLibrary`,
    /// never read directly from a single emitter table.
    #[serde(skip)]
    pub sub_emitters: SubEmitterTable,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            rate: 10.0,
            bursts: Vec::new(),
            duration: 0.0,
            looping: true,
            autoplay: true,
            max_particles: 256,
            lifetime: ValueRange::new(1.0, 2.0),
            speed: ValueRange::new(1.0, 3.0),
            velocity_randomness: 0.0,
            start_size: ValueRange::constant(Vec2::splat(0.1)),
            end_size: None,
            size_variance: 0.0,
            start_rotation: ValueRange::constant(0.0),
            rotation_speed: ValueRange::constant(0.0),
            start_color: ValueRange::constant(Vec4::ONE),
            end_color: None,
            size_over_lifetime: ParticleCurve::empty(),
            color_over_lifetime: ParticleCurve::empty(),
            alpha_over_lifetime: ParticleCurve::empty(),
            speed_over_lifetime: ParticleCurve::empty(),
            shape: ShapeSettings::default(),
            forces: ForceFieldSet::default(),
            trail: TrailSettings::default(),
            blend_mode: BlendMode::AlphaBlend,
            render_mode: RenderMode::Billboard,
            velocity_stretch: 0.1,
            lod: None,
            sub_emitters: SubEmitterTable::default(),
        }
    }
}

impl EmitterConfig {
    /// Parse a single emitter from a TOML table. Sub-emitters need named
    /// references and are only available through `EmitterLibrary`.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn with_sub_emitter(mut self, rule: SubEmitterRule) -> Self {
        self.sub_emitters.push(rule);
        self
    }

    /// Size at normalized age `t` for a particle that started at `start`.
    /// An empty size curve falls back to linear start → end interpolation.
    pub fn size_at(&self, start: Vec2, t: f32) -> Vec2 {
        match self.size_over_lifetime.evaluate(t) {
            Some(scale) => start * scale,
            None => match self.end_size {
                Some(end) => start + (end - start) * t,
                None => start,
            },
        }
    }

    /// Color at normalized age `t` for a particle that started at `start`
    pub fn color_at(&self, start: Vec4, t: f32) -> Vec4 {
        let mut color = match self.color_over_lifetime.evaluate(t) {
            Some(tint) => start * tint,
            None => match self.end_color {
                Some(end) => start + (end - start) * t,
                None => start,
            },
        };
        color.w *= self.alpha_over_lifetime.evaluate_or(t, 1.0);
        color
    }

    pub fn speed_scale_at(&self, t: f32) -> f32 {
        self.speed_over_lifetime.evaluate_or(t, 1.0)
    }

    /// Whether the alive set should be sorted back-to-front each frame
    pub fn sorts_particles(&self) -> bool {
        self.blend_mode.requires_sorting()
    }

    /// Non-fatal configuration problems. The simulation still runs such
    /// configs on a best-effort basis.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.rate < 0.0 {
            warnings.push(format!("rate {} is negative; no particles will be emitted", self.rate));
        }
        if self.max_particles == 0 {
            warnings.push("max_particles is 0; nothing can spawn".to_string());
        }
        if self.lifetime.is_inverted() {
            warnings.push(format!(
                "lifetime range is inverted ({} > {})",
                self.lifetime.min, self.lifetime.max
            ));
        }
        if self.lifetime.lower() <= 0.0 {
            warnings.push("lifetime can be <= 0; such particles die on their first update".to_string());
        }
        if self.speed.is_inverted() {
            warnings.push(format!(
                "speed range is inverted ({} > {})",
                self.speed.min, self.speed.max
            ));
        }
        if self.rotation_speed.is_inverted() || self.start_rotation.is_inverted() {
            warnings.push("rotation range is inverted".to_string());
        }
        if !(0.0..=1.0).contains(&self.velocity_randomness) {
            warnings.push(format!(
                "velocity_randomness {} is outside [0, 1]",
                self.velocity_randomness
            ));
        }
        for (i, burst) in self.bursts.iter().enumerate() {
            if burst.cycles == 0 && burst.interval <= 0.0 {
                warnings.push(format!("burst {i} repeats forever with no interval; it fires once"));
            }
        }
        if self.trail.enabled && self.trail.max_points < 2 {
            warnings.push("trail.max_points < 2; trails need two points to draw".to_string());
        }
        if let Some(lod) = &self.lod {
            if lod.far <= lod.near {
                warnings.push("lod.far must be greater than lod.near".to_string());
            }
        }
        for (i, rule) in self.sub_emitters.rules().iter().enumerate() {
            if !(0.0..=1.0).contains(&rule.probability) {
                warnings.push(format!("sub-emitter {i} probability is outside [0, 1]"));
            }
            if let SubEmitterTrigger::Interval { period } = rule.trigger {
                if period < MIN_INTERVAL_PERIOD {
                    warnings.push(format!(
                        "sub-emitter {i} interval period {period} is below {MIN_INTERVAL_PERIOD}s and will be clamped"
                    ));
                }
            }
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::EmissionShape;

    #[test]
    fn default_config_is_sane() {
        let config = EmitterConfig::default();
        assert!(config.rate > 0.0);
        assert!(config.lifetime.max >= config.lifetime.min);
        assert!(config.max_particles > 0);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn parse_from_toml() {
        let toml_str = r#"
rate = 50.0
max_particles = 500
blend_mode = "additive"
render_mode = "stretched_billboard"
lifetime = { min = 0.5, max = 1 }
start_color = [1.0, 0.5, 0.0, 1.0]
end_color = [1.0, 0.0, 0.0, 0.0]

[shape]
type = "cone"
radius = 0.2
angle = 45.0

[forces]
gravity_multiplier = 1
drag = 0.5
turbulence = { strength = 2.0 }

[[bursts]]
count = 30
interval = 0.5
cycles = 0

[trail]
enabled = true
min_vertex_distance = 0.05
"#;
        let config = EmitterConfig::from_toml_str(toml_str).unwrap();
        assert!((config.rate - 50.0).abs() < 0.01);
        assert_eq!(config.max_particles, 500);
        assert_eq!(config.blend_mode, BlendMode::Additive);
        assert_eq!(config.render_mode, RenderMode::StretchedBillboard);
        assert_eq!(config.lifetime, ValueRange::new(0.5, 1.0));
        assert!((config.start_color.min.y - 0.5).abs() < 0.01);
        assert_eq!(config.end_color, Some(Vec4::new(1.0, 0.0, 0.0, 0.0)));
        assert_eq!(
            config.shape.shape,
            EmissionShape::Cone {
                radius: 0.2,
                angle: 45.0
            }
        );
        assert_eq!(config.forces.gravity_multiplier, 1.0);
        let turbulence = config.forces.turbulence.unwrap();
        assert_eq!(turbulence.strength, 2.0);
        assert_eq!(turbulence.frequency, 1.0);
        assert_eq!(config.bursts.len(), 1);
        assert_eq!(config.bursts[0].cycles, 0);
        assert!(config.trail.enabled);
        assert_eq!(config.trail.max_points, 16);
    }

    #[test]
    fn bad_toml_is_an_error() {
        assert!(EmitterConfig::from_toml_str("rate = \"fast\"").is_err());
    }

    #[test]
    fn size_falls_back_to_linear_without_curve() {
        let config = EmitterConfig {
            start_size: ValueRange::constant(Vec2::splat(0.1)),
            end_size: Some(Vec2::splat(0.5)),
            ..Default::default()
        };
        let size = config.size_at(Vec2::splat(0.1), 0.5);
        assert!((size - Vec2::splat(0.3)).length() < 1e-5);
    }

    #[test]
    fn size_curve_scales_start_size() {
        let config = EmitterConfig {
            size_over_lifetime: ParticleCurve::linear(Vec2::ONE, Vec2::ZERO),
            end_size: Some(Vec2::splat(100.0)),
            ..Default::default()
        };
        let size = config.size_at(Vec2::splat(2.0), 0.25);
        assert!((size - Vec2::splat(1.5)).length() < 1e-5);
    }

    #[test]
    fn color_and_alpha_curves_compose() {
        let config = EmitterConfig {
            color_over_lifetime: ParticleCurve::constant(Vec4::new(1.0, 0.5, 1.0, 1.0)),
            alpha_over_lifetime: ParticleCurve::linear(1.0, 0.0),
            ..Default::default()
        };
        let c = config.color_at(Vec4::ONE, 0.5);
        assert!((c - Vec4::new(1.0, 0.5, 1.0, 0.5)).length() < 1e-5);
    }

    #[test]
    fn lod_scales_between_near_and_far() {
        let lod = LodSettings {
            near: 10.0,
            far: 30.0,
            min_rate_scale: 0.2,
        };
        assert_eq!(lod.rate_scale(5.0), 1.0);
        assert!((lod.rate_scale(20.0) - 0.6).abs() < 1e-5);
        assert_eq!(lod.rate_scale(50.0), 0.2);
    }

    #[test]
    fn blend_modes_that_need_sorting() {
        assert!(BlendMode::AlphaBlend.requires_sorting());
        assert!(BlendMode::Premultiplied.requires_sorting());
        assert!(!BlendMode::Additive.requires_sorting());
        assert!(!BlendMode::Multiply.requires_sorting());
    }

    #[test]
    fn validate_reports_inverted_ranges() {
        let config = EmitterConfig {
            lifetime: ValueRange::new(3.0, 1.0),
            speed: ValueRange::new(5.0, 2.0),
            ..Default::default()
        };
        let warnings = config.validate();
        assert!(warnings.iter().any(|w| w.contains("lifetime")));
        assert!(warnings.iter().any(|w| w.contains("speed")));
    }

    #[test]
    fn validate_reports_tiny_interval_period() {
        let child = std::sync::Arc::new(EmitterConfig::default());
        let config = EmitterConfig::default().with_sub_emitter(SubEmitterRule::new(
            SubEmitterTrigger::Interval { period: 1e-7 },
            child,
        ));
        let warnings = config.validate();
        assert!(warnings.iter().any(|w| w.contains("interval period")));
        assert!(EmitterConfig::default().validate().is_empty());
    }
}
