//! Emission shapes: where a particle starts and which way it heads.
//!
//! All shapes are expressed in emitter-local space with +Y as the emitter's
//! "up"/forward axis. Circles lie in the XZ plane, edges run along X.

use ember_core::ParticleRng;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

/// Geometric sampler for initial particle position and direction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EmissionShape {
    /// Emit from the origin, heading along +Y
    Point,
    Sphere {
        radius: f32,
    },
    /// Upper (+Y) half of a sphere
    Hemisphere {
        radius: f32,
    },
    /// Base disc of `radius` in the XZ plane, directions spread up to
    /// `angle` degrees from +Y (wider towards the rim)
    Cone {
        radius: f32,
        angle: f32,
    },
    Box {
        half_extents: Vec3,
    },
    /// Disc/ring in the XZ plane, heading radially outward
    Circle {
        radius: f32,
    },
    /// Line segment along X centred on the origin, heading along +Y
    Edge {
        length: f32,
    },
}

impl Default for EmissionShape {
    fn default() -> Self {
        Self::Point
    }
}

/// Shape plus the sampling options shared by every shape.
///
/// In TOML the shape's `type` and its parameters sit beside the options.
/// Omitted keys fall back to defaults: `type` to `point`, radii and lengths
/// to 1, the cone angle to 25 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "ShapeTable")]
pub struct ShapeSettings {
    #[serde(flatten)]
    pub shape: EmissionShape,
    /// Angular sub-range in degrees for sphere, hemisphere, cone and circle
    pub arc: f32,
    /// Sample on the surface/rim instead of throughout the volume/area
    pub surface_only: bool,
    /// Ignore the shape's natural direction and pick a uniform one
    pub randomize_direction: bool,
}

impl Default for ShapeSettings {
    fn default() -> Self {
        Self {
            shape: EmissionShape::Point,
            arc: 360.0,
            surface_only: false,
            randomize_direction: false,
        }
    }
}

impl ShapeSettings {
    pub fn new(shape: EmissionShape) -> Self {
        Self {
            shape,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ShapeKind {
    #[default]
    Point,
    Sphere,
    Hemisphere,
    Cone,
    Box,
    Circle,
    Edge,
}

/// Flat TOML form of `ShapeSettings`
#[derive(Deserialize)]
#[serde(default)]
struct ShapeTable {
    #[serde(rename = "type")]
    kind: ShapeKind,
    radius: Option<f32>,
    angle: Option<f32>,
    half_extents: Option<Vec3>,
    length: Option<f32>,
    arc: f32,
    surface_only: bool,
    randomize_direction: bool,
}

impl Default for ShapeTable {
    fn default() -> Self {
        let defaults = ShapeSettings::default();
        Self {
            kind: ShapeKind::Point,
            radius: None,
            angle: None,
            half_extents: None,
            length: None,
            arc: defaults.arc,
            surface_only: defaults.surface_only,
            randomize_direction: defaults.randomize_direction,
        }
    }
}

impl From<ShapeTable> for ShapeSettings {
    fn from(table: ShapeTable) -> Self {
        let radius = table.radius.unwrap_or(1.0);
        let shape = match table.kind {
            ShapeKind::Point => EmissionShape::Point,
            ShapeKind::Sphere => EmissionShape::Sphere { radius },
            ShapeKind::Hemisphere => EmissionShape::Hemisphere { radius },
            ShapeKind::Cone => EmissionShape::Cone {
                radius,
                angle: table.angle.unwrap_or(25.0),
            },
            ShapeKind::Box => EmissionShape::Box {
                half_extents: table.half_extents.unwrap_or(Vec3::ONE),
            },
            ShapeKind::Circle => EmissionShape::Circle { radius },
            ShapeKind::Edge => EmissionShape::Edge {
                length: table.length.unwrap_or(1.0),
            },
        };
        Self {
            shape,
            arc: table.arc,
            surface_only: table.surface_only,
            randomize_direction: table.randomize_direction,
        }
    }
}

/// Result of sampling a shape, in emitter-local space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeSample {
    pub position: Vec3,
    /// Unit length
    pub direction: Vec3,
}

/// Sample a local position and direction from the configured shape
pub fn sample(settings: &ShapeSettings, rng: &mut ParticleRng) -> ShapeSample {
    let arc = settings.arc.clamp(0.0, 360.0).to_radians();
    let surface = settings.surface_only;

    let (position, direction) = match settings.shape {
        EmissionShape::Point => (Vec3::ZERO, Vec3::Y),
        EmissionShape::Sphere { radius } => {
            let normal = arc_limited(rng.random_direction(), arc, rng);
            (normal * radial(radius, surface, rng), normal)
        }
        EmissionShape::Hemisphere { radius } => {
            let mut normal = rng.random_direction();
            normal.y = normal.y.abs();
            let normal = arc_limited(normal, arc, rng);
            (normal * radial(radius, surface, rng), normal)
        }
        EmissionShape::Cone { radius, angle } => {
            let disc = if surface {
                let phi = rng.next_f32() * arc;
                glam::Vec2::new(phi.cos(), phi.sin())
            } else {
                rng.in_disc(arc)
            };
            let position = Vec3::new(disc.x, 0.0, disc.y) * radius.abs();
            let half_angle = angle.abs().min(179.9).to_radians();
            let direction = if radius.abs() > f32::EPSILON {
                // Tilt outward in proportion to distance from the axis
                let tilt = half_angle * disc.length();
                let outward = Vec3::new(disc.x, 0.0, disc.y).normalize_or_zero();
                (Vec3::Y * tilt.cos() + outward * tilt.sin()).normalize_or(Vec3::Y)
            } else {
                rng.cone_direction(Vec3::Y, half_angle)
            };
            (position, direction)
        }
        EmissionShape::Box { half_extents } => {
            let h = half_extents.abs();
            let mut position = Vec3::new(
                rng.range(-h.x, h.x),
                rng.range(-h.y, h.y),
                rng.range(-h.z, h.z),
            );
            if surface {
                // Snap one axis to a face
                let axis = (rng.next_f32() * 3.0) as usize % 3;
                let sign = if rng.chance(0.5) { 1.0 } else { -1.0 };
                position[axis] = h[axis] * sign;
            }
            (position, Vec3::Y)
        }
        EmissionShape::Circle { radius } => {
            let disc = if surface {
                let phi = rng.next_f32() * arc;
                glam::Vec2::new(phi.cos(), phi.sin())
            } else {
                rng.in_disc(arc)
            };
            let position = Vec3::new(disc.x, 0.0, disc.y) * radius.abs();
            let direction = Vec3::new(disc.x, 0.0, disc.y).normalize_or(Vec3::X);
            (position, direction)
        }
        EmissionShape::Edge { length } => {
            let half = length.abs() * 0.5;
            (Vec3::new(rng.range(-half, half), 0.0, 0.0), Vec3::Y)
        }
    };

    let direction = if settings.randomize_direction {
        rng.random_direction()
    } else {
        direction
    };

    ShapeSample {
        position,
        direction,
    }
}

/// Distance from centre: surface samples sit on the radius, volume samples
/// are uniform in the ball
fn radial(radius: f32, surface: bool, rng: &mut ParticleRng) -> f32 {
    let radius = radius.abs();
    if surface {
        radius
    } else {
        radius * rng.next_f32().cbrt()
    }
}

/// Re-draw the azimuth (around +Y) of `dir` inside `[0, arc)`
fn arc_limited(dir: Vec3, arc: f32, rng: &mut ParticleRng) -> Vec3 {
    if arc >= TAU {
        return dir;
    }
    let horizontal = (dir.x * dir.x + dir.z * dir.z).sqrt();
    let phi = rng.next_f32() * arc;
    Vec3::new(horizontal * phi.cos(), dir.y, horizontal * phi.sin())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(shape: EmissionShape, f: impl Fn(&mut ShapeSettings)) -> Vec<ShapeSample> {
        let mut settings = ShapeSettings::new(shape);
        f(&mut settings);
        let mut rng = ParticleRng::new(17);
        (0..500).map(|_| sample(&settings, &mut rng)).collect()
    }

    #[test]
    fn point_emits_up_from_origin() {
        for s in samples(EmissionShape::Point, |_| {}) {
            assert_eq!(s.position, Vec3::ZERO);
            assert_eq!(s.direction, Vec3::Y);
        }
    }

    #[test]
    fn sphere_volume_and_surface() {
        for s in samples(EmissionShape::Sphere { radius: 2.0 }, |_| {}) {
            assert!(s.position.length() <= 2.0 + 1e-4);
            assert!((s.direction.length() - 1.0).abs() < 1e-3);
        }
        for s in samples(EmissionShape::Sphere { radius: 2.0 }, |c| c.surface_only = true) {
            assert!((s.position.length() - 2.0).abs() < 1e-3);
            // Direction is the outward normal
            assert!(s.direction.dot(s.position.normalize()) > 0.999);
        }
    }

    #[test]
    fn hemisphere_stays_above_plane() {
        for s in samples(EmissionShape::Hemisphere { radius: 1.0 }, |_| {}) {
            assert!(s.position.y >= -1e-6);
            assert!(s.direction.y >= -1e-6);
        }
    }

    #[test]
    fn cone_directions_within_half_angle() {
        let half = 30f32.to_radians();
        for s in samples(EmissionShape::Cone { radius: 1.0, angle: 30.0 }, |_| {}) {
            assert!(s.position.y.abs() < 1e-6);
            assert!(s.position.length() <= 1.0 + 1e-4);
            assert!(s.direction.dot(Vec3::Y) >= half.cos() - 1e-4);
        }
        for s in samples(EmissionShape::Cone { radius: 0.0, angle: 30.0 }, |_| {}) {
            assert_eq!(s.position, Vec3::ZERO);
            assert!(s.direction.dot(Vec3::Y) >= half.cos() - 1e-4);
        }
    }

    #[test]
    fn box_within_half_extents() {
        let h = Vec3::new(1.0, 2.0, 3.0);
        for s in samples(EmissionShape::Box { half_extents: h }, |_| {}) {
            assert!(s.position.abs().cmple(h + Vec3::splat(1e-5)).all());
        }
        for s in samples(EmissionShape::Box { half_extents: h }, |c| c.surface_only = true) {
            let on_face = (0..3).any(|i| (s.position[i].abs() - h[i]).abs() < 1e-5);
            assert!(on_face);
        }
    }

    #[test]
    fn circle_lies_in_plane_and_respects_arc() {
        for s in samples(EmissionShape::Circle { radius: 1.5 }, |c| c.arc = 90.0) {
            assert_eq!(s.position.y, 0.0);
            assert!(s.position.length() <= 1.5 + 1e-4);
            assert!(s.position.x >= -1e-5 && s.position.z >= -1e-5);
            assert!(s.direction.y.abs() < 1e-6);
        }
    }

    #[test]
    fn edge_lies_on_x_axis() {
        for s in samples(EmissionShape::Edge { length: 4.0 }, |_| {}) {
            assert!(s.position.x.abs() <= 2.0);
            assert_eq!(s.position.y, 0.0);
            assert_eq!(s.position.z, 0.0);
        }
    }

    #[test]
    fn randomize_direction_overrides_normal() {
        let dirs = samples(EmissionShape::Point, |c| c.randomize_direction = true);
        assert!(dirs.iter().any(|s| s.direction.y < 0.0));
        for s in dirs {
            assert!((s.direction.length() - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn parses_tagged_shape() {
        let settings: ShapeSettings =
            toml::from_str("type = \"cone\"\nradius = 0.5\nangle = 25\narc = 180").unwrap();
        assert_eq!(
            settings.shape,
            EmissionShape::Cone {
                radius: 0.5,
                angle: 25.0
            }
        );
        assert_eq!(settings.arc, 180.0);
    }

    #[test]
    fn shape_table_keys_are_optional() {
        let settings: ShapeSettings = toml::from_str("arc = 90").unwrap();
        assert_eq!(settings.shape, EmissionShape::Point);
        assert_eq!(settings.arc, 90.0);

        let settings: ShapeSettings = toml::from_str("type = \"sphere\"").unwrap();
        assert_eq!(settings.shape, EmissionShape::Sphere { radius: 1.0 });

        let settings: ShapeSettings = toml::from_str("").unwrap();
        assert_eq!(settings, ShapeSettings::default());

        assert!(toml::from_str::<ShapeSettings>("type = \"torus\"").is_err());
    }

    #[test]
    fn serialized_settings_parse_back() {
        let original = ShapeSettings {
            surface_only: true,
            ..ShapeSettings::new(EmissionShape::Box {
                half_extents: Vec3::new(1.0, 2.0, 3.0),
            })
        };
        let text = toml::to_string(&original).unwrap();
        let parsed: ShapeSettings = toml::from_str(&text).unwrap();
        assert_eq!(parsed, original);
    }
}
