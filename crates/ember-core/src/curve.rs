//! Value-over-lifetime curves
//!
//! A `ParticleCurve` is an ordered list of `(t, value)` keyframes evaluated at
//! a particle's normalized age. Values between keys are linearly interpolated
//! component-wise.

use glam::{Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Linear interpolation for values that can be animated over a lifetime
pub trait Lerp: Copy {
    fn lerp(self, other: Self, t: f32) -> Self;
}

impl Lerp for f32 {
    fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

impl Lerp for Vec2 {
    fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

impl Lerp for Vec3 {
    fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

impl Lerp for Vec4 {
    fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

/// A single curve key
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe<T> {
    pub t: f32,
    pub value: T,
}

impl<T> Keyframe<T> {
    pub fn new(t: f32, value: T) -> Self {
        Self { t, value }
    }
}

/// Piecewise-linear keyframe curve over `t ∈ [0, 1]`.
///
/// Keys are kept sorted by `t` and clamped into `[0, 1]` on construction,
/// whether built in code or deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Keyframe<T>>", into = "Vec<Keyframe<T>>")]
pub struct ParticleCurve<T: Lerp> {
    keys: Vec<Keyframe<T>>,
}

impl<T: Lerp> ParticleCurve<T> {
    pub fn new(keys: impl IntoIterator<Item = Keyframe<T>>) -> Self {
        let mut keys: Vec<Keyframe<T>> = keys
            .into_iter()
            .map(|k| Keyframe::new(clamp_unit(k.t), k.value))
            .collect();
        keys.sort_by(|a, b| a.t.total_cmp(&b.t));
        Self { keys }
    }

    /// A curve with no keys. Evaluating it always yields the caller's default.
    pub fn empty() -> Self {
        Self { keys: Vec::new() }
    }

    pub fn constant(value: T) -> Self {
        Self {
            keys: vec![Keyframe::new(0.0, value)],
        }
    }

    /// Two-key curve from `start` at t=0 to `end` at t=1
    pub fn linear(start: T, end: T) -> Self {
        Self {
            keys: vec![Keyframe::new(0.0, start), Keyframe::new(1.0, end)],
        }
    }

    /// Builder-style key insertion
    pub fn with_key(mut self, t: f32, value: T) -> Self {
        let t = clamp_unit(t);
        let idx = self.keys.partition_point(|k| k.t <= t);
        self.keys.insert(idx, Keyframe::new(t, value));
        self
    }

    pub fn keys(&self) -> &[Keyframe<T>] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Evaluate at normalized time. `None` when the curve has no keys.
    pub fn evaluate(&self, t: f32) -> Option<T> {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return None,
        };
        let t = clamp_unit(t);
        if t <= first.t {
            return Some(first.value);
        }
        if t >= last.t {
            return Some(last.value);
        }

        // first.t < t < last.t, so idx is in 1..len
        let idx = self.keys.partition_point(|k| k.t <= t);
        let a = &self.keys[idx - 1];
        let b = &self.keys[idx];
        let span = b.t - a.t;
        if span <= f32::EPSILON {
            return Some(b.value);
        }
        Some(a.value.lerp(b.value, (t - a.t) / span))
    }

    /// Evaluate, falling back to `default` for a key-less curve
    pub fn evaluate_or(&self, t: f32, default: T) -> T {
        self.evaluate(t).unwrap_or(default)
    }
}

impl<T: Lerp> Default for ParticleCurve<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Lerp> From<Vec<Keyframe<T>>> for ParticleCurve<T> {
    fn from(keys: Vec<Keyframe<T>>) -> Self {
        Self::new(keys)
    }
}

impl<T: Lerp> From<ParticleCurve<T>> for Vec<Keyframe<T>> {
    fn from(curve: ParticleCurve<T>) -> Self {
        curve.keys
    }
}

/// Clamp into [0, 1], mapping NaN to 0
fn clamp_unit(t: f32) -> f32 {
    if t.is_nan() {
        0.0
    } else {
        t.clamp(0.0, 1.0)
    }
}
