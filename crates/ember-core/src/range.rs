//! Randomization ranges sampled at spawn time

use crate::curve::Lerp;
use crate::rng::ParticleRng;
use serde::{Deserialize, Serialize};

/// A `[min, max]` range of any interpolable value.
///
/// Sampling draws one uniform scalar and interpolates between the bounds, so
/// vector ranges keep their components correlated (a size range scales
/// uniformly, a color range picks a point on the gradient between the two
/// colors). `min > max` is tolerated: samples always lie between the bounds.
///
/// In TOML a range is written either as a bare constant or as a
/// `{ min = .., max = .. }` table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RangeRepr<T>", into = "RangeRepr<T>")]
pub struct ValueRange<T: Lerp> {
    pub min: T,
    pub max: T,
}

impl<T: Lerp> ValueRange<T> {
    pub const fn new(min: T, max: T) -> Self {
        Self { min, max }
    }

    pub const fn constant(value: T) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    pub fn sample(&self, rng: &mut ParticleRng) -> T {
        self.min.lerp(self.max, rng.next_f32())
    }

    /// Value at a fixed fraction between the bounds
    pub fn at(&self, t: f32) -> T {
        self.min.lerp(self.max, t)
    }
}

impl ValueRange<f32> {
    pub fn is_inverted(&self) -> bool {
        self.min > self.max
    }

    /// Smallest value the range can produce
    pub fn lower(&self) -> f32 {
        self.min.min(self.max)
    }
}

impl<T: Lerp + Default> Default for ValueRange<T> {
    fn default() -> Self {
        Self::constant(T::default())
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RangeRepr<T> {
    Constant(T),
    Range { min: T, max: T },
}

impl<T: Lerp> From<RangeRepr<T>> for ValueRange<T> {
    fn from(repr: RangeRepr<T>) -> Self {
        match repr {
            RangeRepr::Constant(value) => Self::constant(value),
            RangeRepr::Range { min, max } => Self::new(min, max),
        }
    }
}

impl<T: Lerp> From<ValueRange<T>> for RangeRepr<T> {
    fn from(range: ValueRange<T>) -> Self {
        RangeRepr::Range {
            min: range.min,
            max: range.max,
        }
    }
}
