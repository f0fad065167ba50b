//! Miscellaneous utility structs and functions.

use std::fmt::Debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An interval on the real number line.
#[derive(Copy, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Interval {
    pub min: f64,
    pub max: f64,
}

impl Interval {
    /// Creates a new interval.
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Creates an interval extending `below` under and `above` over the given point.
    pub fn around(point: f64, below: f64, above: f64) -> Self {
        Self {
            min: point - below,
            max: point + above,
        }
    }

    /// Returns true if this interval contains the value.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Gets the magnitude of the interval.
    pub fn length(&self) -> f64 {
        self.max - self.min
    }

    /// Linearly interpolates between the ends of the interval.
    pub fn lerp(&self, t: f64) -> f64 {
        self.min + t * (self.max - self.min)
    }

    /// The fraction of the way `value` lies from `min` to `max`, clamped to `[0, 1]`.
    /// Degenerate intervals give zero.
    pub fn inv_lerp_clamped(&self, value: f64) -> f64 {
        let len = self.length();
        if len > 0.0 {
            ((value - self.min) / len).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

impl Debug for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interval({:?}, {:?})", &self.min, &self.max)
    }
}
