use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// Represents a point or offset in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vector2 {
    /// Value along the x-axis.
    /// Positive direction is to the right.
    pub x: f64,
    /// Value along the y-axis.
    /// Positive direction is down, as on screen.
    pub y: f64,
}

impl Vector2 {
    pub fn new(x: f64, y: f64) -> Self {
        Vector2 { x, y }
    }

    /// Returns the magnitude of the vector.
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Returns the euclidean distance to another point.
    pub fn distance(&self, other: &Vector2) -> f64 {
        (*other - *self).magnitude()
    }

    /// Clamps both components into `[0, width] x [0, height]`.
    pub fn clamp_to(&self, width: f64, height: f64) -> Vector2 {
        Vector2 {
            x: self.x.clamp(0.0, width),
            y: self.y.clamp(0.0, height),
        }
    }
}

impl Add for Vector2 {
    type Output = Vector2;

    fn add(self, other: Vector2) -> Vector2 {
        Vector2::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Vector2 {
    type Output = Vector2;

    fn sub(self, other: Vector2) -> Vector2 {
        Vector2::new(self.x - other.x, self.y - other.y)
    }
}
