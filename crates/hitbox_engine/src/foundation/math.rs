//! Math utilities and types
//!
//! Provides the 2D math types used by the hitbox physics core. Angles are in
//! radians and rotate counter-clockwise in a Y-up world.

pub use nalgebra::Vector2;

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// Axis-aligned bounding box in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner
    pub min: Vec2,
    /// Maximum corner
    pub max: Vec2,
}

impl Aabb {
    /// Create a bounding box from its corners
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// An inverted box that any call to [`Aabb::expand`] will replace
    pub fn empty() -> Self {
        Self {
            min: Vec2::new(f32::INFINITY, f32::INFINITY),
            max: Vec2::new(f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    /// Whether no bounds have been accumulated yet
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    /// Grow this box to also enclose `other`
    pub fn expand(&mut self, other: &Aabb) {
        self.min.x = self.min.x.min(other.min.x);
        self.min.y = self.min.y.min(other.min.y);
        self.max.x = self.max.x.max(other.max.x);
        self.max.y = self.max.y.max(other.max.y);
    }

    /// Overlap test. Touching edges count as overlapping.
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// Whether `other` lies completely inside this box
    pub fn contains(&self, other: &Aabb) -> bool {
        other.min.x >= self.min.x
            && other.max.x <= self.max.x
            && other.min.y >= self.min.y
            && other.max.y <= self.max.y
    }

    /// Translate the box in place
    pub fn translate(&mut self, delta: Vec2) {
        self.min += delta;
        self.max += delta;
    }

    /// Center point of the box
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// 2 * Pi
    pub const TAU: f32 = 2.0 * PI;

    /// Pi / 2
    pub const HALF_PI: f32 = PI * 0.5;
}

/// Math utility functions
pub mod utils {
    use super::{constants, Vec2};

    /// Rotate a vector counter-clockwise by `angle` radians
    pub fn rotate_vec2(v: Vec2, angle: f32) -> Vec2 {
        let (sin, cos) = angle.sin_cos();
        Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
    }

    /// Build a vector from polar coordinates
    pub fn polar_vec2(magnitude: f32, angle: f32) -> Vec2 {
        let (sin, cos) = angle.sin_cos();
        Vec2::new(magnitude * cos, magnitude * sin)
    }

    /// Wrap an angle into `[-π, π)`
    pub fn normalize_angle(angle: f32) -> f32 {
        let wrapped = (angle + constants::PI).rem_euclid(constants::TAU) - constants::PI;
        // rem_euclid can round up to TAU for tiny negative inputs
        if wrapped >= constants::PI {
            wrapped - constants::TAU
        } else {
            wrapped
        }
    }

    /// Shortest signed angle that takes `from` to `to`, in `[-π, π)`
    pub fn angle_difference(from: f32, to: f32) -> f32 {
        normalize_angle(normalize_angle(to) - normalize_angle(from))
    }

    /// Unit vector perpendicular to `v` (rotated +90°)
    pub fn perpendicular(v: Vec2) -> Vec2 {
        Vec2::new(-v.y, v.x)
    }
}
