//! Narrow-phase collision shapes

pub mod shape;

pub use shape::{BoxShape, CircularBox, CollisionBox, CollisionResult, RectangularBox};
