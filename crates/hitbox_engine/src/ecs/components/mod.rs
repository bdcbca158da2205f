//! Stored components

pub mod transform;

pub use transform::{CarryInfo, TransformComponent};
