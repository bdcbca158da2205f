//! Entity-Component-System implementation
//!
//! The physics core only needs one stored component per entity (the
//! [`TransformComponent`](components::TransformComponent)) plus a set of
//! gameplay component kinds used to dispatch collision callbacks.

pub mod world;
pub mod entity;
pub mod component;
pub mod components;

pub use world::World;
pub use entity::Entity;
pub use component::{ComponentKind, ComponentSet, CollisionDispatch, CollisionListener};
