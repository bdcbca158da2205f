//! # Hitbox Engine
//!
//! Authoritative 2D physics core for a multiplayer survival game server.
//!
//! ## Features
//!
//! - **Hitbox Hierarchies**: parent/child hitboxes across entities, so arrows
//!   lodge in targets and limbs hang off bodies
//! - **Tethers**: spring-damper links, linear and angular
//! - **Chunked Broad Phase**: per-layer chunk grids bucketed by collision group
//! - **SAT Narrow Phase**: circles and oriented rectangles
//! - **Deterministic Ticks**: verlet integration with derived velocities
//!
//! ## Quick Start
//!
//! ```rust
//! use hitbox_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut world = World::new(PhysicsConfig::default())?;
//!     let mut physics = PhysicsSystem::new();
//!
//!     let creature = world.create_entity(0, CollisionGroup::Default)?;
//!     let body = world.add_hitbox(
//!         creature,
//!         Hitbox::new(CollisionBox::circular(Vec2::new(512.0, 512.0), 16.0)),
//!         None,
//!     )?;
//!     world.join(creature)?;
//!
//!     world.apply_force(HitboxRef::new(creature, body), Vec2::new(600.0, 0.0))?;
//!     physics.update(&mut world)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;
pub mod config;
pub mod ecs;
pub mod spatial;
pub mod physics;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, PhysicsConfig},
        ecs::{
            components::TransformComponent, CollisionDispatch, CollisionListener, ComponentKind, ComponentSet,
            Entity, World,
        },
        foundation::math::{Aabb, Vec2},
        physics::{
            AngularTether, CollisionBits, CollisionBox, Hitbox, HitboxCollisionType, HitboxFlags, HitboxLocalId,
            HitboxRef, PhysicsError, PhysicsSystem, Tether, TickReport,
        },
        spatial::{CollisionGroup, Layer, LayerId},
    };
}
