//! Physics module: hitbox hierarchies, collision detection and resolution
//!
//! All physics state lives on [`World`]; the files in this module each add a
//! group of `World` methods for one concern. [`PhysicsSystem`] ties them
//! together into a fixed tick.

pub mod boundaries;
pub mod carry;
pub mod collision;
pub mod collision_layers;
pub mod collision_resolution;
pub mod collision_system;
pub mod error;
pub mod hierarchy;
pub mod hitbox;
pub mod integration;
pub mod serialization;
pub mod tether;

#[cfg(test)]
mod tests;

pub use collision::{BoxShape, CollisionBox, CollisionResult};
pub use collision_layers::CollisionBits;
pub use collision_resolution::ResolutionStats;
pub use collision_system::{
    CollidingHitboxPair, CollisionPair, EntityCollisionInfo, GlobalCollisionInfo, MAX_PACKED_HITBOX_INDEX,
    NO_COLLISION,
};
pub use error::{PhysicsError, SnapshotError};
pub use hitbox::{Hitbox, HitboxCollisionType, HitboxFlags, HitboxLocalId, HitboxRef};
pub use serialization::{ExternalParent, HitboxSnapshot, ParentRef, ShapeSnapshot, TransformSnapshot};
pub use tether::{AngularTether, Tether};

use crate::ecs::component::{CollisionDispatch, CollisionListener, ComponentKind};
use crate::ecs::World;

/// What happened during one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Index of the tick, starting at 0
    pub tick: u64,
    /// Tethers applied before integration
    pub tethers: usize,
    /// Entities moved by integration
    pub moved_entities: usize,
    /// Entities pushed back inside the layer border
    pub border_corrections: usize,
    /// Hitbox against wall subtile hits
    pub wall_collisions: usize,
    /// Ordered entity pairs found colliding
    pub colliding_entity_pairs: usize,
    /// Hitbox pairs that went through resolution
    pub resolved_hitbox_pairs: usize,
    /// Entities removed at the end of the tick
    pub removed_entities: usize,
}

/// Fixed-step tick driver
///
/// Owns the collision listeners so they can be handed `&mut World` during
/// resolution.
#[derive(Default)]
pub struct PhysicsSystem {
    dispatch: CollisionDispatch,
}

impl PhysicsSystem {
    /// Create a physics system with no listeners
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a physics system around an existing listener table
    pub fn with_dispatch(dispatch: CollisionDispatch) -> Self {
        Self { dispatch }
    }

    /// Register the listener for a component kind, returning the one it replaces
    pub fn register_listener(
        &mut self,
        kind: ComponentKind,
        listener: Box<dyn CollisionListener>,
    ) -> Option<Box<dyn CollisionListener>> {
        self.dispatch.register(kind, listener)
    }

    /// Listener table
    pub fn dispatch(&self) -> &CollisionDispatch {
        &self.dispatch
    }

    /// Mutable listener table
    pub fn dispatch_mut(&mut self) -> &mut CollisionDispatch {
        &mut self.dispatch
    }

    /// Run one tick
    ///
    /// Tethers, integration, per-entity clean with border and wall
    /// collisions, detection over every layer, resolution, a final clean of
    /// everything resolution touched, then queued removals. Any error aborts
    /// the tick and is returned as is.
    pub fn update(&mut self, world: &mut World) -> Result<TickReport, PhysicsError> {
        self.run_tick(world).map_err(|e| {
            log::warn!("Physics tick {} aborted: {}", world.tick(), e);
            e
        })
    }

    fn run_tick(&mut self, world: &mut World) -> Result<TickReport, PhysicsError> {
        let mut report = TickReport {
            tick: world.tick(),
            ..TickReport::default()
        };

        report.tethers = world.update_tethers()?;
        report.moved_entities = world.integrate_world();

        for entity in world.dirty_entities() {
            world.clean_transform(entity)?;
            if world.resolve_border_collision(entity)? {
                report.border_corrections += 1;
            }
            report.wall_collisions += world.resolve_wall_collisions(entity, &mut self.dispatch)?;
        }

        let collisions = world.detect_collisions();
        report.colliding_entity_pairs = collisions.len();
        let stats = world.resolve_collisions(&collisions, &mut self.dispatch)?;
        report.resolved_hitbox_pairs = stats.hitbox_pairs;

        world.clean_dirty_transforms()?;
        report.removed_entities = world.process_removals()?;
        world.advance_tick();

        log::trace!(
            "Tick {}: {} moved, {} entity pairs, {} hitbox pairs, {} wall hits",
            report.tick,
            report.moved_entities,
            report.colliding_entity_pairs,
            report.resolved_hitbox_pairs,
            report.wall_collisions
        );
        Ok(report)
    }
}
