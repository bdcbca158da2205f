//! Physics error types

use crate::ecs::Entity;
use crate::physics::hitbox::{HitboxLocalId, HitboxRef};
use crate::spatial::LayerId;

/// Errors raised by physics operations
///
/// Lookup failures indicate a hierarchy construction bug and are never
/// defaulted. `ZeroOverlap` and `OutOfBounds` are invariant violations that
/// abort the tick.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PhysicsError {
    /// Entity handle is stale or was never created
    #[error("Entity {0:?} does not exist")]
    MissingEntity(Entity),

    /// Layer index outside the world's layers
    #[error("Layer {0} does not exist")]
    MissingLayer(LayerId),

    /// Hitbox local ID not present in the entity's transform
    #[error("Hitbox {local_id} does not exist on entity {entity:?}")]
    MissingHitbox {
        /// Entity that was searched
        entity: Entity,
        /// Missing local ID
        local_id: HitboxLocalId,
    },

    /// Hard collision with a zero-length overlap vector
    #[error("Hard collision on hitbox {0} has a zero overlap vector")]
    ZeroOverlap(HitboxRef),

    /// Entity still outside the world after border correction
    #[error("Entity {entity:?} is out of bounds after border correction (x {min_x}..{max_x}, y {min_y}..{max_y})")]
    OutOfBounds {
        /// Offending entity
        entity: Entity,
        /// Bounding box left edge
        min_x: f32,
        /// Bounding box right edge
        max_x: f32,
        /// Bounding box bottom edge
        min_y: f32,
        /// Bounding box top edge
        max_y: f32,
    },

    /// Attaching a hitbox that already has a parent
    #[error("Hitbox {0} already has a parent")]
    AlreadyAttached(HitboxRef),

    /// Attaching would make a hitbox its own ancestor
    #[error("Attaching {child} to {parent} would create a cycle")]
    HierarchyCycle {
        /// Hitbox being attached
        child: HitboxRef,
        /// Requested parent
        parent: HitboxRef,
    },

    /// Entity is already riding another entity
    #[error("Entity {0:?} is already mounted")]
    AlreadyMounted(Entity),

    /// Mounting would make an entity carry itself
    #[error("Entity {rider:?} cannot mount {mount:?}: it already carries it")]
    CarryCycle {
        /// Entity trying to mount
        rider: Entity,
        /// Entity being mounted
        mount: Entity,
    },

    /// Operation needs at least one root hitbox
    #[error("Entity {0:?} has no root hitbox")]
    NoRootHitbox(Entity),

    /// Operation requires an entity that has joined the world
    #[error("Entity {0:?} has not joined the world")]
    NotInWorld(Entity),
}

impl PhysicsError {
    /// Missing hitbox error for a reference
    pub fn missing_hitbox(hitbox: HitboxRef) -> Self {
        Self::MissingHitbox {
            entity: hitbox.entity,
            local_id: hitbox.local_id,
        }
    }
}

/// Errors raised while encoding or decoding transform snapshots
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SnapshotError {
    /// A hitbox names a local parent that was not decoded before it
    #[error("Hitbox {local_id} references parent {parent} which has not been decoded")]
    MissingParent {
        /// Hitbox being decoded
        local_id: HitboxLocalId,
        /// Parent local ID that was not found
        parent: HitboxLocalId,
    },

    /// Two hitboxes in one snapshot share a local ID
    #[error("Duplicate hitbox local ID {0}")]
    DuplicateLocalId(HitboxLocalId),

    /// RON encoding failed
    #[error("Snapshot encoding error: {0}")]
    Encode(String),

    /// RON decoding failed
    #[error("Snapshot decoding error: {0}")]
    Decode(String),

    /// The world rejected the decoded transform
    #[error(transparent)]
    Physics(#[from] PhysicsError),
}
