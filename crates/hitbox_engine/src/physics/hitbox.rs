//! Hitboxes: physical collision primitives
//!
//! A [`Hitbox`] wraps exactly one [`CollisionBox`] with mass, collision
//! filtering and hierarchy links. Hitboxes live in their entity's
//! [`TransformComponent`](crate::ecs::components::TransformComponent) and are
//! addressed by a per-entity local ID; links between hitboxes (parent,
//! children, tethers) are [`HitboxRef`]s, never pointers, so a child may belong
//! to a different entity than its parent.
//!
//! Velocity is not stored. It is derived from `position - previous_position`
//! (see [`World::get_hitbox_velocity`](crate::ecs::World::get_hitbox_velocity)).

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::ecs::Entity;
use crate::foundation::math::Vec2;
use crate::physics::collision::CollisionBox;
use crate::physics::collision_layers::CollisionBits;
use crate::physics::tether::{AngularTether, Tether};

/// Per-entity hitbox identifier, stable for the hitbox's lifetime
pub type HitboxLocalId = u32;

/// Address of a hitbox anywhere in the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HitboxRef {
    /// Owning entity
    pub entity: Entity,
    /// ID within the owning entity's transform
    pub local_id: HitboxLocalId,
}

impl HitboxRef {
    /// Create a reference
    pub fn new(entity: Entity, local_id: HitboxLocalId) -> Self {
        Self { entity, local_id }
    }
}

impl fmt::Display for HitboxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}", self.entity, self.local_id)
    }
}

/// How a hitbox responds to overlaps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HitboxCollisionType {
    /// Translated out of penetration, velocity into the surface removed
    #[default]
    Hard,
    /// Pushed apart gradually by a force
    Soft,
}

bitflags! {
    /// Behaviour flags for a hitbox
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct HitboxFlags: u32 {
        /// Skip wall subtile collisions entirely
        const IGNORES_WALL_COLLISIONS = 1 << 0;
        /// Counts towards the parent's rigid mass and moves as part of it
        const PART_OF_PARENT = 1 << 1;
        /// Hard collisions reflect the normal velocity instead of removing it
        const BOUNCY = 1 << 2;
    }
}

/// Chunk-space extent of a hitbox's bounds, cached between clean passes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChunkBounds {
    /// Leftmost chunk column
    pub min_x: i32,
    /// Rightmost chunk column
    pub max_x: i32,
    /// Bottom chunk row
    pub min_y: i32,
    /// Top chunk row
    pub max_y: i32,
}

/// Physical collision primitive
#[derive(Debug, Clone)]
pub struct Hitbox {
    /// Per-entity ID (assigned when added to a transform)
    pub local_id: HitboxLocalId,
    /// Shape and absolute transform
    pub collision_box: CollisionBox,
    /// Position at the start of the previous tick
    pub previous_position: Vec2,
    /// Relative angle at the start of the previous tick
    pub previous_relative_angle: f32,
    /// Linear acceleration accumulated this tick
    pub acceleration: Vec2,
    /// Angular acceleration accumulated this tick
    pub angular_acceleration: f32,
    /// Mass of this hitbox alone
    pub mass: f32,
    /// Response type
    pub collision_type: HitboxCollisionType,
    /// What this hitbox is
    pub collision_bit: CollisionBits,
    /// What this hitbox collides with
    pub collision_mask: CollisionBits,
    /// Behaviour flags
    pub flags: HitboxFlags,
    /// Immovable hitboxes ignore forces, knockback and collision pushes
    pub is_static: bool,
    /// Structural parent, possibly owned by another entity
    pub parent: Option<HitboxRef>,
    /// Structural children, possibly owned by other entities
    pub children: Vec<HitboxRef>,
    /// Spring tethers pulling this hitbox
    pub tethers: Vec<Tether>,
    /// Angular spring tethers turning this hitbox
    pub angular_tethers: Vec<AngularTether>,
    pub(crate) chunk_bounds: Option<ChunkBounds>,
}

impl Hitbox {
    /// Create a dynamic hard hitbox with unit mass that collides with everything
    pub fn new(collision_box: CollisionBox) -> Self {
        Self {
            local_id: 0,
            previous_position: collision_box.position,
            previous_relative_angle: collision_box.relative_angle,
            collision_box,
            acceleration: Vec2::zeros(),
            angular_acceleration: 0.0,
            mass: 1.0,
            collision_type: HitboxCollisionType::Hard,
            collision_bit: CollisionBits::DEFAULT,
            collision_mask: CollisionBits::all(),
            flags: HitboxFlags::empty(),
            is_static: false,
            parent: None,
            children: Vec::new(),
            tethers: Vec::new(),
            angular_tethers: Vec::new(),
            chunk_bounds: None,
        }
    }

    /// Builder pattern: Set mass
    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    /// Builder pattern: Set collision type
    pub fn with_collision_type(mut self, collision_type: HitboxCollisionType) -> Self {
        self.collision_type = collision_type;
        self
    }

    /// Builder pattern: Set collision bit and mask
    pub fn with_collision_bits(mut self, bit: CollisionBits, mask: CollisionBits) -> Self {
        self.collision_bit = bit;
        self.collision_mask = mask;
        self
    }

    /// Builder pattern: Add flags
    pub fn with_flags(mut self, flags: HitboxFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Builder pattern: Make the hitbox immovable
    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Builder pattern: Add a positional tether
    pub fn with_tether(mut self, tether: Tether) -> Self {
        self.tethers.push(tether);
        self
    }

    /// Builder pattern: Add an angular tether
    pub fn with_angular_tether(mut self, tether: AngularTether) -> Self {
        self.angular_tethers.push(tether);
        self
    }

    /// Absolute position
    pub fn position(&self) -> Vec2 {
        self.collision_box.position
    }

    /// Absolute angle
    pub fn angle(&self) -> f32 {
        self.collision_box.angle
    }

    /// Angle relative to the parent
    pub fn relative_angle(&self) -> f32 {
        self.collision_box.relative_angle
    }

    /// Whether this hitbox moves as part of its parent's rigid cluster
    pub fn is_part_of_parent(&self) -> bool {
        self.flags.contains(HitboxFlags::PART_OF_PARENT)
    }

    /// Whether this hitbox has a positional tether to `other`
    pub fn is_tethered_to(&self, other: HitboxRef) -> bool {
        self.tethers.iter().any(|tether| tether.origin == other)
    }

    /// Bit/mask compatibility with another hitbox
    pub fn can_collide_with(&self, other: &Hitbox) -> bool {
        CollisionBits::should_collide(
            self.collision_bit,
            self.collision_mask,
            other.collision_bit,
            other.collision_mask,
        )
    }
}
