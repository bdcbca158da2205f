//! Component kinds and collision callback dispatch
//!
//! Gameplay components are not stored by the physics core. An entity only
//! advertises which [`ComponentKind`]s it has through a [`ComponentSet`], and
//! the [`CollisionDispatch`] table maps each kind to an optional
//! [`CollisionListener`]. Kinds without a listener are simply skipped.

use bitflags::bitflags;

use crate::ecs::{Entity, World};
use crate::foundation::math::Vec2;
use crate::physics::collision_system::CollidingHitboxPair;
use crate::physics::hitbox::HitboxRef;

/// Gameplay component kinds that can react to collisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentKind {
    /// Takes damage
    Health,
    /// Flies, hits and possibly lodges
    Projectile,
    /// Damages whatever touches it
    Hazard,
    /// Grabs onto what it touches
    Latch,
    /// Can be picked up
    Pickup,
    /// Static building piece
    Structure,
}

impl ComponentKind {
    /// Number of component kinds
    pub const COUNT: usize = 6;

    /// Every kind, in dispatch order
    pub const ALL: [ComponentKind; Self::COUNT] = [
        ComponentKind::Health,
        ComponentKind::Projectile,
        ComponentKind::Hazard,
        ComponentKind::Latch,
        ComponentKind::Pickup,
        ComponentKind::Structure,
    ];

    /// Dense table index
    pub fn index(self) -> usize {
        self as usize
    }

    /// Single-kind set
    pub fn as_set(self) -> ComponentSet {
        ComponentSet::from_bits_truncate(1 << self.index())
    }
}

bitflags! {
    /// Component kinds present on an entity
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ComponentSet: u32 {
        /// [`ComponentKind::Health`]
        const HEALTH = 1 << 0;
        /// [`ComponentKind::Projectile`]
        const PROJECTILE = 1 << 1;
        /// [`ComponentKind::Hazard`]
        const HAZARD = 1 << 2;
        /// [`ComponentKind::Latch`]
        const LATCH = 1 << 3;
        /// [`ComponentKind::Pickup`]
        const PICKUP = 1 << 4;
        /// [`ComponentKind::Structure`]
        const STRUCTURE = 1 << 5;
    }
}

impl ComponentSet {
    /// Iterate the kinds in the set, in dispatch order
    pub fn kinds(self) -> impl Iterator<Item = ComponentKind> {
        ComponentKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(kind.as_set()))
    }
}

/// Overlap between two hitboxes, seen from the affected hitbox
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitboxCollisionEvent {
    /// Hitbox being pushed
    pub affected: HitboxRef,
    /// Hitbox doing the pushing
    pub colliding: HitboxRef,
    /// Midpoint between the two hitbox centers
    pub collision_point: Vec2,
    /// Push-out vector for the affected hitbox
    pub overlap: Vec2,
}

/// Aggregate collision between two entities
#[derive(Debug, Clone, Copy)]
pub struct EntityCollisionEvent<'a> {
    /// Entity being pushed
    pub affected: Entity,
    /// Entity doing the pushing
    pub colliding: Entity,
    /// Every overlapping hitbox pair detected this tick
    pub hitbox_pairs: &'a [CollidingHitboxPair],
}

/// Collision callbacks for one component kind
///
/// Callbacks run synchronously during resolution. They may apply forces,
/// attach or detach hitboxes and queue entity removals, but must not remove
/// hitboxes or entities directly.
pub trait CollisionListener {
    /// Called for each overlapping hitbox pair before it is resolved
    fn on_hitbox_collision(&mut self, _world: &mut World, _event: &HitboxCollisionEvent) {}

    /// Called once per entity pair after all of its hitbox pairs are resolved
    fn on_entity_collision(&mut self, _world: &mut World, _event: &EntityCollisionEvent<'_>) {}

    /// Called when a hitbox of `entity` is pushed out of a wall subtile
    fn on_wall_collision(&mut self, _world: &mut World, _entity: Entity, _hitbox: HitboxRef) {}
}

/// Dense table of collision listeners indexed by [`ComponentKind`]
pub struct CollisionDispatch {
    listeners: [Option<Box<dyn CollisionListener>>; ComponentKind::COUNT],
}

impl CollisionDispatch {
    /// Create a table with no listeners
    pub fn new() -> Self {
        Self {
            listeners: std::array::from_fn(|_| None),
        }
    }

    /// Register the listener for a kind, returning the one it replaces
    pub fn register(
        &mut self,
        kind: ComponentKind,
        listener: Box<dyn CollisionListener>,
    ) -> Option<Box<dyn CollisionListener>> {
        self.listeners[kind.index()].replace(listener)
    }

    /// Remove the listener for a kind
    pub fn unregister(&mut self, kind: ComponentKind) -> Option<Box<dyn CollisionListener>> {
        self.listeners[kind.index()].take()
    }

    /// Whether a kind has a listener
    pub fn has_listener(&self, kind: ComponentKind) -> bool {
        self.listeners[kind.index()].is_some()
    }

    /// Whether any kind in `components` has a listener
    pub fn listens_to(&self, components: ComponentSet) -> bool {
        components.kinds().any(|kind| self.has_listener(kind))
    }

    pub(crate) fn dispatch_hitbox_collision(
        &mut self,
        world: &mut World,
        components: ComponentSet,
        event: &HitboxCollisionEvent,
    ) {
        for kind in components.kinds() {
            if let Some(listener) = &mut self.listeners[kind.index()] {
                listener.on_hitbox_collision(world, event);
            }
        }
    }

    pub(crate) fn dispatch_entity_collision(
        &mut self,
        world: &mut World,
        components: ComponentSet,
        event: &EntityCollisionEvent<'_>,
    ) {
        for kind in components.kinds() {
            if let Some(listener) = &mut self.listeners[kind.index()] {
                listener.on_entity_collision(world, event);
            }
        }
    }

    pub(crate) fn dispatch_wall_collision(
        &mut self,
        world: &mut World,
        components: ComponentSet,
        entity: Entity,
        hitbox: HitboxRef,
    ) {
        for kind in components.kinds() {
            if let Some(listener) = &mut self.listeners[kind.index()] {
                listener.on_wall_collision(world, entity, hitbox);
            }
        }
    }
}

impl Default for CollisionDispatch {
    fn default() -> Self {
        Self::new()
    }
}
