//! Transform component: an entity's hitbox tree and spatial state
//!
//! The transform exclusively owns its entity's hitboxes in a flat, order
//! stable list. Parent and child links may point into other entities'
//! transforms; those links are structural only and never transfer ownership.
//!
//! Anything that needs to follow a link into another entity lives on
//! [`World`](crate::ecs::World). This type only keeps its own bookkeeping
//! consistent: local IDs, root list, total mass, bounding area and chunk set.

use std::collections::BTreeSet;

use crate::ecs::Entity;
use crate::foundation::math::{Aabb, Vec2};
use crate::physics::error::PhysicsError;
use crate::physics::hitbox::{Hitbox, HitboxLocalId, HitboxRef};
use crate::spatial::{ChunkIndex, CollisionGroup, Layer, LayerId};

/// An entity carried by (mounted on) this one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarryInfo {
    /// The rider
    pub entity: Entity,
    /// Rider hitboxes that were roots before mounting
    pub hitboxes: Vec<HitboxLocalId>,
}

/// Per-entity physical state
#[derive(Debug, Clone)]
pub struct TransformComponent {
    entity: Entity,
    layer: LayerId,
    collision_group: CollisionGroup,

    /// World position, taken from the primary root hitbox after each clean
    pub position: Vec2,
    /// World rotation, taken from the primary root hitbox after each clean
    pub rotation: f32,
    /// Velocity the entity moves itself with (walking, flying)
    pub self_velocity: Vec2,
    /// Velocity imposed from outside (conveyors, currents)
    pub external_velocity: Vec2,

    hitboxes: Vec<Hitbox>,
    root_hitboxes: Vec<HitboxLocalId>,
    next_hitbox_local_id: HitboxLocalId,
    total_mass: f32,

    bounding_area: Aabb,
    pub(crate) chunks: BTreeSet<ChunkIndex>,
    chunks_stale: bool,

    pub(crate) mount: Option<Entity>,
    pub(crate) carry_root: Entity,
    pub(crate) carried_entities: Vec<CarryInfo>,

    pub(crate) is_dirty: bool,
    pub(crate) in_world: bool,
}

impl TransformComponent {
    pub(crate) fn new(entity: Entity, layer: LayerId, collision_group: CollisionGroup) -> Self {
        Self {
            entity,
            layer,
            collision_group,
            position: Vec2::zeros(),
            rotation: 0.0,
            self_velocity: Vec2::zeros(),
            external_velocity: Vec2::zeros(),
            hitboxes: Vec::new(),
            root_hitboxes: Vec::new(),
            next_hitbox_local_id: 1,
            total_mass: 0.0,
            bounding_area: Aabb::empty(),
            chunks: BTreeSet::new(),
            chunks_stale: false,
            mount: None,
            carry_root: entity,
            carried_entities: Vec::new(),
            is_dirty: true,
            in_world: false,
        }
    }

    /// Owning entity
    pub fn entity(&self) -> Entity {
        self.entity
    }

    /// Layer the entity lives on
    pub fn layer(&self) -> LayerId {
        self.layer
    }

    /// Broad-phase collision group
    pub fn collision_group(&self) -> CollisionGroup {
        self.collision_group
    }

    /// All owned hitboxes in insertion order
    pub fn hitboxes(&self) -> &[Hitbox] {
        &self.hitboxes
    }

    /// Owned hitbox by local ID
    pub fn hitbox(&self, local_id: HitboxLocalId) -> Option<&Hitbox> {
        self.hitboxes.iter().find(|hitbox| hitbox.local_id == local_id)
    }

    /// Mutable owned hitbox by local ID
    ///
    /// Positions should only be changed through the world's force and velocity
    /// primitives; this is for collision filtering, flags and tethers.
    pub fn hitbox_mut(&mut self, local_id: HitboxLocalId) -> Option<&mut Hitbox> {
        self.hitboxes.iter_mut().find(|hitbox| hitbox.local_id == local_id)
    }

    /// Position of a hitbox in the flat list
    pub fn hitbox_index(&self, local_id: HitboxLocalId) -> Option<usize> {
        self.hitboxes.iter().position(|hitbox| hitbox.local_id == local_id)
    }

    pub(crate) fn hitboxes_mut(&mut self) -> &mut [Hitbox] {
        &mut self.hitboxes
    }

    /// Local IDs of every owned hitbox, in list order
    pub fn hitbox_ids(&self) -> Vec<HitboxLocalId> {
        self.hitboxes.iter().map(|hitbox| hitbox.local_id).collect()
    }

    /// Reference to an owned hitbox
    pub fn hitbox_ref(&self, local_id: HitboxLocalId) -> HitboxRef {
        HitboxRef::new(self.entity, local_id)
    }

    /// Hitboxes with no parent at all
    pub fn root_hitboxes(&self) -> &[HitboxLocalId] {
        &self.root_hitboxes
    }

    /// The first root hitbox, which defines the entity's position
    pub fn primary_root(&self) -> Option<HitboxLocalId> {
        self.root_hitboxes.first().copied()
    }

    /// Sum of the masses of all owned hitboxes
    pub fn total_mass(&self) -> f32 {
        self.total_mass
    }

    /// Cached union of all owned hitbox bounds
    pub fn bounding_area(&self) -> &Aabb {
        &self.bounding_area
    }

    /// Chunks the bounding area currently overlaps
    pub fn chunks(&self) -> &BTreeSet<ChunkIndex> {
        &self.chunks
    }

    /// Entity this one is mounted on
    pub fn mount(&self) -> Option<Entity> {
        self.mount
    }

    /// Top of the carry hierarchy (the entity itself when not carried)
    pub fn carry_root(&self) -> Entity {
        self.carry_root
    }

    /// Entities mounted on this one
    pub fn carried_entities(&self) -> &[CarryInfo] {
        &self.carried_entities
    }

    /// Whether positions, bounds or chunks need recomputing
    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    /// Request a clean pass
    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    /// Whether the entity has joined the world
    pub fn is_in_world(&self) -> bool {
        self.in_world
    }

    /// Local IDs of hitboxes whose parent is missing or owned elsewhere
    ///
    /// These are the starting points of a clean pass.
    pub fn clean_starting_points(&self) -> Vec<HitboxLocalId> {
        self.hitboxes
            .iter()
            .filter(|hitbox| hitbox.parent.map_or(true, |parent| parent.entity != self.entity))
            .map(|hitbox| hitbox.local_id)
            .collect()
    }

    /// Add a hitbox, optionally under a parent owned by this transform
    pub(crate) fn insert_hitbox(
        &mut self,
        mut hitbox: Hitbox,
        parent: Option<HitboxLocalId>,
    ) -> Result<HitboxLocalId, PhysicsError> {
        if let Some(parent_id) = parent {
            if self.hitbox(parent_id).is_none() {
                return Err(PhysicsError::MissingHitbox {
                    entity: self.entity,
                    local_id: parent_id,
                });
            }
        }

        let local_id = self.next_hitbox_local_id;
        self.next_hitbox_local_id += 1;
        self.insert_with_local_id(&mut hitbox, local_id, parent);
        self.hitboxes.push(hitbox);
        Ok(local_id)
    }

    /// Add a hitbox under a caller-chosen local ID, for snapshot decoding
    pub(crate) fn insert_hitbox_with_id(
        &mut self,
        mut hitbox: Hitbox,
        local_id: HitboxLocalId,
        parent: Option<HitboxLocalId>,
    ) {
        self.next_hitbox_local_id = self.next_hitbox_local_id.max(local_id + 1);
        self.insert_with_local_id(&mut hitbox, local_id, parent);
        self.hitboxes.push(hitbox);
    }

    fn insert_with_local_id(
        &mut self,
        hitbox: &mut Hitbox,
        local_id: HitboxLocalId,
        parent: Option<HitboxLocalId>,
    ) {
        hitbox.local_id = local_id;
        hitbox.parent = parent.map(|parent_id| HitboxRef::new(self.entity, parent_id));
        hitbox.children.clear();
        hitbox.chunk_bounds = None;

        match parent {
            Some(parent_id) => {
                let child = HitboxRef::new(self.entity, local_id);
                if let Some(parent) = self.hitbox_mut(parent_id) {
                    parent.children.push(child);
                }
            }
            None => self.root_hitboxes.push(local_id),
        }
        self.total_mass += hitbox.mass;
        self.is_dirty = true;
    }

    /// Remove a hitbox from the list without touching any links
    pub(crate) fn take_hitbox(&mut self, local_id: HitboxLocalId) -> Option<Hitbox> {
        let index = self.hitbox_index(local_id)?;
        let hitbox = self.hitboxes.remove(index);
        self.root_hitboxes.retain(|&id| id != local_id);
        self.total_mass -= hitbox.mass;
        self.chunks_stale = true;
        self.is_dirty = true;
        Some(hitbox)
    }

    /// Add or remove a hitbox from the root list
    pub(crate) fn set_root(&mut self, local_id: HitboxLocalId, is_root: bool) {
        let position = self.root_hitboxes.iter().position(|&id| id == local_id);
        match (is_root, position) {
            (true, None) => self.root_hitboxes.push(local_id),
            (false, Some(index)) => {
                self.root_hitboxes.remove(index);
            }
            _ => {}
        }
    }

    /// Recompute the bounding area and each hitbox's chunk bounds
    ///
    /// Returns whether any hitbox crossed a chunk boundary, or a hitbox was
    /// removed since the last refresh.
    pub(crate) fn refresh_bounds(&mut self, layer: &Layer) -> bool {
        let mut bounding_area = Aabb::empty();
        let mut chunk_bounds_changed = std::mem::take(&mut self.chunks_stale);

        for hitbox in &mut self.hitboxes {
            let bounds = hitbox.collision_box.bounds();
            bounding_area.expand(&bounds);

            let chunk_bounds = layer.chunk_bounds(&bounds);
            if hitbox.chunk_bounds != Some(chunk_bounds) {
                hitbox.chunk_bounds = Some(chunk_bounds);
                chunk_bounds_changed = true;
            }
        }

        self.bounding_area = bounding_area;
        self.sync_position();
        chunk_bounds_changed
    }

    /// Forget cached chunk bounds so the next refresh reassigns chunks
    pub(crate) fn invalidate_chunk_bounds(&mut self) {
        for hitbox in &mut self.hitboxes {
            hitbox.chunk_bounds = None;
        }
    }

    fn sync_position(&mut self) {
        let primary = self
            .primary_root()
            .and_then(|id| self.hitbox(id))
            .or_else(|| self.hitboxes.first())
            .map(|hitbox| (hitbox.position(), hitbox.angle()));
        if let Some((position, rotation)) = primary {
            self.position = position;
            self.rotation = rotation;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicsConfig;
    use crate::physics::collision::CollisionBox;
    use slotmap::SlotMap;

    fn transform() -> TransformComponent {
        let mut keys: SlotMap<Entity, ()> = SlotMap::with_key();
        TransformComponent::new(keys.insert(()), 0, CollisionGroup::Default)
    }

    fn circle(x: f32, y: f32, radius: f32) -> Hitbox {
        Hitbox::new(CollisionBox::circular(Vec2::new(x, y), radius))
    }

    #[test]
    fn test_insert_links_parent_and_roots() {
        let mut transform = transform();
        let body = transform.insert_hitbox(circle(0.0, 0.0, 10.0).with_mass(2.0), None).unwrap();
        let head = transform.insert_hitbox(circle(0.0, 0.0, 4.0), Some(body)).unwrap();

        assert_ne!(body, head);
        assert_eq!(transform.root_hitboxes(), &[body]);
        assert_eq!(transform.hitbox(body).unwrap().children, vec![transform.hitbox_ref(head)]);
        assert_eq!(transform.hitbox(head).unwrap().parent, Some(transform.hitbox_ref(body)));
        assert!((transform.total_mass() - 3.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_insert_under_missing_parent_fails() {
        let mut transform = transform();
        let result = transform.insert_hitbox(circle(0.0, 0.0, 1.0), Some(42));
        assert!(matches!(result, Err(PhysicsError::MissingHitbox { local_id: 42, .. })));
        assert!(transform.hitboxes().is_empty());
    }

    #[test]
    fn test_take_hitbox_keeps_order_and_mass() {
        let mut transform = transform();
        let a = transform.insert_hitbox(circle(0.0, 0.0, 1.0), None).unwrap();
        let b = transform.insert_hitbox(circle(5.0, 0.0, 1.0).with_mass(3.0), None).unwrap();
        let c = transform.insert_hitbox(circle(9.0, 0.0, 1.0), None).unwrap();

        let removed = transform.take_hitbox(b).unwrap();
        assert_eq!(removed.local_id, b);
        assert_eq!(transform.hitbox_ids(), vec![a, c]);
        assert_eq!(transform.root_hitboxes(), &[a, c]);
        assert!((transform.total_mass() - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_refresh_bounds_reports_chunk_crossings() {
        let layer = Layer::new(0, &PhysicsConfig::default());
        let mut transform = transform();
        let id = transform.insert_hitbox(circle(100.0, 100.0, 10.0), None).unwrap();

        assert!(transform.refresh_bounds(&layer));
        assert!(!transform.refresh_bounds(&layer));
        assert_eq!(transform.bounding_area().min, Vec2::new(90.0, 90.0));
        assert_eq!(transform.position, Vec2::new(100.0, 100.0));

        transform.hitbox_mut(id).unwrap().collision_box.translate(Vec2::new(200.0, 0.0));
        assert!(transform.refresh_bounds(&layer));
    }
}
