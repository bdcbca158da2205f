//! ECS World implementation
//!
//! The world owns every piece of mutable physics state: the transform arena,
//! the per-layer chunk grids, the collision group pair table and the queue of
//! entities waiting to be removed. Every physics operation is a method on
//! [`World`]; the split into files under `physics/` is by concern only.

use std::collections::BTreeSet;

use slotmap::{SecondaryMap, SlotMap};

use crate::config::{ConfigError, PhysicsConfig};
use crate::ecs::component::ComponentSet;
use crate::ecs::components::TransformComponent;
use crate::ecs::Entity;
use crate::foundation::math::Vec2;
use crate::physics::error::PhysicsError;
use crate::physics::hitbox::{Hitbox, HitboxRef};
use crate::spatial::{build_collision_group_pairs, CollisionGroup, Layer, LayerId};

/// Physics world containing all entities, layers and chunk grids
pub struct World {
    config: PhysicsConfig,
    transforms: SlotMap<Entity, TransformComponent>,
    components: SecondaryMap<Entity, ComponentSet>,
    layers: Vec<Layer>,
    collision_group_pairs: Vec<(CollisionGroup, CollisionGroup)>,
    pending_removals: Vec<Entity>,
    tick: u64,
}

impl World {
    /// Create a world with `config.layer_count` empty layers
    pub fn new(config: PhysicsConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: PhysicsConfig) -> Self {
        let layers = (0..config.layer_count)
            .map(|id| Layer::new(id, &config))
            .collect();
        Self {
            config,
            transforms: SlotMap::with_key(),
            components: SecondaryMap::new(),
            layers,
            collision_group_pairs: build_collision_group_pairs(),
            pending_removals: Vec::new(),
            tick: 0,
        }
    }

    /// Simulation constants
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Number of completed ticks
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub(crate) fn advance_tick(&mut self) {
        self.tick += 1;
    }

    /// All layers
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Layer by ID
    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(id)
    }

    /// Mutable layer by ID, for editing wall subtiles
    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.get_mut(id)
    }

    /// Append an empty layer
    pub fn add_layer(&mut self) -> LayerId {
        let id = self.layers.len();
        self.layers.push(Layer::new(id, &self.config));
        id
    }

    /// `(pushing, pushed)` collision group pairs checked by the broad phase
    pub fn collision_group_pairs(&self) -> &[(CollisionGroup, CollisionGroup)] {
        &self.collision_group_pairs
    }

    /// Create an entity with an empty transform. It does not collide until it joins.
    pub fn create_entity(
        &mut self,
        layer: LayerId,
        collision_group: CollisionGroup,
    ) -> Result<Entity, PhysicsError> {
        if layer >= self.layers.len() {
            return Err(PhysicsError::MissingLayer(layer));
        }
        let entity = self
            .transforms
            .insert_with_key(|entity| TransformComponent::new(entity, layer, collision_group));
        Ok(entity)
    }

    /// Whether the entity exists
    pub fn contains(&self, entity: Entity) -> bool {
        self.transforms.contains_key(entity)
    }

    /// Number of existing entities, joined or not
    pub fn entity_count(&self) -> usize {
        self.transforms.len()
    }

    /// Iterate all existing entities
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.transforms.keys()
    }

    /// Transform of an entity
    pub fn transform(&self, entity: Entity) -> Option<&TransformComponent> {
        self.transforms.get(entity)
    }

    /// Mutable transform of an entity
    pub fn transform_mut(&mut self, entity: Entity) -> Option<&mut TransformComponent> {
        self.transforms.get_mut(entity)
    }

    pub(crate) fn get_transform(&self, entity: Entity) -> Result<&TransformComponent, PhysicsError> {
        self.transforms
            .get(entity)
            .ok_or(PhysicsError::MissingEntity(entity))
    }

    pub(crate) fn get_transform_mut(&mut self, entity: Entity) -> Result<&mut TransformComponent, PhysicsError> {
        self.transforms
            .get_mut(entity)
            .ok_or(PhysicsError::MissingEntity(entity))
    }

    pub(crate) fn transforms_mut(&mut self) -> impl Iterator<Item = (Entity, &mut TransformComponent)> {
        self.transforms.iter_mut()
    }

    /// Hitbox lookup that fails loudly on a dangling reference
    pub fn hitbox(&self, hitbox: HitboxRef) -> Result<&Hitbox, PhysicsError> {
        self.get_transform(hitbox.entity)?
            .hitbox(hitbox.local_id)
            .ok_or_else(|| PhysicsError::missing_hitbox(hitbox))
    }

    /// Mutable hitbox lookup that fails loudly on a dangling reference
    pub fn hitbox_mut(&mut self, hitbox: HitboxRef) -> Result<&mut Hitbox, PhysicsError> {
        self.get_transform_mut(hitbox.entity)?
            .hitbox_mut(hitbox.local_id)
            .ok_or_else(|| PhysicsError::missing_hitbox(hitbox))
    }

    /// Current absolute position and angle of a hitbox
    pub fn hitbox_pose(&self, hitbox: HitboxRef) -> Result<(Vec2, f32), PhysicsError> {
        let hitbox = self.hitbox(hitbox)?;
        Ok((hitbox.position(), hitbox.angle()))
    }

    /// Declare which gameplay component kinds an entity has
    pub fn set_components(&mut self, entity: Entity, components: ComponentSet) -> Result<(), PhysicsError> {
        if !self.contains(entity) {
            return Err(PhysicsError::MissingEntity(entity));
        }
        self.components.insert(entity, components);
        Ok(())
    }

    /// Gameplay component kinds of an entity (empty if none were declared)
    pub fn components(&self, entity: Entity) -> ComponentSet {
        self.components.get(entity).copied().unwrap_or_default()
    }

    /// Add an entity to the simulation
    ///
    /// Runs a full clean pass, pushes the entity back inside the border and
    /// registers it with the chunks its bounds overlap.
    pub fn join(&mut self, entity: Entity) -> Result<(), PhysicsError> {
        let transform = self.get_transform_mut(entity)?;
        if transform.in_world {
            return Ok(());
        }
        transform.in_world = true;
        transform.invalidate_chunk_bounds();

        self.clean_transform(entity)?;
        self.resolve_border_collision(entity)?;
        self.update_chunk_membership(entity)?;

        let transform = self.get_transform(entity)?;
        log::debug!(
            "Entity {:?} joined layer {} with {} hitboxes",
            entity,
            transform.layer(),
            transform.hitboxes().len()
        );
        Ok(())
    }

    /// Schedule an entity for removal at the end of the tick
    pub fn queue_removal(&mut self, entity: Entity) {
        if self.contains(entity) && !self.pending_removals.contains(&entity) {
            self.pending_removals.push(entity);
        }
    }

    /// Whether an entity is waiting to be removed
    pub fn is_queued_for_removal(&self, entity: Entity) -> bool {
        self.pending_removals.contains(&entity)
    }

    /// Remove every queued entity, returning how many were removed
    pub fn process_removals(&mut self) -> Result<usize, PhysicsError> {
        let pending = std::mem::take(&mut self.pending_removals);
        let mut removed = 0;
        for entity in pending {
            if self.contains(entity) {
                self.remove_entity(entity)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Remove an entity immediately
    ///
    /// Dismounts it and its riders, detaches every cross-entity hitbox link,
    /// drops tethers elsewhere that point at it and deregisters it from its
    /// chunks. Must not be called from a collision callback; use
    /// [`World::queue_removal`] there.
    pub fn remove_entity(&mut self, entity: Entity) -> Result<TransformComponent, PhysicsError> {
        let transform = self.get_transform(entity)?;
        let mount = transform.mount;
        let riders: Vec<Entity> = transform
            .carried_entities
            .iter()
            .map(|info| info.entity)
            .collect();

        if mount.is_some() {
            self.dismount_entity(entity)?;
        }
        for rider in riders {
            self.dismount_entity(rider)?;
        }

        let mut external_links = Vec::new();
        for hitbox in self.get_transform(entity)?.hitboxes() {
            if let Some(parent) = hitbox.parent {
                if parent.entity != entity {
                    external_links.push(HitboxRef::new(entity, hitbox.local_id));
                }
            }
            external_links.extend(hitbox.children.iter().filter(|child| child.entity != entity));
        }
        for hitbox in external_links {
            self.detach_hitbox(hitbox)?;
        }

        for (other, transform) in self.transforms.iter_mut() {
            if other == entity {
                continue;
            }
            for hitbox in transform.hitboxes_mut() {
                hitbox.tethers.retain(|tether| tether.origin.entity != entity);
                hitbox.angular_tethers.retain(|tether| tether.origin.entity != entity);
            }
        }

        self.deregister_from_chunks(entity)?;
        self.components.remove(entity);
        self.pending_removals.retain(|&pending| pending != entity);

        let transform = self
            .transforms
            .remove(entity)
            .ok_or(PhysicsError::MissingEntity(entity))?;
        log::debug!("Entity {:?} removed", entity);
        Ok(transform)
    }

    /// Recompute absolute hitbox transforms, bounds and chunks for an entity
    ///
    /// Walks from every hitbox whose parent is missing or owned by another
    /// entity down through its children, so each child is placed against its
    /// parent's already updated transform. Children owned by other entities
    /// are repositioned too, and their owners' bounds refreshed.
    pub fn clean_transform(&mut self, entity: Entity) -> Result<(), PhysicsError> {
        let starting_points = self.get_transform(entity)?.clean_starting_points();
        let mut touched = vec![entity];
        let mut stack = Vec::with_capacity(starting_points.len());

        for local_id in starting_points {
            let hitbox = HitboxRef::new(entity, local_id);
            match self.hitbox(hitbox)?.parent {
                None => self.hitbox_mut(hitbox)?.collision_box.update_as_root(),
                Some(parent) => {
                    let (position, angle) = self.hitbox_pose(parent)?;
                    self.hitbox_mut(hitbox)?
                        .collision_box
                        .update_from_parent(position, angle);
                }
            }
            stack.push(hitbox);
        }

        while let Some(hitbox) = stack.pop() {
            let parent = self.hitbox(hitbox)?;
            let (position, angle) = (parent.position(), parent.angle());
            let children = parent.children.clone();
            for child in children {
                self.hitbox_mut(child)?
                    .collision_box
                    .update_from_parent(position, angle);
                if !touched.contains(&child.entity) {
                    touched.push(child.entity);
                }
                stack.push(child);
            }
        }

        for touched_entity in touched {
            self.refresh_entity_bounds(touched_entity)?;
        }
        self.get_transform_mut(entity)?.is_dirty = false;
        Ok(())
    }

    /// Entities in the world flagged dirty
    pub(crate) fn dirty_entities(&self) -> Vec<Entity> {
        self.transforms
            .iter()
            .filter(|(_, transform)| transform.in_world && transform.is_dirty)
            .map(|(entity, _)| entity)
            .collect()
    }

    /// Clean every dirty entity in the world, returning how many were cleaned
    pub fn clean_dirty_transforms(&mut self) -> Result<usize, PhysicsError> {
        let dirty = self.dirty_entities();
        for &entity in &dirty {
            self.clean_transform(entity)?;
        }
        Ok(dirty.len())
    }

    /// Refresh the bounding area, and the chunk set if a chunk boundary was crossed
    pub(crate) fn refresh_entity_bounds(&mut self, entity: Entity) -> Result<(), PhysicsError> {
        let transform = self
            .transforms
            .get_mut(entity)
            .ok_or(PhysicsError::MissingEntity(entity))?;
        let layer = self
            .layers
            .get(transform.layer())
            .ok_or(PhysicsError::MissingLayer(transform.layer()))?;

        let chunk_bounds_changed = transform.refresh_bounds(layer);
        if chunk_bounds_changed && transform.in_world {
            self.update_chunk_membership(entity)?;
        }
        Ok(())
    }

    /// Make the entity's chunk set match its bounding area
    pub(crate) fn update_chunk_membership(&mut self, entity: Entity) -> Result<(), PhysicsError> {
        let transform = self
            .transforms
            .get_mut(entity)
            .ok_or(PhysicsError::MissingEntity(entity))?;
        let layer = self
            .layers
            .get_mut(transform.layer())
            .ok_or(PhysicsError::MissingLayer(transform.layer()))?;

        let new_chunks: BTreeSet<_> = layer
            .chunks_overlapping(transform.bounding_area())
            .into_iter()
            .collect();
        if new_chunks == transform.chunks {
            return Ok(());
        }

        let group = transform.collision_group();
        for &index in transform.chunks.difference(&new_chunks) {
            if let Some(chunk) = layer.chunk_mut(index) {
                chunk.remove_entity(entity, group);
            }
        }
        for &index in new_chunks.difference(&transform.chunks) {
            if let Some(chunk) = layer.chunk_mut(index) {
                chunk.add_entity(entity, group);
            }
        }

        log::trace!("Entity {:?} now spans {} chunks", entity, new_chunks.len());
        transform.chunks = new_chunks;
        Ok(())
    }

    fn deregister_from_chunks(&mut self, entity: Entity) -> Result<(), PhysicsError> {
        let transform = self
            .transforms
            .get_mut(entity)
            .ok_or(PhysicsError::MissingEntity(entity))?;
        let layer = self
            .layers
            .get_mut(transform.layer())
            .ok_or(PhysicsError::MissingLayer(transform.layer()))?;

        let group = transform.collision_group();
        for &index in &transform.chunks {
            if let Some(chunk) = layer.chunk_mut(index) {
                chunk.remove_entity(entity, group);
            }
        }
        transform.chunks.clear();
        transform.in_world = false;
        Ok(())
    }
}

impl Default for World {
    fn default() -> Self {
        Self::with_valid_config(PhysicsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collision::CollisionBox;

    fn circle(x: f32, y: f32, radius: f32) -> Hitbox {
        Hitbox::new(CollisionBox::circular(Vec2::new(x, y), radius))
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = PhysicsConfig {
            layer_count: 0,
            ..PhysicsConfig::default()
        };
        assert!(World::new(config).is_err());
    }

    #[test]
    fn test_create_entity_on_missing_layer() {
        let mut world = World::default();
        assert_eq!(
            world.create_entity(3, CollisionGroup::Default),
            Err(PhysicsError::MissingLayer(3))
        );
    }

    #[test]
    fn test_join_registers_chunks() {
        let mut world = World::default();
        let entity = world.create_entity(0, CollisionGroup::Default).unwrap();
        world.add_hitbox(entity, circle(250.0, 100.0, 10.0), None).unwrap();
        assert!(world.transform(entity).unwrap().chunks().is_empty());

        world.join(entity).unwrap();
        let transform = world.transform(entity).unwrap();
        assert_eq!(transform.chunks().len(), 2);
        let layer = world.layer(0).unwrap();
        for &index in transform.chunks() {
            let chunk = layer.chunk(index).unwrap();
            assert!(chunk.entities_in_group(CollisionGroup::Default).contains(&entity));
        }
    }

    #[test]
    fn test_queued_removal_deregisters() {
        let mut world = World::default();
        let entity = world.create_entity(0, CollisionGroup::Default).unwrap();
        world.add_hitbox(entity, circle(100.0, 100.0, 10.0), None).unwrap();
        world.join(entity).unwrap();

        world.queue_removal(entity);
        world.queue_removal(entity);
        assert!(world.contains(entity));
        assert_eq!(world.process_removals().unwrap(), 1);
        assert!(!world.contains(entity));
        assert!(world.layer(0).unwrap().chunks().iter().all(|chunk| chunk.entities().is_empty()));
    }

    #[test]
    fn test_components_default_to_empty() {
        let mut world = World::default();
        let entity = world.create_entity(0, CollisionGroup::Default).unwrap();
        assert!(world.components(entity).is_empty());
        world.set_components(entity, ComponentSet::HEALTH).unwrap();
        assert_eq!(world.components(entity), ComponentSet::HEALTH);
    }
}
