//! Chunk buckets for broad-phase pruning

use crate::ecs::Entity;
use crate::spatial::CollisionGroup;

/// Index of a chunk within its layer (`y * chunks_per_side + x`)
pub type ChunkIndex = usize;

/// Fixed-size spatial grid cell
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Column of the chunk
    pub x: usize,
    /// Row of the chunk
    pub y: usize,
    entities: Vec<Entity>,
    group_entities: [Vec<Entity>; CollisionGroup::COUNT],
    has_wall_subtiles: bool,
}

impl Chunk {
    /// Create an empty chunk
    pub fn new(x: usize, y: usize) -> Self {
        Self {
            x,
            y,
            entities: Vec::new(),
            group_entities: std::array::from_fn(|_| Vec::new()),
            has_wall_subtiles: false,
        }
    }

    /// Every entity overlapping the chunk
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Entities overlapping the chunk in one collision group
    pub fn entities_in_group(&self, group: CollisionGroup) -> &[Entity] {
        &self.group_entities[group.index()]
    }

    /// Whether any wall subtile lies inside the chunk
    pub fn has_wall_subtiles(&self) -> bool {
        self.has_wall_subtiles
    }

    pub(crate) fn set_has_wall_subtiles(&mut self, has_wall_subtiles: bool) {
        self.has_wall_subtiles = has_wall_subtiles;
    }

    pub(crate) fn add_entity(&mut self, entity: Entity, group: CollisionGroup) {
        if !self.entities.contains(&entity) {
            self.entities.push(entity);
            self.group_entities[group.index()].push(entity);
        }
    }

    pub(crate) fn remove_entity(&mut self, entity: Entity, group: CollisionGroup) {
        if let Some(index) = self.entities.iter().position(|&e| e == entity) {
            self.entities.swap_remove(index);
        }
        let bucket = &mut self.group_entities[group.index()];
        if let Some(index) = bucket.iter().position(|&e| e == entity) {
            bucket.swap_remove(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn test_add_and_remove_keep_buckets_in_sync() {
        let mut keys: SlotMap<Entity, ()> = SlotMap::with_key();
        let a = keys.insert(());
        let b = keys.insert(());

        let mut chunk = Chunk::new(0, 0);
        chunk.add_entity(a, CollisionGroup::Default);
        chunk.add_entity(a, CollisionGroup::Default);
        chunk.add_entity(b, CollisionGroup::Projectile);
        assert_eq!(chunk.entities().len(), 2);
        assert_eq!(chunk.entities_in_group(CollisionGroup::Default), &[a]);

        chunk.remove_entity(a, CollisionGroup::Default);
        assert_eq!(chunk.entities(), &[b]);
        assert!(chunk.entities_in_group(CollisionGroup::Default).is_empty());
        assert_eq!(chunk.entities_in_group(CollisionGroup::Projectile), &[b]);
    }
}
