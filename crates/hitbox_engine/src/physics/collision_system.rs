//! Collision detection
//!
//! Detection runs in two phases against a frozen snapshot of positions:
//!
//! - Broad phase: for every `(pushing, pushed)` collision group pair and every
//!   chunk, pair up the chunk's pushed entities with its pushing entities.
//!   Self pairs, pairs in the same carry hierarchy and pairs whose bounding
//!   areas do not overlap are dropped, and each ordered entity pair is only
//!   tested once per tick even when it shares several chunks.
//! - Narrow phase: test every hitbox of the affected entity against every
//!   hitbox of the colliding entity whose bits and masks are compatible.
//!
//! Results are collected into a [`GlobalCollisionInfo`] which resolution then
//! consumes, so resolving one pair never changes what another pair detected.

use std::collections::{HashMap, HashSet};

use crate::ecs::components::TransformComponent;
use crate::ecs::{Entity, World};
use crate::foundation::math::{Aabb, Vec2};
use crate::physics::collision::CollisionBox;
use crate::physics::error::PhysicsError;
use crate::physics::hitbox::{HitboxLocalId, HitboxRef};
use crate::spatial::{Layer, LayerId};

/// Returned by [`World::entities_are_colliding`] when no hitbox pair overlaps
pub const NO_COLLISION: u32 = u32::MAX;

/// Largest hitbox index [`World::entities_are_colliding`] can pack
pub const MAX_PACKED_HITBOX_INDEX: usize = 0xFF;

/// Ordered entity pair: `affected` is pushed by `colliding`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollisionPair {
    /// Entity being pushed
    pub affected: Entity,
    /// Entity doing the pushing
    pub colliding: Entity,
}

/// One overlapping hitbox pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollidingHitboxPair {
    /// Hitbox of the affected entity
    pub affected: HitboxLocalId,
    /// Hitbox of the colliding entity
    pub colliding: HitboxLocalId,
    /// Push-out vector for the affected hitbox
    pub overlap: Vec2,
}

/// Everything an affected entity collided with from one colliding entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntityCollisionInfo {
    /// Entity doing the pushing
    pub colliding_entity: Entity,
    /// Overlapping hitbox pairs
    pub hitbox_pairs: Vec<CollidingHitboxPair>,
}

/// All collisions detected in one tick
#[derive(Debug, Clone, Default)]
pub struct GlobalCollisionInfo {
    collisions: HashMap<Entity, Vec<EntityCollisionInfo>>,
    pairs: Vec<CollisionPair>,
}

impl GlobalCollisionInfo {
    /// Create an empty result set
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, affected: Entity, colliding: Entity, hitbox_pairs: Vec<CollidingHitboxPair>) {
        self.collisions
            .entry(affected)
            .or_default()
            .push(EntityCollisionInfo {
                colliding_entity: colliding,
                hitbox_pairs,
            });
        self.pairs.push(CollisionPair { affected, colliding });
    }

    /// Entity pairs in detection order
    pub fn pairs(&self) -> &[CollisionPair] {
        &self.pairs
    }

    /// Number of colliding entity pairs
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether nothing collided
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Total number of overlapping hitbox pairs
    pub fn hitbox_pair_count(&self) -> usize {
        self.collisions
            .values()
            .flatten()
            .map(|info| info.hitbox_pairs.len())
            .sum()
    }

    /// Everything `affected` collided with
    pub fn collisions_for(&self, affected: Entity) -> &[EntityCollisionInfo] {
        self.collisions.get(&affected).map_or(&[], Vec::as_slice)
    }

    /// Collision of `affected` with `colliding`, if any
    pub fn find(&self, affected: Entity, colliding: Entity) -> Option<&EntityCollisionInfo> {
        self.collisions_for(affected)
            .iter()
            .find(|info| info.colliding_entity == colliding)
    }
}

impl World {
    /// Detect every collision on every layer
    pub fn detect_collisions(&self) -> GlobalCollisionInfo {
        let mut info = GlobalCollisionInfo::new();
        for layer in self.layers() {
            let candidates = self.broad_phase(layer);
            self.narrow_phase(candidates, &mut info);
        }
        log::trace!(
            "Detected {} colliding entity pairs ({} hitbox pairs)",
            info.len(),
            info.hitbox_pair_count()
        );
        info
    }

    /// Candidate entity pairs on one layer
    fn broad_phase(&self, layer: &Layer) -> Vec<CollisionPair> {
        let mut tested = HashSet::new();
        let mut candidates = Vec::new();

        for &(pushing_group, pushed_group) in self.collision_group_pairs() {
            for chunk in layer.chunks() {
                let affected_entities = chunk.entities_in_group(pushed_group);
                if affected_entities.is_empty() {
                    continue;
                }
                let colliding_entities = chunk.entities_in_group(pushing_group);

                for &affected in affected_entities {
                    let Some(affected_transform) = self.transform(affected) else {
                        continue;
                    };
                    for &colliding in colliding_entities {
                        if affected == colliding {
                            continue;
                        }
                        let Some(colliding_transform) = self.transform(colliding) else {
                            continue;
                        };
                        if affected_transform.carry_root() == colliding_transform.carry_root() {
                            continue;
                        }
                        if !affected_transform
                            .bounding_area()
                            .intersects(colliding_transform.bounding_area())
                        {
                            continue;
                        }
                        let pair = CollisionPair { affected, colliding };
                        if tested.insert(pair) {
                            candidates.push(pair);
                        }
                    }
                }
            }
        }

        candidates
    }

    fn narrow_phase(&self, candidates: Vec<CollisionPair>, info: &mut GlobalCollisionInfo) {
        for pair in candidates {
            let (Some(affected), Some(colliding)) = (self.transform(pair.affected), self.transform(pair.colliding))
            else {
                continue;
            };
            let hitbox_pairs = self.colliding_hitbox_pairs(affected, colliding);
            if !hitbox_pairs.is_empty() {
                info.insert(pair.affected, pair.colliding, hitbox_pairs);
            }
        }
    }

    /// Every compatible, overlapping hitbox pair between two transforms
    fn colliding_hitbox_pairs(
        &self,
        affected: &TransformComponent,
        colliding: &TransformComponent,
    ) -> Vec<CollidingHitboxPair> {
        let mut pairs = Vec::new();
        for affected_hitbox in affected.hitboxes() {
            for colliding_hitbox in colliding.hitboxes() {
                if !affected_hitbox.can_collide_with(colliding_hitbox) {
                    continue;
                }
                let result = affected_hitbox
                    .collision_box
                    .collision_result(&colliding_hitbox.collision_box);
                if !result.is_colliding {
                    continue;
                }
                let affected_ref = affected.hitbox_ref(affected_hitbox.local_id);
                let colliding_ref = colliding.hitbox_ref(colliding_hitbox.local_id);
                if (affected_hitbox.parent.is_some() || colliding_hitbox.parent.is_some())
                    && self.share_root(affected_ref, colliding_ref)
                {
                    continue;
                }
                pairs.push(CollidingHitboxPair {
                    affected: affected_hitbox.local_id,
                    colliding: colliding_hitbox.local_id,
                    overlap: result.overlap,
                });
            }
        }
        pairs
    }

    /// Whether two hitboxes belong to the same attached hierarchy
    pub(crate) fn share_root(&self, a: HitboxRef, b: HitboxRef) -> bool {
        match (self.get_root_hitbox(a), self.get_root_hitbox(b)) {
            (Ok(root_a), Ok(root_b)) => root_a == root_b,
            _ => false,
        }
    }

    /// Indices (into each transform's hitbox list) of the first overlapping hitbox pair
    ///
    /// Tests the two entities directly, without the broad phase. Entities on
    /// different layers never collide.
    pub fn colliding_hitbox_indices(
        &self,
        first: Entity,
        second: Entity,
    ) -> Result<Option<(usize, usize)>, PhysicsError> {
        let a = self.get_transform(first)?;
        let b = self.get_transform(second)?;
        if a.layer() != b.layer() || !a.bounding_area().intersects(b.bounding_area()) {
            return Ok(None);
        }

        for (i, hitbox_a) in a.hitboxes().iter().enumerate() {
            for (j, hitbox_b) in b.hitboxes().iter().enumerate() {
                if hitbox_a.can_collide_with(hitbox_b)
                    && hitbox_a
                        .collision_box
                        .is_colliding_with(&hitbox_b.collision_box, 0.0)
                {
                    return Ok(Some((i, j)));
                }
            }
        }
        Ok(None)
    }

    /// Packed `first_index | second_index << 8` of the first overlapping hitbox pair, or [`NO_COLLISION`]
    ///
    /// Each index gets 8 bits. When the first overlapping pair has an index
    /// above [`MAX_PACKED_HITBOX_INDEX`] this also returns [`NO_COLLISION`];
    /// use [`World::colliding_hitbox_indices`] for entities that large.
    pub fn entities_are_colliding(&self, first: Entity, second: Entity) -> Result<u32, PhysicsError> {
        Ok(match self.colliding_hitbox_indices(first, second)? {
            Some((i, j)) if i <= MAX_PACKED_HITBOX_INDEX && j <= MAX_PACKED_HITBOX_INDEX => {
                i as u32 | ((j as u32) << 8)
            }
            _ => NO_COLLISION,
        })
    }

    /// Entities on a layer with any hitbox within `epsilon` of any of `boxes`
    ///
    /// Results are in discovery order without duplicates. Bits and masks are
    /// not consulted.
    pub fn get_boxes_colliding_entities(
        &self,
        layer: LayerId,
        boxes: &[CollisionBox],
        epsilon: f32,
    ) -> Result<Vec<Entity>, PhysicsError> {
        let layer = self.layer(layer).ok_or(PhysicsError::MissingLayer(layer))?;
        let mut found = Vec::new();
        let mut seen = HashSet::new();

        for query_box in boxes {
            let area = expanded_bounds(query_box, epsilon);
            for chunk_index in layer.chunks_overlapping(&area) {
                let Some(chunk) = layer.chunk(chunk_index) else {
                    continue;
                };
                for &entity in chunk.entities() {
                    if seen.contains(&entity) {
                        continue;
                    }
                    let Some(transform) = self.transform(entity) else {
                        continue;
                    };
                    if !transform.bounding_area().intersects(&area) {
                        continue;
                    }
                    let hit = transform
                        .hitboxes()
                        .iter()
                        .any(|hitbox| hitbox.collision_box.is_colliding_with(query_box, epsilon));
                    if hit {
                        seen.insert(entity);
                        found.push(entity);
                    }
                }
            }
        }
        Ok(found)
    }

    /// Entities with any hitbox within `epsilon` of any of `hitboxes`
    ///
    /// Unlike [`World::get_boxes_colliding_entities`] this respects bits and
    /// masks, and never returns the entities that own the query hitboxes.
    pub fn get_hitboxes_colliding_entities(
        &self,
        hitboxes: &[HitboxRef],
        epsilon: f32,
    ) -> Result<Vec<Entity>, PhysicsError> {
        let owners: HashSet<Entity> = hitboxes.iter().map(|hitbox| hitbox.entity).collect();
        let mut found = Vec::new();
        let mut seen = HashSet::new();

        for &query in hitboxes {
            let query_hitbox = self.hitbox(query)?;
            let layer_id = self.get_transform(query.entity)?.layer();
            let layer = self.layer(layer_id).ok_or(PhysicsError::MissingLayer(layer_id))?;
            let area = expanded_bounds(&query_hitbox.collision_box, epsilon);

            for chunk_index in layer.chunks_overlapping(&area) {
                let Some(chunk) = layer.chunk(chunk_index) else {
                    continue;
                };
                for &entity in chunk.entities() {
                    if owners.contains(&entity) || seen.contains(&entity) {
                        continue;
                    }
                    let Some(transform) = self.transform(entity) else {
                        continue;
                    };
                    if !transform.bounding_area().intersects(&area) {
                        continue;
                    }
                    let hit = transform.hitboxes().iter().any(|hitbox| {
                        query_hitbox.can_collide_with(hitbox)
                            && query_hitbox
                                .collision_box
                                .is_colliding_with(&hitbox.collision_box, epsilon)
                    });
                    if hit {
                        seen.insert(entity);
                        found.push(entity);
                    }
                }
            }
        }
        Ok(found)
    }
}

fn expanded_bounds(collision_box: &CollisionBox, epsilon: f32) -> Aabb {
    let bounds = collision_box.bounds();
    let margin = Vec2::new(epsilon.max(0.0), epsilon.max(0.0));
    Aabb::new(bounds.min - margin, bounds.max + margin)
}
