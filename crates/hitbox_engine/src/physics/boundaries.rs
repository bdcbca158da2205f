//! Layer border and wall subtile collisions
//!
//! Both run on freshly cleaned transforms, right after integration. Border
//! correction shifts an entity's root hitboxes back inside the layer and
//! stops it on the clipped axis. Wall collisions resolve each hitbox against
//! the wall subtiles under it as hard collisions.

use crate::ecs::component::CollisionDispatch;
use crate::ecs::{Entity, World};
use crate::foundation::math::Vec2;
use crate::physics::error::PhysicsError;
use crate::physics::hitbox::{HitboxFlags, HitboxRef};

/// Slack allowed when checking that a corrected entity is back inside
const BORDER_TOLERANCE: f32 = 1e-3;

impl World {
    /// Push an entity back inside its layer, returning whether it was outside
    ///
    /// The overflow on each axis is removed from every root hitbox, their
    /// velocity on that axis is zeroed, and so are the transform's self and
    /// external velocities on that axis. Entities without root hitboxes follow
    /// their parents and are left alone. An entity still outside after the
    /// correction is an invariant violation.
    pub fn resolve_border_collision(&mut self, entity: Entity) -> Result<bool, PhysicsError> {
        let transform = self.get_transform(entity)?;
        let bounds = *transform.bounding_area();
        if bounds.is_empty() || transform.root_hitboxes().is_empty() {
            return Ok(false);
        }
        let world_size = self
            .layer(transform.layer())
            .ok_or(PhysicsError::MissingLayer(transform.layer()))?
            .world_size();

        let overflow = |min: f32, max: f32| {
            if min < 0.0 {
                -min
            } else if max > world_size {
                world_size - max
            } else {
                0.0
            }
        };
        let shift = Vec2::new(overflow(bounds.min.x, bounds.max.x), overflow(bounds.min.y, bounds.max.y));
        if shift == Vec2::zeros() {
            return Ok(false);
        }

        let roots = transform.root_hitboxes().to_vec();
        for local_id in roots {
            let hitbox = self.hitbox_mut(HitboxRef::new(entity, local_id))?;
            hitbox.collision_box.translate(shift);
            hitbox.previous_position += shift;
            if shift.x != 0.0 {
                hitbox.previous_position.x = hitbox.position().x;
            }
            if shift.y != 0.0 {
                hitbox.previous_position.y = hitbox.position().y;
            }
        }

        let transform = self.get_transform_mut(entity)?;
        if shift.x != 0.0 {
            transform.self_velocity.x = 0.0;
            transform.external_velocity.x = 0.0;
        }
        if shift.y != 0.0 {
            transform.self_velocity.y = 0.0;
            transform.external_velocity.y = 0.0;
        }
        log::debug!("Entity {:?} pushed back inside the border by {:?}", entity, shift);

        self.clean_transform(entity)?;

        let bounds = *self.get_transform(entity)?.bounding_area();
        if bounds.min.x < -BORDER_TOLERANCE
            || bounds.min.y < -BORDER_TOLERANCE
            || bounds.max.x > world_size + BORDER_TOLERANCE
            || bounds.max.y > world_size + BORDER_TOLERANCE
        {
            return Err(PhysicsError::OutOfBounds {
                entity,
                min_x: bounds.min.x,
                max_x: bounds.max.x,
                min_y: bounds.min.y,
                max_y: bounds.max.y,
            });
        }
        Ok(true)
    }

    /// Resolve an entity's hitboxes against the wall subtiles under them
    ///
    /// Skipped entirely unless one of the entity's chunks contains walls.
    /// Returns the number of wall hits.
    pub fn resolve_wall_collisions(
        &mut self,
        entity: Entity,
        dispatch: &mut CollisionDispatch,
    ) -> Result<usize, PhysicsError> {
        let transform = self.get_transform(entity)?;
        let layer_id = transform.layer();
        let layer = self.layer(layer_id).ok_or(PhysicsError::MissingLayer(layer_id))?;
        let near_walls = transform
            .chunks()
            .iter()
            .any(|&index| layer.chunk(index).is_some_and(|chunk| chunk.has_wall_subtiles()));
        if !near_walls {
            return Ok(0);
        }

        let candidates: Vec<_> = transform
            .hitboxes()
            .iter()
            .filter(|hitbox| !hitbox.flags.contains(HitboxFlags::IGNORES_WALL_COLLISIONS))
            .map(|hitbox| hitbox.local_id)
            .collect();
        let components = self.components(entity);

        let mut hits = 0;
        for local_id in candidates {
            let hitbox = HitboxRef::new(entity, local_id);
            let bounds = self.hitbox(hitbox)?.collision_box.bounds();
            let layer = self.layer(layer_id).ok_or(PhysicsError::MissingLayer(layer_id))?;
            let (columns, rows) = layer.subtile_range(&bounds);
            let walls: Vec<(i32, i32)> = rows
                .flat_map(|y| columns.clone().map(move |x| (x, y)))
                .filter(|&(x, y)| layer.is_wall_subtile(x, y))
                .collect();

            for (x, y) in walls {
                if self.resolve_wall_collision(hitbox, x, y)? {
                    hits += 1;
                    dispatch.dispatch_wall_collision(self, components, entity, hitbox);
                }
            }
        }
        Ok(hits)
    }

    /// Resolve one hitbox against one wall subtile, returning whether they overlapped
    ///
    /// Bouncy hitboxes reflect off the wall instead of sliding along it.
    /// Hitboxes with a static root only report the hit.
    pub fn resolve_wall_collision(&mut self, hitbox: HitboxRef, subtile_x: i32, subtile_y: i32) -> Result<bool, PhysicsError> {
        let layer_id = self.get_transform(hitbox.entity)?.layer();
        let wall = self
            .layer(layer_id)
            .ok_or(PhysicsError::MissingLayer(layer_id))?
            .subtile_box(subtile_x, subtile_y);

        let this = self.hitbox(hitbox)?;
        let result = this.collision_box.collision_result(&wall);
        if !result.is_colliding {
            return Ok(false);
        }
        let bounce = this.flags.contains(HitboxFlags::BOUNCY);

        let root = self.get_root_hitbox(hitbox)?;
        if self.hitbox(root)?.is_static || result.overlap == Vec2::zeros() {
            return Ok(true);
        }
        self.resolve_hard_collision(hitbox, result.overlap, bounce)?;
        // Later subtiles must see the corrected position
        self.clean_transform(root.entity)?;
        if root.entity != hitbox.entity {
            self.clean_transform(hitbox.entity)?;
        }
        Ok(true)
    }
}
