//! Hitbox hierarchy, mass and motion primitives
//!
//! Forces, accelerations and velocity changes always land on the root of a
//! hitbox's parent chain: an attached hierarchy moves as one unit. Velocity
//! is derived from the root's position history and never stored.

use crate::ecs::{Entity, World};
use crate::foundation::math::utils::{normalize_angle, polar_vec2, rotate_vec2};
use crate::foundation::math::Vec2;
use crate::physics::error::PhysicsError;
use crate::physics::hitbox::{Hitbox, HitboxFlags, HitboxLocalId, HitboxRef};

impl World {
    /// Add a hitbox to an entity, optionally under one of its own hitboxes
    ///
    /// If the entity already joined the world the hitbox is positioned
    /// through its parent chain right away and the entity's bounds are
    /// updated. Bounds that clip the border trigger a full clean and a border
    /// correction.
    pub fn add_hitbox(
        &mut self,
        entity: Entity,
        hitbox: Hitbox,
        parent: Option<HitboxLocalId>,
    ) -> Result<HitboxLocalId, PhysicsError> {
        let transform = self.get_transform_mut(entity)?;
        let local_id = transform.insert_hitbox(hitbox, parent)?;
        if !transform.in_world {
            return Ok(local_id);
        }

        let hitbox = HitboxRef::new(entity, local_id);
        match parent {
            Some(parent_id) => {
                let (position, angle) = self.hitbox_pose(HitboxRef::new(entity, parent_id))?;
                self.hitbox_mut(hitbox)?
                    .collision_box
                    .update_from_parent(position, angle);
            }
            None => self.hitbox_mut(hitbox)?.collision_box.update_as_root(),
        }
        self.refresh_entity_bounds(entity)?;

        let transform = self.get_transform(entity)?;
        let clips_border = self
            .layer(transform.layer())
            .is_some_and(|layer| !layer.bounds().contains(transform.bounding_area()));
        if clips_border {
            self.clean_transform(entity)?;
            self.resolve_border_collision(entity)?;
        }
        Ok(local_id)
    }

    /// Remove a hitbox from its entity
    ///
    /// Children are detached first and keep their world position and their
    /// root's velocity. Tethers anywhere that pull towards the hitbox are
    /// dropped.
    pub fn remove_hitbox(&mut self, hitbox: HitboxRef) -> Result<Hitbox, PhysicsError> {
        let children = self.hitbox(hitbox)?.children.clone();
        for child in children {
            self.detach_hitbox(child)?;
        }
        self.detach_hitbox(hitbox)?;

        for (_, transform) in self.transforms_mut() {
            for other in transform.hitboxes_mut() {
                other.tethers.retain(|tether| tether.origin != hitbox);
                other.angular_tethers.retain(|tether| tether.origin != hitbox);
            }
        }

        let removed = self
            .get_transform_mut(hitbox.entity)?
            .take_hitbox(hitbox.local_id)
            .ok_or_else(|| PhysicsError::missing_hitbox(hitbox))?;
        self.clean_transform(hitbox.entity)?;
        log::debug!("Removed hitbox {}", hitbox);
        Ok(removed)
    }

    /// Top of a hitbox's parent chain
    pub fn get_root_hitbox(&self, hitbox: HitboxRef) -> Result<HitboxRef, PhysicsError> {
        let mut current = hitbox;
        while let Some(parent) = self.hitbox(current)?.parent {
            current = parent;
        }
        Ok(current)
    }

    /// Mass of a hitbox plus every descendant that is part of its rigid cluster
    pub fn get_hitbox_connected_mass(&self, hitbox: HitboxRef) -> Result<f32, PhysicsError> {
        let this = self.hitbox(hitbox)?;
        let mut mass = this.mass;
        for &child in &this.children {
            if self.hitbox(child)?.is_part_of_parent() {
                mass += self.get_hitbox_connected_mass(child)?;
            }
        }
        Ok(mass)
    }

    /// Accumulate `force / connected mass` on the hitbox's root
    pub fn apply_force(&mut self, hitbox: HitboxRef, force: Vec2) -> Result<(), PhysicsError> {
        let root = self.get_root_hitbox(hitbox)?;
        let mass = self.get_hitbox_connected_mass(root)?;
        if mass > 0.0 {
            self.hitbox_mut(root)?.acceleration += force / mass;
        }
        Ok(())
    }

    /// Accumulate an acceleration on the hitbox's root, ignoring mass
    pub fn apply_acceleration(&mut self, hitbox: HitboxRef, acceleration: Vec2) -> Result<(), PhysicsError> {
        let root = self.get_root_hitbox(hitbox)?;
        self.hitbox_mut(root)?.acceleration += acceleration;
        Ok(())
    }

    /// Instant velocity change of `magnitude / connected mass` along `direction`
    ///
    /// Does nothing if the root is static.
    pub fn apply_knockback(&mut self, hitbox: HitboxRef, magnitude: f32, direction: f32) -> Result<(), PhysicsError> {
        let root = self.get_root_hitbox(hitbox)?;
        if self.hitbox(root)?.is_static {
            return Ok(());
        }
        let mass = self.get_hitbox_connected_mass(root)?;
        if mass <= 0.0 {
            return Ok(());
        }
        let velocity = self.get_hitbox_velocity(root)? + polar_vec2(magnitude / mass, direction);
        self.set_hitbox_velocity(root, velocity)
    }

    /// Velocity of the hitbox's rigid cluster, in units per second
    pub fn get_hitbox_velocity(&self, hitbox: HitboxRef) -> Result<Vec2, PhysicsError> {
        let root = self.hitbox(self.get_root_hitbox(hitbox)?)?;
        let ticks_per_second = self.config().ticks_per_second as f32;
        Ok((root.position() - root.previous_position) * ticks_per_second)
    }

    /// Set the velocity of the hitbox's rigid cluster by rewriting its root's previous position
    pub fn set_hitbox_velocity(&mut self, hitbox: HitboxRef, velocity: Vec2) -> Result<(), PhysicsError> {
        let root = self.get_root_hitbox(hitbox)?;
        let ticks_per_second = self.config().ticks_per_second as f32;
        let root = self.hitbox_mut(root)?;
        root.previous_position = root.position() - velocity / ticks_per_second;
        Ok(())
    }

    /// Angular velocity of the hitbox's relative angle, in radians per second
    pub fn get_hitbox_angular_velocity(&self, hitbox: HitboxRef) -> Result<f32, PhysicsError> {
        let hitbox = self.hitbox(hitbox)?;
        let ticks_per_second = self.config().ticks_per_second as f32;
        Ok((hitbox.relative_angle() - hitbox.previous_relative_angle) * ticks_per_second)
    }

    /// Set the angular velocity of the hitbox's relative angle
    pub fn set_hitbox_angular_velocity(&mut self, hitbox: HitboxRef, angular_velocity: f32) -> Result<(), PhysicsError> {
        let ticks_per_second = self.config().ticks_per_second as f32;
        let hitbox = self.hitbox_mut(hitbox)?;
        hitbox.previous_relative_angle = hitbox.relative_angle() - angular_velocity / ticks_per_second;
        Ok(())
    }

    /// Move a hitbox's root without changing its velocity
    pub fn translate_hitbox(&mut self, hitbox: HitboxRef, delta: Vec2) -> Result<(), PhysicsError> {
        let root = self.get_root_hitbox(hitbox)?;
        let root_hitbox = self.hitbox_mut(root)?;
        root_hitbox.collision_box.translate(delta);
        root_hitbox.previous_position += delta;
        self.get_transform_mut(root.entity)?.mark_dirty();
        Ok(())
    }

    /// Link `child` under `parent` using the child's existing offset and relative angle
    ///
    /// The child does not move until the next clean pass places it relative
    /// to its new parent.
    pub fn attach_hitbox(
        &mut self,
        child: HitboxRef,
        parent: HitboxRef,
        is_part_of_parent: bool,
    ) -> Result<(), PhysicsError> {
        if self.hitbox(child)?.parent.is_some() {
            return Err(PhysicsError::AlreadyAttached(child));
        }

        let mut ancestor = Some(parent);
        while let Some(current) = ancestor {
            if current == child {
                return Err(PhysicsError::HierarchyCycle { child, parent });
            }
            ancestor = self.hitbox(current)?.parent;
        }

        let hitbox = self.hitbox_mut(child)?;
        hitbox.parent = Some(parent);
        hitbox.flags.set(HitboxFlags::PART_OF_PARENT, is_part_of_parent);
        hitbox.acceleration = Vec2::zeros();
        self.hitbox_mut(parent)?.children.push(child);

        let transform = self.get_transform_mut(child.entity)?;
        transform.set_root(child.local_id, false);
        transform.mark_dirty();
        self.get_transform_mut(parent.entity)?.mark_dirty();

        log::debug!("Attached hitbox {} to {}", child, parent);
        Ok(())
    }

    /// Attach `child` under `parent` so that it stays exactly where it is
    ///
    /// The child's offset and relative angle are rewritten from the current
    /// poses of both hitboxes. Used for projectiles lodging into targets.
    pub fn attach_hitbox_in_place(
        &mut self,
        child: HitboxRef,
        parent: HitboxRef,
        is_part_of_parent: bool,
    ) -> Result<(), PhysicsError> {
        let (child_position, child_angle) = self.hitbox_pose(child)?;
        let (parent_position, parent_angle) = self.hitbox_pose(parent)?;

        self.attach_hitbox(child, parent, is_part_of_parent)?;

        let collision_box = &mut self.hitbox_mut(child)?.collision_box;
        collision_box.offset = rotate_vec2(child_position - parent_position, -parent_angle);
        collision_box.relative_angle = normalize_angle(child_angle - parent_angle);
        Ok(())
    }

    /// Make a hitbox a root again
    ///
    /// It keeps its current world position and angle and inherits the
    /// velocity of the root it was moving with. Detaching a root is a no-op.
    pub fn detach_hitbox(&mut self, child: HitboxRef) -> Result<(), PhysicsError> {
        let Some(parent) = self.hitbox(child)?.parent else {
            return Ok(());
        };

        let root = self.get_root_hitbox(child)?;
        let root_step = {
            let root = self.hitbox(root)?;
            root.position() - root.previous_position
        };

        self.hitbox_mut(parent)?.children.retain(|&c| c != child);

        let hitbox = self.hitbox_mut(child)?;
        hitbox.parent = None;
        hitbox.flags.remove(HitboxFlags::PART_OF_PARENT);
        hitbox.collision_box.relative_angle = hitbox.collision_box.angle;
        hitbox.previous_relative_angle = hitbox.collision_box.angle;
        hitbox.previous_position = hitbox.position() - root_step;

        let transform = self.get_transform_mut(child.entity)?;
        transform.set_root(child.local_id, true);
        transform.mark_dirty();
        self.get_transform_mut(parent.entity)?.mark_dirty();

        log::debug!("Detached hitbox {} from {}", child, parent);
        Ok(())
    }
}
