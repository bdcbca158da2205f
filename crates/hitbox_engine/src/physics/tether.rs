//! Spring-damper tethers between hitboxes
//!
//! A tether is stored on the hitbox it pulls and points at an origin
//! hitbox. Linear tethers keep the two hitboxes near `ideal_distance` apart;
//! angular tethers keep the hitbox's angle near `ideal_angle` relative to the
//! origin's angle, with a dead zone of `padding` radians on either side.
//!
//! Neither kind stores a velocity. The offset from the previous tick is kept
//! instead and differenced, the same way hitbox velocity is derived.

use serde::{Deserialize, Serialize};

use crate::ecs::World;
use crate::foundation::math::utils::{angle_difference, normalize_angle};
use crate::foundation::math::Vec2;
use crate::physics::error::PhysicsError;
use crate::physics::hitbox::HitboxRef;

/// Positional spring between a hitbox and an origin hitbox
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tether {
    /// Hitbox the spring is anchored to
    pub origin: HitboxRef,
    /// Rest length
    pub ideal_distance: f32,
    /// Force per unit of stretch
    pub spring_constant: f32,
    /// Force per unit of relative speed along the spring
    pub damping: f32,
    #[serde(skip)]
    previous_offset: Option<Vec2>,
}

impl Tether {
    /// Create a tether anchored to `origin`
    pub fn new(origin: HitboxRef, ideal_distance: f32, spring_constant: f32, damping: f32) -> Self {
        Self {
            origin,
            ideal_distance,
            spring_constant,
            damping,
            previous_offset: None,
        }
    }

    /// Offset from the origin measured on the previous update
    pub fn previous_offset(&self) -> Option<Vec2> {
        self.previous_offset
    }
}

/// Angular spring keeping a hitbox's angle relative to an origin hitbox
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AngularTether {
    /// Hitbox whose angle is the reference
    pub origin: HitboxRef,
    /// Rest angle relative to the origin
    pub ideal_angle: f32,
    /// Torque per radian outside the dead zone
    pub spring_constant: f32,
    /// Torque per radian per second
    pub damping: f32,
    /// Half-width of the dead zone around `ideal_angle`
    pub padding: f32,
    #[serde(skip)]
    previous_angle_offset: Option<f32>,
}

impl AngularTether {
    /// Create an angular tether anchored to `origin`
    pub fn new(origin: HitboxRef, ideal_angle: f32, spring_constant: f32, damping: f32, padding: f32) -> Self {
        Self {
            origin,
            ideal_angle,
            spring_constant,
            damping,
            padding,
            previous_angle_offset: None,
        }
    }
}

impl World {
    /// Apply every tether in the world, returning how many were applied
    pub fn update_tethers(&mut self) -> Result<usize, PhysicsError> {
        let mut tethered = Vec::new();
        for entity in self.entities().collect::<Vec<_>>() {
            let transform = self.get_transform(entity)?;
            if !transform.is_in_world() {
                continue;
            }
            for hitbox in transform.hitboxes() {
                if !hitbox.tethers.is_empty() || !hitbox.angular_tethers.is_empty() {
                    tethered.push((
                        transform.hitbox_ref(hitbox.local_id),
                        hitbox.tethers.len(),
                        hitbox.angular_tethers.len(),
                    ));
                }
            }
        }

        let mut applied = 0;
        for (hitbox, linear_count, angular_count) in tethered {
            for index in 0..linear_count {
                self.update_tether(hitbox, index)?;
            }
            for index in 0..angular_count {
                self.update_angular_tether(hitbox, index)?;
            }
            applied += linear_count + angular_count;
        }
        Ok(applied)
    }

    fn update_tether(&mut self, hitbox: HitboxRef, index: usize) -> Result<(), PhysicsError> {
        let ticks_per_second = self.config().ticks_per_second as f32;
        let this = self.hitbox(hitbox)?;
        let Some(tether) = this.tethers.get(index).cloned() else {
            return Ok(());
        };
        let offset = this.position() - self.hitbox(tether.origin)?.position();
        let previous_offset = tether.previous_offset.unwrap_or(offset);

        let distance = offset.magnitude();
        if distance > f32::EPSILON {
            let direction = offset / distance;
            let spring_force = (distance - tether.ideal_distance) * tether.spring_constant;
            let relative_speed = (offset - previous_offset).dot(&direction) * ticks_per_second;
            let force = -direction * (spring_force + relative_speed * tether.damping);
            self.apply_force(hitbox, force)?;
        }

        if let Some(tether) = self.hitbox_mut(hitbox)?.tethers.get_mut(index) {
            tether.previous_offset = Some(offset);
        }
        Ok(())
    }

    fn update_angular_tether(&mut self, hitbox: HitboxRef, index: usize) -> Result<(), PhysicsError> {
        let ticks_per_second = self.config().ticks_per_second as f32;
        let this = self.hitbox(hitbox)?;
        let Some(tether) = this.angular_tethers.get(index).cloned() else {
            return Ok(());
        };
        let angle_offset = angle_difference(self.hitbox(tether.origin)?.angle(), this.angle());
        let previous_angle_offset = tether.previous_angle_offset.unwrap_or(angle_offset);

        let displacement = angle_difference(tether.ideal_angle, angle_offset);
        let excess = if displacement > tether.padding {
            displacement - tether.padding
        } else if displacement < -tether.padding {
            displacement + tether.padding
        } else {
            0.0
        };

        let hitbox = self.hitbox_mut(hitbox)?;
        if excess != 0.0 {
            let angular_velocity = angle_difference(previous_angle_offset, angle_offset) * ticks_per_second;
            hitbox.angular_acceleration -= excess * tether.spring_constant + angular_velocity * tether.damping;
        }
        if let Some(tether) = hitbox.angular_tethers.get_mut(index) {
            tether.previous_angle_offset = Some(angle_offset);
        }
        Ok(())
    }

    /// Spring a hitbox towards a target angle
    ///
    /// `ideal_angle` is compared against the relative angle when
    /// `ideal_angle_is_relative` is set, otherwise against the absolute
    /// angle. Both are normalized so the hitbox always turns the short way.
    pub fn turn_hitbox_to_angle(
        &mut self,
        hitbox: HitboxRef,
        ideal_angle: f32,
        turn_speed: f32,
        damping: f32,
        ideal_angle_is_relative: bool,
    ) -> Result<(), PhysicsError> {
        let this = self.hitbox(hitbox)?;
        let current_angle = if ideal_angle_is_relative {
            normalize_angle(this.relative_angle())
        } else {
            normalize_angle(this.angle())
        };
        let angle_diff = angle_difference(current_angle, ideal_angle);
        let angular_velocity = self.get_hitbox_angular_velocity(hitbox)?;

        self.hitbox_mut(hitbox)?.angular_acceleration += angle_diff * turn_speed - angular_velocity * damping;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::Entity;
    use crate::physics::collision::CollisionBox;
    use crate::physics::hitbox::Hitbox;
    use crate::spatial::CollisionGroup;
    use approx::assert_relative_eq;

    fn spawn(world: &mut World, x: f32, y: f32, hitbox: impl FnOnce(Hitbox) -> Hitbox) -> (Entity, HitboxRef) {
        let entity = world.create_entity(0, CollisionGroup::Default).unwrap();
        let base = Hitbox::new(CollisionBox::circular(Vec2::new(x, y), 5.0));
        let id = world.add_hitbox(entity, hitbox(base), None).unwrap();
        world.join(entity).unwrap();
        (entity, HitboxRef::new(entity, id))
    }

    #[test]
    fn test_stretched_tether_pulls_towards_origin() {
        let mut world = World::default();
        let (_, anchor) = spawn(&mut world, 500.0, 500.0, |h| h.as_static());
        let (_, weight) = spawn(&mut world, 600.0, 500.0, |h| {
            h.with_mass(2.0).with_tether(Tether::new(anchor, 40.0, 10.0, 0.0))
        });

        assert_eq!(world.update_tethers().unwrap(), 1);
        // (100 - 40) * 10 = 600 towards the anchor, over mass 2
        assert_relative_eq!(world.hitbox(weight).unwrap().acceleration, Vec2::new(-300.0, 0.0), epsilon = 1e-3);
        let tether = &world.hitbox(weight).unwrap().tethers[0];
        assert_eq!(tether.previous_offset(), Some(Vec2::new(100.0, 0.0)));
    }

    #[test]
    fn test_tether_damping_opposes_separation() {
        let mut world = World::default();
        let (_, anchor) = spawn(&mut world, 500.0, 500.0, |h| h.as_static());
        let (_, weight) = spawn(&mut world, 540.0, 500.0, |h| h.with_tether(Tether::new(anchor, 40.0, 10.0, 2.0)));

        world.update_tethers().unwrap();
        assert_relative_eq!(world.hitbox(weight).unwrap().acceleration, Vec2::zeros(), epsilon = 1e-4);

        world.hitbox_mut(weight).unwrap().acceleration = Vec2::zeros();
        world.translate_hitbox(weight, Vec2::new(1.0, 0.0)).unwrap();
        world.update_tethers().unwrap();
        // spring 1 * 10 plus relative speed 60 * damping 2
        assert_relative_eq!(world.hitbox(weight).unwrap().acceleration, Vec2::new(-130.0, 0.0), epsilon = 1e-2);
    }

    #[test]
    fn test_angular_tether_dead_zone() {
        let mut world = World::default();
        let (_, origin) = spawn(&mut world, 500.0, 500.0, |h| h.as_static());
        let (_, limb) = spawn(&mut world, 520.0, 500.0, |h| h);
        world
            .hitbox_mut(limb)
            .unwrap()
            .angular_tethers
            .push(AngularTether::new(origin, 0.0, 5.0, 0.0, 0.3));

        world.hitbox_mut(limb).unwrap().collision_box.relative_angle = 0.2;
        world.clean_transform(limb.entity).unwrap();
        world.update_tethers().unwrap();
        assert_eq!(world.hitbox(limb).unwrap().angular_acceleration, 0.0);

        world.hitbox_mut(limb).unwrap().collision_box.relative_angle = 0.5;
        world.clean_transform(limb.entity).unwrap();
        world.update_tethers().unwrap();
        assert_relative_eq!(world.hitbox(limb).unwrap().angular_acceleration, -1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_turn_to_angle_takes_short_way() {
        let mut world = World::default();
        let (_, hitbox) = spawn(&mut world, 500.0, 500.0, |h| h);
        world.hitbox_mut(hitbox).unwrap().collision_box.relative_angle = 3.0;
        world.hitbox_mut(hitbox).unwrap().previous_relative_angle = 3.0;
        world.clean_transform(hitbox.entity).unwrap();

        world.turn_hitbox_to_angle(hitbox, -3.0, 2.0, 0.5, false).unwrap();
        let expected = angle_difference(3.0, -3.0) * 2.0;
        assert!(expected > 0.0);
        assert_relative_eq!(world.hitbox(hitbox).unwrap().angular_acceleration, expected, epsilon = 1e-4);
    }
}
