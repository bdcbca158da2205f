//! Verlet integration
//!
//! Each non-static root hitbox advances by its implicit velocity
//! (`position - previous_position`) plus its accumulated acceleration. The
//! owning transform's self and external velocities are applied as a drift on
//! top of that, and the drift is also added to the previous position so it
//! does not feed back into the implicit velocity on the next tick.
//!
//! Relative angles integrate the same way for every non-static hitbox, root
//! or child. Accumulators are cleared for every hitbox, static or not.

use crate::ecs::World;
use crate::foundation::math::Vec2;

impl World {
    /// Advance every hitbox in the world by one tick, returning how many entities moved
    pub fn integrate_world(&mut self) -> usize {
        let delta_time = self.config().delta_time();
        let delta_time_squared = delta_time * delta_time;
        let mut moved_entities = 0;

        for (_, transform) in self.transforms_mut() {
            if !transform.is_in_world() {
                continue;
            }
            let drift = (transform.self_velocity + transform.external_velocity) * delta_time;
            let mut moved = false;

            for hitbox in transform.hitboxes_mut() {
                if !hitbox.is_static {
                    let relative_angle = hitbox.relative_angle();
                    let angular_step = relative_angle - hitbox.previous_relative_angle;
                    let new_relative_angle =
                        relative_angle + angular_step + hitbox.angular_acceleration * delta_time_squared;
                    hitbox.previous_relative_angle = relative_angle;
                    hitbox.collision_box.relative_angle = new_relative_angle;
                    moved |= new_relative_angle != relative_angle;

                    if hitbox.parent.is_none() {
                        let position = hitbox.position();
                        let step = position - hitbox.previous_position;
                        let new_position = position + step + hitbox.acceleration * delta_time_squared + drift;
                        hitbox.previous_position = position + drift;
                        hitbox.collision_box.position = new_position;
                        moved |= new_position != position;
                    }
                }

                hitbox.acceleration = Vec2::zeros();
                hitbox.angular_acceleration = 0.0;
            }

            if moved {
                transform.mark_dirty();
                moved_entities += 1;
            }
        }

        moved_entities
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collision::CollisionBox;
    use crate::physics::hitbox::{Hitbox, HitboxRef};
    use crate::spatial::CollisionGroup;
    use approx::assert_relative_eq;

    fn spawn(world: &mut World, hitbox: Hitbox) -> HitboxRef {
        let entity = world.create_entity(0, CollisionGroup::Default).unwrap();
        let id = world.add_hitbox(entity, hitbox, None).unwrap();
        world.join(entity).unwrap();
        HitboxRef::new(entity, id)
    }

    #[test]
    fn test_coasting_keeps_velocity() {
        let mut world = World::default();
        let hitbox = spawn(&mut world, Hitbox::new(CollisionBox::circular(Vec2::new(500.0, 500.0), 5.0)));
        world.set_hitbox_velocity(hitbox, Vec2::new(60.0, 30.0)).unwrap();

        for _ in 0..10 {
            world.integrate_world();
        }
        assert_relative_eq!(world.hitbox(hitbox).unwrap().position(), Vec2::new(510.0, 505.0), epsilon = 1e-3);
        assert_relative_eq!(world.get_hitbox_velocity(hitbox).unwrap(), Vec2::new(60.0, 30.0), epsilon = 1e-2);
    }

    #[test]
    fn test_self_velocity_does_not_accumulate() {
        let mut world = World::default();
        let hitbox = spawn(&mut world, Hitbox::new(CollisionBox::circular(Vec2::new(500.0, 500.0), 5.0)));
        world.transform_mut(hitbox.entity).unwrap().self_velocity = Vec2::new(120.0, 0.0);

        for _ in 0..3 {
            world.integrate_world();
        }
        assert_relative_eq!(world.hitbox(hitbox).unwrap().position(), Vec2::new(506.0, 500.0), epsilon = 1e-3);
        assert_relative_eq!(world.get_hitbox_velocity(hitbox).unwrap(), Vec2::zeros(), epsilon = 1e-3);
    }

    #[test]
    fn test_static_hitbox_stays_and_clears_accumulators() {
        let mut world = World::default();
        let hitbox = spawn(
            &mut world,
            Hitbox::new(CollisionBox::circular(Vec2::new(500.0, 500.0), 5.0)).as_static(),
        );
        world.hitbox_mut(hitbox).unwrap().acceleration = Vec2::new(1000.0, 0.0);

        assert_eq!(world.integrate_world(), 0);
        let hitbox = world.hitbox(hitbox).unwrap();
        assert_eq!(hitbox.position(), Vec2::new(500.0, 500.0));
        assert_eq!(hitbox.acceleration, Vec2::zeros());
    }

    #[test]
    fn test_angular_acceleration_turns_hitbox() {
        let mut world = World::default();
        let hitbox = spawn(&mut world, Hitbox::new(CollisionBox::rectangular(Vec2::new(500.0, 500.0), 20.0, 10.0)));
        world.hitbox_mut(hitbox).unwrap().angular_acceleration = 3600.0;

        world.integrate_world();
        assert_relative_eq!(world.hitbox(hitbox).unwrap().relative_angle(), 1.0, epsilon = 1e-4);
        assert!(world.transform(hitbox.entity).unwrap().is_dirty());
    }
}
