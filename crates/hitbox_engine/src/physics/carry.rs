//! Mounting and carrying
//!
//! A rider mounts another entity by hanging its root hitboxes off the
//! mount's primary root. Every entity in a carry tree shares the same
//! `carry_root`, which the broad phase uses to skip pairs that ride together.

use crate::ecs::components::CarryInfo;
use crate::ecs::{Entity, World};
use crate::physics::error::PhysicsError;
use crate::physics::hitbox::HitboxRef;

impl World {
    /// Mount `rider` on `mount`
    ///
    /// The rider's root hitboxes are attached in place to the mount's primary
    /// root, outside the mount's rigid mass, and follow it from the next clean
    /// pass on.
    pub fn mount_entity(&mut self, rider: Entity, mount: Entity) -> Result<(), PhysicsError> {
        let rider_transform = self.get_transform(rider)?;
        if rider_transform.mount.is_some() {
            return Err(PhysicsError::AlreadyMounted(rider));
        }
        if !rider_transform.is_in_world() {
            return Err(PhysicsError::NotInWorld(rider));
        }
        let rider_roots = rider_transform.root_hitboxes().to_vec();
        if rider_roots.is_empty() {
            return Err(PhysicsError::NoRootHitbox(rider));
        }

        let mut current = Some(mount);
        while let Some(entity) = current {
            if entity == rider {
                return Err(PhysicsError::CarryCycle { rider, mount });
            }
            current = self.get_transform(entity)?.mount;
        }

        let mount_transform = self.get_transform(mount)?;
        if !mount_transform.is_in_world() {
            return Err(PhysicsError::NotInWorld(mount));
        }
        let mount_root = mount_transform
            .primary_root()
            .ok_or(PhysicsError::NoRootHitbox(mount))?;
        let carry_root = mount_transform.carry_root;

        let parent = HitboxRef::new(mount, mount_root);
        for &local_id in &rider_roots {
            self.attach_hitbox_in_place(HitboxRef::new(rider, local_id), parent, false)?;
        }

        self.get_transform_mut(rider)?.mount = Some(mount);
        self.get_transform_mut(mount)?.carried_entities.push(CarryInfo {
            entity: rider,
            hitboxes: rider_roots,
        });
        self.propagate_carry_root(rider, carry_root)?;

        log::debug!("Entity {:?} mounted {:?}", rider, mount);
        Ok(())
    }

    /// Dismount `rider` from whatever it is riding
    ///
    /// The rider's formerly mounted hitboxes become roots again, keeping the
    /// velocity they had while carried. Its own riders stay with it. Does
    /// nothing if the rider is not mounted.
    pub fn dismount_entity(&mut self, rider: Entity) -> Result<(), PhysicsError> {
        let Some(mount) = self.get_transform(rider)?.mount else {
            return Ok(());
        };

        let carried = self.transform_mut(mount).and_then(|transform| {
            let index = transform
                .carried_entities
                .iter()
                .position(|info| info.entity == rider)?;
            Some(transform.carried_entities.remove(index))
        });
        let hitboxes = match carried {
            Some(info) => info.hitboxes,
            None => self
                .get_transform(rider)?
                .hitboxes()
                .iter()
                .filter(|hitbox| hitbox.parent.is_some_and(|parent| parent.entity == mount))
                .map(|hitbox| hitbox.local_id)
                .collect(),
        };

        for local_id in hitboxes {
            let hitbox = HitboxRef::new(rider, local_id);
            // Hitboxes removed while riding are simply gone
            if self.hitbox(hitbox).is_ok() {
                self.detach_hitbox(hitbox)?;
            }
        }

        self.get_transform_mut(rider)?.mount = None;
        self.propagate_carry_root(rider, rider)?;

        log::debug!("Entity {:?} dismounted {:?}", rider, mount);
        Ok(())
    }

    fn propagate_carry_root(&mut self, entity: Entity, carry_root: Entity) -> Result<(), PhysicsError> {
        let mut stack = vec![entity];
        while let Some(current) = stack.pop() {
            let transform = self.get_transform_mut(current)?;
            transform.carry_root = carry_root;
            stack.extend(transform.carried_entities.iter().map(|info| info.entity));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec2;
    use crate::physics::collision::CollisionBox;
    use crate::physics::hitbox::Hitbox;
    use crate::spatial::CollisionGroup;
    use approx::assert_relative_eq;

    fn spawn(world: &mut World, x: f32, y: f32, radius: f32) -> HitboxRef {
        let entity = world.create_entity(0, CollisionGroup::Default).unwrap();
        let id = world
            .add_hitbox(entity, Hitbox::new(CollisionBox::circular(Vec2::new(x, y), radius)), None)
            .unwrap();
        world.join(entity).unwrap();
        HitboxRef::new(entity, id)
    }

    #[test]
    fn test_rider_follows_mount() {
        let mut world = World::default();
        let mount = spawn(&mut world, 500.0, 500.0, 10.0);
        let rider = spawn(&mut world, 520.0, 500.0, 5.0);

        world.mount_entity(rider.entity, mount.entity).unwrap();
        world.set_hitbox_velocity(mount, Vec2::new(60.0, 0.0)).unwrap();
        world.integrate_world();
        world.clean_transform(mount.entity).unwrap();

        assert_relative_eq!(world.hitbox(rider).unwrap().position(), Vec2::new(521.0, 500.0), epsilon = 1e-3);
        assert_relative_eq!(world.get_hitbox_velocity(rider).unwrap(), Vec2::new(60.0, 0.0), epsilon = 1e-2);
        let transform = world.transform(rider.entity).unwrap();
        assert_eq!(transform.mount(), Some(mount.entity));
        assert_eq!(transform.carry_root(), mount.entity);
        assert_eq!(world.transform(mount.entity).unwrap().carried_entities().len(), 1);
    }

    #[test]
    fn test_riders_do_not_collide_with_mount() {
        let mut world = World::default();
        let mount = spawn(&mut world, 500.0, 500.0, 10.0);
        let rider = spawn(&mut world, 505.0, 500.0, 5.0);
        assert!(!world.detect_collisions().is_empty());

        world.mount_entity(rider.entity, mount.entity).unwrap();
        assert!(world.detect_collisions().is_empty());
    }

    #[test]
    fn test_mount_rejects_cycles_and_double_mounts() {
        let mut world = World::default();
        let a = spawn(&mut world, 500.0, 500.0, 10.0).entity;
        let b = spawn(&mut world, 600.0, 500.0, 10.0).entity;
        let c = spawn(&mut world, 700.0, 500.0, 10.0).entity;

        assert_eq!(
            world.mount_entity(a, a),
            Err(PhysicsError::CarryCycle { rider: a, mount: a })
        );
        world.mount_entity(b, a).unwrap();
        assert_eq!(world.mount_entity(b, c), Err(PhysicsError::AlreadyMounted(b)));
        assert_eq!(
            world.mount_entity(a, b),
            Err(PhysicsError::CarryCycle { rider: a, mount: b })
        );
    }

    #[test]
    fn test_carry_root_propagates_through_nested_riders() {
        let mut world = World::default();
        let a = spawn(&mut world, 500.0, 500.0, 10.0).entity;
        let b = spawn(&mut world, 520.0, 500.0, 5.0).entity;
        let c = spawn(&mut world, 540.0, 500.0, 5.0).entity;

        world.mount_entity(c, b).unwrap();
        world.mount_entity(b, a).unwrap();
        assert_eq!(world.transform(c).unwrap().carry_root(), a);

        world.dismount_entity(b).unwrap();
        assert_eq!(world.transform(b).unwrap().carry_root(), b);
        assert_eq!(world.transform(c).unwrap().carry_root(), b);
        assert_eq!(world.transform(c).unwrap().mount(), Some(b));
    }

    #[test]
    fn test_dismount_keeps_carried_velocity() {
        let mut world = World::default();
        let mount = spawn(&mut world, 500.0, 500.0, 10.0);
        let rider = spawn(&mut world, 520.0, 500.0, 5.0);
        world.mount_entity(rider.entity, mount.entity).unwrap();
        world.set_hitbox_velocity(mount, Vec2::new(0.0, 120.0)).unwrap();

        world.dismount_entity(rider.entity).unwrap();
        let hitbox = world.hitbox(rider).unwrap();
        assert!(hitbox.parent.is_none());
        assert_relative_eq!(world.get_hitbox_velocity(rider).unwrap(), Vec2::new(0.0, 120.0), epsilon = 1e-2);
        assert!(world.transform(mount.entity).unwrap().carried_entities().is_empty());
        assert_eq!(world.transform(rider.entity).unwrap().mount(), None);
    }

    #[test]
    fn test_removing_mount_drops_riders() {
        let mut world = World::default();
        let mount = spawn(&mut world, 500.0, 500.0, 10.0);
        let rider = spawn(&mut world, 520.0, 500.0, 5.0);
        world.mount_entity(rider.entity, mount.entity).unwrap();

        world.remove_entity(mount.entity).unwrap();
        let transform = world.transform(rider.entity).unwrap();
        assert_eq!(transform.mount(), None);
        assert_eq!(transform.root_hitboxes(), &[rider.local_id]);
    }
}
