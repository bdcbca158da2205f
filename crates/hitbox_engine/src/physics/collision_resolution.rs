//! Collision resolution
//!
//! Consumes a [`GlobalCollisionInfo`] pair by pair. For each overlapping
//! hitbox pair the affected entity's listeners see the collision first, then
//! the affected hitbox's root is corrected:
//!
//! - hard hitboxes are translated out by the full overlap and lose the
//!   velocity component along the overlap normal (bouncy ones reflect it);
//! - soft hitboxes get a push force of
//!   `overlap * soft_push_force_constant * colliding mass`.
//!
//! Static roots are never moved, but their listeners still fire. A pair
//! whose hitboxes a listener joined into one hierarchy is not corrected.

use crate::ecs::component::{CollisionDispatch, EntityCollisionEvent, HitboxCollisionEvent};
use crate::ecs::{Entity, World};
use crate::foundation::math::utils::perpendicular;
use crate::foundation::math::Vec2;
use crate::physics::collision_system::{EntityCollisionInfo, GlobalCollisionInfo};
use crate::physics::error::PhysicsError;
use crate::physics::hitbox::{HitboxCollisionType, HitboxFlags, HitboxRef};

/// Counts from one resolution pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionStats {
    /// Entity pairs processed
    pub entity_pairs: usize,
    /// Hitbox pairs that went through resolution
    pub hitbox_pairs: usize,
    /// Hitbox pairs skipped because the hitboxes are tethered together
    pub tethered_pairs: usize,
}

impl World {
    /// Resolve every detected collision in detection order
    pub fn resolve_collisions(
        &mut self,
        info: &GlobalCollisionInfo,
        dispatch: &mut CollisionDispatch,
    ) -> Result<ResolutionStats, PhysicsError> {
        let mut stats = ResolutionStats::default();
        for pair in info.pairs() {
            let Some(collision) = info.find(pair.affected, pair.colliding) else {
                continue;
            };
            self.resolve_entity_collision(pair.affected, collision, dispatch, &mut stats)?;
            stats.entity_pairs += 1;
        }
        log::trace!(
            "Resolved {} hitbox pairs across {} entity pairs",
            stats.hitbox_pairs,
            stats.entity_pairs
        );
        Ok(stats)
    }

    fn resolve_entity_collision(
        &mut self,
        affected: Entity,
        collision: &EntityCollisionInfo,
        dispatch: &mut CollisionDispatch,
        stats: &mut ResolutionStats,
    ) -> Result<(), PhysicsError> {
        let colliding = collision.colliding_entity;
        let components = self.components(affected);
        let soft_push_force_constant = self.config().soft_push_force_constant;

        for pair in &collision.hitbox_pairs {
            let affected_ref = HitboxRef::new(affected, pair.affected);
            let colliding_ref = HitboxRef::new(colliding, pair.colliding);
            if self.hitboxes_are_tethered(affected_ref, colliding_ref)? {
                stats.tethered_pairs += 1;
                continue;
            }

            let collision_point = (self.hitbox(affected_ref)?.position() + self.hitbox(colliding_ref)?.position()) * 0.5;
            let event = HitboxCollisionEvent {
                affected: affected_ref,
                colliding: colliding_ref,
                collision_point,
                overlap: pair.overlap,
            };
            dispatch.dispatch_hitbox_collision(self, components, &event);

            // Listeners may have detached or re-parented the hitbox
            if self.share_root(affected_ref, colliding_ref) {
                stats.hitbox_pairs += 1;
                continue;
            }
            let root = self.get_root_hitbox(affected_ref)?;
            if !self.hitbox(root)?.is_static {
                let affected_hitbox = self.hitbox(affected_ref)?;
                let collision_type = affected_hitbox.collision_type;
                let bounce = affected_hitbox.flags.contains(HitboxFlags::BOUNCY);
                match collision_type {
                    HitboxCollisionType::Hard => {
                        self.resolve_hard_collision(affected_ref, pair.overlap, bounce)?;
                    }
                    HitboxCollisionType::Soft => {
                        let colliding_mass = self.hitbox(colliding_ref)?.mass;
                        let force = pair.overlap * soft_push_force_constant * colliding_mass;
                        self.apply_force(affected_ref, force)?;
                    }
                }
                self.get_transform_mut(affected)?.mark_dirty();
            }
            stats.hitbox_pairs += 1;
        }

        let event = EntityCollisionEvent {
            affected,
            colliding,
            hitbox_pairs: &collision.hitbox_pairs,
        };
        dispatch.dispatch_entity_collision(self, components, &event);
        Ok(())
    }

    /// Whether either hitbox has a positional tether to the other
    pub fn hitboxes_are_tethered(&self, a: HitboxRef, b: HitboxRef) -> Result<bool, PhysicsError> {
        Ok(self.hitbox(a)?.is_tethered_to(b) || self.hitbox(b)?.is_tethered_to(a))
    }

    /// Push a hitbox's root out by `overlap` and cancel (or reflect) its normal velocity
    ///
    /// The tangential component of the root's velocity is kept. A zero
    /// overlap has no normal and is rejected.
    pub fn resolve_hard_collision(&mut self, hitbox: HitboxRef, overlap: Vec2, bounce: bool) -> Result<(), PhysicsError> {
        let magnitude = overlap.magnitude();
        if magnitude <= 0.0 {
            return Err(PhysicsError::ZeroOverlap(hitbox));
        }

        let root = self.get_root_hitbox(hitbox)?;
        self.translate_hitbox(root, overlap)?;

        let normal = overlap / magnitude;
        let tangent = perpendicular(normal);
        let velocity = self.get_hitbox_velocity(root)?;
        let tangential = tangent * velocity.dot(&tangent);
        let new_velocity = if bounce {
            tangential - normal * velocity.dot(&normal)
        } else {
            tangential
        };
        self.set_hitbox_velocity(root, new_velocity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{ComponentKind, ComponentSet};
    use crate::ecs::component::CollisionListener;
    use crate::physics::collision::CollisionBox;
    use crate::physics::hitbox::Hitbox;
    use crate::spatial::CollisionGroup;
    use approx::assert_relative_eq;

    struct Lodger;

    impl CollisionListener for Lodger {
        fn on_hitbox_collision(&mut self, world: &mut World, event: &HitboxCollisionEvent) {
            if world.hitbox(event.affected).unwrap().parent.is_none() {
                world.attach_hitbox_in_place(event.affected, event.colliding, false).unwrap();
            }
        }
    }

    fn spawn(world: &mut World, hitbox: Hitbox) -> HitboxRef {
        let entity = world.create_entity(0, CollisionGroup::Default).unwrap();
        let id = world.add_hitbox(entity, hitbox, None).unwrap();
        world.join(entity).unwrap();
        HitboxRef::new(entity, id)
    }

    #[test]
    fn test_zero_overlap_is_rejected() {
        let mut world = World::default();
        let hitbox = spawn(&mut world, Hitbox::new(CollisionBox::circular(Vec2::new(500.0, 500.0), 5.0)));
        assert_eq!(
            world.resolve_hard_collision(hitbox, Vec2::zeros(), false),
            Err(PhysicsError::ZeroOverlap(hitbox))
        );
    }

    #[test]
    fn test_bounce_reflects_normal_velocity() {
        let mut world = World::default();
        let hitbox = spawn(&mut world, Hitbox::new(CollisionBox::circular(Vec2::new(500.0, 500.0), 5.0)));
        world.set_hitbox_velocity(hitbox, Vec2::new(90.0, 30.0)).unwrap();

        world.resolve_hard_collision(hitbox, Vec2::new(-2.0, 0.0), true).unwrap();
        assert_relative_eq!(world.hitbox(hitbox).unwrap().position(), Vec2::new(498.0, 500.0), epsilon = 1e-4);
        assert_relative_eq!(world.get_hitbox_velocity(hitbox).unwrap(), Vec2::new(-90.0, 30.0), epsilon = 1e-2);
    }

    #[test]
    fn test_tethered_pair_is_skipped() {
        let mut world = World::default();
        let a = spawn(&mut world, Hitbox::new(CollisionBox::circular(Vec2::new(500.0, 500.0), 10.0)));
        let b = spawn(&mut world, Hitbox::new(CollisionBox::circular(Vec2::new(510.0, 500.0), 10.0)));
        world
            .hitbox_mut(b)
            .unwrap()
            .tethers
            .push(crate::physics::tether::Tether::new(a, 10.0, 1.0, 0.0));

        let info = world.detect_collisions();
        assert_eq!(info.len(), 2);
        let stats = world.resolve_collisions(&info, &mut CollisionDispatch::new()).unwrap();
        assert_eq!(stats.tethered_pairs, 2);
        assert_eq!(stats.hitbox_pairs, 0);
        assert_eq!(world.hitbox(a).unwrap().position(), Vec2::new(500.0, 500.0));
    }

    #[test]
    fn test_pair_joined_by_listener_is_not_resolved() {
        let mut world = World::default();
        let target = spawn(
            &mut world,
            Hitbox::new(CollisionBox::circular(Vec2::new(500.0, 500.0), 10.0))
                .with_collision_type(HitboxCollisionType::Soft),
        );
        let arrow = spawn(&mut world, Hitbox::new(CollisionBox::circular(Vec2::new(512.0, 500.0), 5.0)));
        world.set_components(arrow.entity, ComponentSet::PROJECTILE).unwrap();
        world.set_hitbox_velocity(target, Vec2::new(40.0, 0.0)).unwrap();

        let mut dispatch = CollisionDispatch::new();
        dispatch.register(ComponentKind::Projectile, Box::new(Lodger));
        let info = world.detect_collisions();
        world.resolve_collisions(&info, &mut dispatch).unwrap();

        assert_eq!(world.get_root_hitbox(arrow).unwrap(), target);
        assert_eq!(world.hitbox(target).unwrap().position(), Vec2::new(500.0, 500.0));
        assert_relative_eq!(world.get_hitbox_velocity(target).unwrap(), Vec2::new(40.0, 0.0), epsilon = 1e-2);
    }
}
