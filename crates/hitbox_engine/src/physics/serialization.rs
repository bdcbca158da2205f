//! Transform snapshots
//!
//! A [`TransformSnapshot`] is a flat, pointer-free copy of an entity's
//! hitbox tree. Hitboxes are listed parents first and reference their parent
//! by local ID, so a decoder can rebuild the tree in one forward pass.
//! Parents owned by other entities are kept as full [`HitboxRef`]s and linked
//! once the owning entity exists, see [`World::link_external_parents`].
//!
//! Tethers are not part of a snapshot; they point at other entities'
//! hitboxes and are re-created by gameplay code.

use serde::{Deserialize, Serialize};

use crate::ecs::components::TransformComponent;
use crate::ecs::{Entity, World};
use crate::foundation::math::Vec2;
use crate::physics::collision::{BoxShape, CollisionBox};
use crate::physics::collision_layers::CollisionBits;
use crate::physics::error::{PhysicsError, SnapshotError};
use crate::physics::hitbox::{Hitbox, HitboxCollisionType, HitboxFlags, HitboxLocalId, HitboxRef};
use crate::spatial::{CollisionGroup, LayerId};

/// Shape-specific snapshot fields
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ShapeSnapshot {
    /// Circle
    Circular {
        /// Unscaled radius
        radius: f32,
    },
    /// Rectangle
    Rectangular {
        /// Unscaled width
        width: f32,
        /// Unscaled height
        height: f32,
    },
}

/// Where a snapshot hitbox hangs from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParentRef {
    /// Hitbox earlier in the same snapshot
    Local(HitboxLocalId),
    /// Hitbox owned by another entity
    External(HitboxRef),
}

/// Full state of one hitbox
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitboxSnapshot {
    /// Local ID within the owning entity
    pub local_id: HitboxLocalId,
    /// Absolute position
    pub position: Vec2,
    /// Position on the previous tick, carries the velocity
    pub previous_position: Vec2,
    /// Absolute angle
    pub angle: f32,
    /// Angle relative to the parent
    pub relative_angle: f32,
    /// Relative angle on the previous tick
    pub previous_relative_angle: f32,
    /// Offset from the parent
    pub offset: Vec2,
    /// Dimension multiplier
    pub scale: f32,
    /// Mass
    pub mass: f32,
    /// Hard or soft
    pub collision_type: HitboxCollisionType,
    /// Raw [`CollisionBits`] identifying the hitbox
    pub collision_bit: u32,
    /// Raw [`CollisionBits`] the hitbox reacts to
    pub collision_mask: u32,
    /// Raw [`HitboxFlags`]
    pub flags: u32,
    /// Never moved by integration or collisions
    pub is_static: bool,
    /// Parent, if any
    pub parent: Option<ParentRef>,
    /// Shape and dimensions
    pub shape: ShapeSnapshot,
}

/// Full state of one transform, hitboxes parents first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformSnapshot {
    /// Layer the entity lives on
    pub layer: LayerId,
    /// Broad-phase collision group
    pub collision_group: CollisionGroup,
    /// Entity position
    pub position: Vec2,
    /// Entity rotation
    pub rotation: f32,
    /// Self-propelled velocity
    pub self_velocity: Vec2,
    /// Externally imposed velocity
    pub external_velocity: Vec2,
    /// Hitboxes, every parent before its children
    pub hitboxes: Vec<HitboxSnapshot>,
}

impl TransformSnapshot {
    /// Encode as pretty-printed RON
    pub fn to_ron(&self) -> Result<String, SnapshotError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| SnapshotError::Encode(e.to_string()))
    }

    /// Decode from RON
    pub fn from_ron(text: &str) -> Result<Self, SnapshotError> {
        ron::from_str(text).map_err(|e| SnapshotError::Decode(e.to_string()))
    }
}

/// A decoded hitbox waiting to be attached to another entity's hitbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalParent {
    /// Decoded hitbox
    pub child: HitboxLocalId,
    /// Parent owned by another entity
    pub parent: HitboxRef,
}

impl HitboxSnapshot {
    fn capture(hitbox: &Hitbox, owner: Entity) -> Self {
        let collision_box = &hitbox.collision_box;
        let shape = match collision_box.shape {
            BoxShape::Circular(circle) => ShapeSnapshot::Circular { radius: circle.radius },
            BoxShape::Rectangular(rect) => ShapeSnapshot::Rectangular {
                width: rect.width,
                height: rect.height,
            },
        };
        let parent = hitbox.parent.map(|parent| {
            if parent.entity == owner {
                ParentRef::Local(parent.local_id)
            } else {
                ParentRef::External(parent)
            }
        });

        Self {
            local_id: hitbox.local_id,
            position: collision_box.position,
            previous_position: hitbox.previous_position,
            angle: collision_box.angle,
            relative_angle: collision_box.relative_angle,
            previous_relative_angle: hitbox.previous_relative_angle,
            offset: collision_box.offset,
            scale: collision_box.scale,
            mass: hitbox.mass,
            collision_type: hitbox.collision_type,
            collision_bit: hitbox.collision_bit.bits(),
            collision_mask: hitbox.collision_mask.bits(),
            flags: hitbox.flags.bits(),
            is_static: hitbox.is_static,
            parent,
            shape,
        }
    }

    fn restore(&self) -> Hitbox {
        let mut collision_box = match self.shape {
            ShapeSnapshot::Circular { radius } => CollisionBox::circular(self.position, radius),
            ShapeSnapshot::Rectangular { width, height } => CollisionBox::rectangular(self.position, width, height),
        };
        collision_box.angle = self.angle;
        collision_box.relative_angle = self.relative_angle;
        collision_box.offset = self.offset;
        collision_box.scale = self.scale;
        collision_box.refresh_geometry();

        let mut hitbox = Hitbox::new(collision_box)
            .with_mass(self.mass)
            .with_collision_type(self.collision_type)
            .with_collision_bits(
                CollisionBits::from_bits_truncate(self.collision_bit),
                CollisionBits::from_bits_truncate(self.collision_mask),
            )
            .with_flags(HitboxFlags::from_bits_truncate(self.flags));
        hitbox.is_static = self.is_static;
        hitbox.previous_position = self.previous_position;
        hitbox.previous_relative_angle = self.previous_relative_angle;
        hitbox
    }
}

impl TransformComponent {
    /// Rebuild a transform for `entity` from a snapshot
    ///
    /// Local parents must appear before their children. Hitboxes whose parent
    /// belongs to another entity are decoded as roots and returned so the
    /// caller can link them.
    pub(crate) fn from_snapshot(
        entity: Entity,
        snapshot: &TransformSnapshot,
    ) -> Result<(Self, Vec<ExternalParent>), SnapshotError> {
        let mut transform = Self::new(entity, snapshot.layer, snapshot.collision_group);
        let mut external_parents = Vec::new();

        for hitbox in &snapshot.hitboxes {
            if transform.hitbox(hitbox.local_id).is_some() {
                return Err(SnapshotError::DuplicateLocalId(hitbox.local_id));
            }
            let local_parent = match hitbox.parent {
                Some(ParentRef::Local(parent)) => {
                    if transform.hitbox(parent).is_none() {
                        return Err(SnapshotError::MissingParent {
                            local_id: hitbox.local_id,
                            parent,
                        });
                    }
                    Some(parent)
                }
                Some(ParentRef::External(parent)) => {
                    external_parents.push(ExternalParent {
                        child: hitbox.local_id,
                        parent,
                    });
                    None
                }
                None => None,
            };
            transform.insert_hitbox_with_id(hitbox.restore(), hitbox.local_id, local_parent);
        }

        transform.position = snapshot.position;
        transform.rotation = snapshot.rotation;
        transform.self_velocity = snapshot.self_velocity;
        transform.external_velocity = snapshot.external_velocity;
        Ok((transform, external_parents))
    }
}

impl World {
    /// Capture an entity's transform, parents before children
    pub fn snapshot_transform(&self, entity: Entity) -> Result<TransformSnapshot, PhysicsError> {
        let transform = self.get_transform(entity)?;
        let mut hitboxes = Vec::with_capacity(transform.hitboxes().len());

        let mut stack: Vec<HitboxLocalId> = transform.clean_starting_points();
        stack.reverse();
        while let Some(local_id) = stack.pop() {
            let hitbox = self.hitbox(HitboxRef::new(entity, local_id))?;
            hitboxes.push(HitboxSnapshot::capture(hitbox, entity));
            stack.extend(
                hitbox
                    .children
                    .iter()
                    .rev()
                    .filter(|child| child.entity == entity)
                    .map(|child| child.local_id),
            );
        }

        Ok(TransformSnapshot {
            layer: transform.layer(),
            collision_group: transform.collision_group(),
            position: transform.position,
            rotation: transform.rotation,
            self_velocity: transform.self_velocity,
            external_velocity: transform.external_velocity,
            hitboxes,
        })
    }

    /// Create a new entity from a snapshot
    ///
    /// The entity has not joined the world yet. Hitboxes whose parents live in
    /// other entities are returned unlinked.
    pub fn spawn_from_snapshot(
        &mut self,
        snapshot: &TransformSnapshot,
    ) -> Result<(Entity, Vec<ExternalParent>), SnapshotError> {
        let entity = self.create_entity(snapshot.layer, snapshot.collision_group)?;
        match TransformComponent::from_snapshot(entity, snapshot) {
            Ok((transform, external_parents)) => {
                *self.get_transform_mut(entity)? = transform;
                Ok((entity, external_parents))
            }
            Err(e) => {
                self.remove_entity(entity)?;
                Err(e)
            }
        }
    }

    /// Attach decoded hitboxes of `entity` to their parents in other entities
    ///
    /// Offsets and relative angles come from the snapshot, so each child lands
    /// where it was captured relative to its parent. Returns how many links
    /// were made.
    pub fn link_external_parents(
        &mut self,
        entity: Entity,
        external_parents: &[ExternalParent],
    ) -> Result<usize, PhysicsError> {
        for link in external_parents {
            let child = HitboxRef::new(entity, link.child);
            let is_part_of_parent = self.hitbox(child)?.is_part_of_parent();
            self.attach_hitbox(child, link.parent, is_part_of_parent)?;
        }
        Ok(external_parents.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::constants::HALF_PI;
    use approx::assert_relative_eq;

    fn build_creature(world: &mut World) -> Entity {
        let entity = world.create_entity(0, CollisionGroup::Default).unwrap();
        let body = world
            .add_hitbox(
                entity,
                Hitbox::new(CollisionBox::rectangular(Vec2::new(300.0, 300.0), 40.0, 20.0).with_relative_angle(HALF_PI))
                    .with_mass(3.0),
                None,
            )
            .unwrap();
        let head = world
            .add_hitbox(
                entity,
                Hitbox::new(CollisionBox::circular(Vec2::zeros(), 8.0).with_offset(Vec2::new(30.0, 0.0)))
                    .with_collision_type(HitboxCollisionType::Soft)
                    .with_flags(HitboxFlags::PART_OF_PARENT),
                Some(body),
            )
            .unwrap();
        world
            .add_hitbox(
                entity,
                Hitbox::new(CollisionBox::circular(Vec2::zeros(), 3.0).with_offset(Vec2::new(10.0, 0.0))),
                Some(head),
            )
            .unwrap();
        world.join(entity).unwrap();
        entity
    }

    #[test]
    fn test_snapshot_lists_parents_first() {
        let mut world = World::default();
        let entity = build_creature(&mut world);
        let snapshot = world.snapshot_transform(entity).unwrap();

        let ids: Vec<_> = snapshot.hitboxes.iter().map(|h| h.local_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(snapshot.hitboxes[0].parent, None);
        assert_eq!(snapshot.hitboxes[1].parent, Some(ParentRef::Local(1)));
        assert_eq!(snapshot.hitboxes[2].parent, Some(ParentRef::Local(2)));
    }

    #[test]
    fn test_ron_snapshot_rebuilds_hierarchy() {
        let mut world = World::default();
        let entity = build_creature(&mut world);
        world.transform_mut(entity).unwrap().self_velocity = Vec2::new(5.0, -2.0);
        let text = world.snapshot_transform(entity).unwrap().to_ron().unwrap();

        let snapshot = TransformSnapshot::from_ron(&text).unwrap();
        let (copy, external) = world.spawn_from_snapshot(&snapshot).unwrap();
        assert!(external.is_empty());
        world.join(copy).unwrap();

        let original = world.transform(entity).unwrap();
        let rebuilt = world.transform(copy).unwrap();
        assert_eq!(rebuilt.root_hitboxes(), &[1]);
        assert_relative_eq!(rebuilt.total_mass(), original.total_mass());
        assert_eq!(rebuilt.self_velocity, Vec2::new(5.0, -2.0));
        for (a, b) in original.hitboxes().iter().zip(rebuilt.hitboxes()) {
            assert_eq!(a.local_id, b.local_id);
            assert_relative_eq!(a.position(), b.position(), epsilon = 1e-4);
            assert_relative_eq!(a.angle(), b.angle(), epsilon = 1e-5);
            assert_eq!(a.collision_type, b.collision_type);
            assert_eq!(a.flags, b.flags);
            assert_eq!(a.parent.map(|p| p.local_id), b.parent.map(|p| p.local_id));
        }
        // New hitboxes continue after the decoded IDs
        let next = world
            .add_hitbox(copy, Hitbox::new(CollisionBox::circular(Vec2::new(300.0, 300.0), 1.0)), None)
            .unwrap();
        assert_eq!(next, 4);
    }

    #[test]
    fn test_child_before_parent_is_rejected() {
        let mut world = World::default();
        let entity = build_creature(&mut world);
        let mut snapshot = world.snapshot_transform(entity).unwrap();
        snapshot.hitboxes.swap(0, 1);

        let count = world.entity_count();
        assert_eq!(
            world.spawn_from_snapshot(&snapshot).unwrap_err(),
            SnapshotError::MissingParent { local_id: 2, parent: 1 }
        );
        assert_eq!(world.entity_count(), count);
    }

    #[test]
    fn test_duplicate_local_id_is_rejected() {
        let mut world = World::default();
        let entity = build_creature(&mut world);
        let mut snapshot = world.snapshot_transform(entity).unwrap();
        let duplicate = snapshot.hitboxes[0].clone();
        snapshot.hitboxes.push(duplicate);

        assert_eq!(
            world.spawn_from_snapshot(&snapshot).unwrap_err(),
            SnapshotError::DuplicateLocalId(1)
        );
    }

    #[test]
    fn test_external_parent_is_linked_after_spawn() {
        let mut world = World::default();
        let target = build_creature(&mut world);
        let arrow = world.create_entity(0, CollisionGroup::Projectile).unwrap();
        let arrow_id = world
            .add_hitbox(arrow, Hitbox::new(CollisionBox::rectangular(Vec2::new(310.0, 300.0), 12.0, 2.0)), None)
            .unwrap();
        world.join(arrow).unwrap();
        let body = HitboxRef::new(target, 1);
        world.attach_hitbox_in_place(HitboxRef::new(arrow, arrow_id), body, false).unwrap();

        let snapshot = world.snapshot_transform(arrow).unwrap();
        assert_eq!(snapshot.hitboxes[0].parent, Some(ParentRef::External(body)));

        let (copy, external) = world.spawn_from_snapshot(&snapshot).unwrap();
        assert_eq!(external, vec![ExternalParent { child: arrow_id, parent: body }]);
        assert_eq!(world.link_external_parents(copy, &external).unwrap(), 1);
        world.join(copy).unwrap();

        let copied = HitboxRef::new(copy, arrow_id);
        assert_eq!(world.hitbox(copied).unwrap().parent, Some(body));
        assert!(world.hitbox(body).unwrap().children.contains(&copied));
        assert_relative_eq!(world.hitbox(copied).unwrap().position(), Vec2::new(310.0, 300.0), epsilon = 1e-3);
    }
}
