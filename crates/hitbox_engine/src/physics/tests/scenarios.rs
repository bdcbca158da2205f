//! Physics scenarios
//!
//! Each test builds a small world, runs one piece of the tick (or a whole
//! tick through [`PhysicsSystem`]) and checks the observable outcome.

use std::cell::RefCell;
use std::rc::Rc;

use approx::assert_relative_eq;

use crate::ecs::component::{EntityCollisionEvent, HitboxCollisionEvent};
use crate::ecs::{CollisionDispatch, CollisionListener, ComponentKind, ComponentSet, Entity, World};
use crate::foundation::math::utils::rotate_vec2;
use crate::foundation::math::Vec2;
use crate::physics::{
    CollisionBox, Hitbox, HitboxCollisionType, HitboxFlags, HitboxRef, PhysicsSystem,
};
use crate::spatial::CollisionGroup;

fn spawn(world: &mut World, group: CollisionGroup, hitbox: Hitbox) -> HitboxRef {
    let entity = world.create_entity(0, group).unwrap();
    let id = world.add_hitbox(entity, hitbox, None).unwrap();
    world.join(entity).unwrap();
    HitboxRef::new(entity, id)
}

fn circle(x: f32, y: f32, radius: f32) -> Hitbox {
    Hitbox::new(CollisionBox::circular(Vec2::new(x, y), radius))
}

fn square(x: f32, y: f32, side: f32) -> Hitbox {
    Hitbox::new(CollisionBox::rectangular(Vec2::new(x, y), side, side))
}

fn assert_children_follow_parents(world: &World, entity: Entity) {
    for hitbox in world.transform(entity).unwrap().hitboxes() {
        let Some(parent) = hitbox.parent else {
            continue;
        };
        let (parent_position, parent_angle) = world.hitbox_pose(parent).unwrap();
        let offset = hitbox.collision_box.offset;
        assert_relative_eq!(
            hitbox.position(),
            parent_position + rotate_vec2(offset, parent_angle),
            epsilon = 1e-3
        );
        assert_relative_eq!(hitbox.angle(), parent_angle + hitbox.relative_angle(), epsilon = 1e-5);
        // Decompose back into the parent's frame
        let recovered = rotate_vec2(hitbox.position() - parent_position, -parent_angle);
        assert_relative_eq!(recovered, offset, epsilon = 1e-3);
    }
}

#[test]
fn test_force_displacement_scales_with_connected_mass() {
    let mut world = World::default();
    let delta_time = world.config().delta_time();

    for force in [300.0_f32, 600.0] {
        let root = spawn(&mut world, CollisionGroup::Default, circle(1000.0, 1000.0, 10.0).with_mass(2.0));
        let limb = world
            .add_hitbox(
                root.entity,
                circle(0.0, 0.0, 4.0)
                    .with_mass(3.0)
                    .with_flags(HitboxFlags::PART_OF_PARENT),
                Some(root.local_id),
            )
            .unwrap();

        let before = world.hitbox(root).unwrap().position();
        world.apply_force(HitboxRef::new(root.entity, limb), Vec2::new(force, 0.0)).unwrap();
        world.integrate_world();

        let delta = world.hitbox(root).unwrap().position() - before;
        assert_relative_eq!(delta.x, force / 5.0 * delta_time * delta_time, epsilon = 1e-4);
        assert_relative_eq!(delta.y, 0.0);
        world.remove_entity(root.entity).unwrap();
    }
}

#[test]
fn test_children_follow_parents_after_clean() {
    let mut world = World::default();
    let entity = world.create_entity(0, CollisionGroup::Default).unwrap();
    let body = world
        .add_hitbox(
            entity,
            Hitbox::new(CollisionBox::rectangular(Vec2::new(100.0, 200.0), 30.0, 20.0).with_relative_angle(0.7)),
            None,
        )
        .unwrap();
    let arm = world
        .add_hitbox(
            entity,
            Hitbox::new(
                CollisionBox::rectangular(Vec2::zeros(), 12.0, 4.0)
                    .with_offset(Vec2::new(15.0, -4.0))
                    .with_relative_angle(0.3),
            ),
            Some(body),
        )
        .unwrap();
    world
        .add_hitbox(
            entity,
            Hitbox::new(CollisionBox::circular(Vec2::zeros(), 3.0).with_offset(Vec2::new(5.0, 5.0))),
            Some(arm),
        )
        .unwrap();
    world.join(entity).unwrap();
    assert_children_follow_parents(&world, entity);

    let body = HitboxRef::new(entity, body);
    world.translate_hitbox(body, Vec2::new(30.0, -10.0)).unwrap();
    world.hitbox_mut(body).unwrap().collision_box.relative_angle = -1.2;
    world.clean_transform(entity).unwrap();
    assert_children_follow_parents(&world, entity);
    assert_relative_eq!(world.transform(entity).unwrap().position, Vec2::new(130.0, 190.0));
}

#[test]
fn test_hard_resolution_separates_once() {
    let mut world = World::default();
    let mover = spawn(&mut world, CollisionGroup::Default, square(100.0, 100.0, 40.0));
    let wall = spawn(&mut world, CollisionGroup::Default, square(130.0, 100.0, 40.0).as_static());
    let mut dispatch = CollisionDispatch::new();

    let collisions = world.detect_collisions();
    world.resolve_collisions(&collisions, &mut dispatch).unwrap();
    world.clean_dirty_transforms().unwrap();
    assert_relative_eq!(world.hitbox(mover).unwrap().position(), Vec2::new(90.0, 100.0), epsilon = 1e-4);
    assert_eq!(world.hitbox(wall).unwrap().position(), Vec2::new(130.0, 100.0));

    let separated = world.hitbox(mover).unwrap().collision_box;
    assert!(!separated.collision_result(&world.hitbox(wall).unwrap().collision_box).is_colliding);

    let collisions = world.detect_collisions();
    assert!(collisions.is_empty());
    let stats = world.resolve_collisions(&collisions, &mut dispatch).unwrap();
    assert_eq!(stats.hitbox_pairs, 0);
    assert_eq!(world.hitbox(mover).unwrap().position(), separated.position);
}

#[test]
fn test_knockback_on_static_root_is_noop() {
    let mut world = World::default();
    let root = spawn(&mut world, CollisionGroup::Structure, square(400.0, 400.0, 30.0).as_static());
    let child = world
        .add_hitbox(
            root.entity,
            Hitbox::new(CollisionBox::circular(Vec2::zeros(), 5.0).with_offset(Vec2::new(20.0, 0.0))),
            Some(root.local_id),
        )
        .unwrap();
    let child = HitboxRef::new(root.entity, child);
    let before: Vec<_> = world
        .transform(root.entity)
        .unwrap()
        .hitboxes()
        .iter()
        .map(|h| (h.position(), h.previous_position))
        .collect();

    world.apply_knockback(child, 500.0, 1.0).unwrap();
    world.apply_knockback(root, 500.0, -2.0).unwrap();
    world.integrate_world();
    world.clean_transform(root.entity).unwrap();

    let after: Vec<_> = world
        .transform(root.entity)
        .unwrap()
        .hitboxes()
        .iter()
        .map(|h| (h.position(), h.previous_position))
        .collect();
    assert_eq!(before, after);
}

#[test]
fn test_velocity_round_trip() {
    let mut world = World::default();
    let root = spawn(&mut world, CollisionGroup::Default, circle(500.0, 500.0, 10.0));
    let child = world
        .add_hitbox(root.entity, circle(0.0, 0.0, 2.0), Some(root.local_id))
        .unwrap();

    for velocity in [Vec2::new(37.5, -12.25), Vec2::zeros(), Vec2::new(-900.0, 450.0)] {
        world.set_hitbox_velocity(root, velocity).unwrap();
        assert_relative_eq!(world.get_hitbox_velocity(root).unwrap(), velocity, epsilon = 1e-2);
        // Children report their root's velocity
        let child = HitboxRef::new(root.entity, child);
        assert_relative_eq!(world.get_hitbox_velocity(child).unwrap(), velocity, epsilon = 1e-2);
    }
}

#[test]
fn test_soft_collision_push_force() {
    let mut world = World::default();
    let k = world.config().soft_push_force_constant;
    let affected = spawn(
        &mut world,
        CollisionGroup::Default,
        circle(500.0, 500.0, 10.0).with_collision_type(HitboxCollisionType::Soft),
    );
    let colliding = spawn(
        &mut world,
        CollisionGroup::Default,
        circle(515.0, 500.0, 10.0)
            .with_collision_type(HitboxCollisionType::Soft)
            .with_mass(2.0),
    );

    let collisions = world.detect_collisions();
    let info = collisions.find(affected.entity, colliding.entity).unwrap();
    assert_eq!(info.hitbox_pairs.len(), 1);
    let overlap = info.hitbox_pairs[0].overlap;
    assert_relative_eq!(overlap, Vec2::new(-5.0, 0.0), epsilon = 1e-4);

    world.resolve_collisions(&collisions, &mut CollisionDispatch::new()).unwrap();
    assert_relative_eq!(
        world.hitbox(affected).unwrap().acceleration,
        overlap * k * 2.0,
        epsilon = 1e-2
    );
    // Soft collisions push through forces only
    assert_eq!(world.hitbox(affected).unwrap().position(), Vec2::new(500.0, 500.0));
    assert_relative_eq!(
        world.hitbox(colliding).unwrap().acceleration,
        Vec2::new(5.0, 0.0) * k * 1.0 / 2.0,
        epsilon = 1e-2
    );
}

#[test]
fn test_hard_collision_removes_normal_velocity() {
    let mut world = World::default();
    let mut physics = PhysicsSystem::new();
    let mover = spawn(&mut world, CollisionGroup::Default, square(100.0, 100.0, 40.0));
    spawn(&mut world, CollisionGroup::Default, square(138.0, 100.0, 40.0).as_static());
    world.set_hitbox_velocity(mover, Vec2::new(100.0, 30.0)).unwrap();

    let report = physics.update(&mut world).unwrap();
    assert_eq!(report.colliding_entity_pairs, 2);
    let velocity = world.get_hitbox_velocity(mover).unwrap();
    assert_relative_eq!(velocity.x, 0.0, epsilon = 1e-2);
    assert_relative_eq!(velocity.y, 30.0, epsilon = 1e-2);
    assert_relative_eq!(world.hitbox(mover).unwrap().position().x, 98.0, epsilon = 1e-3);
}

#[test]
fn test_force_on_chain_lands_on_root() {
    let mut world = World::default();
    let a = spawn(&mut world, CollisionGroup::Default, circle(600.0, 600.0, 10.0).with_mass(1.0));
    let part = |mass| circle(0.0, 0.0, 3.0).with_mass(mass).with_flags(HitboxFlags::PART_OF_PARENT);
    let b = world.add_hitbox(a.entity, part(2.0), Some(a.local_id)).unwrap();
    let c = world.add_hitbox(a.entity, part(3.0), Some(b)).unwrap();

    world.apply_force(HitboxRef::new(a.entity, c), Vec2::new(60.0, -12.0)).unwrap();
    assert_relative_eq!(world.hitbox(a).unwrap().acceleration, Vec2::new(10.0, -2.0), epsilon = 1e-5);
    assert_eq!(world.hitbox(HitboxRef::new(a.entity, b)).unwrap().acceleration, Vec2::zeros());
    assert_eq!(world.hitbox(HitboxRef::new(a.entity, c)).unwrap().acceleration, Vec2::zeros());
}

struct Recorder {
    log: Rc<RefCell<Vec<&'static str>>>,
}

impl CollisionListener for Recorder {
    fn on_hitbox_collision(&mut self, world: &mut World, event: &HitboxCollisionEvent) {
        assert!(world.contains(event.colliding.entity));
        self.log.borrow_mut().push("hitbox");
    }

    fn on_entity_collision(&mut self, world: &mut World, event: &EntityCollisionEvent<'_>) {
        self.log.borrow_mut().push("entity");
        world.queue_removal(event.affected);
    }
}

#[test]
fn test_listeners_fire_in_order_and_removal_is_deferred() {
    crate::foundation::logging::init_for_tests();
    let mut world = World::default();
    let mut physics = PhysicsSystem::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    physics.register_listener(ComponentKind::Projectile, Box::new(Recorder { log: Rc::clone(&log) }));

    spawn(&mut world, CollisionGroup::Default, circle(500.0, 500.0, 10.0));
    let arrow = spawn(
        &mut world,
        CollisionGroup::Projectile,
        Hitbox::new(CollisionBox::rectangular(Vec2::new(505.0, 500.0), 12.0, 2.0)),
    );
    world.set_components(arrow.entity, ComponentSet::PROJECTILE).unwrap();

    let report = physics.update(&mut world).unwrap();
    assert_eq!(*log.borrow(), vec!["hitbox", "entity"]);
    assert_eq!(report.colliding_entity_pairs, 2);
    assert_eq!(report.removed_entities, 1);
    assert!(!world.contains(arrow.entity));
    assert_eq!(world.tick(), 1);
}

#[test]
fn test_tick_resolves_walls_after_integration() {
    crate::foundation::logging::init_for_tests();
    let mut world = World::default();
    let mut physics = PhysicsSystem::new();
    world.layer_mut(0).unwrap().set_wall_subtile(10, 10, true);
    let mover = spawn(&mut world, CollisionGroup::Default, circle(150.0, 168.0, 8.0));
    world.set_hitbox_velocity(mover, Vec2::new(240.0, 0.0)).unwrap();

    let report = physics.update(&mut world).unwrap();
    assert_eq!(report.wall_collisions, 1);
    assert_eq!(report.moved_entities, 1);
    assert_relative_eq!(world.hitbox(mover).unwrap().position(), Vec2::new(152.0, 168.0), epsilon = 1e-3);
    assert_relative_eq!(world.get_hitbox_velocity(mover).unwrap().x, 0.0, epsilon = 1e-2);
}
