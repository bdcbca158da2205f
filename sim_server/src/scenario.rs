//! Arena scenario: creatures, projectiles, walls and trees

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;
use hitbox_engine::ecs::component::{EntityCollisionEvent, HitboxCollisionEvent};
use hitbox_engine::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// How long a projectile lives, flying or lodged
const PROJECTILE_LIFETIME_SECONDS: u64 = 3;
/// Seconds between creature target changes
const WANDER_INTERVAL_SECONDS: u64 = 2;
const PROJECTILE_SPEED: f32 = 600.0;
const CREATURE_ACCELERATION: f32 = 240.0;
const CREATURE_DRAG: f32 = 1.5;

/// Knobs exposed on the command line
#[derive(Debug, Clone, Copy)]
pub struct ArenaSettings {
    /// Creatures spawned at startup
    pub creatures: usize,
    /// Projectiles fired per simulated second
    pub projectiles_per_second: usize,
    /// RNG seed
    pub seed: u64,
}

/// Events reported by collision listeners since the last summary
#[derive(Debug, Default)]
struct ArenaEvents {
    lodged: usize,
    creature_hits: usize,
    shattered: usize,
}

/// Projectiles lodge into anything with health and shatter on walls
struct ProjectileListener {
    events: Rc<RefCell<ArenaEvents>>,
}

impl CollisionListener for ProjectileListener {
    fn on_hitbox_collision(&mut self, world: &mut World, event: &HitboxCollisionEvent) {
        if !world.components(event.colliding.entity).contains(ComponentSet::HEALTH) {
            return;
        }
        let already_lodged = world
            .hitbox(event.affected)
            .map_or(true, |hitbox| hitbox.parent.is_some());
        if already_lodged {
            return;
        }

        if let Err(e) = world.attach_hitbox_in_place(event.affected, event.colliding, false) {
            log::warn!("Projectile {} failed to lodge: {}", event.affected, e);
            return;
        }
        // Lodged projectiles ride along quietly and stop listening
        if let Ok(hitbox) = world.hitbox_mut(event.affected) {
            hitbox.flags.remove(HitboxFlags::BOUNCY);
            hitbox.collision_type = HitboxCollisionType::Soft;
        }
        if let Err(e) = world.set_components(event.affected.entity, ComponentSet::empty()) {
            log::warn!("Projectile {:?} lost its components: {}", event.affected.entity, e);
        }
        self.events.borrow_mut().lodged += 1;
    }

    fn on_wall_collision(&mut self, world: &mut World, entity: Entity, _hitbox: HitboxRef) {
        world.queue_removal(entity);
        self.events.borrow_mut().shattered += 1;
    }
}

/// Counts projectile hits taken by creatures
struct HealthListener {
    events: Rc<RefCell<ArenaEvents>>,
}

impl CollisionListener for HealthListener {
    fn on_entity_collision(&mut self, world: &mut World, event: &EntityCollisionEvent<'_>) {
        if world.components(event.colliding).contains(ComponentSet::PROJECTILE) {
            self.events.borrow_mut().creature_hits += 1;
        }
    }
}

struct Creature {
    body: HitboxRef,
    target: Vec2,
}

/// Running totals between per-second summaries
#[derive(Debug, Default)]
struct SecondTotals {
    entity_pairs: usize,
    hitbox_pairs: usize,
    wall_collisions: usize,
    border_corrections: usize,
    removed: usize,
}

/// A walled pen with wandering creatures under fire
pub struct Arena {
    world: World,
    physics: PhysicsSystem,
    rng: StdRng,
    settings: ArenaSettings,
    pen_min: Vec2,
    pen_max: Vec2,
    creatures: Vec<Creature>,
    projectiles: Vec<(Entity, u64)>,
    events: Rc<RefCell<ArenaEvents>>,
    totals: SecondTotals,
}

impl Arena {
    /// Build the arena: walls, trees and creatures
    pub fn new(config: PhysicsConfig, settings: ArenaSettings) -> Result<Self> {
        let world = World::new(config)?;
        let events = Rc::new(RefCell::new(ArenaEvents::default()));

        let mut physics = PhysicsSystem::new();
        physics.register_listener(
            ComponentKind::Projectile,
            Box::new(ProjectileListener {
                events: Rc::clone(&events),
            }),
        );
        physics.register_listener(
            ComponentKind::Health,
            Box::new(HealthListener {
                events: Rc::clone(&events),
            }),
        );

        let world_size = world.config().world_size();
        let mut arena = Self {
            world,
            physics,
            rng: StdRng::seed_from_u64(settings.seed),
            settings,
            pen_min: Vec2::new(world_size * 0.25, world_size * 0.25),
            pen_max: Vec2::new(world_size * 0.5, world_size * 0.5),
            creatures: Vec::new(),
            projectiles: Vec::new(),
            events,
            totals: SecondTotals::default(),
        };

        arena.build_walls()?;
        arena.plant_trees(12)?;
        for _ in 0..settings.creatures {
            arena.spawn_creature()?;
        }
        log::info!(
            "Arena ready: {} wall subtiles, {} entities",
            arena.world.layer(0).map_or(0, Layer::wall_subtile_count),
            arena.world.entity_count()
        );
        Ok(arena)
    }

    fn build_walls(&mut self) -> Result<()> {
        let subtile_size = self.world.config().subtile_size();
        let min = (self.pen_min.x / subtile_size) as i32 - 1;
        let max = (self.pen_max.x / subtile_size) as i32;
        let layer = self
            .world
            .layer_mut(0)
            .ok_or(PhysicsError::MissingLayer(0))?;
        for i in min..=max {
            layer.set_wall_subtile(i, min, true);
            layer.set_wall_subtile(i, max, true);
            layer.set_wall_subtile(min, i, true);
            layer.set_wall_subtile(max, i, true);
        }
        Ok(())
    }

    fn random_point(&mut self, margin: f32) -> Vec2 {
        Vec2::new(
            self.rng.gen_range(self.pen_min.x + margin..self.pen_max.x - margin),
            self.rng.gen_range(self.pen_min.y + margin..self.pen_max.y - margin),
        )
    }

    fn plant_trees(&mut self, count: usize) -> Result<()> {
        for _ in 0..count {
            let position = self.random_point(64.0);
            let radius = self.rng.gen_range(18.0..32.0);
            let tree = self.world.create_entity(0, CollisionGroup::Structure)?;
            self.world.add_hitbox(
                tree,
                Hitbox::new(CollisionBox::circular(position, radius))
                    .with_collision_bits(CollisionBits::STRUCTURE, CollisionBits::all())
                    .as_static(),
                None,
            )?;
            self.world.set_components(tree, ComponentSet::STRUCTURE)?;
            self.world.join(tree)?;
        }
        Ok(())
    }

    fn spawn_creature(&mut self) -> Result<()> {
        let position = self.random_point(48.0);
        let entity = self.world.create_entity(0, CollisionGroup::Default)?;

        let body = self.world.add_hitbox(
            entity,
            Hitbox::new(CollisionBox::circular(position, 16.0)).with_mass(4.0),
            None,
        )?;
        self.world.add_hitbox(
            entity,
            Hitbox::new(CollisionBox::circular(Vec2::zeros(), 8.0).with_offset(Vec2::new(22.0, 0.0)))
                .with_flags(HitboxFlags::PART_OF_PARENT),
            Some(body),
        )?;

        let body = HitboxRef::new(entity, body);
        self.world.add_hitbox(
            entity,
            Hitbox::new(CollisionBox::circular(position - Vec2::new(28.0, 0.0), 6.0))
                .with_mass(0.5)
                .with_collision_type(HitboxCollisionType::Soft)
                .with_tether(Tether::new(body, 28.0, 60.0, 3.0))
                .with_angular_tether(AngularTether::new(body, 0.0, 20.0, 2.0, 0.3)),
            None,
        )?;

        self.world.set_components(entity, ComponentSet::HEALTH)?;
        self.world.join(entity)?;
        let target = self.random_point(48.0);
        self.creatures.push(Creature { body, target });
        Ok(())
    }

    fn fire_projectile(&mut self) -> Result<()> {
        if self.creatures.is_empty() {
            return Ok(());
        }
        let target_index = self.rng.gen_range(0..self.creatures.len());
        let (target, _) = self.world.hitbox_pose(self.creatures[target_index].body)?;
        let origin = self.random_point(24.0);
        let offset = target - origin;
        if offset.norm_squared() < 1.0 {
            return Ok(());
        }
        let direction = offset.normalize();

        let entity = self.world.create_entity(0, CollisionGroup::Projectile)?;
        let local_id = self.world.add_hitbox(
            entity,
            Hitbox::new(
                CollisionBox::rectangular(origin, 14.0, 3.0).with_relative_angle(direction.y.atan2(direction.x)),
            )
            .with_mass(0.2)
            .with_collision_bits(
                CollisionBits::PROJECTILE,
                CollisionBits::DEFAULT | CollisionBits::STRUCTURE,
            )
            .with_flags(HitboxFlags::BOUNCY),
            None,
        )?;
        self.world.set_components(entity, ComponentSet::PROJECTILE)?;
        self.world.join(entity)?;
        self.world
            .set_hitbox_velocity(HitboxRef::new(entity, local_id), direction * PROJECTILE_SPEED)?;

        self.projectiles.push((entity, self.world.tick()));
        Ok(())
    }

    fn drive_creatures(&mut self) -> Result<(), PhysicsError> {
        let ticks_per_second = u64::from(self.world.config().ticks_per_second);
        let retarget = self.world.tick() % (WANDER_INTERVAL_SECONDS * ticks_per_second) == 0;

        for index in 0..self.creatures.len() {
            if retarget {
                let target = self.random_point(48.0);
                self.creatures[index].target = target;
            }
            let creature = &self.creatures[index];
            let body = creature.body;
            let (position, _) = self.world.hitbox_pose(body)?;
            let offset = creature.target - position;
            let velocity = self.world.get_hitbox_velocity(body)?;

            let mut acceleration = -velocity * CREATURE_DRAG;
            if offset.norm_squared() > 16.0 {
                let direction = offset.normalize();
                acceleration += direction * CREATURE_ACCELERATION;
                self.world
                    .turn_hitbox_to_angle(body, direction.y.atan2(direction.x), 40.0, 8.0, false)?;
            }
            self.world.apply_acceleration(body, acceleration)?;
        }
        Ok(())
    }

    fn expire_projectiles(&mut self) {
        let lifetime = PROJECTILE_LIFETIME_SECONDS * u64::from(self.world.config().ticks_per_second);
        let now = self.world.tick();
        let world = &mut self.world;
        self.projectiles.retain(|&(entity, spawned)| {
            if !world.contains(entity) {
                return false;
            }
            if now.saturating_sub(spawned) >= lifetime {
                world.queue_removal(entity);
                return false;
            }
            true
        });
    }

    /// Run one server tick: AI, spawning, then physics
    pub fn step(&mut self) -> Result<TickReport> {
        let ticks_per_second = u64::from(self.world.config().ticks_per_second);
        let tick = self.world.tick();

        self.drive_creatures()?;
        if self.settings.projectiles_per_second > 0 {
            let interval = (ticks_per_second / self.settings.projectiles_per_second as u64).max(1);
            if tick % interval == 0 {
                self.fire_projectile()?;
            }
        }
        self.expire_projectiles();

        let report = self.physics.update(&mut self.world)?;
        self.totals.entity_pairs += report.colliding_entity_pairs;
        self.totals.hitbox_pairs += report.resolved_hitbox_pairs;
        self.totals.wall_collisions += report.wall_collisions;
        self.totals.border_corrections += report.border_corrections;
        self.totals.removed += report.removed_entities;

        if (tick + 1) % ticks_per_second == 0 {
            self.log_second((tick + 1) / ticks_per_second);
        }
        Ok(report)
    }

    fn log_second(&mut self, second: u64) {
        let totals = std::mem::take(&mut self.totals);
        let events = std::mem::take(&mut *self.events.borrow_mut());
        log::info!(
            "Second {}: {} entities, {} entity pairs, {} hitbox pairs, {} wall hits, {} border fixes, {} removed",
            second,
            self.world.entity_count(),
            totals.entity_pairs,
            totals.hitbox_pairs,
            totals.wall_collisions,
            totals.border_corrections,
            totals.removed
        );
        log::info!(
            "Second {}: {} projectiles lodged, {} creature hits, {} shattered on walls",
            second,
            events.lodged,
            events.creature_hits,
            events.shattered
        );
    }

    /// Log where every creature ended up
    pub fn log_summary(&self) {
        log::info!(
            "Simulation finished after {} ticks with {} entities",
            self.world.tick(),
            self.world.entity_count()
        );
        for creature in &self.creatures {
            if let Ok((position, angle)) = self.world.hitbox_pose(creature.body) {
                log::debug!(
                    "Creature {:?} at ({:.1}, {:.1}) facing {:.2}",
                    creature.body.entity,
                    position.x,
                    position.y,
                    angle
                );
            }
        }
    }
}
