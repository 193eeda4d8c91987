//! Physics systems - integrate positions and resolve collisions.

use bevy_ecs::prelude::*;

use crate::components::*;
use crate::config::SimConfig;

/// Resource containing the delta time for the current tick.
#[derive(Resource, Default)]
pub struct DeltaTime(pub f32);

/// Integrate every position, then apply gravity and grounding.
/// Pushes the new transform to the renderable when the entity moved.
pub fn movement_system(
    dt: Res<DeltaTime>,
    config: Res<SimConfig>,
    mut query: Query<(
        &mut PositionComponent,
        Option<&mut PhysicsComponent>,
        Option<&mut Renderable>,
    )>,
) {
    let delta = dt.0;
    for (mut pos, physics, renderable) in query.iter_mut() {
        let moved = pos.update(delta);
        if let Some(mut physics) = physics {
            physics.update(delta, &mut pos, config.ground_height);
        }
        if let Some(mut renderable) = renderable {
            if moved || renderable.y != pos.y || renderable.rotation_y != pos.direction {
                renderable.set_transform(&pos);
            }
        }
    }
}

/// Pairwise collision detection and resolution.
///
/// Contact lists were cleared by [`movement_system`] earlier in the tick and
/// are repopulated here.
pub fn collision_system(
    mut query: Query<(
        &EntityInfo,
        &mut PositionComponent,
        &mut PhysicsComponent,
        Option<&mut Renderable>,
    )>,
) {
    let mut pairs = query.iter_combinations_mut();
    while let Some([(a_info, mut a_pos, mut a_body, a_render), (b_info, mut b_pos, mut b_body, b_render)]) =
        pairs.fetch_next()
    {
        if a_body.is_static && b_body.is_static {
            continue;
        }
        if !a_body.check_collision(&a_pos, &b_body, &b_pos) {
            continue;
        }
        a_body.record_contact(b_info.id);
        b_body.record_contact(a_info.id);

        if a_body.resolve_collision(&mut a_pos, &b_body, &mut b_pos) {
            if let Some(mut render) = a_render {
                render.set_transform(&a_pos);
            }
            if let Some(mut render) = b_render {
                render.set_transform(&b_pos);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn physics_world() -> World {
        let mut world = World::new();
        world.insert_resource(DeltaTime(0.1));
        world.insert_resource(SimConfig::default());
        world
    }

    fn info(id: u32) -> EntityInfo {
        EntityInfo {
            id: EntityId(id),
            kind: EntityKind::Structure,
            name: None,
        }
    }

    fn physics_schedule() -> Schedule {
        let mut schedule = Schedule::default();
        schedule.add_systems((movement_system, collision_system).chain());
        schedule
    }

    #[test]
    fn test_movement_applies_velocity() {
        let mut world = physics_world();
        let mut pos = PositionComponent::new(0.0, 0.0, 0.0);
        pos.set_velocity(5.0, 0.0, 3.0);
        let entity = world
            .spawn((pos, Renderable::new(RenderHandle(1))))
            .id();

        let mut schedule = Schedule::default();
        schedule.add_systems(movement_system);
        schedule.run(&mut world);

        let pos = world.get::<PositionComponent>(entity).unwrap();
        assert!((pos.x - 0.5).abs() < 0.001);
        assert!((pos.z - 0.3).abs() < 0.001);
        let render = world.get::<Renderable>(entity).unwrap();
        assert_eq!((render.x, render.z), (pos.x, pos.z));
        assert!(render.dirty);
    }

    #[test]
    fn test_resting_entity_keeps_renderable_clean() {
        let mut world = physics_world();
        let entity = world
            .spawn((
                PositionComponent::new(2.0, 0.0, 2.0),
                PhysicsComponent::new(1.0, 0.5),
                Renderable::new(RenderHandle(1)),
            ))
            .id();
        world.get_mut::<Renderable>(entity).unwrap().set_transform(&PositionComponent::new(2.0, 0.0, 2.0));
        world.get_mut::<Renderable>(entity).unwrap().take_dirty();

        physics_schedule().run(&mut world);

        assert!(!world.get::<Renderable>(entity).unwrap().dirty);
        assert!(world.get::<PhysicsComponent>(entity).unwrap().grounded);
    }

    #[test]
    fn test_falling_body_lands_on_ground() {
        let mut world = physics_world();
        let entity = world
            .spawn((
                info(1),
                PositionComponent::new(0.0, 1.0, 0.0),
                PhysicsComponent::new(1.0, 0.5),
            ))
            .id();

        let mut schedule = physics_schedule();
        for _ in 0..30 {
            schedule.run(&mut world);
        }

        let pos = world.get::<PositionComponent>(entity).unwrap();
        assert_eq!(pos.y, 0.0);
        assert_eq!(pos.velocity_y, 0.0);
        assert!(world.get::<PhysicsComponent>(entity).unwrap().grounded);
    }

    #[test]
    fn test_ground_height_is_configurable() {
        let mut world = physics_world();
        world.insert_resource(SimConfig {
            ground_height: 2.0,
            ..Default::default()
        });
        let entity = world
            .spawn((
                info(1),
                PositionComponent::new(0.0, 0.0, 0.0),
                PhysicsComponent::new(1.0, 0.5),
            ))
            .id();

        physics_schedule().run(&mut world);

        assert_eq!(world.get::<PositionComponent>(entity).unwrap().y, 2.0);
    }

    #[test]
    fn test_overlapping_bodies_are_separated() {
        let mut world = physics_world();
        let a = world
            .spawn((info(1), PositionComponent::new(0.0, 0.0, 0.0), PhysicsComponent::new(10.0, 1.0)))
            .id();
        let b = world
            .spawn((info(2), PositionComponent::new(1.0, 0.0, 0.0), PhysicsComponent::new(10.0, 1.0)))
            .id();

        physics_schedule().run(&mut world);

        let pa = *world.get::<PositionComponent>(a).unwrap();
        let pb = *world.get::<PositionComponent>(b).unwrap();
        assert!((pb.x - pa.x - 2.0).abs() < 1e-4);
        assert_eq!(world.get::<PhysicsComponent>(a).unwrap().colliding_with, vec![EntityId(2)]);
        assert_eq!(world.get::<PhysicsComponent>(b).unwrap().colliding_with, vec![EntityId(1)]);
    }

    #[test]
    fn test_contacts_reset_once_apart() {
        let mut world = physics_world();
        let a = world
            .spawn((info(1), PositionComponent::new(0.0, 0.0, 0.0), PhysicsComponent::new(1.0, 1.0)))
            .id();
        world.spawn((info(2), PositionComponent::new(1.5, 0.0, 0.0), PhysicsComponent::new(1.0, 1.0)));

        let mut schedule = physics_schedule();
        schedule.run(&mut world);
        assert!(world.get::<PhysicsComponent>(a).unwrap().colliding);

        // Separated now: the next tick clears the contact
        schedule.run(&mut world);
        let body = world.get::<PhysicsComponent>(a).unwrap();
        assert!(!body.colliding);
        assert!(body.colliding_with.is_empty());
    }

    #[test]
    fn test_static_bodies_never_move() {
        let mut world = physics_world();
        let wall = world
            .spawn((info(1), PositionComponent::new(0.0, 0.0, 0.0), PhysicsComponent::static_body(2.0)))
            .id();
        let mut walker = PositionComponent::new(0.0, 0.0, 2.5);
        walker.set_velocity(0.0, 0.0, -3.0);
        let walker = world
            .spawn((info(2), walker, PhysicsComponent::new(1.0, 0.5)))
            .id();

        let mut schedule = physics_schedule();
        for _ in 0..10 {
            schedule.run(&mut world);
        }

        let wall_pos = world.get::<PositionComponent>(wall).unwrap();
        assert_eq!((wall_pos.x, wall_pos.z), (0.0, 0.0));
        let walker_pos = world.get::<PositionComponent>(walker).unwrap();
        assert!(walker_pos.z >= 2.5 - 1e-4, "walked into the wall: z = {}", walker_pos.z);
    }
}
