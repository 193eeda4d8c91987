//! ECS Systems for the Living Village simulation.
//!
//! Systems contain the logic that runs across entities each fixed tick.
//! They are registered by [`SystemKind`] and run strictly in registration
//! order; the default order is:
//!
//! 1. **Time** - advances the game clock and flags routine refreshes on
//!    hour rollover.
//! 2. **Behavior** - runs every NPC/animal task queue and applies social
//!    interactions.
//! 3. **Physics** - integrates positions, applies gravity and grounding,
//!    then resolves pairwise collisions.
//! 4. **Render** - advances animation clocks and writes poses to renderables.
//!
//! The schedule is single-threaded. Every entity update of one system
//! completes before the next system starts.

pub mod ai;
pub mod movement;
pub mod render;
pub mod time;

pub use ai::*;
pub use movement::*;
pub use render::*;
pub use time::*;

use bevy_ecs::prelude::*;
use bevy_ecs::schedule::ExecutorKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A registrable system. Each kind is also the system set its systems run in.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemKind {
    Time,
    Behavior,
    Physics,
    Render,
}

impl SystemKind {
    pub const DEFAULT_ORDER: [SystemKind; 4] = [
        SystemKind::Time,
        SystemKind::Behavior,
        SystemKind::Physics,
        SystemKind::Render,
    ];

    fn add_to(self, schedule: &mut Schedule) {
        match self {
            SystemKind::Time => schedule.add_systems(time_system.in_set(self)),
            SystemKind::Behavior => schedule.add_systems(behavior_system.in_set(self)),
            SystemKind::Physics => {
                schedule.add_systems((movement_system, collision_system).chain().in_set(self))
            }
            SystemKind::Render => schedule.add_systems(render_system.in_set(self)),
        };
    }
}

impl fmt::Display for SystemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SystemKind::Time => "time",
            SystemKind::Behavior => "behavior",
            SystemKind::Physics => "physics",
            SystemKind::Render => "render",
        };
        f.write_str(name)
    }
}

/// Build a schedule running `systems` one after another, in slice order.
pub fn build_schedule(systems: &[SystemKind]) -> Schedule {
    let mut schedule = Schedule::default();
    schedule.set_executor_kind(ExecutorKind::SingleThreaded);
    for kind in systems {
        kind.add_to(&mut schedule);
    }
    for pair in systems.windows(2) {
        schedule.configure_sets(pair[1].after(pair[0]));
    }
    schedule
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::*;
    use crate::config::SimConfig;

    fn world_with_resources() -> World {
        let mut world = World::new();
        let config = SimConfig::default();
        world.insert_resource(DeltaTime(config.fixed_timestep));
        world.insert_resource(GameClock::from_config(&config));
        world.insert_resource(SimRng::seeded(config.seed));
        world.insert_resource(config);
        world
    }

    #[test]
    fn test_render_runs_after_physics_by_default() {
        let mut world = world_with_resources();
        let entity = world
            .spawn((
                EntityInfo {
                    id: EntityId(1),
                    kind: EntityKind::Player,
                    name: None,
                },
                PositionComponent::new(0.0, 0.0, 0.0),
                Renderable::new(RenderHandle(7)),
            ))
            .id();
        world
            .get_mut::<PositionComponent>(entity)
            .unwrap()
            .set_velocity(3.0, 0.0, 0.0);

        let mut schedule = build_schedule(&SystemKind::DEFAULT_ORDER);
        schedule.run(&mut world);

        let pos = *world.get::<PositionComponent>(entity).unwrap();
        let renderable = world.get::<Renderable>(entity).unwrap();
        assert!(pos.x > 0.0);
        assert_eq!(renderable.x, pos.x);
    }

    #[test]
    fn test_empty_schedule_is_a_noop() {
        let mut world = world_with_resources();
        let mut schedule = build_schedule(&[]);
        schedule.run(&mut world);
        assert_eq!(world.resource::<GameClock>().ticks(), 0);
    }

    #[test]
    fn test_partial_registration_only_runs_listed_kinds() {
        let mut world = world_with_resources();
        let mut schedule = build_schedule(&[SystemKind::Time]);
        schedule.run(&mut world);
        assert_eq!(world.resource::<GameClock>().ticks(), 1);
    }
}
