//! Snapshot types.
//!
//! The `Snapshot` struct provides a serializable view of the simulation state
//! that can be handed to the rendering collaborator or logged.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::behavior::{AnimalBehavior, BehaviorState, Brain, Needs, NpcBehavior, Task, TaskKind};
use crate::components::*;
use crate::systems::GameClock;

/// One entity's visible state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub kind: EntityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub direction: f32,
    pub speed: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<BehaviorState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queued_tasks: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<AnimationState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs: Option<Needs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounded: Option<bool>,
}

/// Complete simulation state snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Current simulation tick.
    pub tick: u64,
    /// Elapsed simulation time in seconds.
    pub time: f32,
    /// In-game hour of day.
    pub hour: u32,
    /// Days since the clock started.
    pub day: u32,
    /// All positioned entities, ordered by id.
    pub entities: Vec<EntitySnapshot>,
}

impl Snapshot {
    /// Create a snapshot from the ECS world.
    pub fn from_world(world: &mut World, tick: u64, time: f32) -> Self {
        let (hour, day) = world
            .get_resource::<GameClock>()
            .map(|clock| (clock.hour(), clock.day()))
            .unwrap_or_default();

        let mut query = world.query::<(
            &EntityInfo,
            &PositionComponent,
            Option<&PhysicsComponent>,
            Option<&AppearanceComponent>,
            Option<&NpcBehavior>,
            Option<&AnimalBehavior>,
        )>();

        let mut entities: Vec<EntitySnapshot> = query
            .iter(world)
            .map(|(info, pos, physics, appearance, npc, animal)| {
                let brain: Option<&Brain> = npc
                    .map(NpcBehavior::brain)
                    .or_else(|| animal.map(AnimalBehavior::brain));
                EntitySnapshot {
                    id: info.id,
                    kind: info.kind,
                    name: info.name.clone(),
                    x: pos.x,
                    y: pos.y,
                    z: pos.z,
                    direction: pos.direction,
                    speed: pos.speed,
                    state: brain.map(Brain::state),
                    task: brain.and_then(|b| b.current_task()).map(Task::kind),
                    queued_tasks: brain.map(|b| b.tasks().len()),
                    animation: appearance.map(AppearanceComponent::animation_state),
                    needs: animal.map(|a| a.needs),
                    grounded: physics.map(|p| p.grounded),
                }
            })
            .collect();
        entities.sort_by_key(|e| e.id);

        Self {
            tick,
            time,
            hour,
            day,
            entities,
        }
    }

    pub fn entity(&self, id: EntityId) -> Option<&EntitySnapshot> {
        self.entities.iter().find(|e| e.id == id)
    }

    /// Serialize snapshot to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize snapshot to pretty JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize a snapshot from a JSON string.
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}
