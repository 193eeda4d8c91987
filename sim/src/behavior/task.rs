//! Queued units of behavior intent.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::BehaviorState;
use crate::components::EntityId;

/// Why an entity is walking somewhere. Only affects the reported state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovePurpose {
    Work,
    Home,
    Food,
    Elsewhere,
}

/// One queued task. The head of a behavior's queue is the active one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Task {
    /// Walk to a point; gives up after the move timeout.
    MoveTo { x: f32, z: f32, purpose: MovePurpose },
    /// Stand still for `duration` seconds.
    Wait { duration: f32 },
    /// Work until the work window closes. Farmers wander between plots,
    /// picking a new `sub_target` every few seconds.
    Work {
        sub_target: Option<(f32, f32)>,
        retarget_in: f32,
    },
    /// Visit each waypoint in order.
    FollowPath { waypoints: Vec<(f32, f32)>, next: usize },
    /// Stay `distance` away from the player for `duration` seconds.
    FollowPlayer { duration: f32, distance: f32 },
    /// Stay `distance` away from another entity for `duration` seconds.
    Follow {
        target: EntityId,
        duration: f32,
        distance: f32,
    },
    Eat { duration: f32 },
    /// Sleep until rested or the sleep window ends.
    Sleep,
    Play {
        duration: f32,
        partner: Option<EntityId>,
    },
    /// Roam around home, re-rolling the destination each time it is reached.
    Wander {
        duration: f32,
        target: Option<(f32, f32)>,
    },
    /// Run directly away from a point.
    Flee { from_x: f32, from_z: f32, duration: f32 },
}

/// Fieldless tag of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    MoveTo,
    Wait,
    Work,
    FollowPath,
    FollowPlayer,
    Follow,
    Eat,
    Sleep,
    Play,
    Wander,
    Flee,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskKind::MoveTo => "move_to",
            TaskKind::Wait => "wait",
            TaskKind::Work => "work",
            TaskKind::FollowPath => "follow_path",
            TaskKind::FollowPlayer => "follow_player",
            TaskKind::Follow => "follow",
            TaskKind::Eat => "eat",
            TaskKind::Sleep => "sleep",
            TaskKind::Play => "play",
            TaskKind::Wander => "wander",
            TaskKind::Flee => "flee",
        };
        f.write_str(name)
    }
}

impl Task {
    pub fn move_to(x: f32, z: f32, purpose: MovePurpose) -> Self {
        Task::MoveTo { x, z, purpose }
    }

    pub fn work() -> Self {
        Task::Work {
            sub_target: None,
            retarget_in: 0.0,
        }
    }

    pub fn follow_path(waypoints: Vec<(f32, f32)>) -> Self {
        Task::FollowPath { waypoints, next: 0 }
    }

    pub fn wander(duration: f32) -> Self {
        Task::Wander {
            duration,
            target: None,
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            Task::MoveTo { .. } => TaskKind::MoveTo,
            Task::Wait { .. } => TaskKind::Wait,
            Task::Work { .. } => TaskKind::Work,
            Task::FollowPath { .. } => TaskKind::FollowPath,
            Task::FollowPlayer { .. } => TaskKind::FollowPlayer,
            Task::Follow { .. } => TaskKind::Follow,
            Task::Eat { .. } => TaskKind::Eat,
            Task::Sleep => TaskKind::Sleep,
            Task::Play { .. } => TaskKind::Play,
            Task::Wander { .. } => TaskKind::Wander,
            Task::Flee { .. } => TaskKind::Flee,
        }
    }

    /// State an entity enters when this task becomes active.
    pub fn state(&self) -> BehaviorState {
        match self {
            Task::MoveTo { purpose, .. } => match purpose {
                MovePurpose::Work => BehaviorState::MovingToWork,
                MovePurpose::Home => BehaviorState::MovingToHome,
                MovePurpose::Food | MovePurpose::Elsewhere => BehaviorState::Walking,
            },
            Task::Wait { .. } => BehaviorState::Idle,
            Task::Work { .. } => BehaviorState::Working,
            Task::FollowPath { .. } => BehaviorState::Walking,
            Task::FollowPlayer { .. } | Task::Follow { .. } => BehaviorState::Following,
            Task::Eat { .. } => BehaviorState::Eating,
            Task::Sleep => BehaviorState::Sleeping,
            Task::Play { .. } => BehaviorState::Playing,
            Task::Wander { .. } => BehaviorState::Wandering,
            Task::Flee { .. } => BehaviorState::Fleeing,
        }
    }

    /// Tasks performed standing in place.
    pub fn is_stationary(&self) -> bool {
        matches!(self, Task::Wait { .. } | Task::Eat { .. } | Task::Sleep)
    }

    /// Destination of a plain movement task.
    pub fn destination(&self) -> Option<(f32, f32)> {
        match self {
            Task::MoveTo { x, z, .. } => Some((*x, *z)),
            _ => None,
        }
    }
}
