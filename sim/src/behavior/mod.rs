//! Task-queue AI for villagers and animals.
//!
//! Every agent carries a [`Brain`]: a FIFO queue of [`Task`]s plus a small
//! state machine. Only the head task runs. When the queue empties, or when
//! the clock rolls over to a new hour, the agent re-derives its daily routine
//! and refills the queue, so the queue is always a projection of "what should
//! I be doing now" rather than an independent source of truth.
//!
//! [`NpcBehavior`] and [`AnimalBehavior`] share the queue driver and the
//! movement task handlers in this module and add their own routines, tasks
//! and social rules.

mod animal;
mod npc;
mod task;

pub use animal::{AnimalBehavior, AnimalMemory, AnimalProperties, NeedKind, Needs, Personality};
pub use npc::{NpcBehavior, NpcProperties};
pub use task::{MovePurpose, Task, TaskKind};

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use tracing::debug;

use crate::components::{AnimationState, EntityId, EntityKind, PositionComponent};
use crate::config::SimConfig;

// ============================================================================
// STATE MACHINE
// ============================================================================

/// What an agent is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BehaviorState {
    #[default]
    Idle,
    Walking,
    Wandering,
    MovingToWork,
    MovingToHome,
    Working,
    Eating,
    Sleeping,
    Playing,
    Following,
    Fleeing,
}

impl BehaviorState {
    /// Animation clip shown while in this state.
    pub fn animation(&self) -> AnimationState {
        match self {
            BehaviorState::Idle => AnimationState::Idle,
            BehaviorState::Walking
            | BehaviorState::Wandering
            | BehaviorState::MovingToWork
            | BehaviorState::MovingToHome
            | BehaviorState::Following
            | BehaviorState::Fleeing => AnimationState::Walking,
            BehaviorState::Working => AnimationState::Farming,
            BehaviorState::Eating => AnimationState::Eating,
            BehaviorState::Sleeping => AnimationState::Sleeping,
            BehaviorState::Playing => AnimationState::Playing,
        }
    }
}

impl fmt::Display for BehaviorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BehaviorState::Idle => "idle",
            BehaviorState::Walking => "walking",
            BehaviorState::Wandering => "wandering",
            BehaviorState::MovingToWork => "moving_to_work",
            BehaviorState::MovingToHome => "moving_to_home",
            BehaviorState::Working => "working",
            BehaviorState::Eating => "eating",
            BehaviorState::Sleeping => "sleeping",
            BehaviorState::Playing => "playing",
            BehaviorState::Following => "following",
            BehaviorState::Fleeing => "fleeing",
        };
        f.write_str(name)
    }
}

/// Inclusive-start, exclusive-end range of in-game hours. Wraps past
/// midnight when `start > end` (e.g. 22..6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourWindow {
    pub start: u32,
    pub end: u32,
}

impl HourWindow {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, hour: u32) -> bool {
        let hour = hour % 24;
        if self.start <= self.end {
            hour >= self.start && hour < self.end
        } else {
            hour >= self.start || hour < self.end
        }
    }
}

// ============================================================================
// BRAIN
// ============================================================================

/// Task queue and state machine shared by every kind of agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Brain {
    state: BehaviorState,
    previous_state: BehaviorState,
    /// Seconds since the last state change.
    state_time: f32,
    /// Seconds spent in the current wait task.
    wait_time: f32,
    queue: VecDeque<Task>,
    task_started: bool,
    refresh_requested: bool,
    #[serde(skip)]
    pending_animation: Option<AnimationState>,
}

impl Brain {
    pub fn state(&self) -> BehaviorState {
        self.state
    }

    pub fn previous_state(&self) -> BehaviorState {
        self.previous_state
    }

    pub fn state_time(&self) -> f32 {
        self.state_time
    }

    pub fn wait_time(&self) -> f32 {
        self.wait_time
    }

    pub fn tasks(&self) -> &VecDeque<Task> {
        &self.queue
    }

    pub fn current_task(&self) -> Option<&Task> {
        self.queue.front()
    }

    pub fn refresh_requested(&self) -> bool {
        self.refresh_requested
    }

    /// Enter `state`, restarting the state clock and queueing the matching
    /// animation for the appearance component.
    pub fn change_state(&mut self, state: BehaviorState) {
        self.previous_state = self.state;
        self.state = state;
        self.state_time = 0.0;
        self.pending_animation = Some(state.animation());
    }

    pub fn push_task(&mut self, task: Task) {
        self.queue.push_back(task);
    }

    /// Put a task ahead of the current one. The interrupted task restarts
    /// when it comes back to the head.
    pub fn interrupt(&mut self, task: Task) {
        self.queue.push_front(task);
        self.task_started = false;
    }

    /// Drop every queued task. The next update derives a fresh routine.
    pub fn clear_tasks(&mut self) {
        self.queue.clear();
        self.task_started = false;
    }

    pub fn replace_tasks(&mut self, tasks: impl IntoIterator<Item = Task>) {
        self.clear_tasks();
        self.queue.extend(tasks);
    }

    /// Ask for the routine to be re-derived on the next update.
    pub fn request_refresh(&mut self) {
        self.refresh_requested = true;
    }

    /// Show a clip without changing state (e.g. a farmer pausing between plots).
    pub fn set_animation(&mut self, animation: AnimationState) {
        self.pending_animation = Some(animation);
    }

    pub fn take_animation(&mut self) -> Option<AnimationState> {
        self.pending_animation.take()
    }

    fn restart_timer(&mut self) {
        self.state_time = 0.0;
    }

    fn begin_task(&mut self, task: &Task, pos: &mut PositionComponent) {
        self.change_state(task.state());
        self.wait_time = 0.0;
        self.task_started = true;
        if task.is_stationary() {
            pos.stop();
        }
    }

    /// Clear the queue ahead of a freshly derived routine.
    fn start_routine(&mut self) {
        self.clear_tasks();
        self.refresh_requested = false;
    }
}

// ============================================================================
// WORLD VIEW
// ============================================================================

/// Another live entity as seen by an agent this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: EntityId,
    pub kind: EntityKind,
    pub x: f32,
    pub z: f32,
}

/// Everything a behavior update may read besides its own entity.
pub struct BehaviorContext<'a> {
    pub delta_time: f32,
    pub hour: u32,
    pub self_id: EntityId,
    /// All live positioned entities, including this one.
    pub neighbors: &'a [Neighbor],
    pub tuning: &'a SimConfig,
    pub rng: &'a mut dyn RngCore,
}

impl BehaviorContext<'_> {
    pub fn find(&self, id: EntityId) -> Option<Neighbor> {
        self.neighbors.iter().find(|n| n.id == id).copied()
    }

    pub fn player(&self) -> Option<Neighbor> {
        self.neighbors
            .iter()
            .find(|n| n.kind == EntityKind::Player)
            .copied()
    }

    /// Closest other entity within `radius` that passes `filter`.
    pub fn nearest(
        &self,
        x: f32,
        z: f32,
        radius: f32,
        filter: impl Fn(&Neighbor) -> bool,
    ) -> Option<Neighbor> {
        let radius_sq = radius * radius;
        self.neighbors
            .iter()
            .filter(|n| n.id != self.self_id && filter(n))
            .map(|n| {
                let dx = n.x - x;
                let dz = n.z - z;
                (n, dx * dx + dz * dz)
            })
            .filter(|(_, dist_sq)| *dist_sq <= radius_sq)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(n, _)| *n)
    }

    /// True with probability `p`.
    pub fn roll(&mut self, p: f32) -> bool {
        self.rng.gen::<f32>() < p
    }
}

/// Immediate effect of one agent's social interaction on another entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Interaction {
    /// Turn toward the greeter.
    Greet {
        target: EntityId,
        from_x: f32,
        from_z: f32,
    },
    /// Change one of an animal's needs.
    AdjustNeed {
        target: EntityId,
        need: NeedKind,
        amount: f32,
    },
    /// Abandon the current plan and run away.
    ScareOff {
        target: EntityId,
        from_x: f32,
        from_z: f32,
    },
}

impl Interaction {
    pub fn target(&self) -> EntityId {
        match self {
            Interaction::Greet { target, .. }
            | Interaction::AdjustNeed { target, .. }
            | Interaction::ScareOff { target, .. } => *target,
        }
    }
}

// ============================================================================
// QUEUE DRIVER
// ============================================================================

/// Seconds of chat when two villagers meet.
const CHAT_SECONDS: f32 = 2.5;

/// Hooks the queue driver needs from a concrete behavior.
pub(crate) trait Agent {
    fn brain_mut(&mut self) -> &mut Brain;

    fn move_speed(&self) -> f32;

    fn derive_routine(&mut self, pos: &PositionComponent, ctx: &mut BehaviorContext<'_>);

    /// Handle tasks not covered by [`process_common_task`]. Returns true when
    /// the task is complete.
    fn process_own_task(
        &mut self,
        task: &mut Task,
        pos: &mut PositionComponent,
        ctx: &mut BehaviorContext<'_>,
    ) -> bool;
}

/// Advance the head task. Returns true if it completed and was popped.
pub(crate) fn process_current_task<A: Agent>(
    agent: &mut A,
    pos: &mut PositionComponent,
    ctx: &mut BehaviorContext<'_>,
) -> bool {
    let speed = agent.move_speed();
    let Some(mut task) = agent.brain_mut().queue.pop_front() else {
        return false;
    };
    if !agent.brain_mut().task_started {
        agent.brain_mut().begin_task(&task, pos);
    }

    let completed = match process_common_task(&mut task, agent.brain_mut(), pos, speed, ctx) {
        Some(done) => done,
        None => agent.process_own_task(&mut task, pos, ctx),
    };

    let brain = agent.brain_mut();
    if completed {
        brain.task_started = false;
    } else {
        brain.queue.push_front(task);
    }
    completed
}

/// One scheduling tick: refresh the routine if asked to or idle, run the head
/// task, and refill the queue the moment it runs dry.
pub(crate) fn run_schedule<A: Agent>(
    agent: &mut A,
    pos: &mut PositionComponent,
    ctx: &mut BehaviorContext<'_>,
) {
    let brain = agent.brain_mut();
    brain.state_time += ctx.delta_time;
    if brain.refresh_requested || brain.queue.is_empty() {
        agent.derive_routine(pos, ctx);
    }

    if process_current_task(agent, pos, ctx) && agent.brain_mut().queue.is_empty() {
        agent.derive_routine(pos, ctx);
    }
}

/// Movement tasks every agent understands. Returns `None` for tasks the
/// concrete behavior must handle itself.
fn process_common_task(
    task: &mut Task,
    brain: &mut Brain,
    pos: &mut PositionComponent,
    speed: f32,
    ctx: &mut BehaviorContext<'_>,
) -> Option<bool> {
    let timeout = ctx.tuning.move_timeout;
    let done = match task {
        Task::MoveTo { x, z, .. } => {
            if pos.move_toward(*x, *z, speed) {
                true
            } else if brain.state_time > timeout {
                debug!(entity = %ctx.self_id, x = *x, z = *z, "move_to timed out, forcing completion");
                pos.stop();
                true
            } else {
                false
            }
        }
        Task::Wait { duration } => {
            brain.wait_time += ctx.delta_time;
            brain.wait_time >= *duration
        }
        Task::FollowPath { waypoints, next } => {
            let Some(&(x, z)) = waypoints.get(*next) else {
                return Some(true);
            };
            let reached = pos.move_toward(x, z, speed);
            if reached || brain.state_time > timeout {
                if !reached {
                    debug!(entity = %ctx.self_id, waypoint = *next, "waypoint timed out, skipping");
                }
                *next += 1;
                brain.restart_timer();
            }
            *next >= waypoints.len()
        }
        Task::FollowPlayer { duration, distance } => match ctx.player() {
            Some(player) => {
                keep_distance(pos, player.x, player.z, *distance, speed);
                brain.state_time >= *duration
            }
            None => {
                pos.stop();
                true
            }
        },
        Task::Follow {
            target,
            duration,
            distance,
        } => match ctx.find(*target) {
            Some(other) => {
                keep_distance(pos, other.x, other.z, *distance, speed);
                brain.state_time >= *duration
            }
            None => {
                debug!(entity = %ctx.self_id, target = %target, "follow target gone");
                pos.stop();
                true
            }
        },
        Task::Flee {
            from_x,
            from_z,
            duration,
        } => {
            let away = (pos.x - *from_x).atan2(pos.z - *from_z);
            pos.move_in_direction(away, speed * 1.5);
            if brain.state_time >= *duration {
                pos.stop();
                true
            } else {
                false
            }
        }
        _ => return None,
    };
    Some(done)
}

/// Hold a distance band around a target: approach when too far, back off
/// when too close, otherwise stop and face it.
pub(crate) fn keep_distance(pos: &mut PositionComponent, x: f32, z: f32, distance: f32, speed: f32) {
    let tolerance = (distance * 0.25).max(0.5);
    let current = pos.horizontal_distance_to(x, z);
    if current > distance + tolerance {
        pos.move_toward(x, z, speed);
    } else if current < distance - tolerance {
        let away = (pos.x - x).atan2(pos.z - z);
        pos.move_in_direction(away, speed * 0.5);
    } else {
        pos.stop();
        pos.face_towards(x, z);
    }
}

/// Random point within a square of half-width `radius` around `center`.
pub(crate) fn jitter(rng: &mut dyn RngCore, center: (f32, f32), radius: f32) -> (f32, f32) {
    if radius <= 0.0 {
        return center;
    }
    (
        center.0 + rng.gen_range(-radius..=radius),
        center.1 + rng.gen_range(-radius..=radius),
    )
}


#[cfg(test)]
mod tests {
    use super::test_support::Harness;
    use super::*;
    use crate::components::{NpcRole, Species};

    #[test]
    fn test_hour_window_plain_and_wrapping() {
        let day = HourWindow::new(6, 18);
        assert!(day.contains(6));
        assert!(day.contains(17));
        assert!(!day.contains(18));
        assert!(!day.contains(3));

        let night = HourWindow::new(22, 6);
        assert!(night.contains(23));
        assert!(night.contains(0));
        assert!(night.contains(5));
        assert!(!night.contains(6));
        assert!(!night.contains(12));
    }

    #[test]
    fn test_change_state_tracks_previous_and_animation() {
        let mut brain = Brain::default();
        brain.state_time = 4.0;
        brain.change_state(BehaviorState::Sleeping);
        assert_eq!(brain.state(), BehaviorState::Sleeping);
        assert_eq!(brain.previous_state(), BehaviorState::Idle);
        assert_eq!(brain.state_time(), 0.0);
        assert_eq!(brain.take_animation(), Some(AnimationState::Sleeping));
        assert_eq!(brain.take_animation(), None);
    }

    #[test]
    fn test_interrupt_runs_first() {
        let mut brain = Brain::default();
        brain.push_task(Task::Sleep);
        brain.interrupt(Task::Wait { duration: 1.0 });
        assert_eq!(brain.current_task().map(Task::kind), Some(TaskKind::Wait));
        assert_eq!(brain.tasks().len(), 2);
    }

    #[test]
    fn test_nearest_skips_self_and_far_entities() {
        let mut harness = Harness::new();
        harness.neighbors = vec![
            Neighbor { id: EntityId(1), kind: EntityKind::Npc(NpcRole::Farmer), x: 0.0, z: 0.0 },
            Neighbor { id: EntityId(2), kind: EntityKind::Animal(Species::Dog), x: 3.0, z: 0.0 },
            Neighbor { id: EntityId(3), kind: EntityKind::Animal(Species::Cat), x: 1.0, z: 1.0 },
            Neighbor { id: EntityId(4), kind: EntityKind::Player, x: 20.0, z: 0.0 },
        ];
        let ctx = harness.ctx(0.1, 12);
        let found = ctx.nearest(0.0, 0.0, 5.0, |_| true).map(|n| n.id);
        assert_eq!(found, Some(EntityId(3)));
        let dogs = ctx.nearest(0.0, 0.0, 5.0, |n| n.kind == EntityKind::Animal(Species::Dog));
        assert_eq!(dogs.map(|n| n.id), Some(EntityId(2)));
        assert!(ctx.nearest(0.0, 0.0, 5.0, |n| n.kind == EntityKind::Player).is_none());
        assert_eq!(ctx.player().map(|n| n.id), Some(EntityId(4)));
    }

    #[test]
    fn test_keep_distance_band() {
        // Too far: approach
        let mut pos = PositionComponent::new(0.0, 0.0, 0.0);
        keep_distance(&mut pos, 0.0, 10.0, 2.0, 1.0);
        assert!(pos.velocity_z > 0.0);

        // Too close: back off
        let mut pos = PositionComponent::new(0.0, 0.0, 0.0);
        keep_distance(&mut pos, 0.0, 0.5, 3.0, 1.0);
        assert!(pos.velocity_z < 0.0);

        // In band: stop and face
        let mut pos = PositionComponent::new(0.0, 0.0, 0.0);
        pos.set_velocity(1.0, 0.0, 0.0);
        keep_distance(&mut pos, 2.0, 0.0, 2.0, 1.0);
        assert_eq!(pos.speed, 0.0);
        assert!((pos.direction - std::f32::consts::FRAC_PI_2).abs() < 1e-4);
    }

    #[test]
    fn test_jitter_stays_in_square() {
        let mut harness = Harness::new();
        for _ in 0..100 {
            let (x, z) = jitter(&mut harness.rng, (10.0, -4.0), 2.0);
            assert!((8.0..=12.0).contains(&x));
            assert!((-6.0..=-2.0).contains(&z));
        }
        assert_eq!(jitter(&mut harness.rng, (1.0, 1.0), 0.0), (1.0, 1.0));
    }
}
