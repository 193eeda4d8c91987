//! Villager behavior: work/home daily routine and greetings.

use bevy_ecs::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    jitter, run_schedule, Agent, BehaviorContext, Brain, HourWindow, Interaction, MovePurpose,
    NeedKind, Task, TaskKind, CHAT_SECONDS,
};
use crate::components::{AnimationState, ComponentKind, EntityKind, NpcRole, PositionComponent, SimComponent};

/// Seconds a farmer spends on one plot before picking another.
pub const WORK_RETARGET_SECONDS: f32 = 5.0;

/// Social need a villager restores in a domestic animal it pets.
const PETTING_SOCIAL_BOOST: f32 = 15.0;

/// Per-role tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpcProperties {
    pub move_speed: f32,
    pub sight_radius: f32,
    pub wander_radius: f32,
    pub home: (f32, f32),
    pub work: (f32, f32),
    pub work_hours: HourWindow,
    /// Half-width of the area a farmer tends around the work position.
    pub work_radius: f32,
}

impl NpcProperties {
    pub fn for_role(role: NpcRole, home: (f32, f32), work: (f32, f32)) -> Self {
        let (move_speed, work_hours, work_radius) = match role {
            NpcRole::Farmer => (1.5, HourWindow::new(6, 18), 4.0),
            NpcRole::Blacksmith => (1.3, HourWindow::new(8, 17), 1.0),
            NpcRole::Merchant => (1.4, HourWindow::new(9, 19), 1.5),
            // Night watch
            NpcRole::Guard => (1.8, HourWindow::new(20, 6), 3.0),
            NpcRole::Villager => (1.2, HourWindow::new(9, 17), 2.0),
        };
        Self {
            move_speed,
            sight_radius: 10.0,
            wander_radius: 8.0,
            home,
            work,
            work_hours,
            work_radius,
        }
    }
}

/// Task-queue brain of a villager.
#[derive(Component, Debug, Clone, Serialize, Deserialize)]
pub struct NpcBehavior {
    pub role: NpcRole,
    pub properties: NpcProperties,
    brain: Brain,
}

impl SimComponent for NpcBehavior {
    const KIND: ComponentKind = ComponentKind::Behavior;
}

impl NpcBehavior {
    pub fn new(role: NpcRole, home: (f32, f32), work: (f32, f32)) -> Self {
        Self {
            role,
            properties: NpcProperties::for_role(role, home, work),
            brain: Brain::default(),
        }
    }

    pub fn brain(&self) -> &Brain {
        &self.brain
    }

    pub fn brain_mut(&mut self) -> &mut Brain {
        &mut self.brain
    }

    /// Replace the queue with the routine for `hour`.
    pub fn update_daily_routine(&mut self, hour: u32, rng: &mut dyn rand::RngCore) {
        self.brain.start_routine();
        let props = &self.properties;
        if props.work_hours.contains(hour) {
            let (x, z) = jitter(rng, props.work, 2.0);
            self.brain.push_task(Task::move_to(x, z, MovePurpose::Work));
            self.brain.push_task(Task::work());
            let (x, z) = jitter(rng, props.work, 5.0);
            self.brain.push_task(Task::move_to(x, z, MovePurpose::Work));
        } else {
            let (x, z) = jitter(rng, props.home, 2.0);
            self.brain.push_task(Task::move_to(x, z, MovePurpose::Home));
            self.brain.push_task(Task::Wait {
                duration: rng.gen_range(5.0..15.0),
            });
            let (x, z) = jitter(rng, props.home, 4.0);
            self.brain.push_task(Task::move_to(x, z, MovePurpose::Home));
        }
        debug!(role = %self.role, hour, tasks = self.brain.tasks().len(), "villager routine derived");
    }

    /// Advance one tick. Returns effects on other entities.
    pub fn update(
        &mut self,
        pos: &mut PositionComponent,
        ctx: &mut BehaviorContext<'_>,
    ) -> Vec<Interaction> {
        run_schedule(self, pos, ctx);
        self.socialize(pos, ctx)
    }

    fn socialize(
        &mut self,
        pos: &mut PositionComponent,
        ctx: &mut BehaviorContext<'_>,
    ) -> Vec<Interaction> {
        let chance = ctx.tuning.interaction_chance;
        if !ctx.roll(chance) {
            return Vec::new();
        }
        let radius = ctx.tuning.interaction_radius;
        let Some(other) = ctx.nearest(pos.x, pos.z, radius, |n| n.kind.is_npc() || n.kind.is_animal())
        else {
            return Vec::new();
        };
        let (from_x, from_z) = (pos.x, pos.z);

        match other.kind {
            EntityKind::Animal(species) if species.is_wild() => {
                if self.role != NpcRole::Guard {
                    return Vec::new();
                }
                debug!(guard = %ctx.self_id, target = %other.id, %species, "guard scares off animal");
                vec![Interaction::ScareOff {
                    target: other.id,
                    from_x,
                    from_z,
                }]
            }
            EntityKind::Animal(_) => {
                pos.face_towards(other.x, other.z);
                vec![
                    Interaction::AdjustNeed {
                        target: other.id,
                        need: NeedKind::Social,
                        amount: PETTING_SOCIAL_BOOST,
                    },
                    Interaction::Greet {
                        target: other.id,
                        from_x,
                        from_z,
                    },
                ]
            }
            EntityKind::Npc(_) => {
                pos.face_towards(other.x, other.z);
                self.pause_to_chat(pos);
                vec![Interaction::Greet {
                    target: other.id,
                    from_x,
                    from_z,
                }]
            }
            _ => Vec::new(),
        }
    }

    /// React to another entity's interaction.
    pub fn receive(&mut self, interaction: &Interaction, pos: &mut PositionComponent) {
        match *interaction {
            Interaction::Greet { from_x, from_z, .. } => {
                pos.face_towards(from_x, from_z);
                self.pause_to_chat(pos);
            }
            other => debug!(?other, role = %self.role, "interaction ignored by villager"),
        }
    }

    fn pause_to_chat(&mut self, pos: &mut PositionComponent) {
        if self.brain.current_task().map(Task::kind) == Some(TaskKind::Wait) {
            return;
        }
        pos.stop();
        self.brain.interrupt(Task::Wait {
            duration: CHAT_SECONDS,
        });
    }
}

impl Agent for NpcBehavior {
    fn brain_mut(&mut self) -> &mut Brain {
        &mut self.brain
    }

    fn move_speed(&self) -> f32 {
        self.properties.move_speed
    }

    fn derive_routine(&mut self, _pos: &PositionComponent, ctx: &mut BehaviorContext<'_>) {
        self.update_daily_routine(ctx.hour, &mut *ctx.rng);
    }

    fn process_own_task(
        &mut self,
        task: &mut Task,
        pos: &mut PositionComponent,
        ctx: &mut BehaviorContext<'_>,
    ) -> bool {
        match task {
            Task::Work {
                sub_target,
                retarget_in,
            } => {
                if !self.properties.work_hours.contains(ctx.hour) {
                    pos.stop();
                    return true;
                }
                if self.role != NpcRole::Farmer {
                    return false;
                }
                *retarget_in -= ctx.delta_time;
                if sub_target.is_none() || *retarget_in <= 0.0 {
                    *sub_target = Some(jitter(
                        &mut *ctx.rng,
                        self.properties.work,
                        self.properties.work_radius,
                    ));
                    *retarget_in = WORK_RETARGET_SECONDS;
                }
                if let Some((x, z)) = *sub_target {
                    let at_plot = pos.move_toward(x, z, self.properties.move_speed * 0.6);
                    self.brain.set_animation(if at_plot {
                        AnimationState::Farming
                    } else {
                        AnimationState::Walking
                    });
                }
                false
            }
            other => {
                debug!(task = %other.kind(), role = %self.role, "task not supported by villager, dropping");
                true
            }
        }
    }
}
