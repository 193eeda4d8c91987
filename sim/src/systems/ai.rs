//! Behavior system - runs NPC and animal task queues.
//!
//! Agents update one at a time in entity-id order. Interactions an agent
//! emits are applied to their targets right after that agent's update, so an
//! entity later in the order already reacts to them this tick.

use bevy_ecs::prelude::*;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use std::collections::HashMap;
use tracing::debug;

use super::{DeltaTime, GameClock, TimeProvider};
use crate::behavior::{AnimalBehavior, BehaviorContext, Interaction, Neighbor, NpcBehavior};
use crate::components::{AppearanceComponent, EntityId, EntityInfo, PositionComponent};
use crate::config::SimConfig;

/// Seeded random source shared by every system.
#[derive(Resource, Debug, Clone)]
pub struct SimRng(pub Pcg32);

impl SimRng {
    pub fn seeded(seed: u64) -> Self {
        Self(Pcg32::seed_from_u64(seed))
    }
}

impl Default for SimRng {
    fn default() -> Self {
        Self::seeded(SimConfig::default().seed)
    }
}

type AgentQuery<'w, 's> = Query<
    'w,
    's,
    (
        Entity,
        &'static EntityInfo,
        &'static mut PositionComponent,
        Option<&'static mut NpcBehavior>,
        Option<&'static mut AnimalBehavior>,
        Option<&'static mut AppearanceComponent>,
    ),
>;

/// Run one behavior update for every agent.
pub fn behavior_system(
    dt: Res<DeltaTime>,
    clock: Res<GameClock>,
    config: Res<SimConfig>,
    mut rng: ResMut<SimRng>,
    mut agents: AgentQuery,
    unplaced: Query<
        &EntityInfo,
        (
            Or<(With<NpcBehavior>, With<AnimalBehavior>)>,
            Without<PositionComponent>,
        ),
    >,
) {
    for info in unplaced.iter() {
        debug!(entity = %info.id, "behavior without position, skipping");
    }

    let mut neighbors = Vec::new();
    let mut index = HashMap::new();
    let mut order = Vec::new();
    for (entity, info, pos, npc, animal, _) in agents.iter() {
        neighbors.push(Neighbor {
            id: info.id,
            kind: info.kind,
            x: pos.x,
            z: pos.z,
        });
        index.insert(info.id, entity);
        if npc.is_some() || animal.is_some() {
            order.push((info.id, entity));
        }
    }
    order.sort_unstable_by_key(|(id, _)| *id);

    let hour = clock.current_hour();
    let config: &SimConfig = &config;
    let rng = &mut rng.0;

    for (id, entity) in order {
        let Ok((_, _, mut pos, npc, animal, appearance)) = agents.get_mut(entity) else {
            continue;
        };
        let mut ctx = BehaviorContext {
            delta_time: dt.0,
            hour,
            self_id: id,
            neighbors: &neighbors,
            tuning: config,
            rng: &mut *rng,
        };

        let (effects, animation) = match (npc, animal) {
            (Some(mut npc), _) => {
                let effects = npc.update(&mut pos, &mut ctx);
                (effects, npc.brain_mut().take_animation())
            }
            (None, Some(mut animal)) => {
                let effects = animal.update(&mut pos, &mut ctx);
                (effects, animal.brain_mut().take_animation())
            }
            (None, None) => continue,
        };
        if let (Some(animation), Some(mut appearance)) = (animation, appearance) {
            appearance.set_animation_state(animation);
        }

        for effect in &effects {
            apply_interaction(&mut agents, &index, effect);
        }
    }
}

fn apply_interaction(
    agents: &mut AgentQuery,
    index: &HashMap<EntityId, Entity>,
    interaction: &Interaction,
) {
    let target = interaction.target();
    let Some(entity) = index.get(&target).copied() else {
        debug!(%target, "interaction target gone");
        return;
    };
    let Ok((_, _, mut pos, npc, animal, _)) = agents.get_mut(entity) else {
        return;
    };
    match (npc, animal) {
        (Some(mut npc), _) => npc.receive(interaction, &mut pos),
        (None, Some(mut animal)) => animal.receive(interaction, &mut pos),
        (None, None) => debug!(%target, "interaction target has no behavior"),
    }
}
