//! Animal behavior: needs-driven routine, personality and social reactions.

use bevy_ecs::prelude::*;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;
use std::fmt;
use tracing::debug;

use super::{
    jitter, keep_distance, run_schedule, Agent, BehaviorContext, BehaviorState, Brain, HourWindow,
    Interaction, MovePurpose, Task, TaskKind,
};
use crate::components::{ComponentKind, EntityKind, PositionComponent, SimComponent, Species};

// ============================================================================
// NEEDS
// ============================================================================

const NEED_MIN: f32 = 0.0;
const NEED_MAX: f32 = 100.0;

const HUNGER_RATE: f32 = 0.2;
const ENERGY_DRAIN: f32 = 0.1;
const SOCIAL_DECAY: f32 = 0.15;
const FREEDOM_GAIN: f32 = 0.1;
const FREEDOM_DRAIN_WANDERING: f32 = 0.5;

const EAT_RATE: f32 = 8.0;
const SLEEP_RECOVERY: f32 = 5.0;
const PLAY_SOCIAL_GAIN: f32 = 3.0;
const PLAY_ENERGY_COST: f32 = 0.8;
/// Play stops once energy falls to this level.
const PLAY_MIN_ENERGY: f32 = 20.0;

/// Idle time at home after sleep ends inside the sleep window.
const NIGHT_REST_SECONDS: std::ops::Range<f32> = 20.0..40.0;

const HUNGRY_ABOVE: f32 = 70.0;
const TIRED_BELOW: f32 = 30.0;
const LONELY_BELOW: f32 = 30.0;
const RESTLESS_BELOW: f32 = 50.0;

/// One of an animal's internal drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NeedKind {
    Hunger,
    Energy,
    Social,
    Freedom,
}

impl fmt::Display for NeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NeedKind::Hunger => "hunger",
            NeedKind::Energy => "energy",
            NeedKind::Social => "social",
            NeedKind::Freedom => "freedom",
        };
        f.write_str(name)
    }
}

/// Bounded drives, each kept within `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Needs {
    hunger: f32,
    energy: f32,
    social: f32,
    freedom: f32,
}

impl Default for Needs {
    fn default() -> Self {
        Self::new(30.0, 80.0, 60.0, 60.0)
    }
}

impl Needs {
    pub fn new(hunger: f32, energy: f32, social: f32, freedom: f32) -> Self {
        Self {
            hunger: clamp_need(hunger),
            energy: clamp_need(energy),
            social: clamp_need(social),
            freedom: clamp_need(freedom),
        }
    }

    pub fn hunger(&self) -> f32 {
        self.hunger
    }

    pub fn energy(&self) -> f32 {
        self.energy
    }

    pub fn social(&self) -> f32 {
        self.social
    }

    pub fn freedom(&self) -> f32 {
        self.freedom
    }

    pub fn get(&self, need: NeedKind) -> f32 {
        match need {
            NeedKind::Hunger => self.hunger,
            NeedKind::Energy => self.energy,
            NeedKind::Social => self.social,
            NeedKind::Freedom => self.freedom,
        }
    }

    pub fn set(&mut self, need: NeedKind, value: f32) {
        let slot = match need {
            NeedKind::Hunger => &mut self.hunger,
            NeedKind::Energy => &mut self.energy,
            NeedKind::Social => &mut self.social,
            NeedKind::Freedom => &mut self.freedom,
        };
        *slot = clamp_need(value);
    }

    pub fn adjust(&mut self, need: NeedKind, delta: f32) {
        self.set(need, self.get(need) + delta);
    }
}

fn clamp_need(value: f32) -> f32 {
    if value.is_nan() {
        return NEED_MIN;
    }
    value.clamp(NEED_MIN, NEED_MAX)
}

/// Traits rolled once at creation, each in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Personality {
    pub friendliness: f32,
    pub playfulness: f32,
    pub loyalty: f32,
    pub aggression: f32,
    pub curiosity: f32,
}

impl Personality {
    pub fn roll(rng: &mut dyn RngCore) -> Self {
        let mut trait_value = || rng.gen_range(0.0f32..=100.0);
        Self {
            friendliness: trait_value(),
            playfulness: trait_value(),
            loyalty: trait_value(),
            aggression: trait_value(),
            curiosity: trait_value(),
        }
    }
}

impl Default for Personality {
    fn default() -> Self {
        Self {
            friendliness: 50.0,
            playfulness: 50.0,
            loyalty: 50.0,
            aggression: 50.0,
            curiosity: 50.0,
        }
    }
}

/// Places an animal knows about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimalMemory {
    pub home: (f32, f32),
    pub food_sources: Vec<(f32, f32)>,
    pub water_sources: Vec<(f32, f32)>,
    pub territory_center: (f32, f32),
    pub territory_radius: f32,
}

impl AnimalMemory {
    pub fn new(home: (f32, f32), territory_radius: f32) -> Self {
        Self {
            home,
            food_sources: Vec::new(),
            water_sources: Vec::new(),
            territory_center: home,
            territory_radius,
        }
    }

    pub fn remember_food(&mut self, x: f32, z: f32) {
        if !self.food_sources.contains(&(x, z)) {
            self.food_sources.push((x, z));
        }
    }

    /// Closest known food, or home when none is known.
    pub fn nearest_food(&self, x: f32, z: f32) -> (f32, f32) {
        self.food_sources
            .iter()
            .copied()
            .min_by(|a, b| {
                let da = (a.0 - x).powi(2) + (a.1 - z).powi(2);
                let db = (b.0 - x).powi(2) + (b.1 - z).powi(2);
                da.total_cmp(&db)
            })
            .unwrap_or(self.home)
    }

    pub fn in_territory(&self, x: f32, z: f32) -> bool {
        let dx = x - self.territory_center.0;
        let dz = z - self.territory_center.1;
        dx * dx + dz * dz <= self.territory_radius * self.territory_radius
    }
}

// ============================================================================
// PROPERTIES
// ============================================================================

/// Per-species tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimalProperties {
    pub move_speed: f32,
    pub sight_radius: f32,
    pub wander_radius: f32,
    pub sleep_hours: HourWindow,
}

impl AnimalProperties {
    pub fn for_species(species: Species) -> Self {
        let (move_speed, sight_radius, wander_radius, sleep_hours) = match species {
            Species::Dog => (2.5, 12.0, 10.0, HourWindow::new(22, 6)),
            Species::Cat => (2.2, 10.0, 15.0, HourWindow::new(2, 8)),
            Species::Chicken => (1.2, 6.0, 6.0, HourWindow::new(19, 6)),
            Species::Cow => (1.0, 8.0, 12.0, HourWindow::new(21, 5)),
            Species::Sheep => (1.1, 8.0, 12.0, HourWindow::new(21, 5)),
            Species::Horse => (2.8, 12.0, 20.0, HourWindow::new(22, 4)),
            // Crepuscular and nocturnal animals rest through the day
            Species::Deer => (2.6, 16.0, 30.0, HourWindow::new(10, 15)),
            Species::Rabbit => (2.4, 10.0, 12.0, HourWindow::new(11, 16)),
            Species::Fox => (2.7, 15.0, 30.0, HourWindow::new(9, 16)),
            Species::Wolf => (3.0, 18.0, 35.0, HourWindow::new(8, 16)),
        };
        Self {
            move_speed,
            sight_radius,
            wander_radius,
            sleep_hours,
        }
    }
}

// ============================================================================
// BEHAVIOR
// ============================================================================

/// Task-queue brain of an animal.
#[derive(Component, Debug, Clone, Serialize, Deserialize)]
pub struct AnimalBehavior {
    pub species: Species,
    pub properties: AnimalProperties,
    pub needs: Needs,
    pub personality: Personality,
    pub memory: AnimalMemory,
    brain: Brain,
}

impl SimComponent for AnimalBehavior {
    const KIND: ComponentKind = ComponentKind::Behavior;
}

impl AnimalBehavior {
    /// New animal living at `home`, with a freshly rolled personality.
    pub fn new(species: Species, home: (f32, f32), rng: &mut dyn RngCore) -> Self {
        let properties = AnimalProperties::for_species(species);
        let memory = AnimalMemory::new(home, properties.wander_radius);
        Self {
            species,
            properties,
            needs: Needs::default(),
            personality: Personality::roll(rng),
            memory,
            brain: Brain::default(),
        }
    }

    pub fn brain(&self) -> &Brain {
        &self.brain
    }

    pub fn brain_mut(&mut self) -> &mut Brain {
        &mut self.brain
    }

    /// Grow or decay every need by one tick.
    pub fn update_needs(&mut self, delta_time: f32) {
        let state = self.brain.state();
        self.needs.adjust(NeedKind::Hunger, HUNGER_RATE * delta_time);
        if state != BehaviorState::Sleeping {
            self.needs.adjust(NeedKind::Energy, -ENERGY_DRAIN * delta_time);
        }
        if self.species.is_domestic() {
            self.needs.adjust(NeedKind::Social, -SOCIAL_DECAY * delta_time);
        }
        if state == BehaviorState::Wandering {
            self.needs
                .adjust(NeedKind::Freedom, -FREEDOM_DRAIN_WANDERING * delta_time);
        } else {
            self.needs.adjust(NeedKind::Freedom, FREEDOM_GAIN * delta_time);
        }
    }

    /// Replace the queue with the highest-priority routine for the current
    /// hour and needs.
    pub fn update_daily_routine(&mut self, pos: &PositionComponent, ctx: &mut BehaviorContext<'_>) {
        self.brain.start_routine();
        let home = self.memory.home;

        let reason = if self.properties.sleep_hours.contains(ctx.hour) {
            self.brain.push_task(Task::move_to(home.0, home.1, MovePurpose::Home));
            self.brain.push_task(Task::Sleep);
            // Once rested, idle at home instead of re-planning
            self.brain.push_task(Task::Wait {
                duration: ctx.rng.gen_range(NIGHT_REST_SECONDS),
            });
            "sleep"
        } else if self.needs.hunger > HUNGRY_ABOVE {
            let (x, z) = self.memory.nearest_food(pos.x, pos.z);
            self.brain.push_task(Task::move_to(x, z, MovePurpose::Food));
            self.brain.push_task(Task::Eat { duration: 10.0 });
            "hungry"
        } else if self.needs.energy < TIRED_BELOW {
            self.brain.push_task(Task::move_to(home.0, home.1, MovePurpose::Home));
            self.brain.push_task(Task::Wait {
                duration: ctx.rng.gen_range(10.0..20.0),
            });
            "tired"
        } else if self.needs.social < LONELY_BELOW && self.species.is_domestic() {
            let sight = self.properties.sight_radius;
            match ctx.nearest(pos.x, pos.z, sight, |n| n.kind.is_npc() || n.kind.is_animal()) {
                Some(friend) => {
                    self.brain.push_task(Task::Follow {
                        target: friend.id,
                        duration: 8.0,
                        distance: 1.5,
                    });
                    self.brain.push_task(Task::Play {
                        duration: 10.0,
                        partner: Some(friend.id),
                    });
                }
                None => self.brain.push_task(Task::wander(20.0)),
            }
            "lonely"
        } else if self.needs.freedom < RESTLESS_BELOW || ctx.roll(0.3) {
            self.brain.push_task(Task::wander(15.0));
            self.brain.push_task(Task::Wait {
                duration: ctx.rng.gen_range(5.0..10.0),
            });
            "restless"
        } else {
            let (x, z) = jitter(&mut *ctx.rng, home, 3.0);
            self.brain.push_task(Task::move_to(x, z, MovePurpose::Elsewhere));
            self.brain.push_task(Task::Wait {
                duration: ctx.rng.gen_range(8.0..15.0),
            });
            "idle"
        };
        debug!(species = %self.species, hour = ctx.hour, reason, "animal routine derived");
    }

    /// Advance one tick. Returns effects on other entities.
    pub fn update(
        &mut self,
        pos: &mut PositionComponent,
        ctx: &mut BehaviorContext<'_>,
    ) -> Vec<Interaction> {
        self.update_needs(ctx.delta_time);
        run_schedule(self, pos, ctx);
        self.socialize(pos, ctx)
    }

    fn socialize(
        &mut self,
        pos: &mut PositionComponent,
        ctx: &mut BehaviorContext<'_>,
    ) -> Vec<Interaction> {
        if self.brain.state() == BehaviorState::Sleeping {
            return Vec::new();
        }
        let chance = ctx.tuning.interaction_chance;
        if !ctx.roll(chance) {
            return Vec::new();
        }
        let radius = ctx.tuning.interaction_radius;
        let Some(other) = ctx.nearest(pos.x, pos.z, radius, |n| {
            n.kind.is_npc() || n.kind.is_animal() || n.kind == EntityKind::Player
        }) else {
            return Vec::new();
        };
        let (from_x, from_z) = (pos.x, pos.z);

        if self.species.is_wild() {
            let threatened = match other.kind {
                EntityKind::Npc(_) | EntityKind::Player => true,
                EntityKind::Animal(Species::Dog) => {
                    self.personality.aggression <= 80.0 || !self.memory.in_territory(pos.x, pos.z)
                }
                _ => false,
            };
            if threatened {
                debug!(animal = %ctx.self_id, threat = %other.id, "wild animal flees");
                self.flee_from(other.x, other.z, 4.0);
                return Vec::new();
            }
            if other.kind == EntityKind::Animal(Species::Dog) {
                // Aggressive enough to defend its territory
                return vec![Interaction::ScareOff {
                    target: other.id,
                    from_x,
                    from_z,
                }];
            }
            return Vec::new();
        }

        let head = self.brain.current_task().map(Task::kind);
        match other.kind {
            EntityKind::Animal(Species::Cat) if self.species == Species::Dog => {
                if head != Some(TaskKind::Follow) {
                    self.brain.interrupt(Task::Follow {
                        target: other.id,
                        duration: 4.0,
                        distance: 0.5,
                    });
                }
                vec![Interaction::ScareOff {
                    target: other.id,
                    from_x,
                    from_z,
                }]
            }
            EntityKind::Animal(species) if species == self.species => {
                if head != Some(TaskKind::Play) && self.personality.playfulness > 30.0 {
                    self.brain.interrupt(Task::Play {
                        duration: 5.0,
                        partner: Some(other.id),
                    });
                }
                self.needs.adjust(NeedKind::Social, 10.0);
                vec![Interaction::AdjustNeed {
                    target: other.id,
                    need: NeedKind::Social,
                    amount: 10.0,
                }]
            }
            EntityKind::Npc(_) | EntityKind::Player => {
                pos.face_towards(other.x, other.z);
                self.needs.adjust(NeedKind::Social, 5.0);
                if self.personality.loyalty > 60.0 && head != Some(TaskKind::Follow) {
                    self.brain.interrupt(Task::Follow {
                        target: other.id,
                        duration: 5.0,
                        distance: 2.0,
                    });
                }
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// React to another entity's interaction.
    pub fn receive(&mut self, interaction: &Interaction, pos: &mut PositionComponent) {
        match *interaction {
            Interaction::Greet { from_x, from_z, .. } => pos.face_towards(from_x, from_z),
            Interaction::AdjustNeed { need, amount, .. } => self.needs.adjust(need, amount),
            Interaction::ScareOff { from_x, from_z, .. } => {
                debug!(species = %self.species, "scared off");
                self.flee_from(from_x, from_z, 5.0);
            }
        }
    }

    /// Drop the current plan and run from a point.
    fn flee_from(&mut self, from_x: f32, from_z: f32, duration: f32) {
        self.brain.replace_tasks([Task::Flee {
            from_x,
            from_z,
            duration,
        }]);
    }

    fn wander_radius(&self) -> f32 {
        self.properties.wander_radius * (0.75 + self.personality.curiosity / 200.0)
    }
}

impl Agent for AnimalBehavior {
    fn brain_mut(&mut self) -> &mut Brain {
        &mut self.brain
    }

    fn move_speed(&self) -> f32 {
        self.properties.move_speed
    }

    fn derive_routine(&mut self, pos: &PositionComponent, ctx: &mut BehaviorContext<'_>) {
        self.update_daily_routine(pos, ctx);
    }

    fn process_own_task(
        &mut self,
        task: &mut Task,
        pos: &mut PositionComponent,
        ctx: &mut BehaviorContext<'_>,
    ) -> bool {
        let dt = ctx.delta_time;
        let elapsed = self.brain.state_time();
        match task {
            Task::Eat { duration } => {
                self.needs.adjust(NeedKind::Hunger, -EAT_RATE * dt);
                self.needs.hunger <= NEED_MIN || elapsed >= *duration
            }
            Task::Sleep => {
                self.needs.adjust(NeedKind::Energy, SLEEP_RECOVERY * dt);
                self.needs.energy >= NEED_MAX || !self.properties.sleep_hours.contains(ctx.hour)
            }
            Task::Play { duration, partner } => {
                self.needs.adjust(NeedKind::Social, PLAY_SOCIAL_GAIN * dt);
                self.needs.adjust(NeedKind::Energy, -PLAY_ENERGY_COST * dt);
                match partner.and_then(|id| ctx.find(id)) {
                    Some(other) => {
                        keep_distance(pos, other.x, other.z, 1.0, self.properties.move_speed * 0.8)
                    }
                    None => pos.stop(),
                }
                elapsed >= *duration || self.needs.energy <= PLAY_MIN_ENERGY
            }
            Task::Wander { duration, target } => {
                let speed = self.properties.move_speed * 0.6;
                let reached = match *target {
                    Some((x, z)) => pos.move_toward(x, z, speed),
                    None => true,
                };
                if reached {
                    let angle = ctx.rng.gen_range(0.0..TAU);
                    let distance = ctx.rng.gen_range(0.0..=self.wander_radius());
                    let home = self.memory.home;
                    *target = Some((home.0 + angle.sin() * distance, home.1 + angle.cos() * distance));
                }
                if elapsed >= *duration {
                    pos.stop();
                    true
                } else {
                    false
                }
            }
            other => {
                debug!(task = %other.kind(), species = %self.species, "task not supported by animal, dropping");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Harness;
    use super::super::Neighbor;
    use super::*;
    use crate::components::{EntityId, NpcRole};
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn animal(species: Species, harness: &mut Harness) -> AnimalBehavior {
        AnimalBehavior::new(species, (0.0, 0.0), &mut harness.rng)
    }

    #[test]
    fn test_hungry_animal_goes_to_food() {
        let mut harness = Harness::new();
        let mut dog = animal(Species::Dog, &mut harness);
        dog.memory.remember_food(5.0, 5.0);
        dog.memory.remember_food(-30.0, 2.0);
        dog.needs.set(NeedKind::Hunger, 80.0);

        let pos = PositionComponent::default();
        dog.update_daily_routine(&pos, &mut harness.ctx(0.1, 12));

        let tasks = dog.brain().tasks();
        assert_eq!(
            tasks[0],
            Task::MoveTo {
                x: 5.0,
                z: 5.0,
                purpose: MovePurpose::Food
            }
        );
        assert_eq!(tasks[1].kind(), TaskKind::Eat);
    }

    #[test]
    fn test_sleep_window_wins_over_hunger() {
        let mut harness = Harness::new();
        let mut dog = animal(Species::Dog, &mut harness);
        dog.needs.set(NeedKind::Hunger, 95.0);
        dog.update_daily_routine(&PositionComponent::default(), &mut harness.ctx(0.1, 23));

        let kinds: Vec<TaskKind> = dog.brain().tasks().iter().map(Task::kind).collect();
        assert_eq!(kinds, vec![TaskKind::MoveTo, TaskKind::Sleep, TaskKind::Wait]);
    }

    #[test]
    fn test_rested_animal_settles_at_night() {
        let mut harness = Harness::new();
        let mut dog = animal(Species::Dog, &mut harness);
        dog.needs.set(NeedKind::Energy, 100.0);
        let mut pos = PositionComponent::default();

        let mut states = Vec::new();
        for _ in 0..30 {
            dog.update(&mut pos, &mut harness.ctx(1.0 / 30.0, 23));
            pos.update(1.0 / 30.0);
            states.push(dog.brain().state());
        }
        let changes = states.windows(2).filter(|w| w[0] != w[1]).count();
        assert!(changes <= 3, "states flapped: {states:?}");
        assert_eq!(dog.brain().state(), BehaviorState::Idle);
        assert_eq!(dog.brain().current_task().map(Task::kind), Some(TaskKind::Wait));
    }

    #[test]
    fn test_needs_drift_over_time() {
        let mut harness = Harness::new();
        let mut dog = animal(Species::Dog, &mut harness);
        dog.needs = Needs::new(30.0, 80.0, 60.0, 60.0);

        dog.update_needs(10.0);
        assert!((dog.needs.hunger() - 32.0).abs() < 1e-4);
        assert!((dog.needs.energy() - 79.0).abs() < 1e-4);
        assert!((dog.needs.social() - 58.5).abs() < 1e-4);
        assert!((dog.needs.freedom() - 61.0).abs() < 1e-4);

        // Asleep: hunger still rises, energy holds
        dog.brain_mut().change_state(BehaviorState::Sleeping);
        dog.update_needs(10.0);
        assert!((dog.needs.hunger() - 34.0).abs() < 1e-4);
        assert!((dog.needs.energy() - 79.0).abs() < 1e-4);

        let mut wolf = animal(Species::Wolf, &mut harness);
        wolf.needs = Needs::new(30.0, 80.0, 60.0, 60.0);
        wolf.update_needs(10.0);
        assert!((wolf.needs.social() - 60.0).abs() < 1e-4);
        assert!(wolf.needs.energy() < 80.0);
    }

    #[test]
    fn test_tired_animal_rests_at_home() {
        let mut harness = Harness::new();
        let mut cow = animal(Species::Cow, &mut harness);
        cow.needs.set(NeedKind::Energy, 10.0);
        cow.update_daily_routine(&PositionComponent::new(8.0, 0.0, 8.0), &mut harness.ctx(0.1, 12));

        let tasks = cow.brain().tasks();
        assert_eq!(tasks[0].destination(), Some((0.0, 0.0)));
        assert_eq!(tasks[1].kind(), TaskKind::Wait);
    }

    #[test]
    fn test_lonely_pet_follows_nearest_friend() {
        let mut harness = Harness::new();
        harness.neighbors = vec![Neighbor {
            id: EntityId(3),
            kind: EntityKind::Npc(NpcRole::Farmer),
            x: 4.0,
            z: 0.0,
        }];
        let mut dog = animal(Species::Dog, &mut harness);
        dog.needs.set(NeedKind::Social, 10.0);
        dog.update_daily_routine(&PositionComponent::default(), &mut harness.ctx(0.1, 12));

        let tasks = dog.brain().tasks();
        assert!(matches!(tasks[0], Task::Follow { target: EntityId(3), .. }));
        assert!(matches!(tasks[1], Task::Play { partner: Some(EntityId(3)), .. }));
    }

    #[test]
    fn test_restless_animal_wanders() {
        let mut harness = Harness::new();
        let mut sheep = animal(Species::Sheep, &mut harness);
        sheep.needs.set(NeedKind::Freedom, 20.0);
        sheep.update_daily_routine(&PositionComponent::default(), &mut harness.ctx(0.1, 12));

        let kinds: Vec<TaskKind> = sheep.brain().tasks().iter().map(Task::kind).collect();
        assert_eq!(kinds, vec![TaskKind::Wander, TaskKind::Wait]);
    }

    #[test]
    fn test_eating_ends_when_full() {
        let mut harness = Harness::new();
        let mut cow = animal(Species::Cow, &mut harness);
        cow.needs.set(NeedKind::Hunger, 8.0);
        cow.brain_mut().replace_tasks([Task::Eat { duration: 60.0 }, Task::Wait { duration: 60.0 }]);
        let mut pos = PositionComponent::default();

        let mut ticks = 0;
        while cow.brain().current_task().map(Task::kind) == Some(TaskKind::Eat) {
            cow.update(&mut pos, &mut harness.ctx(0.1, 12));
            ticks += 1;
            assert!(ticks < 100);
        }
        assert_eq!(cow.needs.hunger(), 0.0);
        assert!(ticks <= 12);
    }

    #[test]
    fn test_sleep_ends_at_dawn() {
        let mut harness = Harness::new();
        let mut dog = animal(Species::Dog, &mut harness);
        dog.needs.set(NeedKind::Energy, 10.0);
        dog.brain_mut().replace_tasks([Task::Sleep, Task::Wait { duration: 60.0 }]);
        let mut pos = PositionComponent::default();

        dog.update(&mut pos, &mut harness.ctx(1.0, 2));
        assert_eq!(dog.brain().state(), BehaviorState::Sleeping);
        assert!((dog.needs.energy() - 14.9).abs() < 1e-3);

        dog.update(&mut pos, &mut harness.ctx(1.0, 6));
        assert_eq!(dog.brain().current_task().map(Task::kind), Some(TaskKind::Wait));
    }

    #[test]
    fn test_play_stops_when_exhausted() {
        let mut harness = Harness::new();
        let mut cat = animal(Species::Cat, &mut harness);
        cat.needs.set(NeedKind::Energy, 20.5);
        cat.brain_mut().replace_tasks([
            Task::Play {
                duration: 60.0,
                partner: None,
            },
            Task::Wait { duration: 60.0 },
        ]);
        let mut pos = PositionComponent::default();

        cat.update(&mut pos, &mut harness.ctx(1.0, 12));
        assert_eq!(cat.brain().current_task().map(Task::kind), Some(TaskKind::Wait));
        assert!(cat.needs.energy() <= PLAY_MIN_ENERGY);
    }

    #[test]
    fn test_wandering_drains_freedom() {
        let mut harness = Harness::new();
        let mut deer = animal(Species::Deer, &mut harness);
        deer.needs.set(NeedKind::Freedom, 50.0);
        deer.brain_mut().replace_tasks([Task::wander(30.0)]);
        let mut pos = PositionComponent::default();

        for _ in 0..10 {
            deer.update(&mut pos, &mut harness.ctx(1.0, 20));
            pos.update(1.0);
        }
        assert_eq!(deer.brain().state(), BehaviorState::Wandering);
        assert!(deer.needs.freedom() < 50.0);
        // Wild animals do not get lonely
        assert!((deer.needs.social() - 60.0).abs() < 1e-3);
    }

    #[test]
    fn test_wander_stays_near_home() {
        let mut harness = Harness::new();
        let mut rabbit = animal(Species::Rabbit, &mut harness);
        rabbit.brain_mut().replace_tasks([Task::wander(1000.0)]);
        let mut pos = PositionComponent::default();
        let limit = rabbit.wander_radius() + 1.0;

        for _ in 0..2000 {
            rabbit.update(&mut pos, &mut harness.ctx(0.1, 20));
            pos.update(0.1);
            assert!(pos.horizontal_distance_to(0.0, 0.0) <= limit);
        }
    }

    #[test]
    fn test_scare_off_replaces_plan_with_flight() {
        let mut harness = Harness::new();
        let mut wolf = animal(Species::Wolf, &mut harness);
        let mut pos = PositionComponent::new(0.0, 0.0, 5.0);
        wolf.update(&mut pos, &mut harness.ctx(0.1, 20));

        wolf.receive(
            &Interaction::ScareOff {
                target: EntityId(1),
                from_x: 0.0,
                from_z: 0.0,
            },
            &mut pos,
        );
        assert_eq!(wolf.brain().tasks().len(), 1);

        wolf.update(&mut pos, &mut harness.ctx(0.1, 20));
        assert_eq!(wolf.brain().state(), BehaviorState::Fleeing);
        assert!(pos.velocity_z > 0.0, "should run away from the threat");
    }

    #[test]
    fn test_wild_animal_flees_villagers() {
        let mut harness = Harness::new();
        harness.config.interaction_chance = 1.0;
        harness.neighbors = vec![Neighbor {
            id: EntityId(2),
            kind: EntityKind::Npc(NpcRole::Villager),
            x: 3.0,
            z: 0.0,
        }];
        let mut fox = animal(Species::Fox, &mut harness);
        let mut pos = PositionComponent::default();
        fox.update(&mut pos, &mut harness.ctx(0.1, 20));
        assert_eq!(fox.brain().current_task().map(Task::kind), Some(TaskKind::Flee));
    }

    #[test]
    fn test_dog_chases_cat() {
        let mut harness = Harness::new();
        harness.config.interaction_chance = 1.0;
        harness.neighbors = vec![Neighbor {
            id: EntityId(5),
            kind: EntityKind::Animal(Species::Cat),
            x: 0.0,
            z: 2.0,
        }];
        let mut dog = animal(Species::Dog, &mut harness);
        let mut pos = PositionComponent::default();
        let effects = dog.update(&mut pos, &mut harness.ctx(0.1, 12));

        assert!(matches!(effects.as_slice(), [Interaction::ScareOff { target: EntityId(5), .. }]));
        assert!(matches!(
            dog.brain().current_task(),
            Some(Task::Follow { target: EntityId(5), .. })
        ));
    }

    #[test]
    fn test_queue_refilled_every_tick() {
        let mut harness = Harness::new();
        harness.config.interaction_chance = 0.2;
        harness.neighbors = vec![Neighbor {
            id: EntityId(2),
            kind: EntityKind::Animal(Species::Chicken),
            x: 1.0,
            z: 1.0,
        }];
        let mut chicken = animal(Species::Chicken, &mut harness);
        let mut pos = PositionComponent::default();
        for tick in 0..5_000u32 {
            let hour = (tick / 150) % 24;
            chicken.update(&mut pos, &mut harness.ctx(0.2, hour));
            pos.update(0.2);
            assert!(!chicken.brain().tasks().is_empty(), "empty queue at tick {tick}");
        }
    }

    #[test]
    fn test_personality_rolls_in_range() {
        let mut rng = Pcg32::seed_from_u64(99);
        for _ in 0..50 {
            let p = Personality::roll(&mut rng);
            for value in [p.friendliness, p.playfulness, p.loyalty, p.aggression, p.curiosity] {
                assert!((0.0..=100.0).contains(&value));
            }
        }
    }

    proptest! {
        #[test]
        fn prop_needs_stay_bounded(
            seed in any::<u64>(),
            species_index in 0usize..10,
            start in prop::array::uniform4(-50.0f32..150.0),
            steps in prop::collection::vec((0.0f32..5.0, 0u32..24), 1..200),
        ) {
            let all = [
                Species::Dog, Species::Cat, Species::Chicken, Species::Cow, Species::Sheep,
                Species::Horse, Species::Deer, Species::Rabbit, Species::Fox, Species::Wolf,
            ];
            let mut harness = Harness::new();
            harness.rng = Pcg32::seed_from_u64(seed);
            harness.config.interaction_chance = 0.5;
            let mut behavior = AnimalBehavior::new(all[species_index], (0.0, 0.0), &mut harness.rng);
            behavior.needs = Needs::new(start[0], start[1], start[2], start[3]);
            let mut pos = PositionComponent::default();

            for (dt, hour) in steps {
                behavior.update(&mut pos, &mut harness.ctx(dt, hour));
                pos.update(dt);
                for need in [NeedKind::Hunger, NeedKind::Energy, NeedKind::Social, NeedKind::Freedom] {
                    let value = behavior.needs.get(need);
                    prop_assert!((0.0..=100.0).contains(&value), "{need} = {value}");
                }
            }
        }
    }
}
