//! Public API for the simulation.
//!
//! This module provides the main interface for the host application (the
//! scene renderer, a headless tool, or tests) to drive the simulation.
//!
//! ## Frame loop
//!
//! The host calls [`SimWorld::update`] once per rendered frame with a
//! monotonic timestamp in milliseconds. The world turns frame deltas into a
//! whole number of fixed steps (default 30 Hz); each fixed step first applies
//! staged entity additions and removals, then runs the registered systems in
//! order. Everything runs on the caller's thread.
//!
//! ## Entity lifecycle
//!
//! [`SimWorld::add_entity`] and [`SimWorld::remove_entity`] only stage the
//! change. Systems never see an entity list mutate while they iterate it.

use bevy_ecs::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::behavior::{AnimalBehavior, NpcBehavior, Task};
use crate::components::*;
use crate::config::SimConfig;
use crate::entity::EntityBlueprint;
use crate::error::{SimError, SimResult};
use crate::persistence::{LayoutStore, Placement, SavedLayout};
use crate::systems::*;
use crate::world::Snapshot;

/// Renderable attach/detach notification for the rendering collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneChange {
    Attached { id: EntityId, handle: RenderHandle },
    Detached { id: EntityId, handle: RenderHandle },
}

/// The main simulation world container.
///
/// Holds the ECS world and schedule, providing a clean API for:
/// - Adding and removing entities
/// - Registering systems
/// - Driving the frame loop
/// - Extracting state snapshots
/// - Issuing commands to individual entities
pub struct SimWorld {
    world: World,
    schedule: Schedule,
    systems: Vec<SystemKind>,
    entities: HashMap<EntityId, Entity>,
    to_add: Vec<(EntityId, EntityBlueprint)>,
    to_remove: Vec<EntityId>,
    ids: IdAllocator,
    scene_changes: Vec<SceneChange>,
    running: bool,
    last_timestamp_ms: Option<f64>,
    tick: u64,
    time: f32,
    /// Accumulated time for fixed timestep.
    time_accumulator: f32,
}

impl SimWorld {
    /// Create a new empty simulation world with the default configuration.
    pub fn new() -> Self {
        Self::build(SimConfig::default(), IdAllocator::starting_at(1))
    }

    /// Create a new simulation world with custom configuration.
    pub fn with_config(config: SimConfig) -> SimResult<Self> {
        Self::with_id_allocator(config, IdAllocator::starting_at(1))
    }

    /// Create a world that draws entity ids from `ids`.
    pub fn with_id_allocator(config: SimConfig, ids: IdAllocator) -> SimResult<Self> {
        config.validate()?;
        Ok(Self::build(config, ids))
    }

    fn build(config: SimConfig, ids: IdAllocator) -> Self {
        let mut world = World::new();
        world.insert_resource(DeltaTime(config.fixed_timestep));
        world.insert_resource(GameClock::from_config(&config));
        world.insert_resource(SimRng::seeded(config.seed));
        world.insert_resource(config);

        let systems = SystemKind::DEFAULT_ORDER.to_vec();
        let schedule = build_schedule(&systems);

        Self {
            world,
            schedule,
            systems,
            entities: HashMap::new(),
            to_add: Vec::new(),
            to_remove: Vec::new(),
            ids,
            scene_changes: Vec::new(),
            running: false,
            last_timestamp_ms: None,
            tick: 0,
            time: 0.0,
            time_accumulator: 0.0,
        }
    }

    /// Create a small village for demonstration: villagers of every trade,
    /// farm and wild animals, houses, a well and some trees.
    pub fn new_village() -> Self {
        let mut sim = Self::new();
        let mut handles = 0u64;
        let mut next_handle = move || {
            handles += 1;
            RenderHandle(handles)
        };

        let houses = [(-20.0, -10.0), (-20.0, 10.0), (20.0, -10.0), (20.0, 10.0), (0.0, 25.0)];
        for &(x, z) in &houses {
            sim.add_entity(EntityBlueprint::structure(x, z, 3.0).with_render_handle(next_handle()));
        }
        sim.add_entity(
            EntityBlueprint::structure(0.0, 0.0, 1.0)
                .with_name("Well")
                .with_render_handle(next_handle()),
        );

        let villagers = [
            (NpcRole::Farmer, "Alda", houses[0], (-35.0, -30.0)),
            (NpcRole::Farmer, "Berit", houses[1], (-35.0, 30.0)),
            (NpcRole::Blacksmith, "Cort", houses[2], (12.0, -4.0)),
            (NpcRole::Merchant, "Dagny", houses[3], (4.0, 4.0)),
            (NpcRole::Guard, "Egil", houses[4], (0.0, 45.0)),
            (NpcRole::Villager, "Frida", houses[4], (-4.0, 2.0)),
        ];
        for (role, name, (hx, hz), work) in villagers {
            // Stand in front of the door rather than inside the house
            let home = (hx, hz + 4.0);
            sim.add_entity(
                EntityBlueprint::villager(role, home, work)
                    .with_name(name)
                    .with_render_handle(next_handle()),
            );
        }

        let animals = [
            (Species::Dog, (-16.0, -6.0)),
            (Species::Cat, (16.0, 6.0)),
            (Species::Chicken, (-30.0, -24.0)),
            (Species::Chicken, (-31.0, -25.0)),
            (Species::Cow, (-38.0, 24.0)),
            (Species::Sheep, (-34.0, 26.0)),
            (Species::Horse, (10.0, 20.0)),
            (Species::Deer, (60.0, 60.0)),
            (Species::Rabbit, (-50.0, 55.0)),
            (Species::Fox, (70.0, -40.0)),
            (Species::Wolf, (-80.0, -80.0)),
        ];
        for (species, home) in animals {
            let mut blueprint =
                EntityBlueprint::animal(species, home, &mut sim.world.resource_mut::<SimRng>().0);
            if let Some(animal) = blueprint.animal.as_mut() {
                animal.memory.remember_food(home.0 + 3.0, home.1 - 3.0);
                animal.memory.water_sources.push((0.0, 0.0));
            }
            sim.add_entity(blueprint.with_render_handle(next_handle()));
        }

        for i in 0..12 {
            let angle = (i as f32 / 12.0) * std::f32::consts::TAU;
            let (x, z) = (45.0 * angle.sin(), 45.0 * angle.cos());
            let blueprint = if i % 3 == 0 {
                EntityBlueprint::bush(x, z, angle)
            } else {
                EntityBlueprint::tree(x, z, angle)
            };
            sim.add_entity(blueprint.with_render_handle(next_handle()));
        }

        sim.process_entity_changes();
        sim
    }

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    /// Stage an entity. It becomes visible to systems at the start of the
    /// next fixed step (or the next [`process_entity_changes`](Self::process_entity_changes)).
    pub fn add_entity(&mut self, blueprint: EntityBlueprint) -> EntityId {
        let id = self.ids.allocate();
        self.to_add.push((id, blueprint));
        id
    }

    /// Stage an entity for removal.
    pub fn remove_entity(&mut self, id: EntityId) {
        self.to_remove.push(id);
    }

    /// Apply staged additions, then staged removals.
    pub fn process_entity_changes(&mut self) {
        for (id, blueprint) in std::mem::take(&mut self.to_add) {
            let kind = blueprint.kind;
            let handle = blueprint.render_handle;
            let entity = blueprint.spawn(&mut self.world, id);
            self.entities.insert(id, entity);
            if let Some(handle) = handle {
                self.scene_changes.push(SceneChange::Attached { id, handle });
            }
            info!(entity = %id, %kind, "entity added");
        }

        for id in std::mem::take(&mut self.to_remove) {
            let Some(entity) = self.entities.remove(&id) else {
                warn!(entity = %id, "remove requested for unknown entity");
                continue;
            };
            if let Some(renderable) = self.world.get::<Renderable>(entity) {
                self.scene_changes.push(SceneChange::Detached {
                    id,
                    handle: renderable.handle,
                });
            }
            self.world.despawn(entity);
            info!(entity = %id, "entity removed");
        }
    }

    /// Whether `id` names a live (not merely staged) entity.
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Live entity ids in ascending order.
    pub fn entity_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.entities.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Take pending renderable attach/detach notifications.
    pub fn drain_scene_changes(&mut self) -> Vec<SceneChange> {
        std::mem::take(&mut self.scene_changes)
    }

    fn entity(&self, id: EntityId) -> SimResult<Entity> {
        self.entities
            .get(&id)
            .copied()
            .ok_or(SimError::UnknownEntity(id))
    }

    /// Typed component lookup.
    pub fn component<T: SimComponent>(&self, id: EntityId) -> SimResult<&T> {
        let entity = self.entity(id)?;
        self.world
            .get::<T>(entity)
            .ok_or(SimError::MissingComponent { id, kind: T::KIND })
    }

    /// Mutable typed component lookup.
    pub fn component_mut<T: SimComponent>(&mut self, id: EntityId) -> SimResult<Mut<'_, T>> {
        let entity = self.entity(id)?;
        self.world
            .get_mut::<T>(entity)
            .ok_or(SimError::MissingComponent { id, kind: T::KIND })
    }

    /// Capabilities a live entity carries.
    pub fn component_kinds(&self, id: EntityId) -> SimResult<Vec<ComponentKind>> {
        let entity = self.entity(id)?;
        let entity = self.world.entity(entity);
        let mut kinds = Vec::new();
        if entity.contains::<PositionComponent>() {
            kinds.push(ComponentKind::Position);
        }
        if entity.contains::<PhysicsComponent>() {
            kinds.push(ComponentKind::Physics);
        }
        if entity.contains::<AppearanceComponent>() {
            kinds.push(ComponentKind::Appearance);
        }
        if entity.contains::<NpcBehavior>() || entity.contains::<AnimalBehavior>() {
            kinds.push(ComponentKind::Behavior);
        }
        if entity.contains::<GreeneryComponent>() {
            kinds.push(ComponentKind::Greenery);
        }
        Ok(kinds)
    }

    // ------------------------------------------------------------------
    // Systems
    // ------------------------------------------------------------------

    /// Append a system to the run order. Returns false if already registered.
    pub fn register_system(&mut self, kind: SystemKind) -> bool {
        if self.systems.contains(&kind) {
            return false;
        }
        self.systems.push(kind);
        self.schedule = build_schedule(&self.systems);
        debug!(system = %kind, "system registered");
        true
    }

    /// Remove a system from the run order. Returns false if it was not registered.
    pub fn unregister_system(&mut self, kind: SystemKind) -> bool {
        let before = self.systems.len();
        self.systems.retain(|k| *k != kind);
        if self.systems.len() == before {
            return false;
        }
        self.schedule = build_schedule(&self.systems);
        debug!(system = %kind, "system unregistered");
        true
    }

    /// Registered systems in run order.
    pub fn systems(&self) -> &[SystemKind] {
        &self.systems
    }

    // ------------------------------------------------------------------
    // Frame loop
    // ------------------------------------------------------------------

    pub fn start(&mut self) {
        self.running = true;
    }

    /// Stop the loop. The next frame after a restart only records its timestamp.
    pub fn stop(&mut self) {
        self.running = false;
        self.last_timestamp_ms = None;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Frame entry point. `timestamp_ms` is a monotonic host clock.
    ///
    /// Does nothing while stopped. The first frame after starting only
    /// records the timestamp; later frames advance by the elapsed time,
    /// clamped to `max_frame_delta`.
    pub fn update(&mut self, timestamp_ms: f64) {
        if !self.running {
            return;
        }
        let Some(last) = self.last_timestamp_ms.replace(timestamp_ms) else {
            return;
        };
        let max_delta = self.world.resource::<SimConfig>().max_frame_delta;
        let dt = (((timestamp_ms - last) / 1000.0) as f32).clamp(0.0, max_delta);
        self.step(dt);
    }

    /// Step the simulation forward by `dt` seconds.
    ///
    /// Uses fixed timestep internally - accumulates time and runs fixed updates
    /// as needed. This ensures deterministic behavior regardless of frame rate.
    pub fn step(&mut self, dt: f32) {
        let fixed_dt = self.world.resource::<SimConfig>().fixed_timestep;

        self.time_accumulator += dt;
        while self.time_accumulator >= fixed_dt {
            self.fixed_update(fixed_dt);
            self.time_accumulator -= fixed_dt;
        }
    }

    /// Run a single fixed timestep update.
    fn fixed_update(&mut self, dt: f32) {
        self.process_entity_changes();
        self.world.resource_mut::<DeltaTime>().0 = dt;
        self.schedule.run(&mut self.world);
        self.tick += 1;
        self.time += dt;
    }

    /// Get the current tick number.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Get the elapsed simulation time.
    pub fn current_time(&self) -> f32 {
        self.time
    }

    pub fn clock(&self) -> &GameClock {
        self.world.resource::<GameClock>()
    }

    pub fn current_hour(&self) -> u32 {
        self.clock().current_hour()
    }

    /// Jump the clock to `hour` and have every agent re-plan.
    pub fn set_hour(&mut self, hour: u32) {
        self.world.resource_mut::<GameClock>().set_hour(hour);
        let mut npcs = self.world.query::<&mut NpcBehavior>();
        for mut npc in npcs.iter_mut(&mut self.world) {
            npc.brain_mut().request_refresh();
        }
        let mut animals = self.world.query::<&mut AnimalBehavior>();
        for mut animal in animals.iter_mut(&mut self.world) {
            animal.brain_mut().request_refresh();
        }
        info!(hour = hour % 24, "clock set");
    }

    pub fn config(&self) -> &SimConfig {
        self.world.resource::<SimConfig>()
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Replace an agent's task queue.
    pub fn assign_tasks(&mut self, id: EntityId, tasks: Vec<Task>) -> SimResult<()> {
        let entity = self.entity(id)?;
        let mut entity = self.world.entity_mut(entity);
        if let Some(mut npc) = entity.get_mut::<NpcBehavior>() {
            npc.brain_mut().replace_tasks(tasks);
            return Ok(());
        }
        if let Some(mut animal) = entity.get_mut::<AnimalBehavior>() {
            animal.brain_mut().replace_tasks(tasks);
            return Ok(());
        }
        Err(SimError::MissingComponent {
            id,
            kind: ComponentKind::Behavior,
        })
    }

    /// Send an agent along a path of ground waypoints.
    pub fn command_follow_path(&mut self, id: EntityId, waypoints: Vec<(f32, f32)>) -> SimResult<()> {
        self.assign_tasks(id, vec![Task::follow_path(waypoints)])
    }

    /// Make a grounded entity jump. Returns false when airborne.
    pub fn jump(&mut self, id: EntityId, force: f32) -> SimResult<bool> {
        let entity = self.entity(id)?;
        if self.world.get::<PositionComponent>(entity).is_none() {
            return Err(SimError::MissingComponent {
                id,
                kind: ComponentKind::Position,
            });
        }
        let mut query = self
            .world
            .query::<(&mut PositionComponent, &mut PhysicsComponent)>();
        let Ok((mut pos, mut physics)) = query.get_mut(&mut self.world, entity) else {
            return Err(SimError::MissingComponent {
                id,
                kind: ComponentKind::Physics,
            });
        };
        Ok(physics.jump(force, &mut pos))
    }

    // ------------------------------------------------------------------
    // Snapshots and layouts
    // ------------------------------------------------------------------

    /// Get a snapshot of the current simulation state.
    pub fn snapshot(&mut self) -> Snapshot {
        Snapshot::from_world(&mut self.world, self.tick, self.time)
    }

    /// Get the snapshot as a JSON string.
    pub fn snapshot_json(&mut self) -> String {
        self.snapshot().to_json().unwrap_or_else(|_| "{}".to_string())
    }

    /// Save every entity's placement under `key`. Failures are logged.
    pub fn save_layout(&mut self, store: &mut dyn LayoutStore, key: &str) -> bool {
        let mut query = self.world.query::<(&EntityInfo, &PositionComponent)>();
        let mut placements: Vec<Placement> = query
            .iter(&self.world)
            .map(|(info, pos)| Placement {
                id: info.id,
                x: pos.x,
                y: pos.y,
                z: pos.z,
                direction: pos.direction,
            })
            .collect();
        placements.sort_by_key(|p| p.id);
        let layout = SavedLayout { placements };

        match layout.to_json().and_then(|json| store.save(key, &json)) {
            Ok(()) => {
                debug!(key, entities = layout.placements.len(), "layout saved");
                true
            }
            Err(err) => {
                warn!(key, error = %err, "failed to save layout");
                false
            }
        }
    }

    /// Move entities to the placements saved under `key`. Returns how many
    /// entities were placed; on any store failure nothing moves.
    pub fn restore_layout(&mut self, store: &dyn LayoutStore, key: &str) -> usize {
        let layout = match store.load(key).and_then(|data| match data {
            Some(json) => SavedLayout::from_json(&json).map(Some),
            None => Ok(None),
        }) {
            Ok(Some(layout)) => layout,
            Ok(None) => {
                debug!(key, "no saved layout");
                return 0;
            }
            Err(err) => {
                warn!(key, error = %err, "failed to load layout, keeping current placement");
                return 0;
            }
        };

        let mut restored = 0;
        for placement in &layout.placements {
            let Some(&entity) = self.entities.get(&placement.id) else {
                debug!(entity = %placement.id, "saved placement for unknown entity");
                continue;
            };
            let Some(mut pos) = self.world.get_mut::<PositionComponent>(entity) else {
                continue;
            };
            pos.set_position(placement.x, placement.y, placement.z);
            pos.direction = placement.direction;
            let pos = *pos;
            if let Some(mut renderable) = self.world.get_mut::<Renderable>(entity) {
                renderable.set_transform(&pos);
            }
            restored += 1;
        }
        restored
    }

    /// Get direct access to the ECS world (for advanced usage).
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Get mutable access to the ECS world (for advanced usage).
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::{BehaviorState, MovePurpose, TaskKind};
    use crate::persistence::MemoryStore;

    fn started() -> SimWorld {
        let mut sim = SimWorld::new();
        sim.start();
        sim
    }

    #[test]
    fn test_new_world() {
        let sim = SimWorld::new();
        assert_eq!(sim.current_tick(), 0);
        assert_eq!(sim.systems(), &SystemKind::DEFAULT_ORDER);
        assert!(!sim.is_running());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SimConfig {
            ticks_per_hour: 0,
            ..Default::default()
        };
        assert!(matches!(SimWorld::with_config(config), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn test_step_advances_tick() {
        let mut sim = SimWorld::new();
        sim.step(0.05);
        assert_eq!(sim.current_tick(), 1);
        sim.step(0.02);
        assert_eq!(sim.current_tick(), 2);
    }

    #[test]
    fn test_update_ignored_until_started() {
        let mut sim = SimWorld::new();
        sim.update(0.0);
        sim.update(1000.0);
        assert_eq!(sim.current_tick(), 0);
    }

    #[test]
    fn test_first_frame_only_records_timestamp() {
        let mut sim = started();
        sim.update(5_000.0);
        assert_eq!(sim.current_tick(), 0);
        sim.update(5_120.0);
        assert_eq!(sim.current_tick(), 3);
    }

    #[test]
    fn test_long_frames_are_clamped() {
        let mut sim = started();
        sim.update(0.0);
        sim.update(60_000.0);
        // 0.25 s at 30 Hz
        assert!(sim.current_tick() <= 8);
        assert!(sim.current_time() <= 0.25 + 1e-4);
    }

    #[test]
    fn test_stop_resets_frame_clock() {
        let mut sim = started();
        sim.update(0.0);
        sim.update(100.0);
        let ticks = sim.current_tick();
        sim.stop();
        sim.update(200.0);
        sim.start();
        sim.update(10_000.0);
        assert_eq!(sim.current_tick(), ticks);
    }

    #[test]
    fn test_added_entity_visible_after_next_tick() {
        let mut sim = SimWorld::new();
        let id = sim.add_entity(EntityBlueprint::player(0.0, 0.0));
        assert!(!sim.contains(id));
        assert!(matches!(
            sim.component::<PositionComponent>(id),
            Err(SimError::UnknownEntity(_))
        ));

        sim.step(1.0 / 30.0);
        assert!(sim.contains(id));
        assert!(sim.component::<PositionComponent>(id).is_ok());
    }

    #[test]
    fn test_removal_is_staged() {
        let mut sim = SimWorld::new();
        let id = sim.add_entity(EntityBlueprint::structure(0.0, 0.0, 1.0).with_render_handle(RenderHandle(9)));
        sim.process_entity_changes();
        sim.remove_entity(id);
        assert!(sim.contains(id));

        sim.step(1.0 / 30.0);
        assert!(!sim.contains(id));
        assert_eq!(
            sim.drain_scene_changes(),
            vec![
                SceneChange::Attached { id, handle: RenderHandle(9) },
                SceneChange::Detached { id, handle: RenderHandle(9) },
            ]
        );
        assert!(sim.drain_scene_changes().is_empty());
    }

    #[test]
    fn test_removing_unknown_entity_is_harmless() {
        let mut sim = SimWorld::new();
        sim.remove_entity(EntityId(999));
        sim.step(1.0 / 30.0);
        assert_eq!(sim.entity_count(), 0);
    }

    #[test]
    fn test_injected_id_allocator() {
        let mut sim = SimWorld::with_id_allocator(SimConfig::default(), IdAllocator::starting_at(100)).unwrap();
        assert_eq!(sim.add_entity(EntityBlueprint::player(0.0, 0.0)), EntityId(100));
        assert_eq!(sim.add_entity(EntityBlueprint::player(1.0, 0.0)), EntityId(101));
    }

    #[test]
    fn test_missing_component_is_reported() {
        let mut sim = SimWorld::new();
        let id = sim.add_entity(EntityBlueprint::structure(0.0, 0.0, 1.0));
        sim.process_entity_changes();

        assert!(sim.component::<PhysicsComponent>(id).is_ok());
        match sim.component::<AppearanceComponent>(id) {
            Err(SimError::MissingComponent { kind, .. }) => assert_eq!(kind, ComponentKind::Appearance),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            sim.component_kinds(id).unwrap(),
            vec![ComponentKind::Position, ComponentKind::Physics]
        );
        assert!(matches!(
            sim.assign_tasks(id, vec![Task::Sleep]),
            Err(SimError::MissingComponent { kind: ComponentKind::Behavior, .. })
        ));
    }

    #[test]
    fn test_register_system_rejects_duplicates() {
        let mut sim = SimWorld::new();
        assert!(!sim.register_system(SystemKind::Physics));
        assert!(sim.unregister_system(SystemKind::Physics));
        assert!(!sim.unregister_system(SystemKind::Physics));
        assert!(sim.register_system(SystemKind::Physics));
        assert_eq!(
            sim.systems(),
            &[SystemKind::Time, SystemKind::Behavior, SystemKind::Render, SystemKind::Physics]
        );
    }

    #[test]
    fn test_without_physics_nothing_moves() {
        let mut sim = SimWorld::new();
        sim.set_hour(7);
        sim.unregister_system(SystemKind::Physics);
        let id = sim.add_entity(EntityBlueprint::villager(NpcRole::Farmer, (0.0, 0.0), (20.0, 0.0)));
        for _ in 0..30 {
            sim.step(1.0 / 30.0);
        }
        let pos = sim.component::<PositionComponent>(id).unwrap();
        assert_eq!((pos.x, pos.z), (0.0, 0.0));
        assert!(pos.speed > 0.0);
    }

    #[test]
    fn test_farmer_walks_to_work() {
        let mut sim = SimWorld::new();
        sim.set_hour(7);
        let id = sim.add_entity(EntityBlueprint::villager(NpcRole::Farmer, (0.0, 0.0), (10.0, 0.0)));
        for _ in 0..(30 * 8) {
            sim.step(1.0 / 30.0);
        }
        let pos = sim.component::<PositionComponent>(id).unwrap();
        assert!((pos.x - 10.0).abs() <= 5.0, "farmer at x = {}", pos.x);
        let npc = sim.component::<NpcBehavior>(id).unwrap();
        assert!(matches!(
            npc.brain().state(),
            BehaviorState::Working | BehaviorState::MovingToWork
        ));
    }

    #[test]
    fn test_hour_rollover_reschedules_villager() {
        let config = SimConfig {
            ticks_per_hour: 10,
            start_hour: 16,
            ..Default::default()
        };
        let mut sim = SimWorld::with_config(config).unwrap();
        let id = sim.add_entity(EntityBlueprint::villager(NpcRole::Blacksmith, (0.0, 0.0), (5.0, 0.0)));
        sim.step(1.0 / 30.0);
        assert_eq!(
            sim.component::<NpcBehavior>(id).unwrap().brain().state(),
            BehaviorState::MovingToWork
        );

        // 17:00 is past the 8-17 window
        for _ in 0..9 {
            sim.step(1.0 / 30.0);
        }
        assert_eq!(sim.current_hour(), 17);
        assert_eq!(
            sim.component::<NpcBehavior>(id).unwrap().brain().state(),
            BehaviorState::MovingToHome
        );
    }

    #[test]
    fn test_follow_path_command() {
        let mut sim = SimWorld::new();
        let id = sim.add_entity(EntityBlueprint::villager(NpcRole::Villager, (0.0, 0.0), (0.0, 0.0)));
        sim.process_entity_changes();
        sim.command_follow_path(id, vec![(3.0, 0.0), (3.0, 3.0)]).unwrap();

        for _ in 0..(30 * 6) {
            sim.step(1.0 / 30.0);
            let npc = sim.component::<NpcBehavior>(id).unwrap();
            if npc.brain().current_task().map(Task::kind) != Some(TaskKind::FollowPath) {
                break;
            }
        }
        let pos = sim.component::<PositionComponent>(id).unwrap();
        assert!(pos.horizontal_distance_to(3.0, 3.0) < 1.0);
    }

    #[test]
    fn test_assign_tasks_replaces_queue() {
        let mut sim = SimWorld::new();
        let id = sim.add_entity(EntityBlueprint::villager(NpcRole::Guard, (0.0, 0.0), (0.0, 0.0)));
        sim.process_entity_changes();
        sim.assign_tasks(id, vec![Task::move_to(1.0, 1.0, MovePurpose::Elsewhere)]).unwrap();
        let npc = sim.component::<NpcBehavior>(id).unwrap();
        assert_eq!(npc.brain().tasks().len(), 1);
        assert!(matches!(
            sim.assign_tasks(EntityId(77), vec![]),
            Err(SimError::UnknownEntity(EntityId(77)))
        ));
    }

    #[test]
    fn test_jump_only_from_ground() {
        let mut sim = SimWorld::new();
        let id = sim.add_entity(EntityBlueprint::player(0.0, 0.0));
        sim.step(1.0 / 30.0);
        assert!(sim.jump(id, 4.0).unwrap());
        assert!(!sim.jump(id, 4.0).unwrap());

        for _ in 0..60 {
            sim.step(1.0 / 30.0);
        }
        assert!(sim.component::<PhysicsComponent>(id).unwrap().grounded);

        let bush = sim.add_entity(EntityBlueprint::bush(5.0, 5.0, 0.0));
        sim.process_entity_changes();
        assert!(matches!(
            sim.jump(bush, 1.0),
            Err(SimError::MissingComponent { kind: ComponentKind::Physics, .. })
        ));
    }

    #[test]
    fn test_layout_roundtrip() {
        let mut sim = SimWorld::new();
        let id = sim.add_entity(EntityBlueprint::structure(4.0, 2.0, 1.0).with_render_handle(RenderHandle(1)));
        sim.process_entity_changes();

        let mut store = MemoryStore::new();
        assert!(sim.save_layout(&mut store, "village"));

        sim.component_mut::<PositionComponent>(id)
            .unwrap()
            .set_position(-9.0, 0.0, -9.0);
        assert_eq!(sim.restore_layout(&store, "village"), 1);

        let pos = sim.component::<PositionComponent>(id).unwrap();
        assert_eq!((pos.x, pos.z), (4.0, 2.0));
        let mut renderables = sim.world_mut().query::<&Renderable>();
        let renderable = renderables.iter(sim.world()).next().unwrap();
        assert_eq!((renderable.x, renderable.z), (4.0, 2.0));
    }

    struct BrokenStore;

    impl LayoutStore for BrokenStore {
        fn load(&self, _key: &str) -> SimResult<Option<String>> {
            Err(SimError::Store("disk on fire".to_string()))
        }

        fn save(&mut self, _key: &str, _value: &str) -> SimResult<()> {
            Err(SimError::Store("disk on fire".to_string()))
        }
    }

    #[test]
    fn test_store_failures_do_not_propagate() {
        let mut sim = SimWorld::new();
        let id = sim.add_entity(EntityBlueprint::player(1.0, 1.0));
        sim.process_entity_changes();

        assert!(!sim.save_layout(&mut BrokenStore, "village"));
        assert_eq!(sim.restore_layout(&BrokenStore, "village"), 0);
        assert_eq!(sim.restore_layout(&MemoryStore::new(), "village"), 0);
        assert_eq!(sim.component::<PositionComponent>(id).unwrap().x, 1.0);
    }

    #[test]
    fn test_village_runs_and_snapshots() {
        let mut sim = SimWorld::new_village();
        assert!(sim.entity_count() > 30);
        assert!(!sim.drain_scene_changes().is_empty());

        sim.start();
        let mut now = 0.0;
        for _ in 0..120 {
            sim.update(now);
            now += 1000.0 / 60.0;
        }
        assert!(sim.current_tick() > 0);

        let snapshot = sim.snapshot();
        assert_eq!(snapshot.entities.len(), sim.entity_count());
        let json = sim.snapshot_json();
        assert!(json.contains("Farmer"));
        assert!(json.contains("Wolf"));
    }

    #[test]
    fn test_same_seed_same_village() {
        let run = || {
            let mut sim = SimWorld::new_village();
            for _ in 0..90 {
                sim.step(1.0 / 30.0);
            }
            sim.snapshot()
        };
        assert_eq!(run(), run());
    }
}
