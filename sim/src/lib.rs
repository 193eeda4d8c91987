//! Living Village - Simulation Core
//!
//! A deterministic, fixed-timestep ECS simulation of a small village:
//! villagers with daily routines, farm and wild animals driven by needs,
//! simple physics with collisions, and swaying greenery.
//! Uses `bevy_ecs` for the entity-component-system architecture.

pub mod api;
pub mod behavior;
pub mod components;
pub mod config;
pub mod entity;
pub mod error;
pub mod persistence;
pub mod systems;
pub mod world;

pub use api::{SceneChange, SimWorld};
pub use behavior::{
    AnimalBehavior, BehaviorState, Brain, Interaction, MovePurpose, NeedKind, Needs, NpcBehavior, Task,
    TaskKind,
};
pub use components::*;
pub use config::SimConfig;
pub use entity::EntityBlueprint;
pub use error::{SimError, SimResult};
pub use persistence::{LayoutStore, MemoryStore, Placement, SavedLayout};
pub use systems::*;
pub use world::{EntitySnapshot, Snapshot};
