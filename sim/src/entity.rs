//! Entity blueprints.
//!
//! A blueprint carries an entity's full component set so it can be staged
//! with [`SimWorld::add_entity`](crate::SimWorld::add_entity) and spawned
//! in one step at the top of the next tick.

use bevy_ecs::prelude::*;
use rand::RngCore;

use crate::behavior::{AnimalBehavior, NpcBehavior};
use crate::components::*;

/// Identity and placement shared by every spawned entity.
#[derive(Bundle)]
struct BodyBundle {
    info: EntityInfo,
    position: PositionComponent,
}

/// Full description of an entity waiting to be spawned.
#[derive(Debug, Clone)]
pub struct EntityBlueprint {
    pub kind: EntityKind,
    pub name: Option<String>,
    pub position: PositionComponent,
    pub physics: Option<PhysicsComponent>,
    pub appearance: Option<AppearanceComponent>,
    pub greenery: Option<GreeneryComponent>,
    pub npc: Option<NpcBehavior>,
    pub animal: Option<AnimalBehavior>,
    pub render_handle: Option<RenderHandle>,
}

impl EntityBlueprint {
    /// Bare entity with only identity and position.
    pub fn new(kind: EntityKind, x: f32, y: f32, z: f32) -> Self {
        Self {
            kind,
            name: None,
            position: PositionComponent::new(x, y, z),
            physics: None,
            appearance: None,
            greenery: None,
            npc: None,
            animal: None,
            render_handle: None,
        }
    }

    /// Villager living at `home` and working at `work`; starts at home.
    pub fn villager(role: NpcRole, home: (f32, f32), work: (f32, f32)) -> Self {
        let npc = NpcBehavior::new(role, home, work);
        let mut blueprint = Self::new(EntityKind::Npc(role), home.0, 0.0, home.1);
        blueprint.position.max_speed = npc.properties.move_speed * 2.0;
        blueprint.physics = Some(PhysicsComponent::new(70.0, 0.4));
        blueprint.appearance = Some(AppearanceComponent::new(1.0));
        blueprint.npc = Some(npc);
        blueprint
    }

    /// Animal of `species` living at `home`, with a personality rolled from `rng`.
    pub fn animal(species: Species, home: (f32, f32), rng: &mut dyn RngCore) -> Self {
        let animal = AnimalBehavior::new(species, home, rng);
        let (mass, radius, scale) = body_for(species);
        let mut blueprint = Self::new(EntityKind::Animal(species), home.0, 0.0, home.1);
        blueprint.position.max_speed = animal.properties.move_speed * 2.0;
        blueprint.physics = Some(PhysicsComponent::new(mass, radius));
        blueprint.appearance = Some(AppearanceComponent::new(scale));
        blueprint.animal = Some(animal);
        blueprint
    }

    /// Player avatar, driven from outside the simulation.
    pub fn player(x: f32, z: f32) -> Self {
        let mut blueprint = Self::new(EntityKind::Player, x, 0.0, z);
        blueprint.physics = Some(PhysicsComponent::new(75.0, 0.4));
        blueprint.appearance = Some(AppearanceComponent::default());
        blueprint
    }

    /// Building, fence or well.
    pub fn structure(x: f32, z: f32, radius: f32) -> Self {
        let mut blueprint = Self::new(EntityKind::Structure, x, 0.0, z);
        blueprint.physics = Some(PhysicsComponent::static_body(radius));
        blueprint
    }

    /// Swaying tree with a solid trunk.
    pub fn tree(x: f32, z: f32, phase: f32) -> Self {
        let mut blueprint = Self::new(EntityKind::Greenery, x, 0.0, z);
        blueprint.physics = Some(PhysicsComponent::static_body(0.5));
        blueprint.greenery = Some(GreeneryComponent::with_phase(phase));
        blueprint
    }

    /// Bush or flower bed; no collision.
    pub fn bush(x: f32, z: f32, phase: f32) -> Self {
        let mut blueprint = Self::new(EntityKind::Greenery, x, 0.0, z);
        blueprint.greenery = Some(GreeneryComponent {
            sway_amplitude: 0.08,
            sway_speed: 2.0,
            ..GreeneryComponent::with_phase(phase)
        });
        blueprint
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_render_handle(mut self, handle: RenderHandle) -> Self {
        self.render_handle = Some(handle);
        self
    }

    /// Capabilities the spawned entity will carry.
    pub fn component_kinds(&self) -> Vec<ComponentKind> {
        let mut kinds = vec![ComponentKind::Position];
        if self.physics.is_some() {
            kinds.push(ComponentKind::Physics);
        }
        if self.appearance.is_some() {
            kinds.push(ComponentKind::Appearance);
        }
        if self.npc.is_some() || self.animal.is_some() {
            kinds.push(ComponentKind::Behavior);
        }
        if self.greenery.is_some() {
            kinds.push(ComponentKind::Greenery);
        }
        kinds
    }

    /// Spawn into `world` under `id`.
    pub(crate) fn spawn(self, world: &mut World, id: EntityId) -> Entity {
        let mut entity = world.spawn(BodyBundle {
            info: EntityInfo {
                id,
                kind: self.kind,
                name: self.name,
            },
            position: self.position,
        });
        if let Some(handle) = self.render_handle {
            let mut renderable = Renderable::new(handle);
            renderable.set_transform(&self.position);
            if let Some(appearance) = &self.appearance {
                renderable.scale = appearance.scale;
            }
            entity.insert(renderable);
        }
        if let Some(physics) = self.physics {
            entity.insert(physics);
        }
        if let Some(appearance) = self.appearance {
            entity.insert(appearance);
        }
        if let Some(greenery) = self.greenery {
            entity.insert(greenery);
        }
        if let Some(npc) = self.npc {
            entity.insert(npc);
        }
        if let Some(animal) = self.animal {
            entity.insert(animal);
        }
        entity.id()
    }
}

/// Mass, collision radius and visual scale per species.
fn body_for(species: Species) -> (f32, f32, f32) {
    match species {
        Species::Dog => (25.0, 0.4, 0.8),
        Species::Cat => (4.0, 0.25, 0.5),
        Species::Chicken => (2.0, 0.2, 0.4),
        Species::Cow => (600.0, 0.9, 1.4),
        Species::Sheep => (70.0, 0.6, 1.0),
        Species::Horse => (500.0, 0.9, 1.5),
        Species::Deer => (90.0, 0.6, 1.1),
        Species::Rabbit => (2.0, 0.2, 0.35),
        Species::Fox => (8.0, 0.3, 0.6),
        Species::Wolf => (40.0, 0.45, 0.9),
    }
}
