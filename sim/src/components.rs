//! ECS Components for the Living Village simulation.
//!
//! Components hold per-entity state plus the small amount of logic that only
//! touches that state (integration, collision primitives, pose animation).
//! Systems decide when that logic runs and across which entities.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;
use std::fmt;

// ============================================================================
// IDENTITY
// ============================================================================

/// Stable identifier for a simulated entity, independent of ECS storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out entity ids. Owned by the world rather than kept as global state.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    /// Start allocating from `first`.
    pub fn starting_at(first: u32) -> Self {
        Self { next: first }
    }

    /// Return the next unused id.
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.wrapping_add(1);
        id
    }
}

/// Villager professions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NpcRole {
    Farmer,
    Blacksmith,
    Merchant,
    Guard,
    Villager,
}

impl fmt::Display for NpcRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NpcRole::Farmer => "farmer",
            NpcRole::Blacksmith => "blacksmith",
            NpcRole::Merchant => "merchant",
            NpcRole::Guard => "guard",
            NpcRole::Villager => "villager",
        };
        f.write_str(name)
    }
}

/// Animal species living in and around the village.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Species {
    Dog,
    Cat,
    Chicken,
    Cow,
    Sheep,
    Horse,
    Deer,
    Rabbit,
    Fox,
    Wolf,
}

impl Species {
    /// Domestic animals seek company; wild ones avoid it.
    pub fn is_domestic(&self) -> bool {
        matches!(
            self,
            Species::Dog | Species::Cat | Species::Chicken | Species::Cow | Species::Sheep | Species::Horse
        )
    }

    pub fn is_wild(&self) -> bool {
        !self.is_domestic()
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Species::Dog => "dog",
            Species::Cat => "cat",
            Species::Chicken => "chicken",
            Species::Cow => "cow",
            Species::Sheep => "sheep",
            Species::Horse => "horse",
            Species::Deer => "deer",
            Species::Rabbit => "rabbit",
            Species::Fox => "fox",
            Species::Wolf => "wolf",
        };
        f.write_str(name)
    }
}

/// Type tag of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Npc(NpcRole),
    Animal(Species),
    Player,
    Structure,
    Greenery,
}

impl EntityKind {
    pub fn is_npc(&self) -> bool {
        matches!(self, EntityKind::Npc(_))
    }

    pub fn is_animal(&self) -> bool {
        matches!(self, EntityKind::Animal(_))
    }

    pub fn species(&self) -> Option<Species> {
        match self {
            EntityKind::Animal(species) => Some(*species),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Npc(role) => write!(f, "npc:{role}"),
            EntityKind::Animal(species) => write!(f, "animal:{species}"),
            EntityKind::Player => f.write_str("player"),
            EntityKind::Structure => f.write_str("structure"),
            EntityKind::Greenery => f.write_str("greenery"),
        }
    }
}

/// Identity carried by every simulated entity.
#[derive(Component, Debug, Clone, Serialize, Deserialize)]
pub struct EntityInfo {
    pub id: EntityId,
    pub kind: EntityKind,
    pub name: Option<String>,
}

// ============================================================================
// COMPONENT REGISTRY
// ============================================================================

/// The component capabilities an entity can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    Position,
    Physics,
    Appearance,
    Behavior,
    Greenery,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComponentKind::Position => "position",
            ComponentKind::Physics => "physics",
            ComponentKind::Appearance => "appearance",
            ComponentKind::Behavior => "behavior",
            ComponentKind::Greenery => "greenery",
        };
        f.write_str(name)
    }
}

/// A simulation component with a known capability tag.
///
/// Lets callers look components up by type (`world.component::<PositionComponent>(id)`)
/// while still reporting the capability name in errors and logs.
pub trait SimComponent: Component {
    const KIND: ComponentKind;
}

// ============================================================================
// RENDERABLE HANDLE
// ============================================================================

/// Opaque handle owned by the rendering collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderHandle(pub u64);

/// Transform and animation slot read by the renderer every frame.
///
/// The simulation writes here; it never builds or owns geometry.
#[derive(Component, Debug, Clone, Serialize, Deserialize)]
pub struct Renderable {
    pub handle: RenderHandle,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Heading around the vertical axis, radians.
    pub rotation_y: f32,
    pub scale: f32,
    pub animation: AnimationState,
    pub pose: Pose,
    /// Set whenever the simulation writes; cleared by the renderer.
    pub dirty: bool,
}

impl Renderable {
    pub fn new(handle: RenderHandle) -> Self {
        Self {
            handle,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            rotation_y: 0.0,
            scale: 1.0,
            animation: AnimationState::Idle,
            pose: Pose::default(),
            dirty: true,
        }
    }

    /// Copy position and heading from a position component.
    pub fn set_transform(&mut self, pos: &PositionComponent) {
        self.x = pos.x;
        self.y = pos.y;
        self.z = pos.z;
        self.rotation_y = pos.direction;
        self.dirty = true;
    }

    /// Return and clear the dirty flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }
}

// ============================================================================
// POSITION
// ============================================================================

/// Scale applied to velocity during integration.
pub const MOVEMENT_SCALE: f32 = 1.0;

/// Squared arrival distance (0.5 units).
pub const ARRIVAL_DISTANCE_SQ: f32 = 0.25;

/// Horizontal speeds below this snap to zero after friction.
const VELOCITY_SNAP: f32 = 0.01;

/// Horizontal displacement that counts as a visible move.
const MOVE_NOTIFY_THRESHOLD: f32 = 0.001;

/// World position, velocity and heading.
///
/// Heading is left-handed: direction 0 faces +Z, and a heading `d` moves along
/// `(sin d, cos d)` in the X/Z plane.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PositionComponent {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub previous_x: f32,
    pub previous_z: f32,
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub velocity_z: f32,
    /// Heading in radians.
    pub direction: f32,
    /// Horizontal speed, always derived from velocity.
    pub speed: f32,
    pub max_speed: f32,
    /// Horizontal damping factor per 1/60 s.
    pub friction: f32,
}

impl Default for PositionComponent {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

impl PositionComponent {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            x,
            y,
            z,
            previous_x: x,
            previous_z: z,
            velocity_x: 0.0,
            velocity_y: 0.0,
            velocity_z: 0.0,
            direction: 0.0,
            speed: 0.0,
            max_speed: 5.0,
            friction: 0.9,
        }
    }

    pub fn with_max_speed(mut self, max_speed: f32) -> Self {
        self.max_speed = max_speed;
        self
    }

    pub fn set_position(&mut self, x: f32, y: f32, z: f32) {
        self.previous_x = self.x;
        self.previous_z = self.z;
        self.x = x;
        self.y = y;
        self.z = z;
    }

    /// Overwrite velocity; heading follows the new horizontal velocity.
    pub fn set_velocity(&mut self, vx: f32, vy: f32, vz: f32) {
        self.velocity_x = vx;
        self.velocity_y = vy;
        self.velocity_z = vz;
        self.speed = vx.hypot(vz);
        if self.speed > 0.0 {
            self.direction = vx.atan2(vz);
        }
    }

    /// Drive horizontally along `direction`; velocity follows the heading.
    ///
    /// Vertical velocity is left alone rather than zeroed, so a walking
    /// entity keeps falling or jumping under physics. Use
    /// [`move_in_direction_3d`](Self::move_in_direction_3d) to set it.
    pub fn move_in_direction(&mut self, direction: f32, speed: f32) {
        let speed = speed.min(self.max_speed);
        self.direction = direction;
        self.speed = speed;
        self.velocity_x = direction.sin() * speed;
        self.velocity_z = direction.cos() * speed;
    }

    /// Like [`move_in_direction`](Self::move_in_direction), also setting vertical velocity.
    pub fn move_in_direction_3d(&mut self, direction: f32, speed: f32, vertical_speed: f32) {
        self.move_in_direction(direction, speed);
        self.velocity_y = vertical_speed;
    }

    /// Seek a point on the current height. Returns true once within 0.5 units.
    pub fn move_toward(&mut self, target_x: f32, target_z: f32, speed: f32) -> bool {
        let dx = target_x - self.x;
        let dz = target_z - self.z;
        if dx * dx + dz * dz < ARRIVAL_DISTANCE_SQ {
            self.stop();
            return true;
        }
        self.move_in_direction(dx.atan2(dz), speed);
        false
    }

    /// Seek a point in 3D. Vertical speed is capped at `min(|dy|, speed)`.
    pub fn move_toward_3d(&mut self, target_x: f32, target_y: f32, target_z: f32, speed: f32) -> bool {
        let dx = target_x - self.x;
        let dy = target_y - self.y;
        let dz = target_z - self.z;
        if dx * dx + dy * dy + dz * dz < ARRIVAL_DISTANCE_SQ {
            self.stop();
            return true;
        }
        let vertical = dy.abs().min(speed).copysign(dy);
        self.move_in_direction_3d(dx.atan2(dz), speed, vertical);
        false
    }

    /// Turn to face a point without moving.
    pub fn face_towards(&mut self, target_x: f32, target_z: f32) {
        let dx = target_x - self.x;
        let dz = target_z - self.z;
        if dx != 0.0 || dz != 0.0 {
            self.direction = dx.atan2(dz);
        }
    }

    pub fn stop(&mut self) {
        self.velocity_x = 0.0;
        self.velocity_y = 0.0;
        self.velocity_z = 0.0;
        self.speed = 0.0;
    }

    pub fn jump(&mut self, force: f32) {
        self.velocity_y = force;
    }

    pub fn horizontal_distance_sq(&self, x: f32, z: f32) -> f32 {
        let dx = x - self.x;
        let dz = z - self.z;
        dx * dx + dz * dz
    }

    pub fn horizontal_distance_to(&self, x: f32, z: f32) -> f32 {
        self.horizontal_distance_sq(x, z).sqrt()
    }

    /// Integrate one step. Returns true if the entity visibly moved
    /// horizontally, meaning the renderable needs the new transform.
    pub fn update(&mut self, delta_time: f32) -> bool {
        self.previous_x = self.x;
        self.previous_z = self.z;

        self.x += self.velocity_x * delta_time * MOVEMENT_SCALE;
        self.y += self.velocity_y * delta_time * MOVEMENT_SCALE;
        self.z += self.velocity_z * delta_time * MOVEMENT_SCALE;

        // Friction only damps horizontal motion
        let damping = self.friction.powf(delta_time * 60.0);
        self.velocity_x *= damping;
        self.velocity_z *= damping;

        self.speed = self.velocity_x.hypot(self.velocity_z);
        if self.speed < VELOCITY_SNAP {
            self.velocity_x = 0.0;
            self.velocity_z = 0.0;
            self.speed = 0.0;
        }

        let moved = (self.x - self.previous_x).hypot(self.z - self.previous_z);
        moved > MOVE_NOTIFY_THRESHOLD
    }
}

impl SimComponent for PositionComponent {
    const KIND: ComponentKind = ComponentKind::Position;
}

// ============================================================================
// PHYSICS
// ============================================================================

/// Downward acceleration in units/s².
pub const GRAVITY: f32 = 9.8;

/// Mass, collision shape and grounding for an entity.
///
/// Operates on the entity's [`PositionComponent`]; pairwise checks across
/// entities are driven by the collision system.
#[derive(Component, Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsComponent {
    pub mass: f32,
    pub is_static: bool,
    pub friction: f32,
    /// Bounciness (0.0 - 1.0).
    pub restitution: f32,
    pub collision_radius: f32,
    pub gravity: bool,
    pub grounded: bool,
    pub colliding: bool,
    /// Entities touched this tick; cleared before each detection pass.
    pub colliding_with: Vec<EntityId>,
}

impl PhysicsComponent {
    /// A dynamic body.
    pub fn new(mass: f32, collision_radius: f32) -> Self {
        Self {
            mass: mass.max(0.001),
            is_static: false,
            friction: 0.9,
            restitution: 0.3,
            collision_radius: collision_radius.max(0.001),
            gravity: true,
            grounded: false,
            colliding: false,
            colliding_with: Vec::new(),
        }
    }

    /// An immovable body (buildings, fences, trees).
    pub fn static_body(collision_radius: f32) -> Self {
        Self {
            is_static: true,
            gravity: false,
            ..Self::new(1000.0, collision_radius)
        }
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution.clamp(0.0, 1.0);
        self
    }

    pub fn without_gravity(mut self) -> Self {
        self.gravity = false;
        self
    }

    /// True when the horizontal footprints overlap.
    pub fn check_collision(
        &self,
        pos: &PositionComponent,
        other: &PhysicsComponent,
        other_pos: &PositionComponent,
    ) -> bool {
        let radii = self.collision_radius + other.collision_radius;
        pos.horizontal_distance_sq(other_pos.x, other_pos.z) < radii * radii
    }

    /// Separate two overlapping bodies and exchange momentum.
    ///
    /// Returns false when nothing was done: both static, no overlap, or
    /// coincident centers where no contact normal exists.
    pub fn resolve_collision(
        &self,
        pos: &mut PositionComponent,
        other: &PhysicsComponent,
        other_pos: &mut PositionComponent,
    ) -> bool {
        let dx = other_pos.x - pos.x;
        let dz = other_pos.z - pos.z;
        let dist_sq = dx * dx + dz * dz;
        if dist_sq <= f32::EPSILON {
            return false;
        }
        let dist = dist_sq.sqrt();
        let overlap = self.collision_radius + other.collision_radius - dist;
        if overlap <= 0.0 {
            return false;
        }
        // Normal points from self toward other
        let nx = dx / dist;
        let nz = dz / dist;

        match (self.is_static, other.is_static) {
            (true, true) => false,
            (false, false) => {
                let total_mass = self.mass + other.mass;
                let self_share = other.mass / total_mass;
                let other_share = self.mass / total_mass;
                pos.x -= nx * overlap * self_share;
                pos.z -= nz * overlap * self_share;
                other_pos.x += nx * overlap * other_share;
                other_pos.z += nz * overlap * other_share;

                let relative = (other_pos.velocity_x - pos.velocity_x) * nx
                    + (other_pos.velocity_z - pos.velocity_z) * nz;
                if relative < 0.0 {
                    let restitution = self.restitution.min(other.restitution);
                    let impulse =
                        -(1.0 + restitution) * relative / (1.0 / self.mass + 1.0 / other.mass);
                    pos.set_velocity(
                        pos.velocity_x - impulse / self.mass * nx,
                        pos.velocity_y,
                        pos.velocity_z - impulse / self.mass * nz,
                    );
                    other_pos.set_velocity(
                        other_pos.velocity_x + impulse / other.mass * nx,
                        other_pos.velocity_y,
                        other_pos.velocity_z + impulse / other.mass * nz,
                    );
                }
                true
            }
            (false, true) => {
                push_out_of_static(pos, -nx, -nz, overlap, self.restitution);
                true
            }
            (true, false) => {
                push_out_of_static(other_pos, nx, nz, overlap, other.restitution);
                true
            }
        }
    }

    pub fn apply_gravity(&self, delta_time: f32, pos: &mut PositionComponent) {
        if !self.gravity || self.is_static || self.grounded {
            return;
        }
        pos.velocity_y -= GRAVITY * delta_time;
    }

    /// Rest on the ground when at or below it.
    pub fn check_grounded(&mut self, ground_height: f32, pos: &mut PositionComponent) {
        if pos.y <= ground_height {
            pos.y = ground_height;
            pos.velocity_y = 0.0;
            self.grounded = true;
        } else {
            self.grounded = false;
        }
    }

    /// Launch upward. Only allowed from the ground.
    pub fn jump(&mut self, force: f32, pos: &mut PositionComponent) -> bool {
        if !self.grounded {
            return false;
        }
        pos.jump(force);
        self.grounded = false;
        true
    }

    pub fn record_contact(&mut self, other: EntityId) {
        self.colliding = true;
        if !self.colliding_with.contains(&other) {
            self.colliding_with.push(other);
        }
    }

    /// Gravity, grounding, and reset of the per-tick contact list.
    pub fn update(&mut self, delta_time: f32, pos: &mut PositionComponent, ground_height: f32) {
        self.apply_gravity(delta_time, pos);
        self.check_grounded(ground_height, pos);
        self.colliding = false;
        self.colliding_with.clear();
    }
}

/// Push a dynamic body out along `(nx, nz)` (pointing away from the static
/// body) and reflect the inbound part of its velocity.
fn push_out_of_static(pos: &mut PositionComponent, nx: f32, nz: f32, overlap: f32, restitution: f32) {
    pos.x += nx * overlap;
    pos.z += nz * overlap;
    let inbound = pos.velocity_x * nx + pos.velocity_z * nz;
    if inbound < 0.0 {
        let bounce = (1.0 + restitution) * inbound;
        pos.set_velocity(
            pos.velocity_x - bounce * nx,
            pos.velocity_y,
            pos.velocity_z - bounce * nz,
        );
    }
}

impl SimComponent for PhysicsComponent {
    const KIND: ComponentKind = ComponentKind::Physics;
}

// ============================================================================
// APPEARANCE
// ============================================================================

/// Discrete animation clip an entity is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AnimationState {
    #[default]
    Idle,
    Walking,
    Farming,
    Eating,
    Sleeping,
    Playing,
}

/// Procedural offsets applied to a model's sub-parts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub body_offset_y: f32,
    pub body_pitch: f32,
    pub head_pitch: f32,
    pub limb_swing: f32,
    pub tail_wag: f32,
    /// Side-to-side lean for plants.
    pub sway: f32,
}

impl Pose {
    /// Pure function of clip and clip time.
    pub fn animate(state: AnimationState, t: f32) -> Self {
        match state {
            AnimationState::Idle => Self {
                body_offset_y: (t * 2.0).sin() * 0.02,
                head_pitch: (t * 0.5).sin() * 0.05,
                ..Self::default()
            },
            AnimationState::Walking => Self {
                body_offset_y: (t * 8.0).sin().abs() * 0.05,
                limb_swing: (t * 8.0).sin() * 0.5,
                tail_wag: (t * 6.0).sin() * 0.3,
                ..Self::default()
            },
            AnimationState::Farming => Self {
                body_pitch: 0.3 + (t * 3.0).sin() * 0.3,
                limb_swing: (t * 3.0).sin() * 0.8,
                ..Self::default()
            },
            AnimationState::Eating => Self {
                body_pitch: 0.1,
                head_pitch: 0.6 + (t * 4.0).sin() * 0.15,
                ..Self::default()
            },
            AnimationState::Sleeping => Self {
                body_offset_y: -0.2 + (t * 0.8).sin() * 0.01,
                head_pitch: 0.3,
                ..Self::default()
            },
            AnimationState::Playing => Self {
                body_offset_y: (t * 6.0).sin().abs() * 0.25,
                limb_swing: (t * 10.0).sin() * 0.6,
                tail_wag: (t * 12.0).sin() * 0.6,
                ..Self::default()
            },
        }
    }
}

/// Visual scale and animation clock.
#[derive(Component, Debug, Clone, Serialize, Deserialize)]
pub struct AppearanceComponent {
    pub scale: f32,
    animation_state: AnimationState,
    animation_time: f32,
    pose: Pose,
}

impl Default for AppearanceComponent {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl AppearanceComponent {
    pub fn new(scale: f32) -> Self {
        Self {
            scale,
            animation_state: AnimationState::Idle,
            animation_time: 0.0,
            pose: Pose::default(),
        }
    }

    pub fn animation_state(&self) -> AnimationState {
        self.animation_state
    }

    pub fn animation_time(&self) -> f32 {
        self.animation_time
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Switch clip. Returns true and restarts the clock if the clip changed.
    pub fn set_animation_state(&mut self, state: AnimationState) -> bool {
        if self.animation_state == state {
            return false;
        }
        self.animation_state = state;
        self.animation_time = 0.0;
        true
    }

    pub fn update(&mut self, delta_time: f32) {
        self.animation_time += delta_time;
        self.pose = Pose::animate(self.animation_state, self.animation_time);
    }
}

impl SimComponent for AppearanceComponent {
    const KIND: ComponentKind = ComponentKind::Appearance;
}

// ============================================================================
// GREENERY
// ============================================================================

/// Passive vegetation that sways in the wind.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GreeneryComponent {
    /// Peak lean in radians.
    pub sway_amplitude: f32,
    /// Radians of phase per second.
    pub sway_speed: f32,
    pub phase: f32,
}

impl Default for GreeneryComponent {
    fn default() -> Self {
        Self {
            sway_amplitude: 0.04,
            sway_speed: 1.2,
            phase: 0.0,
        }
    }
}

impl GreeneryComponent {
    pub fn with_phase(phase: f32) -> Self {
        Self {
            phase: phase.rem_euclid(TAU),
            ..Self::default()
        }
    }

    pub fn update(&mut self, delta_time: f32) {
        self.phase = (self.phase + delta_time * self.sway_speed).rem_euclid(TAU);
    }

    pub fn sway(&self) -> f32 {
        self.sway_amplitude * self.phase.sin()
    }
}

impl SimComponent for GreeneryComponent {
    const KIND: ComponentKind = ComponentKind::Greenery;
}
