//! Simulation tuning.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Configuration for the simulation loop and behavior tuning.
///
/// Inserted into the ECS world as a resource so every system reads the same
/// values. Missing fields fall back to [`SimConfig::default`] when loaded from
/// JSON.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed timestep in seconds (e.g., 1/30 = 0.0333 for 30 Hz).
    pub fixed_timestep: f32,
    /// Largest frame delta accepted by `SimWorld::update`, in seconds.
    /// Longer gaps (tab switch, debugger pause) are clamped to this.
    pub max_frame_delta: f32,
    /// Fixed ticks per in-game hour.
    pub ticks_per_hour: u32,
    /// In-game hour the clock starts at.
    pub start_hour: u32,
    /// Seed for the simulation RNG.
    pub seed: u64,
    /// Ground plane height used for grounding.
    pub ground_height: f32,
    /// Seconds after which a movement task is force-completed.
    pub move_timeout: f32,
    /// Per-tick probability that an agent looks for someone to interact with.
    pub interaction_chance: f32,
    /// Radius of the social interaction scan.
    pub interaction_radius: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: 1.0 / 30.0, // 30 Hz
            max_frame_delta: 0.25,
            ticks_per_hour: 900, // 30 s of real time per in-game hour
            start_hour: 8,
            seed: 0x5eed_0001,
            ground_height: 0.0,
            move_timeout: 10.0,
            interaction_chance: 0.01,
            interaction_radius: 5.0,
        }
    }
}

impl SimConfig {
    /// Parse a configuration from JSON and validate it.
    pub fn from_json(data: &str) -> SimResult<Self> {
        let config: SimConfig = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every value is usable by the loop.
    pub fn validate(&self) -> SimResult<()> {
        if !(self.fixed_timestep.is_finite() && self.fixed_timestep > 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "fixed_timestep must be positive, got {}",
                self.fixed_timestep
            )));
        }
        if self.max_frame_delta < self.fixed_timestep {
            return Err(SimError::InvalidConfig(
                "max_frame_delta must be at least one fixed timestep".to_string(),
            ));
        }
        if self.ticks_per_hour == 0 {
            return Err(SimError::InvalidConfig("ticks_per_hour must be non-zero".to_string()));
        }
        if self.start_hour > 23 {
            return Err(SimError::InvalidConfig(format!(
                "start_hour must be 0..=23, got {}",
                self.start_hour
            )));
        }
        if !(0.0..=1.0).contains(&self.interaction_chance) {
            return Err(SimError::InvalidConfig(
                "interaction_chance must be a probability".to_string(),
            ));
        }
        Ok(())
    }
}
