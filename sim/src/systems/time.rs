//! Day-night clock.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::DeltaTime;
use crate::behavior::{AnimalBehavior, NpcBehavior};
use crate::config::SimConfig;

/// Anything that can report the in-game hour.
pub trait TimeProvider {
    /// Hour of day, `0..24`.
    fn current_hour(&self) -> u32;
}

/// Accelerated in-game clock. One in-game hour passes every
/// `ticks_per_hour` fixed ticks.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
pub struct GameClock {
    ticks_per_hour: u32,
    tick_in_hour: u32,
    hour: u32,
    day: u32,
    ticks: u64,
    /// Simulated seconds since the clock started.
    elapsed: f32,
}

impl GameClock {
    pub fn new(ticks_per_hour: u32, start_hour: u32) -> Self {
        Self {
            ticks_per_hour: ticks_per_hour.max(1),
            tick_in_hour: 0,
            hour: start_hour % 24,
            day: 0,
            ticks: 0,
            elapsed: 0.0,
        }
    }

    pub fn from_config(config: &SimConfig) -> Self {
        Self::new(config.ticks_per_hour, config.start_hour)
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Hour with the fraction already elapsed, e.g. 13.5.
    pub fn time_of_day(&self) -> f32 {
        self.hour as f32 + self.tick_in_hour as f32 / self.ticks_per_hour as f32
    }

    pub fn is_daytime(&self) -> bool {
        (6..20).contains(&self.hour)
    }

    /// Jump to the start of `hour`.
    pub fn set_hour(&mut self, hour: u32) {
        self.hour = hour % 24;
        self.tick_in_hour = 0;
    }

    /// Advance one fixed tick. Returns true when a new hour began.
    pub fn advance(&mut self, delta_time: f32) -> bool {
        self.ticks += 1;
        self.elapsed += delta_time;
        self.tick_in_hour += 1;
        if self.tick_in_hour < self.ticks_per_hour {
            return false;
        }
        self.tick_in_hour = 0;
        self.hour += 1;
        if self.hour == 24 {
            self.hour = 0;
            self.day += 1;
        }
        true
    }
}

impl Default for GameClock {
    fn default() -> Self {
        Self::from_config(&SimConfig::default())
    }
}

impl TimeProvider for GameClock {
    fn current_hour(&self) -> u32 {
        self.hour
    }
}

/// Advance the clock; on hour rollover, ask every behavior to re-derive its
/// routine.
pub fn time_system(
    dt: Res<DeltaTime>,
    mut clock: ResMut<GameClock>,
    mut npcs: Query<&mut NpcBehavior>,
    mut animals: Query<&mut AnimalBehavior>,
) {
    if !clock.advance(dt.0) {
        return;
    }
    info!(hour = clock.hour(), day = clock.day(), "hour changed");
    for mut npc in npcs.iter_mut() {
        npc.brain_mut().request_refresh();
    }
    for mut animal in animals.iter_mut() {
        animal.brain_mut().request_refresh();
    }
}
