//! EntityLoop: fixed-timestep driver for an [`EntityWorld`].
//!
//! Each `tick(frame_dt)` adds `frame_dt` to an accumulator and runs
//! `fixed_update(fixed_timestep)` once per whole timestep it holds, at
//! most `max_fixed_steps` times. Any backlog beyond that cap is dropped
//! (the fractional remainder is kept). Then `update(frame_dt)` and
//! `late_update(frame_dt)` run once each.

use crate::config::{LoopConfig, RuntimeConfig};
use crate::error::{ConfigError, LoopError};
use crate::world::EntityWorld;
use tracing::{debug, warn};

/// Outcome of one [`EntityLoop::tick`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// `fixed_update` passes that ran.
    pub fixed_steps: u32,
    /// Whole timesteps discarded because the cap was reached.
    pub dropped_steps: u32,
    /// Frames ticked since `start`, including this one. Zero when idle.
    pub frame: u64,
}

#[derive(Debug)]
pub struct EntityLoop {
    world: EntityWorld,
    config: LoopConfig,
    accumulator: f32,
    running: bool,
    frames: u64,
}

impl EntityLoop {
    pub fn new(world: EntityWorld, config: LoopConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            world,
            config,
            accumulator: 0.0,
            running: false,
            frames: 0,
        })
    }

    /// Validates `config` and builds both the world and the loop from it.
    pub fn from_config(config: &RuntimeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let world = EntityWorld::from_config(&config.world).map_err(|err| ConfigError::Invalid {
            field: "world.initial_capacity",
            reason: err.to_string(),
        })?;
        Self::new(world, config.ticker.clone())
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn world(&self) -> &EntityWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut EntityWorld {
        &mut self.world
    }

    pub fn into_world(self) -> EntityWorld {
        self.world
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Fraction of a fixed timestep currently left in the accumulator,
    /// for interpolating between fixed states.
    pub fn alpha(&self) -> f32 {
        self.accumulator / self.config.fixed_timestep
    }

    /// Spawns and enables the world.
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.world.enable();
        self.running = true;
        self.accumulator = 0.0;
        self.frames = 0;
        debug!(
            world = %self.world.name(),
            fixed_timestep = self.config.fixed_timestep,
            max_fixed_steps = self.config.max_fixed_steps,
            "loop started"
        );
    }

    pub fn tick(&mut self, frame_dt: f32) -> Result<TickReport, LoopError> {
        if !frame_dt.is_finite() || frame_dt < 0.0 {
            return Err(LoopError::InvalidDelta(frame_dt));
        }
        if !self.running {
            return Ok(TickReport::default());
        }
        self.frames += 1;

        let step = self.config.fixed_timestep;
        self.accumulator += frame_dt;
        let mut fixed_steps = 0;
        while self.accumulator >= step && fixed_steps < self.config.max_fixed_steps {
            self.world.fixed_update(step);
            self.accumulator -= step;
            fixed_steps += 1;
        }

        let mut dropped_steps = 0;
        if self.accumulator >= step {
            dropped_steps = (self.accumulator / step).floor() as u32;
            self.accumulator %= step;
            warn!(
                world = %self.world.name(),
                frame = self.frames,
                dropped_steps,
                "fixed-step backlog dropped"
            );
        }

        self.world.update(frame_dt);
        self.world.late_update(frame_dt);

        Ok(TickReport {
            fixed_steps,
            dropped_steps,
            frame: self.frames,
        })
    }

    /// Disables the world; entities keep their initialized state.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.world.disable();
        debug!(world = %self.world.name(), frames = self.frames, "loop stopped");
    }

    /// Stops, then despawns the world.
    pub fn shutdown(&mut self) {
        self.stop();
        self.world.despawn();
        debug!(world = %self.world.name(), "loop shut down");
    }
}
