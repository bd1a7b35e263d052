//! Runtime configuration loaded from TOML.
//!
//! ```toml
//! [world]
//! name = "arena"
//! initial_capacity = 256
//! match_mode = "full_equality"
//!
//! [ticker]
//! fixed_timestep = 0.02
//! max_fixed_steps = 8
//! ```
//!
//! Every field has a default, so partial documents are accepted; unknown
//! fields are rejected.

use crate::entity_collection::MatchMode;
use crate::error::ConfigError;
use crate::primes::MAX_CAPACITY;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    pub name: String,
    /// Entities the world can hold before its table first grows.
    pub initial_capacity: usize,
    pub match_mode: MatchMode,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: "world".to_string(),
            initial_capacity: 0,
            match_mode: MatchMode::HashOnly,
        }
    }
}

impl WorldConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_capacity > MAX_CAPACITY {
            return Err(ConfigError::Invalid {
                field: "world.initial_capacity",
                reason: format!("must not exceed {MAX_CAPACITY}"),
            });
        }
        Ok(())
    }
}

/// Fixed-timestep settings for [`EntityLoop`](crate::EntityLoop).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoopConfig {
    /// Seconds simulated by one `fixed_update`.
    pub fixed_timestep: f32,
    /// Upper bound on `fixed_update` calls per tick; the remaining
    /// backlog is dropped.
    pub max_fixed_steps: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: 0.02,
            max_fixed_steps: 8,
        }
    }
}

impl LoopConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.fixed_timestep.is_finite() || self.fixed_timestep <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "ticker.fixed_timestep",
                reason: format!("must be a positive finite number, got {}", self.fixed_timestep),
            });
        }
        if self.max_fixed_steps == 0 {
            return Err(ConfigError::Invalid {
                field: "ticker.max_fixed_steps",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    pub world: WorldConfig,
    pub ticker: LoopConfig,
}

impl RuntimeConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.world.validate()?;
        self.ticker.validate()
    }
}
