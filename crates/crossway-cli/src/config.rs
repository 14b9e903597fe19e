//! Simulation configuration.
//!
//! [`SimulationConfig`] controls how many vehicles the driver spawns, how many
//! trips each makes and how long they dawdle before and inside the
//! intersection.  Defaults come from the [`Default`] implementation, a TOML
//! file can override any subset of fields, and `with_*` setters apply CLI
//! flags on top:
//!
//! ```toml
//! vehicles = 8
//! trips_per_vehicle = 50
//! seed = 42
//!
//! [crossing_time_ms]
//! min = 2
//! max = 15
//! ```

use std::path::Path;
use std::str::FromStr;

use crossway_kernel::MAX_ADMITTED;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, SimulationError};

/// Inclusive range of milliseconds to sleep, sampled uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min: u64,
    pub max: u64,
}

impl DelayRange {
    pub const fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }
}

/// Parses `MIN:MAX` or a single fixed value.
impl FromStr for DelayRange {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || SimulationError::InvalidConfig {
            reason: format!("expected MIN:MAX milliseconds, got `{s}`"),
        };
        let parse = |part: &str| part.trim().parse::<u64>().map_err(|_| invalid());

        match s.split_once(':') {
            Some((min, max)) => Ok(Self::new(parse(min)?, parse(max)?)),
            None => {
                let fixed = parse(s)?;
                Ok(Self::new(fixed, fixed))
            }
        }
    }
}

/// Traffic simulation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Concurrent vehicle threads.  At most [`MAX_ADMITTED`].
    ///
    /// Default: **10**.
    pub vehicles: usize,

    /// Trips each vehicle makes through the intersection.
    ///
    /// Default: **20**.
    pub trips_per_vehicle: u32,

    /// Pause before each arrival.
    ///
    /// Default: **0..=20 ms**.
    pub arrival_delay_ms: DelayRange,

    /// Time spent inside the intersection per trip.
    ///
    /// Default: **1..=10 ms**.
    pub crossing_time_ms: DelayRange,

    /// RNG seed.  A random seed is drawn (and reported) when absent.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            vehicles: MAX_ADMITTED,
            trips_per_vehicle: 20,
            arrival_delay_ms: DelayRange::new(0, 20),
            crossing_time_ms: DelayRange::new(1, 10),
            seed: None,
        }
    }
}

impl SimulationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a TOML config file.  Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|source| SimulationError::ConfigRead {
                path: path.to_path_buf(),
                source,
            })?;

        let config: Self = toml::from_str(&content).map_err(|source| {
            SimulationError::ConfigParse {
                path: path.to_path_buf(),
                source,
            }
        })?;

        info!(path = %path.display(), "simulation config loaded");
        Ok(config)
    }

    pub fn with_vehicles(mut self, vehicles: usize) -> Self {
        self.vehicles = vehicles;
        self
    }

    pub fn with_trips_per_vehicle(mut self, trips: u32) -> Self {
        self.trips_per_vehicle = trips;
        self
    }

    pub fn with_arrival_delay_ms(mut self, range: DelayRange) -> Self {
        self.arrival_delay_ms = range;
        self
    }

    pub fn with_crossing_time_ms(mut self, range: DelayRange) -> Self {
        self.crossing_time_ms = range;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Reject values the driver cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.vehicles == 0 || self.vehicles > MAX_ADMITTED {
            return Err(SimulationError::InvalidConfig {
                reason: format!(
                    "vehicles must be between 1 and {MAX_ADMITTED}, got {}",
                    self.vehicles
                ),
            });
        }
        if self.trips_per_vehicle == 0 {
            return Err(SimulationError::InvalidConfig {
                reason: "trips_per_vehicle must be at least 1".into(),
            });
        }
        for (name, range) in [
            ("arrival_delay_ms", self.arrival_delay_ms),
            ("crossing_time_ms", self.crossing_time_ms),
        ] {
            if range.min > range.max {
                return Err(SimulationError::InvalidConfig {
                    reason: format!("{name}: min {} exceeds max {}", range.min, range.max),
                });
            }
        }
        Ok(())
    }

    /// Total trips across all vehicles.
    pub fn total_trips(&self) -> usize {
        self.vehicles * self.trips_per_vehicle as usize
    }
}
