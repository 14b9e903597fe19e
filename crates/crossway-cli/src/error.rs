//! Simulation driver errors.

use std::path::PathBuf;

use crossway_kernel::GateError;

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`crate::config::SimulationConfig`].
    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A config value is out of range.
    #[error("invalid simulation config: {reason}")]
    InvalidConfig { reason: String },

    /// The OS refused to start a thread.
    #[error("failed to spawn thread {thread}: {source}")]
    Spawn {
        thread: String,
        #[source]
        source: std::io::Error,
    },

    /// A vehicle thread panicked mid-trip.
    #[error("vehicle {vehicle} panicked")]
    VehiclePanicked { vehicle: usize },

    /// The safety monitor thread panicked.
    #[error("safety monitor panicked")]
    MonitorPanicked,

    #[error(transparent)]
    Gate(#[from] GateError),
}

pub type Result<T> = std::result::Result<T, SimulationError>;
