//! Actor Factory error types

use contracts::{ActorRole, ContractError};
use thiserror::Error;

/// Actor Factory specific error
#[derive(Debug, Error)]
pub enum ActorFactoryError {
    /// CARLA connection error
    #[error("failed to connect to CARLA: {message}")]
    ConnectionFailed { message: String },

    /// CARLA did not answer in time
    #[error("timed out connecting to CARLA at {host}:{port} after {timeout_ms}ms")]
    ConnectionTimeout {
        host: String,
        port: u16,
        timeout_ms: u64,
    },

    /// No blueprint matches the filter
    #[error("no blueprint matches '{filter}'")]
    BlueprintNotFound { filter: String },

    /// Vehicle spawn error
    #[error("failed to spawn {role:?} vehicle: {message}")]
    VehicleSpawnFailed { role: ActorRole, message: String },

    /// Sensor spawn error
    #[error("failed to spawn sensor '{sensor_id}' on actor {parent_id}: {message}")]
    SensorSpawnFailed {
        sensor_id: String,
        parent_id: u32,
        message: String,
    },

    /// Camera references a vehicle that was not spawned
    #[error("sensor '{sensor_id}' has no spawned {parent:?} parent")]
    MissingParent { sensor_id: String, parent: ActorRole },

    /// Destroy error
    #[error("failed to destroy actor {actor_id}: {message}")]
    DestroyFailed { actor_id: u32, message: String },

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl ActorFactoryError {
    /// Create vehicle spawn error
    pub fn vehicle_spawn(role: ActorRole, message: impl Into<String>) -> Self {
        Self::VehicleSpawnFailed {
            role,
            message: message.into(),
        }
    }

    /// Create sensor spawn error
    pub fn sensor_spawn(
        sensor_id: impl Into<String>,
        parent_id: u32,
        message: impl Into<String>,
    ) -> Self {
        Self::SensorSpawnFailed {
            sensor_id: sensor_id.into(),
            parent_id,
            message: message.into(),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, ActorFactoryError>;
