//! Layered error definitions
//!
//! Errors raised by simulator actors

use thiserror::Error;

use crate::ActorId;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Actor Errors =====
    /// CARLA spawn error
    #[error("carla spawn error for '{actor}': {message}")]
    CarlaSpawn { actor: String, message: String },

    /// CARLA actor not found
    #[error("carla actor not found: {actor_id}")]
    CarlaActorNotFound { actor_id: ActorId },

    /// Control command rejected by the simulator
    #[error("control command for actor {actor_id} failed: {message}")]
    CarlaControl { actor_id: ActorId, message: String },
}

impl ContractError {
    /// Create CARLA spawn error
    pub fn carla_spawn(actor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CarlaSpawn {
            actor: actor.into(),
            message: message.into(),
        }
    }

    /// Create control error
    pub fn carla_control(actor_id: ActorId, message: impl Into<String>) -> Self {
        Self::CarlaControl {
            actor_id,
            message: message.into(),
        }
    }
}
