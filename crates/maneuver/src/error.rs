//! Maneuver error types

use contracts::{ActorId, ContractError};
use thiserror::Error;

use crate::state::ManeuverState;

/// Fatal controller error
#[derive(Debug, Error)]
pub enum ManeuverError {
    /// Pose query failed
    #[error("reading pose of actor {actor_id} in {state} failed: {source}")]
    Pose {
        state: ManeuverState,
        actor_id: ActorId,
        #[source]
        source: ContractError,
    },

    /// Control command was not applied
    #[error("applying control to actor {actor_id} in {state} failed: {source}")]
    Control {
        state: ManeuverState,
        actor_id: ActorId,
        #[source]
        source: ContractError,
    },
}
