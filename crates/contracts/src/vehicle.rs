//! VehiclePort trait - live pose reads and control writes
//!
//! The only surface the maneuver controller needs from the simulator.

use crate::{ActorId, ContractError, ControlCommand, Pose};

/// Per-vehicle pose query and command issuance
///
/// Both operations are independent per actor, no cross-actor locking is implied.
#[trait_variant::make(VehiclePort: Send)]
pub trait LocalVehiclePort {
    /// Read the vehicle's current pose
    ///
    /// # Errors
    /// Returns error if the actor no longer exists or the session is gone
    async fn pose(&self, vehicle: ActorId) -> Result<Pose, ContractError>;

    /// Apply control command, overwriting the previous one
    async fn apply_control(
        &self,
        vehicle: ActorId,
        command: ControlCommand,
    ) -> Result<(), ContractError>;
}
