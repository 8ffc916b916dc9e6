//! ControlCommand - vehicle control input

use serde::{Deserialize, Serialize};

/// Throttle / steer / brake input applied to a vehicle
///
/// Fire-and-forget: the simulator keeps applying the last command it received
/// until a new one overwrites it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlCommand {
    /// [0, 1]
    pub throttle: f32,
    /// [-1, 1], negative steers left
    pub steer: f32,
    /// [0, 1]
    pub brake: f32,
}

impl ControlCommand {
    /// Hold position
    pub const FULL_BRAKE: Self = Self {
        throttle: 0.0,
        steer: 0.0,
        brake: 1.0,
    };

    /// Build a command, clamping every channel into its valid range
    pub fn new(throttle: f32, steer: f32, brake: f32) -> Self {
        Self {
            throttle: throttle.clamp(0.0, 1.0),
            steer: steer.clamp(-1.0, 1.0),
            brake: brake.clamp(0.0, 1.0),
        }
    }

    /// Whether every channel lies within its range
    pub fn is_valid(&self) -> bool {
        (0.0..=1.0).contains(&self.throttle)
            && (-1.0..=1.0).contains(&self.steer)
            && (0.0..=1.0).contains(&self.brake)
    }
}
