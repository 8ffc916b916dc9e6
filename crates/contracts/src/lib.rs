//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the overtake demo.
//! Business crates depend on this crate only, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Poll cadence and settle delays are wall-clock seconds on the controller side
//! - Frames carry the CARLA simulation timestamp (seconds, f64) and the CARLA frame number

mod blueprint;
mod control;
mod error;
mod runtime;
mod sensor;
mod sensor_source;
mod vehicle;

pub use blueprint::*;
pub use control::ControlCommand;
pub use error::*;
pub use runtime::*;
pub use sensor::Frame;
pub use sensor_source::{FrameCallback, SensorSource};
pub use vehicle::{LocalVehiclePort, VehiclePort};
