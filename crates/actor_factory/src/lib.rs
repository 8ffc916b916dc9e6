//! # Actor Factory
//!
//! CARLA session and actor lifecycle module.
//!
//! Responsibilities:
//! - Connect to the simulator and prepare the world (weather, stale vehicles)
//! - Spawn the scenario's vehicles and cameras into an `ActorRoster`
//! - Tear down every rostered actor on every exit path
//! - Provide unified `SensorSource` / `VehiclePort` access
//! - Support an in-process mock simulator
//!
//! ## Feature Flags
//!
//! - `real-carla`: Enable real CARLA client (requires carla crate)

pub mod client;
pub mod error;
pub mod factory;
pub mod mock_client;
pub mod mock_sensor;

#[cfg(feature = "real-carla")]
pub mod carla_client;
#[cfg(feature = "real-carla")]
pub mod carla_sensor_source;

pub use client::{connect_with_timeout, SimulatorClient, VehicleBlueprint};
pub use contracts::{ActorId, ActorRoster, ScenarioBlueprint, SensorSource, VehiclePort};
pub use error::{ActorFactoryError, Result};
pub use factory::{ActorFactory, ScenarioActors, TeardownReport};
pub use mock_client::{MockCarlaClient, MockConfig};
pub use mock_sensor::{MockCamera, MockCameraConfig};

#[cfg(feature = "real-carla")]
pub use carla_client::RealCarlaClient;
#[cfg(feature = "real-carla")]
pub use carla_sensor_source::CarlaSensorSource;
