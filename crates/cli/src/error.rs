//! Error types for scenario runs.

use actor_factory::{ActorFactoryError, TeardownReport};
use maneuver::ManeuverError;
use thiserror::Error;

/// Scenario error
///
/// Every variant except `Connection` is raised after actors may exist; by the
/// time the caller sees it the roster has already been torn down.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// Could not reach the simulator, nothing was spawned
    #[error("Failed to connect to CARLA server at {host}:{port}: {source}")]
    Connection {
        host: String,
        port: u16,
        #[source]
        source: ActorFactoryError,
    },

    /// World preparation or actor spawning failed
    #[error("Scenario setup failed: {source}")]
    Setup {
        #[source]
        source: ActorFactoryError,
        teardown: TeardownReport,
    },

    /// Maneuver loop aborted
    #[error("Maneuver aborted: {source}")]
    Maneuver {
        #[source]
        source: ManeuverError,
        teardown: TeardownReport,
    },

    /// Ctrl+C / SIGTERM
    #[error("Interrupted by shutdown signal")]
    Interrupted { teardown: TeardownReport },
}

impl ScenarioError {
    /// Teardown performed before the error was returned
    pub fn teardown(&self) -> Option<&TeardownReport> {
        match self {
            Self::Connection { .. } => None,
            Self::Setup { teardown, .. }
            | Self::Maneuver { teardown, .. }
            | Self::Interrupted { teardown } => Some(teardown),
        }
    }
}
