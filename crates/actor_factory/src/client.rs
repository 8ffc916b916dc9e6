//! CARLA client abstraction
//!
//! Defines traits for interacting with CARLA, supporting real implementation and mock testing.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use contracts::{ActorId, SensorSource, Transform, VehiclePort, WeatherParams};
use tracing::{info, instrument};

use crate::error::{ActorFactoryError, Result};

/// Vehicle blueprint as listed by the blueprint library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleBlueprint {
    /// Blueprint id, e.g. "vehicle.audi.tt"
    pub id: String,
    /// Whether the blueprint exposes a `color` attribute
    pub has_color: bool,
}

/// CARLA client trait
///
/// Abstracts CARLA session, world and actor operations for testing and future implementation replacement.
/// Pose reads and control writes come from the `VehiclePort` supertrait.
pub trait SimulatorClient: VehiclePort + Send + Sync {
    /// Connect to CARLA server
    ///
    /// `timeout` is the client-side request timeout; callers that need a hard
    /// deadline on the handshake itself use [`connect_with_timeout`].
    fn connect(
        &mut self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Name of the map currently loaded
    fn map_name(&self) -> impl Future<Output = Result<String>> + Send;

    /// Apply weather parameters
    fn set_weather(&self, weather: WeatherParams) -> impl Future<Output = Result<()>> + Send;

    /// Destroy every existing actor whose type id matches `filter` (e.g. "vehicle.*")
    ///
    /// # Returns
    /// Number of destroyed actors
    fn destroy_matching(&self, filter: &str) -> impl Future<Output = Result<usize>> + Send;

    /// List vehicle blueprints matching `filter` (e.g. "audi")
    fn vehicle_blueprints(
        &self,
        filter: &str,
    ) -> impl Future<Output = Result<Vec<VehicleBlueprint>>> + Send;

    /// Spawn vehicle
    ///
    /// # Arguments
    /// * `blueprint` - Blueprint id, e.g., "vehicle.audi.tt"
    /// * `attributes` - Blueprint attributes to set before spawning
    /// * `transform` - Initial pose
    ///
    /// # Returns
    /// Newly created actor ID
    fn spawn_vehicle(
        &self,
        blueprint: &str,
        attributes: &HashMap<String, String>,
        transform: Transform,
    ) -> impl Future<Output = Result<ActorId>> + Send;

    /// Spawn sensor and attach to parent actor
    ///
    /// # Arguments
    /// * `blueprint` - Blueprint name, e.g., "sensor.camera.rgb"
    /// * `transform` - Pose relative to parent actor
    /// * `parent_id` - Parent actor ID
    /// * `attributes` - Sensor attributes
    fn spawn_sensor(
        &self,
        blueprint: &str,
        transform: Transform,
        parent_id: ActorId,
        attributes: &HashMap<String, String>,
    ) -> impl Future<Output = Result<ActorId>> + Send;

    /// Destroy actor
    ///
    /// Idempotent operation: returns Ok if actor doesn't exist
    fn destroy_actor(&self, actor_id: ActorId) -> impl Future<Output = Result<()>> + Send;

    /// Get frame source of a spawned camera
    ///
    /// # Returns
    /// None if the actor doesn't exist or is not a camera
    fn sensor_source(&self, actor_id: ActorId, sensor_id: String)
        -> Option<Box<dyn SensorSource>>;
}

/// Connect with a hard deadline
///
/// Fails with `ConnectionTimeout` if the handshake does not finish within `timeout`.
#[instrument(name = "carla_connect_with_timeout", skip(client), fields(host = %host, port))]
pub async fn connect_with_timeout<C: SimulatorClient>(
    client: &mut C,
    host: &str,
    port: u16,
    timeout: Duration,
) -> Result<()> {
    match tokio::time::timeout(timeout, client.connect(host, port, timeout)).await {
        Ok(result) => {
            result?;
            info!("connected to CARLA server");
            Ok(())
        }
        Err(_) => Err(ActorFactoryError::ConnectionTimeout {
            host: host.to_string(),
            port,
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

/// Match a CARLA-style wildcard filter ("vehicle.*", "*audi*", "audi")
///
/// A filter without `*` matches as a substring, like the CARLA blueprint library.
pub fn matches_filter(filter: &str, type_id: &str) -> bool {
    if !filter.contains('*') {
        return type_id.contains(filter);
    }

    let parts: Vec<&str> = filter.split('*').collect();
    let mut rest = type_id;

    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(tail) => rest = tail,
                None => return false,
            }
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(pos) => rest = &rest[pos + part.len()..],
                None => return false,
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_filter() {
        assert!(matches_filter("vehicle.*", "vehicle.audi.tt"));
        assert!(!matches_filter("vehicle.*", "sensor.camera.rgb"));
        assert!(matches_filter("audi", "vehicle.audi.etron"));
        assert!(!matches_filter("audi", "vehicle.tesla.model3"));
        assert!(matches_filter("*camera*", "sensor.camera.rgb"));
        assert!(matches_filter("sensor.*.rgb", "sensor.camera.rgb"));
        assert!(!matches_filter("sensor.*.depth", "sensor.camera.rgb"));
    }
}
