//! Real CARLA client implementation
//!
//! Connects to CARLA server using carla-rust crate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use carla::client::{ActorBase, Client, Sensor, Vehicle, World};
use carla::geom::{Location, Rotation, Transform as CarlaTransform};
use carla::rpc::VehicleControl;
use contracts::{
    ActorId, ContractError, ControlCommand, Pose, SensorSource, Transform, VehiclePort,
    WeatherParams,
};
use tracing::{debug, info, instrument, warn};

use crate::carla_sensor_source::CarlaSensorSource;
use crate::client::{SimulatorClient, VehicleBlueprint};
use crate::error::{ActorFactoryError, Result};

/// Real CARLA client
///
/// Wraps carla-rust's Client, implements SimulatorClient trait.
/// Uses Mutex for interior mutability, allowing `&self` methods to modify World.
#[derive(Default, Clone)]
pub struct RealCarlaClient {
    /// CARLA client
    client: Arc<Mutex<Option<Client>>>,
    /// World reference (uses Mutex for interior mutability)
    world: Arc<Mutex<Option<World>>>,
    /// Actors spawned through this client
    actors: Arc<Mutex<HashMap<ActorId, ActorType>>>,
}

/// Actor type enumeration
#[derive(Clone)]
enum ActorType {
    Vehicle(Vehicle),
    Sensor(Sensor),
}

impl RealCarlaClient {
    /// Create new client (disconnected state)
    pub fn new() -> Self {
        Self::default()
    }

    /// Access World with mutable reference, ensuring connected
    fn with_world_mut<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut World) -> Result<R>,
    {
        let mut world_guard = self.world.lock().unwrap();
        let world = world_guard
            .as_mut()
            .ok_or_else(|| ActorFactoryError::ConnectionFailed {
                message: "not connected to CARLA server".into(),
            })?;
        f(world)
    }

    fn store_actor(&self, actor_id: ActorId, actor: ActorType) {
        self.actors.lock().unwrap().insert(actor_id, actor);
    }

    fn vehicle(&self, actor_id: ActorId) -> std::result::Result<Vehicle, ContractError> {
        match self.actors.lock().unwrap().get(&actor_id) {
            Some(ActorType::Vehicle(v)) => Ok(v.clone()),
            _ => Err(ContractError::CarlaActorNotFound { actor_id }),
        }
    }

    fn parent_vehicle_for_sensor(
        &self,
        sensor_blueprint: &str,
        parent_id: ActorId,
    ) -> Result<Vehicle> {
        self.vehicle(parent_id).map_err(|_| {
            ActorFactoryError::sensor_spawn(sensor_blueprint, parent_id, "parent vehicle not found")
        })
    }

    fn create_vehicle(
        world: &mut World,
        blueprint: &str,
        attributes: &HashMap<String, String>,
        transform: Transform,
    ) -> Result<Vehicle> {
        let bp_library = world.blueprint_library();
        let mut vehicle_bp =
            bp_library
                .find(blueprint)
                .ok_or_else(|| ActorFactoryError::BlueprintNotFound {
                    filter: blueprint.to_string(),
                })?;

        for (key, value) in attributes {
            if !vehicle_bp.set_attribute(key, value) {
                warn!(key, value, "failed to set vehicle attribute");
            }
        }

        let actor = world
            .spawn_actor(&vehicle_bp, &to_carla_transform(transform))
            .map_err(|e| ContractError::carla_spawn(blueprint, e.to_string()))?;

        Vehicle::try_from(actor)
            .map_err(|_| ContractError::carla_spawn(blueprint, "spawned actor is not a vehicle").into())
    }

    fn create_sensor(
        world: &mut World,
        blueprint: &str,
        transform: Transform,
        parent_actor: &Vehicle,
        parent_id: ActorId,
        attributes: &HashMap<String, String>,
    ) -> Result<Sensor> {
        let bp_library = world.blueprint_library();
        let mut sensor_bp = bp_library.find(blueprint).ok_or_else(|| {
            ActorFactoryError::sensor_spawn(
                blueprint,
                parent_id,
                format!("blueprint '{}' not found", blueprint),
            )
        })?;

        for (key, value) in attributes {
            if !sensor_bp.set_attribute(key, value) {
                warn!(key, value, "failed to set sensor attribute");
            }
        }

        let actor = world
            .spawn_actor_attached(
                &sensor_bp,
                &to_carla_transform(transform),
                parent_actor,
                None,
            )
            .map_err(|e| ActorFactoryError::sensor_spawn(blueprint, parent_id, e.to_string()))?;

        Sensor::try_from(actor).map_err(|_| {
            ActorFactoryError::sensor_spawn(blueprint, parent_id, "spawned actor is not a sensor")
        })
    }

    fn destroy_sensor_actor(sensor: Sensor) -> bool {
        if sensor.is_listening() {
            sensor.stop();
        }
        sensor.destroy()
    }
}

impl VehiclePort for RealCarlaClient {
    async fn pose(&self, vehicle: ActorId) -> std::result::Result<Pose, ContractError> {
        let transform = self.vehicle(vehicle)?.transform();
        Ok(from_carla_transform(&transform))
    }

    async fn apply_control(
        &self,
        vehicle: ActorId,
        command: ControlCommand,
    ) -> std::result::Result<(), ContractError> {
        let control = VehicleControl {
            throttle: command.throttle,
            steer: command.steer,
            brake: command.brake,
            ..Default::default()
        };
        self.vehicle(vehicle)?.apply_control(&control);
        Ok(())
    }
}

impl SimulatorClient for RealCarlaClient {
    #[instrument(name = "real_carla_connect", skip(self), fields(host = %host, port))]
    async fn connect(&mut self, host: &str, port: u16, timeout: Duration) -> Result<()> {
        let host_owned = host.to_string();
        // libcarla 的握手是阻塞调用
        let (client, world) = tokio::task::spawn_blocking(move || {
            let mut client = Client::connect(&host_owned, port, None);
            client.set_timeout(timeout);
            let world = client.world();
            (client, world)
        })
        .await
        .map_err(|e| ActorFactoryError::ConnectionFailed {
            message: e.to_string(),
        })?;

        info!(
            map = %world.map().name(),
            "connected to CARLA server"
        );

        *self.client.lock().unwrap() = Some(client);
        *self.world.lock().unwrap() = Some(world);

        Ok(())
    }

    async fn map_name(&self) -> Result<String> {
        self.with_world_mut(|world| Ok(world.map().name().to_string()))
    }

    #[instrument(name = "real_carla_set_weather", skip(self))]
    async fn set_weather(&self, weather: WeatherParams) -> Result<()> {
        self.with_world_mut(|world| {
            let mut params = world.weather();
            params.sun_azimuth_angle = weather.sun_azimuth_angle;
            params.sun_altitude_angle = weather.sun_altitude_angle;
            params.wind_intensity = weather.wind_intensity;
            world.set_weather(&params);
            Ok(())
        })
    }

    #[instrument(name = "real_carla_destroy_matching", skip(self), fields(filter = %filter))]
    async fn destroy_matching(&self, filter: &str) -> Result<usize> {
        self.with_world_mut(|world| {
            let mut destroyed = 0;
            for actor in world.actors().filter(filter).iter() {
                let actor_id = actor.id();
                if actor.destroy() {
                    destroyed += 1;
                } else {
                    warn!(actor_id, "destroy stale actor returned false");
                }
            }
            Ok(destroyed)
        })
    }

    async fn vehicle_blueprints(&self, filter: &str) -> Result<Vec<VehicleBlueprint>> {
        self.with_world_mut(|world| {
            Ok(world
                .blueprint_library()
                .filter(filter)
                .iter()
                .filter(|bp| bp.id().starts_with("vehicle."))
                .map(|bp| VehicleBlueprint {
                    id: bp.id().to_string(),
                    has_color: bp.contains_attribute("color"),
                })
                .collect())
        })
    }

    #[instrument(
        name = "real_carla_spawn_vehicle",
        skip(self, attributes, transform),
        fields(blueprint = %blueprint)
    )]
    async fn spawn_vehicle(
        &self,
        blueprint: &str,
        attributes: &HashMap<String, String>,
        transform: Transform,
    ) -> Result<ActorId> {
        let vehicle = self.with_world_mut(|world| {
            Self::create_vehicle(world, blueprint, attributes, transform)
        })?;
        let actor_id = vehicle.id();

        debug!(actor_id, blueprint, "vehicle spawned");
        self.store_actor(actor_id, ActorType::Vehicle(vehicle));

        Ok(actor_id)
    }

    #[instrument(
        name = "real_carla_spawn_sensor",
        skip(self, transform, attributes),
        fields(blueprint = %blueprint, parent_id)
    )]
    async fn spawn_sensor(
        &self,
        blueprint: &str,
        transform: Transform,
        parent_id: ActorId,
        attributes: &HashMap<String, String>,
    ) -> Result<ActorId> {
        let parent_actor = self.parent_vehicle_for_sensor(blueprint, parent_id)?;
        let sensor = self.with_world_mut(|world| {
            Self::create_sensor(
                world,
                blueprint,
                transform,
                &parent_actor,
                parent_id,
                attributes,
            )
        })?;

        let actor_id = sensor.id();

        debug!(
            actor_id,
            blueprint, parent_id, "sensor spawned and attached"
        );
        self.store_actor(actor_id, ActorType::Sensor(sensor));

        Ok(actor_id)
    }

    #[instrument(name = "real_carla_destroy_actor", skip(self), fields(actor_id))]
    async fn destroy_actor(&self, actor_id: ActorId) -> Result<()> {
        let removed = self.actors.lock().unwrap().remove(&actor_id);

        // 幂等：不存在也返回 Ok
        let Some(actor) = removed else {
            return Ok(());
        };

        let destroyed = match actor {
            ActorType::Vehicle(v) => v.destroy(),
            ActorType::Sensor(s) => Self::destroy_sensor_actor(s),
        };

        if destroyed {
            debug!(actor_id, "actor destroyed");
            Ok(())
        } else {
            Err(ActorFactoryError::DestroyFailed {
                actor_id,
                message: "server refused to destroy actor".into(),
            })
        }
    }

    fn sensor_source(
        &self,
        actor_id: ActorId,
        sensor_id: String,
    ) -> Option<Box<dyn SensorSource>> {
        match self.actors.lock().unwrap().get(&actor_id) {
            Some(ActorType::Sensor(sensor)) => {
                Some(Box::new(CarlaSensorSource::new(sensor_id, sensor.clone())))
            }
            _ => None,
        }
    }
}

fn to_carla_transform(transform: Transform) -> CarlaTransform {
    CarlaTransform {
        location: Location {
            x: transform.location.x as f32,
            y: transform.location.y as f32,
            z: transform.location.z as f32,
        },
        rotation: Rotation {
            pitch: transform.rotation.pitch as f32,
            yaw: transform.rotation.yaw as f32,
            roll: transform.rotation.roll as f32,
        },
    }
}

fn from_carla_transform(transform: &CarlaTransform) -> Pose {
    Pose::new(
        contracts::Location::new(
            transform.location.x as f64,
            transform.location.y as f64,
            transform.location.z as f64,
        ),
        contracts::Rotation::new(
            transform.rotation.pitch as f64,
            transform.rotation.yaw as f64,
            transform.rotation.roll as f64,
        ),
    )
}
