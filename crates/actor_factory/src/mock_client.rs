//! Mock CARLA 客户端
//!
//! 进程内的模拟器替身，用于单元测试和 `--mock` 运行模式，支持注入失败场景。
//! 车辆位姿由一个极简的运动学模型推进，只保证控制指令对位姿有单调、可预期的影响。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use contracts::{
    ActorId, ContractError, ControlCommand, Pose, SensorSource, Transform, VehiclePort,
    WeatherParams,
};
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::client::{matches_filter, SimulatorClient, VehicleBlueprint};
use crate::error::{ActorFactoryError, Result};
use crate::mock_sensor::{MockCamera, MockCameraConfig};

/// 全油门加速度 (m/s²)
const MAX_ACCEL: f64 = 4.0;
/// 全刹车减速度 (m/s²)
const MAX_BRAKE_DECEL: f64 = 8.0;
/// 滑行阻力 (m/s²)
const DRAG_DECEL: f64 = 0.5;
/// 满舵时每行驶一米的航向变化 (度)
const YAW_PER_METER: f64 = 6.0;
/// 两车 spawn 点的最小间距 (米)
const MIN_SPAWN_CLEARANCE: f64 = 1.0;

/// Mock 客户端配置
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// connect 是否失败
    pub fail_connect: bool,
    /// connect 前的人为延迟
    pub connect_delay: Option<Duration>,
    /// 第 n 次 spawn（从 0 开始，车辆和传感器一起计数）失败
    pub fail_spawn_at: Option<usize>,
    /// 应该失败的 destroy actor IDs
    pub fail_destroy: Vec<ActorId>,
    /// 成功下发 n 条控制指令后，后续指令全部失败
    pub fail_control_after: Option<usize>,
    /// 成功读取 n 次位姿后，下一次读取直接 panic
    pub panic_on_pose_after: Option<usize>,
    /// 当前加载的地图
    pub map: String,
    /// 连接时世界里已存在的旧车辆数量
    pub stale_vehicles: usize,
    /// 蓝图库中的车辆蓝图
    pub blueprints: Vec<VehicleBlueprint>,
    /// spawn 出来的相机配置
    pub camera: MockCameraConfig,
}

impl Default for MockConfig {
    fn default() -> Self {
        let vehicle = |id: &str, has_color: bool| VehicleBlueprint {
            id: id.to_string(),
            has_color,
        };

        Self {
            fail_connect: false,
            connect_delay: None,
            fail_spawn_at: None,
            fail_destroy: Vec::new(),
            fail_control_after: None,
            panic_on_pose_after: None,
            map: "Carla/Maps/Town04".to_string(),
            stale_vehicles: 0,
            blueprints: vec![
                vehicle("vehicle.audi.a2", true),
                vehicle("vehicle.audi.etron", true),
                vehicle("vehicle.audi.tt", true),
                vehicle("vehicle.tesla.model3", true),
                vehicle("vehicle.carlamotors.firetruck", false),
            ],
            camera: MockCameraConfig::default(),
        }
    }
}

/// Mock 车辆状态
#[derive(Debug, Clone)]
struct MockVehicle {
    pose: Transform,
    control: ControlCommand,
    speed: f64,
    updated_at: Instant,
}

impl MockVehicle {
    fn new(pose: Transform) -> Self {
        Self {
            pose,
            control: ControlCommand::default(),
            speed: 0.0,
            updated_at: Instant::now(),
        }
    }

    /// 用上一次的控制指令把状态推进到 `now`
    fn advance(&mut self, now: Instant) {
        let dt = now.saturating_duration_since(self.updated_at).as_secs_f64();
        self.updated_at = now;
        if dt <= 0.0 {
            return;
        }

        let accel = self.control.throttle as f64 * MAX_ACCEL
            - self.control.brake as f64 * MAX_BRAKE_DECEL
            - DRAG_DECEL;
        let new_speed = (self.speed + accel * dt).max(0.0);
        let distance = (self.speed + new_speed) / 2.0 * dt;
        self.speed = new_speed;

        let rotation = &mut self.pose.rotation;
        let yaw_delta = self.control.steer as f64 * YAW_PER_METER * distance;
        rotation.yaw = normalize_yaw(rotation.yaw + yaw_delta);

        let heading = rotation.yaw.to_radians();
        self.pose.location.x += distance * heading.cos();
        self.pose.location.y += distance * heading.sin();
    }
}

/// 把航向角归一化到 (-180, 180]
fn normalize_yaw(yaw: f64) -> f64 {
    let mut yaw = yaw % 360.0;
    if yaw > 180.0 {
        yaw -= 360.0;
    } else if yaw <= -180.0 {
        yaw += 360.0;
    }
    yaw
}

#[derive(Clone)]
enum MockActorKind {
    Vehicle(MockVehicle),
    Camera { parent: ActorId, camera: MockCamera },
    /// 连接前就存在的车辆
    Stale,
}

#[derive(Clone)]
struct MockActor {
    type_id: String,
    kind: MockActorKind,
}

/// 共享状态
struct MockState {
    /// 配置（可注入失败场景）
    config: MockConfig,
    /// Actor ID 计数器
    next_actor_id: AtomicU32,
    /// spawn 调用计数
    spawn_attempts: AtomicUsize,
    /// 已成功下发的控制指令数
    controls_applied: AtomicUsize,
    /// 位姿读取次数
    poses_read: AtomicUsize,
    /// 已创建的 actors
    actors: Mutex<HashMap<ActorId, MockActor>>,
    /// 连接状态
    connected: AtomicBool,
    /// 当前天气
    weather: Mutex<Option<WeatherParams>>,
    /// 每次真正销毁的 actor（按顺序）
    destroy_log: Mutex<Vec<ActorId>>,
    /// 控制指令记录
    control_log: Mutex<Vec<(ActorId, ControlCommand)>>,
}

/// Mock CARLA 客户端
///
/// Clone 共享同一个模拟世界，测试可以在把客户端交给 `ActorFactory` 后继续检查状态。
#[derive(Clone)]
pub struct MockCarlaClient {
    state: Arc<MockState>,
}

impl MockCarlaClient {
    /// 创建默认 mock 客户端
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    /// 使用配置创建 mock 客户端
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            state: Arc::new(MockState {
                config,
                next_actor_id: AtomicU32::new(1000), // 从 1000 开始，便于识别
                spawn_attempts: AtomicUsize::new(0),
                controls_applied: AtomicUsize::new(0),
                poses_read: AtomicUsize::new(0),
                actors: Mutex::new(HashMap::new()),
                connected: AtomicBool::new(false),
                weather: Mutex::new(None),
                destroy_log: Mutex::new(Vec::new()),
                control_log: Mutex::new(Vec::new()),
            }),
        }
    }

    /// 获取当前存在的 actor 数量
    pub fn actor_count(&self) -> usize {
        self.state.actors.lock().unwrap().len()
    }

    /// 被真正销毁的 actor（按销毁顺序）
    pub fn destroy_log(&self) -> Vec<ActorId> {
        self.state.destroy_log.lock().unwrap().clone()
    }

    /// 下发过的控制指令（按下发顺序）
    pub fn control_log(&self) -> Vec<(ActorId, ControlCommand)> {
        self.state.control_log.lock().unwrap().clone()
    }

    /// 当前天气
    pub fn weather(&self) -> Option<WeatherParams> {
        *self.state.weather.lock().unwrap()
    }

    fn allocate_actor_id(&self) -> ActorId {
        self.state.next_actor_id.fetch_add(1, Ordering::SeqCst)
    }

    /// 本次 spawn 是否应该失败
    fn should_fail_spawn(&self) -> bool {
        let attempt = self.state.spawn_attempts.fetch_add(1, Ordering::SeqCst);
        self.state.config.fail_spawn_at == Some(attempt)
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.state.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ActorFactoryError::ConnectionFailed {
                message: "not connected".into(),
            })
        }
    }

    fn populate_stale_vehicles(&self) {
        let mut actors = self.state.actors.lock().unwrap();
        for _ in 0..self.state.config.stale_vehicles {
            let actor_id = self.allocate_actor_id();
            actors.insert(
                actor_id,
                MockActor {
                    type_id: "vehicle.tesla.model3".to_string(),
                    kind: MockActorKind::Stale,
                },
            );
        }
    }

    fn spawn_point_occupied(actors: &HashMap<ActorId, MockActor>, transform: &Transform) -> bool {
        actors.values().any(|actor| match &actor.kind {
            MockActorKind::Vehicle(v) => {
                let dx = v.pose.location.x - transform.location.x;
                let dy = v.pose.location.y - transform.location.y;
                let dz = v.pose.location.z - transform.location.z;
                (dx * dx + dy * dy + dz * dz).sqrt() < MIN_SPAWN_CLEARANCE
            }
            _ => false,
        })
    }
}

impl Default for MockCarlaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl VehiclePort for MockCarlaClient {
    async fn pose(&self, vehicle: ActorId) -> std::result::Result<Pose, ContractError> {
        // 在拿锁之前 panic，避免 actors 锁中毒影响后续 teardown
        let read = self.state.poses_read.fetch_add(1, Ordering::SeqCst);
        if self.state.config.panic_on_pose_after == Some(read) {
            panic!("mock pose read {read} for actor {vehicle} panicked");
        }

        let mut actors = self.state.actors.lock().unwrap();
        match actors.get_mut(&vehicle).map(|a| &mut a.kind) {
            Some(MockActorKind::Vehicle(v)) => {
                v.advance(Instant::now());
                Ok(v.pose)
            }
            _ => Err(ContractError::CarlaActorNotFound { actor_id: vehicle }),
        }
    }

    async fn apply_control(
        &self,
        vehicle: ActorId,
        command: ControlCommand,
    ) -> std::result::Result<(), ContractError> {
        if let Some(limit) = self.state.config.fail_control_after {
            if self.state.controls_applied.load(Ordering::SeqCst) >= limit {
                return Err(ContractError::carla_control(vehicle, "mock failure"));
            }
        }

        {
            let mut actors = self.state.actors.lock().unwrap();
            match actors.get_mut(&vehicle).map(|a| &mut a.kind) {
                Some(MockActorKind::Vehicle(v)) => {
                    v.advance(Instant::now());
                    v.control = command;
                }
                _ => return Err(ContractError::CarlaActorNotFound { actor_id: vehicle }),
            }
        }

        self.state.controls_applied.fetch_add(1, Ordering::SeqCst);
        self.state
            .control_log
            .lock()
            .unwrap()
            .push((vehicle, command));
        Ok(())
    }
}

impl SimulatorClient for MockCarlaClient {
    #[instrument(name = "mock_carla_connect", skip(self, timeout), fields(host = %host, port))]
    async fn connect(&mut self, host: &str, port: u16, timeout: Duration) -> Result<()> {
        let _ = timeout;
        if let Some(delay) = self.state.config.connect_delay {
            tokio::time::sleep(delay).await;
        }

        if self.state.config.fail_connect {
            return Err(ActorFactoryError::ConnectionFailed {
                message: format!("mock server at {host}:{port} unreachable"),
            });
        }

        if !self.state.connected.swap(true, Ordering::SeqCst) {
            self.populate_stale_vehicles();
        }
        Ok(())
    }

    async fn map_name(&self) -> Result<String> {
        self.ensure_connected()?;
        Ok(self.state.config.map.clone())
    }

    async fn set_weather(&self, weather: WeatherParams) -> Result<()> {
        self.ensure_connected()?;
        *self.state.weather.lock().unwrap() = Some(weather);
        Ok(())
    }

    #[instrument(name = "mock_carla_destroy_matching", skip(self), fields(filter = %filter))]
    async fn destroy_matching(&self, filter: &str) -> Result<usize> {
        self.ensure_connected()?;
        let mut actors = self.state.actors.lock().unwrap();
        let before = actors.len();
        actors.retain(|_, actor| !matches_filter(filter, &actor.type_id));
        Ok(before - actors.len())
    }

    async fn vehicle_blueprints(&self, filter: &str) -> Result<Vec<VehicleBlueprint>> {
        self.ensure_connected()?;
        Ok(self
            .state
            .config
            .blueprints
            .iter()
            .filter(|bp| matches_filter(filter, &bp.id))
            .cloned()
            .collect())
    }

    #[instrument(
        name = "mock_carla_spawn_vehicle",
        skip(self, attributes, transform),
        fields(blueprint = %blueprint)
    )]
    async fn spawn_vehicle(
        &self,
        blueprint: &str,
        attributes: &HashMap<String, String>,
        transform: Transform,
    ) -> Result<ActorId> {
        let _ = attributes;
        self.ensure_connected()?;

        if self.should_fail_spawn() {
            return Err(ContractError::carla_spawn(blueprint, "mock failure").into());
        }

        let mut actors = self.state.actors.lock().unwrap();
        if Self::spawn_point_occupied(&actors, &transform) {
            return Err(ContractError::carla_spawn(blueprint, "spawn point occupied").into());
        }

        let actor_id = self.allocate_actor_id();
        actors.insert(
            actor_id,
            MockActor {
                type_id: blueprint.to_string(),
                kind: MockActorKind::Vehicle(MockVehicle::new(transform)),
            },
        );
        Ok(actor_id)
    }

    #[instrument(
        name = "mock_carla_spawn_sensor",
        skip(self, _transform, attributes),
        fields(blueprint = %blueprint, parent_id)
    )]
    async fn spawn_sensor(
        &self,
        blueprint: &str,
        _transform: Transform,
        parent_id: ActorId,
        attributes: &HashMap<String, String>,
    ) -> Result<ActorId> {
        self.ensure_connected()?;

        // 验证 parent 存在
        if !self.state.actors.lock().unwrap().contains_key(&parent_id) {
            return Err(ActorFactoryError::sensor_spawn(
                blueprint,
                parent_id,
                "parent actor not found",
            ));
        }

        if self.should_fail_spawn() {
            return Err(ActorFactoryError::sensor_spawn(
                blueprint,
                parent_id,
                "mock failure",
            ));
        }

        let mut camera_config = self.state.config.camera.clone();
        if let Some(width) = attributes.get("image_size_x").and_then(|v| v.parse().ok()) {
            camera_config.image_width = width;
        }
        if let Some(height) = attributes.get("image_size_y").and_then(|v| v.parse().ok()) {
            camera_config.image_height = height;
        }

        let actor_id = self.allocate_actor_id();
        let camera = MockCamera::new(format!("actor_{actor_id}"), camera_config);
        self.state.actors.lock().unwrap().insert(
            actor_id,
            MockActor {
                type_id: blueprint.to_string(),
                kind: MockActorKind::Camera {
                    parent: parent_id,
                    camera,
                },
            },
        );
        Ok(actor_id)
    }

    #[instrument(name = "mock_carla_destroy_actor", skip(self), fields(actor_id))]
    async fn destroy_actor(&self, actor_id: ActorId) -> Result<()> {
        if self.state.config.fail_destroy.contains(&actor_id) {
            return Err(ActorFactoryError::DestroyFailed {
                actor_id,
                message: "mock failure".into(),
            });
        }

        // 幂等：即使不存在也返回 Ok
        let removed = self.state.actors.lock().unwrap().remove(&actor_id);
        if let Some(actor) = removed {
            if let MockActorKind::Camera { camera, parent } = &actor.kind {
                camera.stop();
                debug!(actor_id, parent, "mock camera stopped on destroy");
            }
            self.state.destroy_log.lock().unwrap().push(actor_id);
        }
        Ok(())
    }

    fn sensor_source(
        &self,
        actor_id: ActorId,
        sensor_id: String,
    ) -> Option<Box<dyn SensorSource>> {
        let actors = self.state.actors.lock().unwrap();
        match actors.get(&actor_id).map(|a| &a.kind) {
            Some(MockActorKind::Camera { camera, .. }) => {
                debug!(actor_id, sensor_id = %sensor_id, "mock sensor source handed out");
                Some(Box::new(camera.clone()))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Location, Rotation};

    fn spawn_point(y: f64) -> Transform {
        Transform::new(Location::new(-120.4, y, 10.0), Rotation::new(0.0, 180.0, 0.0))
    }

    async fn connected_client(config: MockConfig) -> MockCarlaClient {
        let mut client = MockCarlaClient::with_config(config);
        client
            .connect("localhost", 2000, Duration::from_secs(4))
            .await
            .unwrap();
        client
    }

    #[tokio::test]
    async fn test_mock_spawn_vehicle() {
        let client = connected_client(MockConfig::default()).await;

        let actor_id = client
            .spawn_vehicle("vehicle.audi.tt", &HashMap::new(), spawn_point(13.0))
            .await
            .unwrap();
        assert!(actor_id >= 1000);
        assert_eq!(client.actor_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_spawn_sensor() {
        let client = connected_client(MockConfig::default()).await;

        let vehicle_id = client
            .spawn_vehicle("vehicle.audi.tt", &HashMap::new(), spawn_point(13.0))
            .await
            .unwrap();
        let sensor_id = client
            .spawn_sensor(
                "sensor.camera.rgb",
                Transform::default(),
                vehicle_id,
                &HashMap::new(),
            )
            .await
            .unwrap();

        assert!(sensor_id > vehicle_id);
        assert_eq!(client.actor_count(), 2);
        assert!(client.sensor_source(sensor_id, "cam".into()).is_some());
        assert!(client.sensor_source(vehicle_id, "cam".into()).is_none());
    }

    #[tokio::test]
    async fn test_spawn_requires_connection() {
        let client = MockCarlaClient::new();
        let result = client
            .spawn_vehicle("vehicle.audi.tt", &HashMap::new(), spawn_point(13.0))
            .await;
        assert!(matches!(
            result,
            Err(ActorFactoryError::ConnectionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_occupied_spawn_point_fails() {
        let client = connected_client(MockConfig::default()).await;

        client
            .spawn_vehicle("vehicle.audi.tt", &HashMap::new(), spawn_point(13.0))
            .await
            .unwrap();
        let result = client
            .spawn_vehicle("vehicle.audi.a2", &HashMap::new(), spawn_point(13.5))
            .await;
        assert!(result.is_err());
        assert_eq!(client.actor_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_destroy_idempotent() {
        let client = connected_client(MockConfig::default()).await;

        let actor_id = client
            .spawn_vehicle("vehicle.audi.tt", &HashMap::new(), spawn_point(13.0))
            .await
            .unwrap();
        client.destroy_actor(actor_id).await.unwrap();
        // Second destroy should also succeed
        client.destroy_actor(actor_id).await.unwrap();
        assert_eq!(client.actor_count(), 0);
        assert_eq!(client.destroy_log(), vec![actor_id]);
    }

    #[tokio::test]
    async fn test_destroy_matching_removes_stale_vehicles() {
        let client = connected_client(MockConfig {
            stale_vehicles: 3,
            ..Default::default()
        })
        .await;

        assert_eq!(client.actor_count(), 3);
        let destroyed = client.destroy_matching("vehicle.*").await.unwrap();
        assert_eq!(destroyed, 3);
        assert_eq!(client.actor_count(), 0);
    }

    #[tokio::test]
    async fn test_blueprint_filter() {
        let client = connected_client(MockConfig::default()).await;
        let audis = client.vehicle_blueprints("audi").await.unwrap();
        assert_eq!(audis.len(), 3);
        assert!(audis.iter().all(|bp| bp.id.contains("audi")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_and_steer_move_vehicle() {
        let client = connected_client(MockConfig::default()).await;
        let actor_id = client
            .spawn_vehicle("vehicle.audi.tt", &HashMap::new(), spawn_point(15.6))
            .await
            .unwrap();

        client
            .apply_control(actor_id, ControlCommand::new(0.3, 0.12, 0.0))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        let pose = client.pose(actor_id).await.unwrap();

        // Heading -x, steering right drifts towards smaller y
        assert!(pose.location.x < -120.4);
        assert!(pose.location.y < 15.6);
        // yaw wrapped past 180
        assert!(pose.rotation.yaw < 0.0 && pose.rotation.yaw > -180.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_brake_holds_position() {
        let client = connected_client(MockConfig::default()).await;
        let actor_id = client
            .spawn_vehicle("vehicle.audi.tt", &HashMap::new(), spawn_point(13.0))
            .await
            .unwrap();

        client
            .apply_control(actor_id, ControlCommand::FULL_BRAKE)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(client.pose(actor_id).await.unwrap(), spawn_point(13.0));
    }

    #[tokio::test]
    async fn test_fail_control_after() {
        let client = connected_client(MockConfig {
            fail_control_after: Some(1),
            ..Default::default()
        })
        .await;
        let actor_id = client
            .spawn_vehicle("vehicle.audi.tt", &HashMap::new(), spawn_point(13.0))
            .await
            .unwrap();

        assert!(client
            .apply_control(actor_id, ControlCommand::FULL_BRAKE)
            .await
            .is_ok());
        assert!(client
            .apply_control(actor_id, ControlCommand::FULL_BRAKE)
            .await
            .is_err());
        assert_eq!(client.control_log().len(), 1);
    }

    #[test]
    fn test_normalize_yaw() {
        assert_eq!(normalize_yaw(181.0), -179.0);
        assert_eq!(normalize_yaw(-180.0), 180.0);
        assert_eq!(normalize_yaw(540.0), 180.0);
        assert_eq!(normalize_yaw(45.0), 45.0);
    }
}
