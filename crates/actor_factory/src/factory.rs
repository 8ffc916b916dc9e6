//! ActorFactory 核心实现
//!
//! 准备世界、把场景中的车辆和相机 spawn 进 `ActorRoster`，并负责 teardown。
//! Roster 由调用方持有：spawn 过程中每创建一个 actor 就登记一个，
//! 任何退出路径上调用方都把 roster 交给 `teardown`。

use std::collections::HashMap;

use contracts::{
    ActorId, ActorRole, ActorRoster, CameraSpec, ScenarioBlueprint, VehicleSpec, WorldConfig,
    CAMERA_BLUEPRINT,
};
use rand::seq::IndexedRandom;
use tracing::{error, info, instrument, warn};

use crate::client::{SimulatorClient, VehicleBlueprint};
use crate::error::{ActorFactoryError, Result};

/// Handles of the actors the scenario logic needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioActors {
    /// 被超越的车辆
    pub lead: ActorId,
    /// 由 maneuver controller 驾驶的车辆
    pub trail: ActorId,
    /// 推送到显示窗口的相机 (sensor_id, actor_id)
    pub display_camera: Option<(String, ActorId)>,
}

/// teardown 结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// 成功销毁的 actor
    pub destroyed: Vec<ActorId>,
    /// 销毁失败的 actor
    pub failed: Vec<ActorId>,
}

/// Actor Factory
///
/// 负责准备世界、spawn 场景 actors，并提供 teardown。
pub struct ActorFactory<C: SimulatorClient> {
    client: C,
}

impl<C: SimulatorClient> ActorFactory<C> {
    /// 创建新的 ActorFactory
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// 底层客户端
    pub fn client(&self) -> &C {
        &self.client
    }

    /// 准备世界：检查地图、设置天气、清理旧车辆
    ///
    /// 清理掉的旧车辆不属于本场景，不进入 roster。
    #[instrument(name = "actor_factory_prepare_world", skip(self, world), fields(map = %world.map))]
    pub async fn prepare_world(&self, world: &WorldConfig) -> Result<()> {
        let current_map = self.client.map_name().await?;
        if !current_map.ends_with(&world.map) {
            warn!(
                current_map = %current_map,
                expected_map = %world.map,
                "simulator is running a different map"
            );
        }

        self.client.set_weather(world.weather).await?;
        info!(weather = ?world.weather, "weather applied");

        let destroyed = self
            .client
            .destroy_matching(&world.stale_actor_filter)
            .await?;
        info!(
            filter = %world.stale_actor_filter,
            destroyed,
            "stale actors removed"
        );

        Ok(())
    }

    /// 从 ScenarioBlueprint spawn 所有 actors
    ///
    /// 每个 actor 创建成功后立即登记到 `roster`。出错时直接返回，
    /// 已创建的 actors 仍在 roster 中，由调用方 teardown。
    #[instrument(
        name = "actor_factory_spawn_scenario",
        skip(self, blueprint, roster),
        fields(actor_count = blueprint.actor_count())
    )]
    pub async fn spawn_scenario(
        &self,
        blueprint: &ScenarioBlueprint,
        roster: &mut ActorRoster,
    ) -> Result<ScenarioActors> {
        // 同一个 filter 只抽一次蓝图，两辆车同款不同色
        let mut chosen: HashMap<&str, VehicleBlueprint> = HashMap::new();
        for vehicle in &blueprint.vehicles {
            let filter = vehicle.blueprint_filter.as_str();
            let vehicle_blueprint = match chosen.get(filter).cloned() {
                Some(vehicle_blueprint) => vehicle_blueprint,
                None => {
                    let picked = self.choose_vehicle_blueprint(filter).await?;
                    chosen.insert(filter, picked.clone());
                    picked
                }
            };
            self.spawn_vehicle_actor(vehicle, &vehicle_blueprint, roster)
                .await?;
        }

        for camera in &blueprint.cameras {
            self.spawn_camera_actor(camera, roster).await?;
        }

        let lead = roster
            .find(ActorRole::LeadVehicle)
            .ok_or_else(|| ActorFactoryError::vehicle_spawn(ActorRole::LeadVehicle, "not in blueprint"))?;
        let trail = roster
            .find(ActorRole::TrailVehicle)
            .ok_or_else(|| ActorFactoryError::vehicle_spawn(ActorRole::TrailVehicle, "not in blueprint"))?;
        let display_camera = blueprint.display_camera().and_then(|camera| {
            roster
                .find_by_name(&camera.id)
                .map(|actor_id| (camera.id.clone(), actor_id))
        });

        info!(
            actors = roster.len(),
            lead,
            trail,
            "spawn_scenario completed successfully"
        );

        Ok(ScenarioActors {
            lead,
            trail,
            display_camera,
        })
    }

    /// 销毁 roster 中的所有 actors
    ///
    /// 先销毁传感器，再销毁车辆。单个 actor 销毁失败只记录日志，不影响其余 actor。
    /// 消费 roster，保证同一批 actor 不会经由 roster 被销毁两次。
    #[instrument(
        name = "actor_factory_teardown",
        skip(self, roster),
        fields(actor_count = roster.len())
    )]
    pub async fn teardown(&self, roster: ActorRoster) -> TeardownReport {
        info!("destroying actors");
        let mut report = TeardownReport::default();

        for entry in roster.into_teardown_order() {
            if self.destroy_actor_safe(entry.actor_id, &entry.name).await {
                report.destroyed.push(entry.actor_id);
            } else {
                report.failed.push(entry.actor_id);
            }
        }

        info!(
            destroyed = report.destroyed.len(),
            failed = report.failed.len(),
            "teardown completed"
        );
        report
    }

    /// 安全销毁 actor（忽略错误，仅记录日志）
    #[instrument(
        name = "actor_factory_destroy_actor",
        skip(self, config_id),
        fields(actor_id, config_id = %config_id)
    )]
    async fn destroy_actor_safe(&self, actor_id: ActorId, config_id: &str) -> bool {
        info!(actor_id, config_id, "destroying actor");

        match self.client.destroy_actor(actor_id).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    actor_id,
                    config_id,
                    error = %e,
                    "failed to destroy actor"
                );
                false
            }
        }
    }

    /// Random blueprint among those matching `filter`
    async fn choose_vehicle_blueprint(&self, filter: &str) -> Result<VehicleBlueprint> {
        let candidates = self.client.vehicle_blueprints(filter).await?;
        candidates
            .choose(&mut rand::rng())
            .cloned()
            .ok_or_else(|| ActorFactoryError::BlueprintNotFound {
                filter: filter.to_string(),
            })
    }

    #[instrument(
        name = "actor_factory_spawn_vehicle_actor",
        skip(self, spec, blueprint, roster),
        fields(role = ?spec.role, blueprint = %blueprint.id)
    )]
    async fn spawn_vehicle_actor(
        &self,
        spec: &VehicleSpec,
        blueprint: &VehicleBlueprint,
        roster: &mut ActorRoster,
    ) -> Result<ActorId> {

        let mut attributes = HashMap::new();
        if let (true, Some(color)) = (blueprint.has_color, spec.color.as_ref()) {
            attributes.insert("color".to_string(), color.clone());
        }

        info!(blueprint = %blueprint.id, "spawning vehicle");
        let actor_id = self
            .client
            .spawn_vehicle(&blueprint.id, &attributes, spec.spawn_point)
            .await
            .map_err(|e| ActorFactoryError::vehicle_spawn(spec.role, e.to_string()))?;

        roster.register(actor_id, spec.role, role_name(spec.role), blueprint.id.clone());
        info!(actor_id, "created {}", blueprint.id);

        self.client
            .apply_control(actor_id, spec.initial_control)
            .await?;

        Ok(actor_id)
    }

    #[instrument(
        name = "actor_factory_spawn_camera_actor",
        skip(self, spec, roster),
        fields(sensor_id = %spec.id)
    )]
    async fn spawn_camera_actor(
        &self,
        spec: &CameraSpec,
        roster: &mut ActorRoster,
    ) -> Result<ActorId> {
        let parent_id = roster
            .find(spec.parent)
            .ok_or_else(|| ActorFactoryError::MissingParent {
                sensor_id: spec.id.clone(),
                parent: spec.parent,
            })?;

        info!(parent_id, "spawning camera");
        let actor_id = self
            .client
            .spawn_sensor(
                CAMERA_BLUEPRINT,
                spec.transform,
                parent_id,
                &spec.blueprint_attributes(),
            )
            .await
            .map_err(|e| ActorFactoryError::sensor_spawn(&spec.id, parent_id, e.to_string()))?;

        roster.register(actor_id, ActorRole::Camera, spec.id.clone(), CAMERA_BLUEPRINT);
        info!(actor_id, "created {}_{}", CAMERA_BLUEPRINT, spec.id);

        Ok(actor_id)
    }
}

fn role_name(role: ActorRole) -> &'static str {
    match role {
        ActorRole::LeadVehicle => "lead_vehicle",
        ActorRole::TrailVehicle => "trail_vehicle",
        ActorRole::Camera => "camera",
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::mock_client::{MockCarlaClient, MockConfig};
    use crate::mock_sensor::MockCameraConfig;

    fn small_camera_config() -> MockConfig {
        MockConfig {
            camera: MockCameraConfig {
                image_width: 8,
                image_height: 8,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    async fn connected(config: MockConfig) -> MockCarlaClient {
        let mut client = MockCarlaClient::with_config(config);
        client
            .connect("localhost", 2000, Duration::from_secs(4))
            .await
            .unwrap();
        client
    }

    #[tokio::test]
    async fn test_spawn_success() {
        let client = connected(small_camera_config()).await;
        let factory = ActorFactory::new(client.clone());
        let blueprint = ScenarioBlueprint::overtake();

        let mut roster = ActorRoster::new();
        let actors = factory
            .spawn_scenario(&blueprint, &mut roster)
            .await
            .unwrap();

        assert_eq!(roster.len(), 4);
        assert_eq!(client.actor_count(), 4);
        assert_ne!(actors.lead, actors.trail);
        assert_eq!(
            actors.display_camera.as_ref().map(|(id, _)| id.as_str()),
            Some("cam_1")
        );
        assert!(roster
            .entries()
            .iter()
            .filter(|e| e.role != ActorRole::Camera)
            .all(|e| e.type_id.contains("audi")));
    }

    #[tokio::test]
    async fn test_vehicles_share_one_blueprint() {
        // 候选蓝图有 3 个 audi，多跑几轮排除巧合
        for _ in 0..10 {
            let client = connected(small_camera_config()).await;
            let factory = ActorFactory::new(client);
            let mut roster = ActorRoster::new();
            factory
                .spawn_scenario(&ScenarioBlueprint::overtake(), &mut roster)
                .await
                .unwrap();

            let models: Vec<_> = roster
                .entries()
                .iter()
                .filter(|e| e.role != ActorRole::Camera)
                .map(|e| e.type_id.clone())
                .collect();
            assert_eq!(models.len(), 2);
            assert_eq!(models[0], models[1]);
        }
    }

    #[tokio::test]
    async fn test_initial_controls_applied() {
        let client = connected(small_camera_config()).await;
        let factory = ActorFactory::new(client.clone());
        let blueprint = ScenarioBlueprint::overtake();

        let mut roster = ActorRoster::new();
        let actors = factory
            .spawn_scenario(&blueprint, &mut roster)
            .await
            .unwrap();

        let log = client.control_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].0, actors.lead);
        assert_eq!(log[0].1.brake, 1.0);
        assert_eq!(log[1].0, actors.trail);
        assert_eq!(log[1].1.throttle, 0.3);
    }

    #[tokio::test]
    async fn test_prepare_world() {
        let client = connected(MockConfig {
            stale_vehicles: 2,
            ..Default::default()
        })
        .await;
        let factory = ActorFactory::new(client.clone());
        let blueprint = ScenarioBlueprint::overtake();

        factory.prepare_world(&blueprint.world).await.unwrap();

        assert_eq!(client.actor_count(), 0);
        assert_eq!(client.weather(), Some(blueprint.world.weather));
    }

    #[tokio::test]
    async fn test_spawn_failure_keeps_spawned_actors_in_roster() {
        // spawn order: lead, trail, cam_0, cam_1 -> third spawn fails
        let client = connected(MockConfig {
            fail_spawn_at: Some(2),
            ..small_camera_config()
        })
        .await;
        let factory = ActorFactory::new(client.clone());
        let blueprint = ScenarioBlueprint::overtake();

        let mut roster = ActorRoster::new();
        let result = factory.spawn_scenario(&blueprint, &mut roster).await;

        assert!(matches!(
            result,
            Err(ActorFactoryError::SensorSpawnFailed { .. })
        ));
        assert_eq!(roster.len(), 2);

        let report = factory.teardown(roster).await;
        assert_eq!(report.destroyed.len(), 2);
        assert_eq!(client.actor_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_blueprint() {
        let client = connected(MockConfig {
            blueprints: vec![],
            ..Default::default()
        })
        .await;
        let factory = ActorFactory::new(client);
        let mut roster = ActorRoster::new();

        let result = factory
            .spawn_scenario(&ScenarioBlueprint::overtake(), &mut roster)
            .await;
        assert!(matches!(
            result,
            Err(ActorFactoryError::BlueprintNotFound { .. })
        ));
        assert!(roster.is_empty());
    }

    #[tokio::test]
    async fn test_teardown_continues_after_destroy_failure() {
        let client = connected(small_camera_config()).await;
        let factory = ActorFactory::new(client.clone());
        let mut roster = ActorRoster::new();
        factory
            .spawn_scenario(&ScenarioBlueprint::overtake(), &mut roster)
            .await
            .unwrap();

        // 1000 is the first spawned actor (lead vehicle)
        let failing = MockCarlaClient::with_config(MockConfig {
            fail_destroy: vec![1000],
            ..Default::default()
        });
        let failing_factory = ActorFactory::new(failing);
        let report = failing_factory.teardown(roster.clone()).await;
        assert_eq!(report.failed, vec![1000]);
        assert_eq!(report.destroyed.len(), 3);

        let report = factory.teardown(roster).await;
        assert_eq!(report.destroyed.len(), 4);
        assert_eq!(client.actor_count(), 0);
    }

    #[tokio::test]
    async fn test_teardown_idempotent() {
        let client = connected(small_camera_config()).await;
        let factory = ActorFactory::new(client.clone());
        let mut roster = ActorRoster::new();
        factory
            .spawn_scenario(&ScenarioBlueprint::overtake(), &mut roster)
            .await
            .unwrap();

        // First teardown
        factory.teardown(roster.clone()).await;
        // Second teardown over already-invalid handles should also succeed
        let report = factory.teardown(roster).await;

        assert!(report.failed.is_empty());
        assert_eq!(client.destroy_log().len(), 4);
    }

    #[tokio::test]
    async fn test_empty_roster_teardown() {
        let factory = ActorFactory::new(MockCarlaClient::new());
        let report = factory.teardown(ActorRoster::new()).await;
        assert_eq!(report, TeardownReport::default());
    }
}
