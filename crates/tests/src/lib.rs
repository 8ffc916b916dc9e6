//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 模拟 e2e 测试（无需 CARLA）
//! - teardown 完整性

#[cfg(test)]
mod contract_tests {
    use contracts::{ActorRole, ScenarioBlueprint, TARGET_MAP};

    #[test]
    fn test_overtake_blueprint_shape() {
        let blueprint = ScenarioBlueprint::overtake();
        assert_eq!(blueprint.world.map, TARGET_MAP);
        assert_eq!(blueprint.actor_count(), 4);
        assert!(blueprint
            .cameras
            .iter()
            .all(|c| c.parent == ActorRole::LeadVehicle));
        assert_eq!(blueprint.display_camera().map(|c| c.id.as_str()), Some("cam_1"));
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::time::Duration;

    use actor_factory::{MockCameraConfig, MockCarlaClient, MockConfig};
    use carla_overtake::{ScenarioConfig, ScenarioError, ScenarioRunner};
    use contracts::{ScenarioBlueprint, SensorSource};
    use maneuver::{ManeuverState, ACCELERATE_COMMAND, APPROACH_COMMAND};
    use renderer::{FrameChannel, FrameRenderer, FrameSurface};

    const SIDE: u32 = 16;

    /// Overtake layout with thumbnail cameras and display
    fn small_config() -> ScenarioConfig {
        let mut blueprint = ScenarioBlueprint::overtake();
        for camera in &mut blueprint.cameras {
            camera.image_width = SIDE;
            camera.image_height = SIDE;
        }
        blueprint.display.width = SIDE;
        blueprint.display.height = SIDE;

        ScenarioConfig {
            blueprint,
            ..Default::default()
        }
    }

    fn mock(config: MockConfig) -> MockCarlaClient {
        MockCarlaClient::with_config(MockConfig {
            camera: MockCameraConfig {
                frequency_hz: 100.0,
                ..Default::default()
            },
            ..config
        })
    }

    /// Full run against the mock: both triggers fire, every actor is destroyed
    #[tokio::test(start_paused = true)]
    async fn test_e2e_full_overtake() {
        let client = mock(MockConfig {
            stale_vehicles: 3,
            ..Default::default()
        });
        let observer = client.clone();

        let stats = ScenarioRunner::new(client, small_config())
            .run(std::future::pending())
            .await
            .unwrap();

        // 状态序列
        let path: Vec<_> = stats
            .maneuver
            .transitions
            .iter()
            .map(|t| (t.from, t.to))
            .collect();
        assert_eq!(
            path,
            vec![
                (ManeuverState::Approach, ManeuverState::Realign),
                (ManeuverState::Realign, ManeuverState::Accelerate),
                (ManeuverState::Accelerate, ManeuverState::Done),
            ]
        );
        assert_eq!(stats.maneuver.commands_issued, 2);
        assert!(stats.maneuver.elapsed >= Duration::from_secs(4));

        // 后车收到的控制：初始指令之后依次是 APPROACH 和 ACCELERATE
        let trail_controls: Vec<_> = observer
            .control_log()
            .into_iter()
            .skip(2)
            .map(|(_, command)| command)
            .collect();
        assert_eq!(trail_controls, vec![APPROACH_COMMAND, ACCELERATE_COMMAND]);

        // teardown：4 个场景 actor 各销毁一次，旧车辆不在 roster 中
        assert_eq!(stats.actors_spawned, 4);
        assert_eq!(stats.teardown.destroyed.len(), 4);
        assert!(stats.teardown.failed.is_empty());
        assert_eq!(observer.actor_count(), 0);

        let mut destroyed = observer.destroy_log();
        destroyed.sort_unstable();
        destroyed.dedup();
        assert_eq!(destroyed.len(), observer.destroy_log().len());

        // 渲染计数只能来自通道里真正送达的帧
        let summary = stats.summary();
        assert!(summary.frames_rendered + summary.frames_skipped <= stats.channel.frames_received);
    }

    /// Spawn failure after K actors destroys exactly those K
    #[tokio::test(start_paused = true)]
    async fn test_e2e_spawn_failure_tears_down_partial_roster() {
        for fail_at in 0..4 {
            let client = mock(MockConfig {
                fail_spawn_at: Some(fail_at),
                ..Default::default()
            });
            let observer = client.clone();

            let err = ScenarioRunner::new(client, small_config())
                .run(std::future::pending())
                .await
                .unwrap_err();

            assert!(matches!(err, ScenarioError::Setup { .. }), "fail_at={fail_at}");
            let teardown = err.teardown().unwrap();
            assert_eq!(teardown.destroyed.len(), fail_at, "fail_at={fail_at}");
            assert_eq!(observer.destroy_log().len(), fail_at);
            assert_eq!(observer.actor_count(), 0);
        }
    }

    /// Control failure mid-maneuver still destroys all four actors
    #[tokio::test(start_paused = true)]
    async fn test_e2e_control_failure_tears_down() {
        // 两条初始指令成功，APPROACH 指令失败
        let client = mock(MockConfig {
            fail_control_after: Some(2),
            ..Default::default()
        });
        let observer = client.clone();

        let err = ScenarioRunner::new(client, small_config())
            .run(std::future::pending())
            .await
            .unwrap_err();

        assert!(matches!(err, ScenarioError::Maneuver { .. }));
        assert_eq!(err.teardown().unwrap().destroyed.len(), 4);
        assert_eq!(observer.actor_count(), 0);
    }

    /// Failed destroys are reported, the rest of the roster is still destroyed
    #[tokio::test(start_paused = true)]
    async fn test_e2e_teardown_survives_destroy_failure() {
        // mock 的 actor id 从 1000 开始分配，1000 是前车
        let client = mock(MockConfig {
            fail_destroy: vec![1000],
            ..Default::default()
        });
        let observer = client.clone();

        let stats = ScenarioRunner::new(client, small_config())
            .run(std::future::pending())
            .await
            .unwrap();

        assert_eq!(stats.teardown.failed, vec![1000]);
        assert_eq!(stats.teardown.destroyed.len(), 3);
        assert_eq!(observer.actor_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_e2e_connection_timeout() {
        let client = mock(MockConfig {
            connect_delay: Some(Duration::from_secs(10)),
            ..Default::default()
        });
        let observer = client.clone();

        let err = ScenarioRunner::new(client, small_config())
            .run(std::future::pending())
            .await
            .unwrap_err();

        assert!(matches!(err, ScenarioError::Connection { .. }));
        assert!(err.teardown().is_none());
        assert_eq!(observer.actor_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_e2e_interrupt_mid_maneuver() {
        let client = mock(MockConfig::default());
        let observer = client.clone();

        let err = ScenarioRunner::new(client, small_config())
            .run(tokio::time::sleep(Duration::from_secs(2)))
            .await
            .unwrap_err();

        assert!(matches!(err, ScenarioError::Interrupted { .. }));
        assert_eq!(err.teardown().unwrap().destroyed.len(), 4);
        assert_eq!(observer.actor_count(), 0);
    }

    /// A panic in the maneuver loop propagates only after every actor is destroyed
    #[tokio::test(start_paused = true)]
    async fn test_e2e_panicking_pose_tears_down() {
        // 第一次位姿读取成功，第二次 panic
        let client = mock(MockConfig {
            panic_on_pose_after: Some(1),
            ..Default::default()
        });
        let observer = client.clone();

        let run = ScenarioRunner::new(client, small_config()).run(std::future::pending());
        let err = tokio::spawn(run).await.unwrap_err();

        assert!(err.is_panic());
        assert_eq!(observer.destroy_log().len(), 4);
        assert_eq!(observer.actor_count(), 0);
    }

    /// Mock camera → channel → renderer, in real time
    #[tokio::test]
    async fn test_e2e_camera_to_surface() {
        let camera = actor_factory::MockCamera::new(
            "cam_1".to_string(),
            MockCameraConfig {
                frequency_hz: 200.0,
                image_width: SIDE,
                image_height: SIDE,
                malformed_every: Some(5),
            },
        );
        let channel = FrameChannel::bounded(4);
        let renderer = tokio::spawn(
            FrameRenderer::new(FrameSurface::new(SIDE, SIDE)).run(channel.receiver()),
        );

        camera.listen(channel.callback());
        tokio::time::sleep(Duration::from_millis(200)).await;
        camera.stop();
        channel.close();

        let (report, surface) = renderer.await.unwrap();
        let snapshot = channel.metrics().snapshot();

        assert!(report.metrics.frames_rendered > 0);
        assert!(report.metrics.frames_skipped > 0);
        assert_eq!(surface.presented_frames(), report.metrics.frames_rendered);
        assert!(
            report.metrics.frames_rendered + report.metrics.frames_skipped
                <= snapshot.frames_received
        );
    }
}
