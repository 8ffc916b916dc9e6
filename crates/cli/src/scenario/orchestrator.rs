//! Scenario orchestrator - coordinates all components.
//!
//! connect → prepare world → spawn → renderer task + maneuver loop → teardown.
//! Teardown runs on every path once the connection is up, a panic included.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use actor_factory::{
    connect_with_timeout, ActorFactory, ActorFactoryError, ScenarioActors, SimulatorClient,
};
use contracts::{ActorRoster, ScenarioBlueprint, SensorSource};
use futures::FutureExt;
use maneuver::{ManeuverConfig, ManeuverController, ManeuverError, ManeuverReport};
use renderer::{DisplaySurface, FrameChannel, FrameRenderer, FrameSurface, RenderReport};
use tokio::time::Instant;
use tracing::{error, info, warn};

use super::RunStats;
use crate::error::ScenarioError;

/// Scenario configuration
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    /// CARLA server host
    pub host: String,

    /// CARLA server port
    pub port: u16,

    /// Connection timeout
    pub timeout: Duration,

    /// Frame channel capacity
    pub frame_buffer: usize,

    /// Controller timing
    pub maneuver: ManeuverConfig,

    /// Fixed scenario layout
    pub blueprint: ScenarioBlueprint,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 2000,
            timeout: Duration::from_secs(4),
            frame_buffer: 4,
            maneuver: ManeuverConfig::default(),
            blueprint: ScenarioBlueprint::overtake(),
        }
    }
}

/// What went wrong between spawn and teardown
enum DriveError {
    Setup(ActorFactoryError),
    Maneuver(ManeuverError),
    Interrupted,
}

/// Everything `drive` produced, successful or not
struct DriveOutcome {
    result: Result<ManeuverReport, DriveError>,
    channel: renderer::ChannelSnapshot,
    render: RenderReport,
}

/// Scenario runner
///
/// `S` is where the display camera ends up. Defaults to the in-memory surface.
pub struct ScenarioRunner<C: SimulatorClient, S: DisplaySurface = FrameSurface> {
    client: C,
    config: ScenarioConfig,
    surface: S,
}

impl<C: SimulatorClient> ScenarioRunner<C> {
    /// Create a runner over a not yet connected client
    pub fn new(client: C, config: ScenarioConfig) -> Self {
        let display = &config.blueprint.display;
        let surface = FrameSurface::new(display.width, display.height);
        Self::with_surface(client, config, surface)
    }
}

impl<C, S> ScenarioRunner<C, S>
where
    C: SimulatorClient,
    S: DisplaySurface + 'static,
{
    /// Create a runner that presents frames on `surface`
    pub fn with_surface(client: C, config: ScenarioConfig, surface: S) -> Self {
        Self {
            client,
            config,
            surface,
        }
    }

    /// Run the scenario to completion
    ///
    /// `shutdown` resolving aborts the run like any other error. A panic after
    /// connect is re-raised once the actors are destroyed.
    pub async fn run<F>(mut self, shutdown: F) -> Result<RunStats, ScenarioError>
    where
        F: Future<Output = ()>,
    {
        let start_time = Instant::now();
        let config = &self.config;

        info!(host = %config.host, port = config.port, "Connecting to CARLA server...");
        connect_with_timeout(&mut self.client, &config.host, config.port, config.timeout)
            .await
            .map_err(|source| ScenarioError::Connection {
                host: config.host.clone(),
                port: config.port,
                source,
            })?;

        let factory = ActorFactory::new(self.client);
        let mut roster = ActorRoster::new();

        let drive = drive(&factory, config, self.surface, &mut roster, shutdown);
        let outcome = AssertUnwindSafe(drive).catch_unwind().await;

        let actors_spawned = roster.len();
        let teardown = factory.teardown(roster).await;

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(payload) => {
                error!(
                    destroyed = teardown.destroyed.len(),
                    failed = teardown.failed.len(),
                    "scenario panicked, actors torn down"
                );
                std::panic::resume_unwind(payload);
            }
        };

        let maneuver = match outcome.result {
            Ok(report) => report,
            Err(DriveError::Setup(source)) => {
                return Err(ScenarioError::Setup { source, teardown })
            }
            Err(DriveError::Maneuver(source)) => {
                return Err(ScenarioError::Maneuver { source, teardown })
            }
            Err(DriveError::Interrupted) => return Err(ScenarioError::Interrupted { teardown }),
        };

        let stats = RunStats {
            actors_spawned,
            teardown,
            channel: outcome.channel,
            render: outcome.render,
            maneuver,
            duration: start_time.elapsed(),
        };

        info!("done.");
        Ok(stats)
    }
}

/// Spawn, render and drive; actors land in `roster` as they are created
async fn drive<C, S, F>(
    factory: &ActorFactory<C>,
    config: &ScenarioConfig,
    surface: S,
    roster: &mut ActorRoster,
    shutdown: F,
) -> DriveOutcome
where
    C: SimulatorClient,
    S: DisplaySurface + 'static,
    F: Future<Output = ()>,
{
    let blueprint = &config.blueprint;
    let channel = FrameChannel::bounded(config.frame_buffer);

    let setup = async {
        factory.prepare_world(&blueprint.world).await?;
        factory.spawn_scenario(blueprint, roster).await
    };

    let actors: ScenarioActors = match setup.await {
        Ok(actors) => actors,
        Err(e) => {
            return DriveOutcome {
                result: Err(DriveError::Setup(e)),
                channel: channel.metrics().snapshot(),
                render: RenderReport::default(),
            }
        }
    };

    // Renderer task: sole consumer of the channel and sole owner of the surface
    let renderer_task = tokio::spawn(FrameRenderer::new(surface).run(channel.receiver()));

    let source: Option<Box<dyn SensorSource>> =
        actors
            .display_camera
            .as_ref()
            .and_then(|(sensor_id, actor_id)| {
                factory.client().sensor_source(*actor_id, sensor_id.clone())
            });
    match &source {
        Some(source) => {
            info!(sensor_id = %source.sensor_id(), "streaming camera to display");
            source.listen(channel.callback());
        }
        None => warn!("no display camera, running without frames"),
    }

    let mut controller = ManeuverController::new(factory.client(), config.maneuver);
    let result = tokio::select! {
        result = controller.run(actors.lead, actors.trail) => result.map_err(DriveError::Maneuver),
        _ = shutdown => {
            warn!(state = %controller.state(), "Received shutdown signal, stopping scenario...");
            Err(DriveError::Interrupted)
        }
    };

    // Stop frame delivery before the actors go away
    if let Some(source) = &source {
        source.stop();
    }
    channel.close();

    let render = match renderer_task.await {
        Ok((report, _surface)) => report,
        Err(e) => {
            warn!(error = %e, "renderer task failed");
            RenderReport::default()
        }
    };

    DriveOutcome {
        result,
        channel: channel.metrics().snapshot(),
        render,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actor_factory::{MockCameraConfig, MockCarlaClient, MockConfig};

    fn test_config() -> ScenarioConfig {
        let mut blueprint = ScenarioBlueprint::overtake();
        for camera in &mut blueprint.cameras {
            camera.image_width = 16;
            camera.image_height = 16;
        }
        blueprint.display.width = 16;
        blueprint.display.height = 16;

        ScenarioConfig {
            blueprint,
            ..Default::default()
        }
    }

    fn mock(config: MockConfig) -> MockCarlaClient {
        MockCarlaClient::with_config(MockConfig {
            camera: MockCameraConfig {
                frequency_hz: 50.0,
                ..Default::default()
            },
            ..config
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_failure_spawns_nothing() {
        let client = mock(MockConfig {
            fail_connect: true,
            ..Default::default()
        });
        let observer = client.clone();

        let err = ScenarioRunner::new(client, test_config())
            .run(std::future::pending())
            .await
            .unwrap_err();

        assert!(matches!(err, ScenarioError::Connection { .. }));
        assert!(err.teardown().is_none());
        assert!(observer.destroy_log().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_signal_tears_down() {
        let client = mock(MockConfig::default());
        let observer = client.clone();

        let err = ScenarioRunner::new(client, test_config())
            .run(tokio::time::sleep(Duration::from_millis(200)))
            .await
            .unwrap_err();

        let teardown = err.teardown().unwrap();
        assert!(matches!(err, ScenarioError::Interrupted { .. }));
        assert_eq!(teardown.destroyed.len(), 4);
        assert_eq!(observer.actor_count(), 0);
    }
}
