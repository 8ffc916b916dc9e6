//! `run` command implementation.

use std::time::Duration;

use actor_factory::{MockCarlaClient, SimulatorClient};
use anyhow::{Context, Result};
use carla_overtake::{ScenarioConfig, ScenarioError, ScenarioRunner};
use renderer::{DisplaySurface, FrameSurface};
use tracing::{info, warn};

use crate::cli::RunArgs;

/// Execute the `run` command
pub async fn run_scenario(args: &RunArgs) -> Result<()> {
    if !args.timeout.is_finite() || args.timeout <= 0.0 {
        anyhow::bail!("--timeout must be a positive number of seconds, got {}", args.timeout);
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    let config = ScenarioConfig {
        host: args.host.clone(),
        port: args.port,
        timeout: Duration::from_secs_f64(args.timeout),
        frame_buffer: args.frame_buffer,
        ..Default::default()
    };

    info!(
        host = %config.host,
        port = config.port,
        mock = args.mock,
        headless = args.headless,
        frame_buffer = config.frame_buffer,
        "Starting scenario..."
    );

    if args.mock {
        return execute(MockCarlaClient::new(), config, args.headless).await;
    }

    #[cfg(feature = "real-carla")]
    {
        execute(actor_factory::RealCarlaClient::default(), config, args.headless).await
    }

    #[cfg(not(feature = "real-carla"))]
    {
        anyhow::bail!("built without the `real-carla` feature, rerun with --mock")
    }
}

async fn execute<C: SimulatorClient>(
    client: C,
    config: ScenarioConfig,
    headless: bool,
) -> Result<()> {
    let (width, height) = (config.blueprint.display.width, config.blueprint.display.height);

    #[cfg(feature = "window")]
    if !headless {
        let surface = renderer::WindowSurface::open("CARLA overtake", width, height)
            .context("Failed to open display window (use --headless to run without one)")?;
        return drive_runner(ScenarioRunner::with_surface(client, config, surface)).await;
    }

    #[cfg(not(feature = "window"))]
    if !headless {
        warn!("built without the `window` feature, frames are kept in memory only");
    }

    let surface = FrameSurface::new(width, height);
    drive_runner(ScenarioRunner::with_surface(client, config, surface)).await
}

async fn drive_runner<C, S>(runner: ScenarioRunner<C, S>) -> Result<()>
where
    C: SimulatorClient,
    S: DisplaySurface + 'static,
{
    match runner.run(shutdown_signal()).await {
        Ok(stats) => {
            info!(
                polls = stats.maneuver.polls,
                commands = stats.maneuver.commands_issued,
                frames_rendered = stats.render.metrics.frames_rendered,
                duration_secs = stats.duration.as_secs_f64(),
                "Scenario completed successfully"
            );

            stats.print_summary();
            Ok(())
        }
        Err(e) => {
            if let Some(teardown) = e.teardown() {
                info!(
                    destroyed = teardown.destroyed.len(),
                    failed = teardown.failed.len(),
                    "Actors torn down before exit"
                );
            }
            let context = match &e {
                ScenarioError::Interrupted { .. } => "Scenario interrupted",
                _ => "Scenario execution failed",
            };
            Err(e).context(context)
        }
    }
}

/// Resolve on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
