//! `describe` command implementation.

use anyhow::{Context, Result};
use contracts::{ControlCommand, ScenarioBlueprint};
use maneuver::{ManeuverConfig, ACCELERATE_COMMAND, APPROACH_COMMAND};
use serde::Serialize;

use crate::cli::DescribeArgs;

/// Scenario description for JSON output
#[derive(Serialize)]
struct ScenarioDescription<'a> {
    actor_count: usize,
    poll_interval_ms: u128,
    settle_ms: u128,
    approach_command: ControlCommand,
    accelerate_command: ControlCommand,
    blueprint: &'a ScenarioBlueprint,
}

/// Execute the `describe` command
pub fn run_describe(args: &DescribeArgs) -> Result<()> {
    let blueprint = ScenarioBlueprint::overtake();
    let maneuver = ManeuverConfig::default();

    if args.json {
        let description = ScenarioDescription {
            actor_count: blueprint.actor_count(),
            poll_interval_ms: maneuver.poll_interval.as_millis(),
            settle_ms: maneuver.settle.as_millis(),
            approach_command: APPROACH_COMMAND,
            accelerate_command: ACCELERATE_COMMAND,
            blueprint: &blueprint,
        };
        let json = serde_json::to_string_pretty(&description)
            .context("Failed to serialize scenario description")?;
        println!("{json}");
    } else {
        print_description(&blueprint, &maneuver);
    }

    Ok(())
}

fn print_description(blueprint: &ScenarioBlueprint, maneuver: &ManeuverConfig) {
    let world = &blueprint.world;

    println!("\n=== Overtake Scenario ===\n");
    println!("World:");
    println!("  Map: {}", world.map);
    println!(
        "  Weather: sun azimuth {}°, sun altitude {}°, wind {}",
        world.weather.sun_azimuth_angle,
        world.weather.sun_altitude_angle,
        world.weather.wind_intensity
    );
    println!("  Stale actors removed: {}", world.stale_actor_filter);

    println!("\nVehicles ({}):", blueprint.vehicles.len());
    for vehicle in &blueprint.vehicles {
        let location = vehicle.spawn_point.location;
        println!(
            "  - {:?} ({}) at ({}, {}, {}) yaw {}, colour {}",
            vehicle.role,
            vehicle.blueprint_filter,
            location.x,
            location.y,
            location.z,
            vehicle.spawn_point.rotation.yaw,
            vehicle.color.as_deref().unwrap_or("-")
        );
    }

    println!("\nCameras ({}):", blueprint.cameras.len());
    for camera in &blueprint.cameras {
        let marker = if camera.stream_to_display {
            " [display]"
        } else {
            ""
        };
        println!(
            "  - {} on {:?}, {}x{}{}",
            camera.id, camera.parent, camera.image_width, camera.image_height, marker
        );
    }

    println!(
        "\nDisplay: {}x{}",
        blueprint.display.width, blueprint.display.height
    );
    println!(
        "Maneuver: poll every {} ms, settle {} s",
        maneuver.poll_interval.as_millis(),
        maneuver.settle.as_secs_f64()
    );
    println!();
}
