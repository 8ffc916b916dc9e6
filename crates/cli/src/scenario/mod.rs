//! Scenario orchestration module.

mod orchestrator;
mod stats;

pub use orchestrator::{ScenarioConfig, ScenarioRunner};
pub use stats::RunStats;
