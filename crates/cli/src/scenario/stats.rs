//! Run statistics.

use std::time::Duration;

use actor_factory::TeardownReport;
use maneuver::ManeuverReport;
use observability::{RunMetricsAggregator, RunSummary};
use renderer::{ChannelSnapshot, RenderReport};

/// Statistics from a completed run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Actors spawned for the scenario
    pub actors_spawned: usize,

    /// Teardown result
    pub teardown: TeardownReport,

    /// Frame channel counters
    pub channel: ChannelSnapshot,

    /// Renderer totals
    pub render: RenderReport,

    /// Maneuver loop outcome
    pub maneuver: ManeuverReport,

    /// Total duration of the run
    pub duration: Duration,
}

impl RunStats {
    /// Fold renderer, channel and maneuver figures into one summary
    pub fn summary(&self) -> RunSummary {
        let mut aggregator: RunMetricsAggregator = self.render.metrics.clone();
        aggregator.frames_dropped = self.channel.frames_dropped;
        aggregator.controls_issued = self.maneuver.commands_issued;
        for transition in &self.maneuver.transitions {
            aggregator.on_state_entered(transition.to.as_str(), transition.at);
        }
        aggregator.summary(self.duration)
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!();
        print!("{}", self.summary());
        println!("Maneuver polls: {}", self.maneuver.polls);
        println!(
            "Actors: {} spawned, {} destroyed, {} failed to destroy",
            self.actors_spawned,
            self.teardown.destroyed.len(),
            self.teardown.failed.len()
        );
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maneuver::{ManeuverState, TransitionRecord};

    #[test]
    fn test_summary_merges_sources() {
        let mut render = RenderReport::default();
        render.metrics.on_rendered(2.0);
        render.metrics.on_rendered(4.0);
        render.metrics.on_skipped();

        let stats = RunStats {
            actors_spawned: 4,
            channel: ChannelSnapshot {
                frames_received: 10,
                frames_dropped: 7,
                frames_after_close: 0,
            },
            render,
            maneuver: ManeuverReport {
                polls: 12,
                commands_issued: 2,
                transitions: vec![TransitionRecord {
                    from: ManeuverState::Approach,
                    to: ManeuverState::Realign,
                    poll: 3,
                    at: Duration::from_millis(1500),
                }],
                elapsed: Duration::from_secs(10),
            },
            duration: Duration::from_secs(2),
            ..Default::default()
        };

        let summary = stats.summary();
        assert_eq!(summary.frames_rendered, 2);
        assert_eq!(summary.frames_skipped, 1);
        assert_eq!(summary.frames_dropped, 7);
        assert_eq!(summary.controls_issued, 2);
        assert!((summary.render_fps - 1.0).abs() < 1e-10);
        assert_eq!(
            summary.state_entries.get("realign"),
            Some(&Duration::from_millis(1500))
        );
    }
}
