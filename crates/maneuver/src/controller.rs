//! Maneuver controller
//!
//! Polls the trail vehicle's pose, advances the state machine and issues the
//! commands its transitions require. Runs on the caller's task.

use std::time::Duration;

use contracts::{ActorId, ControlCommand, Pose, VehiclePort};
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use crate::error::ManeuverError;
use crate::state::{advance, Action, ManeuverState};

/// Controller timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManeuverConfig {
    /// Sleep before each poll
    pub poll_interval: Duration,
    /// How long the final command runs before the loop stops
    pub settle: Duration,
}

impl Default for ManeuverConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            settle: Duration::from_secs(4),
        }
    }
}

/// A state change as it happened
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionRecord {
    pub from: ManeuverState,
    pub to: ManeuverState,
    /// Poll number (1-based) that produced the transition
    pub poll: u64,
    /// Time since `run` started
    pub at: Duration,
}

/// Outcome of a completed run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManeuverReport {
    pub polls: u64,
    pub commands_issued: u64,
    pub transitions: Vec<TransitionRecord>,
    pub elapsed: Duration,
}

/// Overtake controller
pub struct ManeuverController<'a, P: VehiclePort> {
    port: &'a P,
    config: ManeuverConfig,
    state: ManeuverState,
}

impl<'a, P: VehiclePort> ManeuverController<'a, P> {
    pub fn new(port: &'a P, config: ManeuverConfig) -> Self {
        Self {
            port,
            config,
            state: ManeuverState::Approach,
        }
    }

    /// Current state
    pub fn state(&self) -> ManeuverState {
        self.state
    }

    /// Drive the maneuver to completion
    ///
    /// Any pose or control error aborts the loop and is returned as is.
    #[instrument(name = "maneuver_run", skip(self))]
    pub async fn run(
        &mut self,
        lead: ActorId,
        trail: ActorId,
    ) -> Result<ManeuverReport, ManeuverError> {
        let started = Instant::now();
        let mut report = ManeuverReport::default();
        info!(state = %self.state, "maneuver started");

        while !self.state.is_terminal() {
            tokio::time::sleep(self.config.poll_interval).await;
            report.polls += 1;

            let trail_pose = self.read_pose(trail).await?;
            let lead_pose = if self.state == ManeuverState::Approach {
                Some(self.read_pose(lead).await?)
            } else {
                None
            };

            debug!(
                poll = report.polls,
                state = %self.state,
                trail_y = trail_pose.location.y,
                trail_yaw = trail_pose.rotation.yaw,
                lead_y = lead_pose.map(|p| p.location.y),
                "poll"
            );

            for transition in advance(self.state, &trail_pose, lead_pose.as_ref()) {
                match transition.action {
                    Action::Command(command) => {
                        self.issue(trail, command).await?;
                        report.commands_issued += 1;
                    }
                    Action::Settle => {
                        info!(settle_secs = self.config.settle.as_secs_f64(), "settling");
                        tokio::time::sleep(self.config.settle).await;
                    }
                }

                info!(from = %transition.from, to = %transition.to, "state transition");
                observability::record_state_transition(
                    transition.from.as_str(),
                    transition.to.as_str(),
                );
                report.transitions.push(TransitionRecord {
                    from: transition.from,
                    to: transition.to,
                    poll: report.polls,
                    at: started.elapsed(),
                });
                self.state = transition.to;
            }
        }

        report.elapsed = started.elapsed();
        info!(
            polls = report.polls,
            commands = report.commands_issued,
            elapsed_secs = report.elapsed.as_secs_f64(),
            "maneuver finished"
        );
        Ok(report)
    }

    async fn read_pose(&self, actor_id: ActorId) -> Result<Pose, ManeuverError> {
        self.port
            .pose(actor_id)
            .await
            .map_err(|source| ManeuverError::Pose {
                state: self.state,
                actor_id,
                source,
            })
    }

    async fn issue(&self, actor_id: ActorId, command: ControlCommand) -> Result<(), ManeuverError> {
        self.port
            .apply_control(actor_id, command)
            .await
            .map_err(|source| ManeuverError::Control {
                state: self.state,
                actor_id,
                source,
            })?;

        observability::record_control_issued(
            self.state.as_str(),
            command.throttle,
            command.steer,
            command.brake,
        );
        debug!(actor_id, ?command, "control issued");
        Ok(())
    }
}
