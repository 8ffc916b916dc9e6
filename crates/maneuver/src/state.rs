//! 超车状态机
//!
//! | 状态 | 触发条件 | 动作 |
//! |---|---|---|
//! | APPROACH | `trail.y - 1 < lead.y` | `{0.3, -0.1, 0}` |
//! | REALIGN | 后车 yaw 回到 180° 附近（见 [`realign_triggered`]） | `{0.7, 0, 0}` |
//! | ACCELERATE | 总是 | 等待 settle 后结束 |
//!
//! 同一次轮询中按顺序检查，可以连续完成多次切换。状态只前进不后退。

use std::fmt;

use contracts::{ControlCommand, Pose};

/// 并线：轻微左转向前车后方
pub const APPROACH_COMMAND: ControlCommand = ControlCommand {
    throttle: 0.3,
    steer: -0.1,
    brake: 0.0,
};

/// 摆正后加速超越
pub const ACCELERATE_COMMAND: ControlCommand = ControlCommand {
    throttle: 0.7,
    steer: 0.0,
    brake: 0.0,
};

/// Maneuver state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ManeuverState {
    /// Waiting for the trail vehicle to close in laterally
    #[default]
    Approach,
    /// Waiting for the heading to swing back
    Realign,
    /// Accelerating past, settle then stop
    Accelerate,
    /// Terminal
    Done,
}

impl ManeuverState {
    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approach => "approach",
            Self::Realign => "realign",
            Self::Accelerate => "accelerate",
            Self::Done => "done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl fmt::Display for ManeuverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side effect of a transition
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// Send command to the trail vehicle
    Command(ControlCommand),
    /// Let the last command run for the settle delay
    Settle,
}

/// One state change and the action it requires
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub from: ManeuverState,
    pub to: ManeuverState,
    pub action: Action,
}

/// 后车是否已横向接近前车
pub fn approach_triggered(trail: &Pose, lead: &Pose) -> bool {
    trail.location.y - 1.0 < lead.location.y
}

/// 后车航向是否已摆回
///
/// 条件保持原样：yaw ∈ (0, 180] 或 yaw ≤ -180。yaw 恰好为 0 时不触发。
#[allow(clippy::nonminimal_bool)]
pub fn realign_triggered(yaw: f64) -> bool {
    (yaw < 0.0 && yaw <= -180.0) || (yaw > 0.0 && yaw <= 180.0)
}

/// 推进一次轮询
///
/// `lead` 只在 APPROACH 状态下需要；缺失时 APPROACH 不触发。
/// 返回本次轮询中依次发生的切换，最后一个切换的 `to` 即新状态。
pub fn advance(state: ManeuverState, trail: &Pose, lead: Option<&Pose>) -> Vec<Transition> {
    let mut transitions = Vec::new();
    let mut current = state;

    if current == ManeuverState::Approach && lead.is_some_and(|lead| approach_triggered(trail, lead))
    {
        transitions.push(Transition {
            from: current,
            to: ManeuverState::Realign,
            action: Action::Command(APPROACH_COMMAND),
        });
        current = ManeuverState::Realign;
    }

    if current == ManeuverState::Realign && realign_triggered(trail.rotation.yaw) {
        transitions.push(Transition {
            from: current,
            to: ManeuverState::Accelerate,
            action: Action::Command(ACCELERATE_COMMAND),
        });
        current = ManeuverState::Accelerate;
    }

    if current == ManeuverState::Accelerate {
        transitions.push(Transition {
            from: current,
            to: ManeuverState::Done,
            action: Action::Settle,
        });
    }

    transitions
}
