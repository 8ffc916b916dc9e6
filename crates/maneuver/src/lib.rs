//! # Maneuver
//!
//! 超车操控模块。
//!
//! 负责：
//! - 三状态机 APPROACH → REALIGN → ACCELERATE（纯函数 `advance`）
//! - 轮询后车位姿、按状态切换下发控制指令的控制循环
//!
//! 控制循环运行在调用方任务上，是后车控制指令的唯一发出者。

pub mod controller;
pub mod error;
pub mod state;

pub use controller::{ManeuverConfig, ManeuverController, ManeuverReport, TransitionRecord};
pub use error::ManeuverError;
pub use state::{
    advance, approach_triggered, realign_triggered, Action, ManeuverState, Transition,
    ACCELERATE_COMMAND, APPROACH_COMMAND,
};
