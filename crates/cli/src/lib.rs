//! # CARLA Overtake
//!
//! 超车场景编排。
//!
//! 提供：
//! - 连接、准备世界、spawn 场景 actors
//! - 渲染任务与操控循环的并发运行
//! - 所有退出路径上的 actor teardown

pub mod error;
pub mod scenario;

pub use error::ScenarioError;
pub use scenario::{RunStats, ScenarioConfig, ScenarioRunner};
