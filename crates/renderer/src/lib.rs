//! # Renderer
//!
//! 相机帧渲染模块。
//!
//! 负责：
//! - 在传感器回调线程与渲染任务之间提供有界通道（满时丢弃最新帧）
//! - 将 BGRA 原始帧解码为 RGB 图像
//! - 将图像贴到显示表面原点并呈现
//! - 解码失败的帧记录日志后跳过，不影响传感器回调路径
//! - `window` feature 下把呈现的图像显示到真实窗口（winit + wgpu）

pub mod channel;
pub mod decode;
pub mod error;
pub mod renderer;
pub mod surface;
#[cfg(feature = "window")]
pub mod window;

pub use channel::{ChannelMetrics, ChannelSnapshot, FrameChannel};
pub use decode::{decode_frame, DecodedFrame};
pub use error::FrameError;
pub use renderer::{FrameRenderer, RenderOutcome, RenderReport};
pub use surface::{DisplaySurface, FrameSurface};
#[cfg(feature = "window")]
pub use window::WindowSurface;
