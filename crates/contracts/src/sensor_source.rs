//! SensorSource trait - camera frame source abstraction
//!
//! Defines a unified interface for frame producers, decoupling the renderer from concrete sensor implementations.
//! Supports unified handling of real CARLA cameras and mock cameras.

use std::sync::Arc;

use crate::Frame;

/// Frame delivery callback type
///
/// Invoked on the sensor's own delivery thread, once per produced frame.
/// Uses `Arc` to allow callback sharing across multiple contexts.
pub type FrameCallback = Arc<dyn Fn(Frame) + Send + Sync>;

/// Frame source trait
///
/// Abstracts the common behavior of real CARLA cameras and mock cameras.
///
/// # Example
///
/// ```ignore
/// let camera: Box<dyn SensorSource> = client.sensor_source(actor_id, "cam_1".into())?;
/// camera.listen(Arc::new(|frame| {
///     println!("Received frame: {}", frame.frame_id);
/// }));
/// // ... use camera ...
/// camera.stop();
/// ```
pub trait SensorSource: Send + Sync {
    /// Get sensor ID
    fn sensor_id(&self) -> &str;

    /// Register frame callback
    ///
    /// If already listening, repeated calls are ignored (only the first callback stays registered).
    fn listen(&self, callback: FrameCallback);

    /// Stop frame delivery
    fn stop(&self);

    /// Check if currently listening
    fn is_listening(&self) -> bool;
}
