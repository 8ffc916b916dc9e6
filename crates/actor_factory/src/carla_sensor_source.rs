//! CARLA Sensor SensorSource wrapper
//!
//! Wraps a CARLA RGB camera as a type implementing `SensorSource` trait.
//! Only compiled when `real-carla` feature is enabled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use carla::client::Sensor;
use carla::sensor::data::Image;
use carla::sensor::{SensorData, SensorDataBase};
use contracts::{Frame, FrameCallback, SensorSource};
use tracing::{debug, trace, warn};

/// CARLA camera wrapper
///
/// Wraps CARLA native `Sensor` as `SensorSource`,
/// so the renderer handles real cameras and mock cameras uniformly.
pub struct CarlaSensorSource {
    sensor_id: String,
    sensor: Sensor,
    listening: Arc<AtomicBool>,
}

impl CarlaSensorSource {
    /// Create new CARLA sensor source
    pub fn new(sensor_id: String, sensor: Sensor) -> Self {
        Self {
            sensor_id,
            sensor,
            listening: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// 将 CARLA Image 转换为 Frame（BGRA 原样拷贝）
fn image_to_frame(sensor_id: &str, data: &SensorData) -> Option<Frame> {
    let timestamp = data.timestamp();
    let frame_id = data.frame() as u64;
    let image = Image::try_from(data.clone()).ok()?;

    Some(Frame {
        sensor_id: sensor_id.to_string(),
        frame_id,
        timestamp,
        width: image.width() as u32,
        height: image.height() as u32,
        data: Bytes::copy_from_slice(image.as_raw_bytes()),
    })
}

impl SensorSource for CarlaSensorSource {
    fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    fn listen(&self, callback: FrameCallback) {
        // Idempotent: if already listening, don't register again
        if self.listening.swap(true, Ordering::SeqCst) {
            warn!(sensor_id = %self.sensor_id, "sensor already listening");
            return;
        }

        let sensor_id = self.sensor_id.clone();
        let listening = self.listening.clone();

        debug!(sensor_id = %sensor_id, "starting CARLA camera");

        self.sensor.listen(move |sensor_data| {
            if !listening.load(Ordering::Relaxed) {
                return;
            }

            match image_to_frame(&sensor_id, &sensor_data) {
                Some(frame) => {
                    trace!(
                        sensor_id = %sensor_id,
                        frame_id = frame.frame_id,
                        "CARLA camera frame received"
                    );
                    callback(frame);
                }
                None => {
                    trace!(sensor_id = %sensor_id, "sensor data is not an image");
                }
            }
        });
    }

    fn stop(&self) {
        if self.listening.swap(false, Ordering::SeqCst) {
            debug!(sensor_id = %self.sensor_id, "stopping CARLA camera");
            self.sensor.stop();
        }
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }
}
