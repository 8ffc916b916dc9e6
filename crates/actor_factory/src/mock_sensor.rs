//! Mock camera implementation
//!
//! Implements `SensorSource` trait, generates synthetic BGRA frames.
//! Used for testing and development without CARLA environment.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use contracts::{Frame, FrameCallback, SensorSource};
use tracing::{debug, trace};

/// Mock camera configuration
#[derive(Debug, Clone)]
pub struct MockCameraConfig {
    /// Send frequency (Hz)
    pub frequency_hz: f64,
    /// Image width
    pub image_width: u32,
    /// Image height
    pub image_height: u32,
    /// Truncate every n-th frame's buffer (exercises the malformed-frame path)
    pub malformed_every: Option<u64>,
}

impl Default for MockCameraConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 20.0,
            image_width: 1080,
            image_height: 1080,
            malformed_every: None,
        }
    }
}

/// Mock camera
///
/// Generates frames at the configured frequency on a background thread and
/// hands them to the registered callback, like a real CARLA camera.
/// Clones share the listening state, so stopping one clone stops them all.
#[derive(Clone)]
pub struct MockCamera {
    sensor_id: String,
    config: MockCameraConfig,
    listening: Arc<AtomicBool>,
}

impl MockCamera {
    /// Create new mock camera
    pub fn new(sensor_id: String, config: MockCameraConfig) -> Self {
        Self {
            sensor_id,
            config,
            listening: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create mock camera with default configuration
    pub fn with_defaults(sensor_id: String) -> Self {
        Self::new(sensor_id, MockCameraConfig::default())
    }

    /// Generate one BGRA frame
    ///
    /// A diagonal gradient that scrolls with the frame number: blue follows x,
    /// green follows y, red follows the frame number.
    pub fn generate_frame(
        config: &MockCameraConfig,
        sensor_id: &str,
        frame_id: u64,
        timestamp: f64,
    ) -> Frame {
        let width = config.image_width as usize;
        let height = config.image_height as usize;
        let mut data = Vec::with_capacity(width * height * Frame::BYTES_PER_PIXEL);

        for y in 0..height {
            for x in 0..width {
                data.push(((x as u64 + frame_id) % 256) as u8);
                data.push(((y as u64 + frame_id) % 256) as u8);
                data.push((frame_id % 256) as u8);
                data.push(255);
            }
        }

        if let Some(n) = config.malformed_every {
            if n > 0 && frame_id % n == 0 {
                data.truncate(data.len().saturating_sub(Frame::BYTES_PER_PIXEL));
            }
        }

        Frame {
            sensor_id: sensor_id.to_string(),
            frame_id,
            timestamp,
            width: config.image_width,
            height: config.image_height,
            data: Bytes::from(data),
        }
    }
}

impl SensorSource for MockCamera {
    fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    fn listen(&self, callback: FrameCallback) {
        // Idempotent: if already listening, don't start again
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let sensor_id = self.sensor_id.clone();
        let config = self.config.clone();
        let listening = self.listening.clone();

        let interval = Duration::from_secs_f64(1.0 / config.frequency_hz);

        thread::spawn(move || {
            let mut frame_id: u64 = 0;
            let start_time = Instant::now();

            debug!(
                sensor_id = %sensor_id,
                frequency_hz = config.frequency_hz,
                "mock camera started"
            );

            while listening.load(Ordering::Relaxed) {
                frame_id += 1;
                let timestamp = start_time.elapsed().as_secs_f64();

                callback(Self::generate_frame(&config, &sensor_id, frame_id, timestamp));

                trace!(sensor_id = %sensor_id, frame_id, timestamp, "mock frame sent");

                thread::sleep(interval);
            }

            debug!(sensor_id = %sensor_id, "mock camera stopped");
        });
    }

    fn stop(&self) {
        self.listening.store(false, Ordering::SeqCst);
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    fn small_config() -> MockCameraConfig {
        MockCameraConfig {
            frequency_hz: 100.0,
            image_width: 8,
            image_height: 4,
            malformed_every: None,
        }
    }

    #[test]
    fn test_mock_camera_delivers_frames() {
        let camera = MockCamera::new("test_camera".to_string(), small_config());

        let count = Arc::new(AtomicU64::new(0));
        let count_clone = count.clone();

        camera.listen(Arc::new(move |frame| {
            assert_eq!(frame.sensor_id, "test_camera");
            assert!(frame.is_well_formed());
            count_clone.fetch_add(1, Ordering::Relaxed);
        }));

        thread::sleep(Duration::from_millis(50));
        camera.stop();

        assert!(count.load(Ordering::Relaxed) > 0);
        assert!(!camera.is_listening());
    }

    #[test]
    fn test_frame_ids_increase() {
        let camera = MockCamera::new("cam".to_string(), small_config());
        let last = Arc::new(AtomicU64::new(0));
        let last_clone = last.clone();

        camera.listen(Arc::new(move |frame| {
            let previous = last_clone.swap(frame.frame_id, Ordering::SeqCst);
            assert!(frame.frame_id > previous);
        }));

        thread::sleep(Duration::from_millis(50));
        camera.stop();
        assert!(last.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn test_malformed_every() {
        let config = MockCameraConfig {
            malformed_every: Some(3),
            ..small_config()
        };

        assert!(MockCamera::generate_frame(&config, "cam", 1, 0.0).is_well_formed());
        assert!(MockCamera::generate_frame(&config, "cam", 2, 0.0).is_well_formed());
        assert!(!MockCamera::generate_frame(&config, "cam", 3, 0.0).is_well_formed());
    }

    #[test]
    fn test_generated_pixel_layout_is_bgra() {
        let frame = MockCamera::generate_frame(&small_config(), "cam", 7, 0.0);
        // pixel (x=2, y=1)
        let offset = (8 + 2) * 4;
        assert_eq!(&frame.data[offset..offset + 4], &[9, 8, 7, 255]);
    }

    #[test]
    fn test_clones_share_listening_state() {
        let camera = MockCamera::new("cam".to_string(), small_config());
        let clone = camera.clone();

        camera.listen(Arc::new(|_| {}));
        assert!(clone.is_listening());

        clone.stop();
        assert!(!camera.is_listening());
    }
}
