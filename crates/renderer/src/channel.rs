//! Frame channel between the sensor callback and the renderer task
//!
//! The callback never blocks: when the channel is full the newest frame is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_channel::{bounded, Receiver, Sender, TrySendError};
use contracts::{Frame, FrameCallback};
use tracing::{trace, warn};

/// Channel metrics
#[derive(Debug, Default)]
pub struct ChannelMetrics {
    /// Frames offered by the sensor
    pub frames_received: AtomicU64,
    /// Frames dropped because the channel was full
    pub frames_dropped: AtomicU64,
    /// Frames offered after the renderer went away
    pub frames_after_close: AtomicU64,
}

impl ChannelMetrics {
    /// Get snapshot
    pub fn snapshot(&self) -> ChannelSnapshot {
        ChannelSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            frames_after_close: self.frames_after_close.load(Ordering::Relaxed),
        }
    }
}

/// Channel metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelSnapshot {
    pub frames_received: u64,
    pub frames_dropped: u64,
    pub frames_after_close: u64,
}

/// Bounded frame channel
pub struct FrameChannel {
    tx: Sender<Frame>,
    rx: Receiver<Frame>,
    metrics: Arc<ChannelMetrics>,
}

impl FrameChannel {
    /// Create a channel holding at most `capacity` frames (minimum 1)
    pub fn bounded(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        Self {
            tx,
            rx,
            metrics: Arc::new(ChannelMetrics::default()),
        }
    }

    /// Callback to register on a `SensorSource`
    pub fn callback(&self) -> FrameCallback {
        let tx = self.tx.clone();
        let metrics = self.metrics.clone();
        Arc::new(move |frame| send_frame(&tx, frame, &metrics))
    }

    /// Consumer side
    pub fn receiver(&self) -> Receiver<Frame> {
        self.rx.clone()
    }

    /// Shared metrics
    pub fn metrics(&self) -> Arc<ChannelMetrics> {
        self.metrics.clone()
    }

    /// Close the channel
    ///
    /// Frames already queued are still delivered to the receiver.
    pub fn close(&self) {
        self.tx.close();
    }
}

/// Enqueue a frame, dropping it if the channel is full
#[inline]
fn send_frame(tx: &Sender<Frame>, frame: Frame, metrics: &ChannelMetrics) {
    metrics.frames_received.fetch_add(1, Ordering::Relaxed);
    let frame_id = frame.frame_id;

    match tx.try_send(frame) {
        Ok(()) => {
            trace!(frame_id, "frame queued");
        }
        Err(TrySendError::Full(frame)) => {
            metrics.frames_dropped.fetch_add(1, Ordering::Relaxed);
            observability::record_frame_dropped(&frame.sensor_id);
            trace!(frame_id, "frame dropped (newest)");
        }
        Err(TrySendError::Closed(frame)) => {
            // 只在第一次提示
            if metrics.frames_after_close.fetch_add(1, Ordering::Relaxed) == 0 {
                warn!(sensor_id = %frame.sensor_id, "frame channel closed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn frame(frame_id: u64) -> Frame {
        Frame {
            sensor_id: "cam_1".into(),
            frame_id,
            timestamp: frame_id as f64 * 0.05,
            width: 1,
            height: 1,
            data: Bytes::from_static(&[0, 0, 0, 255]),
        }
    }

    #[test]
    fn test_drop_newest_when_full() {
        let channel = FrameChannel::bounded(2);
        let callback = channel.callback();

        for id in 1..=5 {
            callback(frame(id));
        }

        let rx = channel.receiver();
        assert_eq!(rx.try_recv().unwrap().frame_id, 1);
        assert_eq!(rx.try_recv().unwrap().frame_id, 2);
        assert!(rx.try_recv().is_err());

        let snapshot = channel.metrics().snapshot();
        assert_eq!(snapshot.frames_received, 5);
        assert_eq!(snapshot.frames_dropped, 3);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let channel = FrameChannel::bounded(0);
        channel.callback()(frame(1));
        assert_eq!(channel.receiver().len(), 1);
    }

    #[test]
    fn test_send_after_close_is_silent() {
        let channel = FrameChannel::bounded(4);
        let callback = channel.callback();
        callback(frame(1));
        channel.close();
        callback(frame(2));
        callback(frame(3));

        let rx = channel.receiver();
        assert_eq!(rx.try_recv().unwrap().frame_id, 1);
        assert!(rx.try_recv().is_err());
        assert_eq!(channel.metrics().snapshot().frames_after_close, 2);
    }

    #[tokio::test]
    async fn test_callback_from_other_thread() {
        let channel = FrameChannel::bounded(16);
        let callback = channel.callback();

        std::thread::spawn(move || {
            for id in 1..=3 {
                callback(frame(id));
            }
        })
        .join()
        .unwrap();

        let rx = channel.receiver();
        for id in 1..=3 {
            assert_eq!(rx.recv().await.unwrap().frame_id, id);
        }
    }
}
