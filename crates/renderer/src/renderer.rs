//! Frame renderer
//!
//! Single consumer of the frame channel and the only toucher of the display surface.

use std::time::Instant;

use async_channel::Receiver;
use contracts::Frame;
use observability::RunMetricsAggregator;
use tracing::{debug, info, instrument, trace, warn};

use crate::decode::decode_frame;
use crate::error::FrameError;
use crate::surface::DisplaySurface;

/// Result of handling one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Decoded, blitted and presented
    Presented,
    /// Skipped, the surface was not touched
    Skipped(FrameError),
}

/// Renderer totals, returned when the consumer loop ends
#[derive(Debug, Clone, Default)]
pub struct RenderReport {
    /// Frames rendered/skipped and render latency
    pub metrics: RunMetricsAggregator,
    /// Last frame id shown on the surface
    pub last_frame_id: Option<u64>,
}

/// Frame renderer
pub struct FrameRenderer<S: DisplaySurface> {
    surface: S,
    report: RenderReport,
}

impl<S: DisplaySurface> FrameRenderer<S> {
    /// Create renderer drawing onto `surface`
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            report: RenderReport::default(),
        }
    }

    /// Display surface
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Totals so far
    pub fn report(&self) -> &RenderReport {
        &self.report
    }

    /// Handle one delivered frame
    ///
    /// Errors are logged and counted here; they never reach the caller as `Err`.
    #[instrument(
        name = "renderer_on_frame",
        level = "trace",
        skip(self, frame),
        fields(sensor_id = %frame.sensor_id, frame_id = frame.frame_id)
    )]
    pub fn on_frame(&mut self, frame: Frame) -> RenderOutcome {
        let started = Instant::now();

        match self.render(&frame) {
            Ok(()) => {
                let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                self.report.metrics.on_rendered(latency_ms);
                self.report.last_frame_id = Some(frame.frame_id);
                observability::record_frame_rendered(&frame.sensor_id, latency_ms);
                trace!(latency_ms, "frame presented");
                RenderOutcome::Presented
            }
            Err(e) => {
                self.report.metrics.on_skipped();
                observability::record_frame_skipped(&frame.sensor_id, e.reason());
                warn!(
                    sensor_id = %frame.sensor_id,
                    frame_id = frame.frame_id,
                    error = %e,
                    "frame skipped"
                );
                RenderOutcome::Skipped(e)
            }
        }
    }

    fn render(&mut self, frame: &Frame) -> Result<(), FrameError> {
        let image = decode_frame(frame)?;
        self.surface.blit(&image)?;
        self.surface.present()
    }

    /// Consume frames until the channel is closed and drained
    #[instrument(name = "renderer_run", skip(self, rx))]
    pub async fn run(mut self, rx: Receiver<Frame>) -> (RenderReport, S) {
        debug!(surface = ?self.surface.size(), "renderer started");

        while let Ok(frame) = rx.recv().await {
            self.on_frame(frame);
        }

        info!(
            rendered = self.report.metrics.frames_rendered,
            skipped = self.report.metrics.frames_skipped,
            "renderer stopped"
        );
        (self.report, self.surface)
    }
}
