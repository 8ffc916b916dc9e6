//! Renderer error types

use thiserror::Error;

/// Per-frame render error
///
/// Never crosses into the sensor delivery path: the renderer logs and skips.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Buffer length does not match width * height * 4
    #[error("malformed frame {frame_id}: expected {expected} bytes for {width}x{height}, got {actual}")]
    Malformed {
        frame_id: u64,
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    /// width * height * 4 does not fit in usize
    #[error("frame {frame_id} dimensions {width}x{height} overflow")]
    DimensionOverflow { frame_id: u64, width: u32, height: u32 },

    /// Zero-sized frame
    #[error("frame {frame_id} has no pixels ({width}x{height})")]
    Empty { frame_id: u64, width: u32, height: u32 },

    /// Display surface rejected the operation
    #[error("display surface error: {message}")]
    Surface { message: String },
}

impl FrameError {
    /// Short label for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Malformed { .. } => "malformed",
            Self::DimensionOverflow { .. } => "overflow",
            Self::Empty { .. } => "empty",
            Self::Surface { .. } => "surface",
        }
    }
}
