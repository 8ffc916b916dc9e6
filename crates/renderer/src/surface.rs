//! Display surface
//!
//! `DisplaySurface` is the window-side seam: blit an image at the origin, then
//! present it. `FrameSurface` is the in-memory double-buffered implementation.

use image::{imageops, Rgb, RgbImage};

use crate::error::FrameError;

/// Fixed-size display surface
pub trait DisplaySurface: Send {
    /// Surface size (width, height)
    fn size(&self) -> (u32, u32);

    /// Draw `image` at (0, 0) into the back buffer, replacing its previous content
    fn blit(&mut self, image: &RgbImage) -> Result<(), FrameError>;

    /// Flip the back buffer to the front
    fn present(&mut self) -> Result<(), FrameError>;
}

/// Double-buffered in-memory surface
///
/// Images larger than the surface are clipped, smaller ones leave the rest black.
#[derive(Debug, Clone)]
pub struct FrameSurface {
    front: RgbImage,
    back: RgbImage,
    presented: u64,
}

impl FrameSurface {
    /// Create a black surface
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            front: RgbImage::new(width, height),
            back: RgbImage::new(width, height),
            presented: 0,
        }
    }

    /// Currently presented image
    pub fn snapshot(&self) -> &RgbImage {
        &self.front
    }

    /// Number of completed presents
    pub fn presented_frames(&self) -> u64 {
        self.presented
    }
}

impl DisplaySurface for FrameSurface {
    fn size(&self) -> (u32, u32) {
        self.back.dimensions()
    }

    fn blit(&mut self, image: &RgbImage) -> Result<(), FrameError> {
        if image.dimensions() != self.back.dimensions() {
            for pixel in self.back.pixels_mut() {
                *pixel = Rgb([0, 0, 0]);
            }
        }
        imageops::replace(&mut self.back, image, 0, 0);
        Ok(())
    }

    fn present(&mut self) -> Result<(), FrameError> {
        std::mem::swap(&mut self.front, &mut self.back);
        self.presented += 1;
        Ok(())
    }
}
