//! BGRA 帧解码
//!
//! 输入按行存储的 height×width×4 BGRA 字节，输出 RGB 图像。
//! 图像按 (x, y) = (列, 行) 寻址，与显示表面的 (width, height) 方向一致。

use contracts::Frame;
use image::{Rgb, RgbImage};

use crate::error::FrameError;

/// Decoded, displayable frame
pub type DecodedFrame = RgbImage;

/// 解码一帧
///
/// 丢弃 alpha 通道，BGR 反转为 RGB：pixel(x, y) = (buf[y,x,2], buf[y,x,1], buf[y,x,0])。
/// 缓冲区长度必须等于 width * height * 4。
pub fn decode_frame(frame: &Frame) -> Result<DecodedFrame, FrameError> {
    let expected = frame
        .expected_len()
        .ok_or(FrameError::DimensionOverflow {
            frame_id: frame.frame_id,
            width: frame.width,
            height: frame.height,
        })?;

    if frame.data.len() != expected {
        return Err(FrameError::Malformed {
            frame_id: frame.frame_id,
            width: frame.width,
            height: frame.height,
            expected,
            actual: frame.data.len(),
        });
    }

    if expected == 0 {
        return Err(FrameError::Empty {
            frame_id: frame.frame_id,
            width: frame.width,
            height: frame.height,
        });
    }

    let pixels: &[[u8; 4]] = bytemuck::cast_slice(&frame.data[..]);
    let width = frame.width as usize;

    Ok(RgbImage::from_fn(frame.width, frame.height, |x, y| {
        let [b, g, r, _] = pixels[y as usize * width + x as usize];
        Rgb([r, g, b])
    }))
}
