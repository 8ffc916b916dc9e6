//! Frame - 相机传感器输出
//!
//! 原始相机帧结构。

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// 原始相机帧
///
/// 从 CARLA 相机回调接收，BGRA 字节序，每像素 4 字节，按行存储。
/// 由 renderer 消费一次后丢弃。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    /// 传感器 ID
    pub sensor_id: String,

    /// CARLA 帧序号 (单调递增)
    pub frame_id: u64,

    /// CARLA 仿真时间戳 (seconds)
    pub timestamp: f64,

    /// 图像宽度
    pub width: u32,

    /// 图像高度
    pub height: u32,

    /// 原始像素数据 (零拷贝)
    pub data: Bytes,
}

impl Frame {
    /// 每像素字节数 (B, G, R, A)
    pub const BYTES_PER_PIXEL: usize = 4;

    /// 根据宽高计算应有的字节数，溢出时返回 None
    pub fn expected_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(Self::BYTES_PER_PIXEL)
    }

    /// 数据长度是否与宽高一致
    pub fn is_well_formed(&self) -> bool {
        self.expected_len() == Some(self.data.len())
    }
}
