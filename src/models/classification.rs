/*
    输出结构
*/

use image::RgbImage;
use serde::{Deserialize, Serialize};

/// 单个车位的判断结果和四个信号的原始值
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SpotVerdict {
    pub index: usize,
    pub is_empty: bool,
    /// 0-100，空位置信度
    pub confidence: u32,
    pub pixel_count: u32,
    pub dynamic_threshold: u32,
    pub edge_density: f32,
    pub texture: f32,
    pub color_std: f32,
}

/// 一帧的分类结果
pub struct FrameClassification {
    /// 已绘制标注的帧
    pub frame: RgbImage,
    pub free: usize,
    pub total: usize,
    pub spots: Vec<SpotVerdict>,
}

impl FrameClassification {
    pub fn summary(&self, frame_index: usize) -> FrameSummary {
        FrameSummary {
            frame_index,
            free: self.free,
            total: self.total,
            spots: self.spots.clone(),
        }
    }
}

/// 写入json的每帧统计，不含图片
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FrameSummary {
    pub frame_index: usize,
    pub free: usize,
    pub total: usize,
    pub spots: Vec<SpotVerdict>,
}
