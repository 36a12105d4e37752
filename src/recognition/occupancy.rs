use std::collections::VecDeque;

use image::GrayImage;

use crate::config::{to_percent, Scoring};
use crate::models::classification::SpotVerdict;
use crate::models::engine_rec::RegionCrops;
use crate::my_utils::image::{color_std, count_non_zero, edge_density, pixel_std, texture_score};

/// 单个车位在一次会话内的自适应状态，按区域下标保存
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionState {
    /// 最近判为空位时前景像素数的平滑值，从未判空时为None
    pub empty_reference: Option<f32>,
    /// 最近若干帧的前景像素数，最旧的在前
    motion_history: VecDeque<u32>,
}

impl RegionState {
    /// 预留给运动抑制使用，目前不参与判断
    pub fn motion_history(&self) -> &VecDeque<u32> {
        &self.motion_history
    }

    fn record_count(&mut self, count: u32, capacity: usize) {
        self.motion_history.push_back(count);
        while self.motion_history.len() > capacity {
            self.motion_history.pop_front();
        }
    }
}

/// 车位占用打分：四个信号加权投票，不持有任何状态
#[derive(Debug, Clone)]
pub struct OccupancyScorer {
    args: Scoring,
}

impl OccupancyScorer {
    pub fn new(args: Scoring) -> Self {
        OccupancyScorer { args }
    }

    pub fn args(&self) -> &Scoring {
        &self.args
    }

    /// 有空位参照时在参照上浮一定比例，否则按二值图的离散程度放大基础阈值
    pub fn dynamic_threshold(&self, processed: &GrayImage, state: &RegionState) -> u32 {
        let threshold = match state.empty_reference {
            Some(reference) => reference * (1.0 + self.args.threshold_margin),
            None => self.args.threshold_base * (1.0 + pixel_std(processed) / 100.0),
        };
        threshold.max(0.0) as u32
    }

    /// 输入一个车位的截图和当前状态，输出判断结果和更新后的状态
    pub fn score(&self, crops: &RegionCrops, index: usize, state: &RegionState) -> (SpotVerdict, RegionState) {
        let args = &self.args;
        let pixel_count = count_non_zero(&crops.processed);
        let dynamic_threshold = self.dynamic_threshold(&crops.processed, state);
        let edge_density = edge_density(&crops.gray, args.canny_low, args.canny_high);
        let texture = texture_score(&crops.gray, args.texture_kernel);
        let color_std = color_std(&crops.rgb);

        let [w_count, w_edge, w_texture, w_color] = args.weights.as_percent();
        let mut confidence = 0u32;
        if pixel_count < dynamic_threshold {
            confidence += w_count;
        }
        if edge_density < args.edge_density_max {
            confidence += w_edge;
        }
        if texture < args.texture_max {
            confidence += w_texture;
        }
        if color_std < args.color_std_max {
            confidence += w_color;
        }
        let is_empty = confidence >= to_percent(args.empty_score);

        let mut next = state.clone();
        next.record_count(pixel_count, args.motion_history_len);
        // 只在空位时更新参照，占用期间保持不变
        if is_empty {
            let alpha = args.reference_smoothing;
            next.empty_reference = Some(match state.empty_reference {
                None => pixel_count as f32,
                Some(reference) => (1.0 - alpha) * reference + alpha * pixel_count as f32,
            });
        }

        log::debug!(
            "spot {index}: count {pixel_count}/{dynamic_threshold} edge {edge_density:.3} texture {texture:.1} color {color_std:.1} -> {confidence}%"
        );

        let verdict = SpotVerdict {
            index,
            is_empty,
            confidence,
            pixel_count,
            dynamic_threshold,
            edge_density,
            texture,
            color_std,
        };
        (verdict, next)
    }
}

impl Default for OccupancyScorer {
    fn default() -> Self {
        OccupancyScorer::new(Scoring::default())
    }
}
