use std::collections::HashMap;

use ab_glyph::FontArc;
use image::{GrayImage, RgbImage};

use crate::config::{Config, CONFIG};
use crate::models::classification::{FrameClassification, SpotVerdict};
use crate::models::engine_rec::RegionCrops;
use crate::models::region::ParkingRegion;
use crate::my_utils::image::{to_gray, ExtractRegion};
use crate::my_utils::io::resolve_font;
use super::occupancy::{OccupancyScorer, RegionState};
use super::preprocess::Preprocessor;
use super::render::RecRendering;

/// 车位分类引擎，一个实例对应一路视频，区域状态跨帧保留
pub struct FrameClassifier {
    config: Config,
    preprocessor: Preprocessor,
    scorer: OccupancyScorer,
    font: Option<FontArc>,
    states: HashMap<usize, RegionState>,
}

impl FrameClassifier {
    /// 使用全局配置
    pub fn new() -> Self {
        FrameClassifier::with_config(CONFIG.clone())
    }

    pub fn with_config(config: Config) -> Self {
        let font = resolve_font(config.rendering.font_path.as_deref());
        FrameClassifier {
            preprocessor: Preprocessor::new(config.image_process.clone()),
            scorer: OccupancyScorer::new(config.scoring.clone()),
            config,
            font,
            states: HashMap::new(),
        }
    }

    /// 跨模块实现方法的时候访问不到成员变量，需要调用此函数
    pub fn get_config(&self) -> &Config {
        &self.config
    }

    pub fn get_font(&self) -> Option<&FontArc> {
        self.font.as_ref()
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    /// 帧预处理，得到二值图
    pub fn preprocess(&self, frame: &RgbImage) -> GrayImage {
        self.preprocessor.process(frame)
    }

    /// 某个区域当前的自适应状态，还没分类过的区域返回None
    pub fn region_state(&self, index: usize) -> Option<&RegionState> {
        self.states.get(&index)
    }

    /// 清空所有区域状态，区域列表变化后调用
    pub fn reset(&mut self) {
        self.states.clear();
    }

    /// 对一帧里所有车位分类并在帧上绘制结果
    /// 截图取自未绘制的原始帧，绘制不影响后面区域的判断
    pub fn classify(&mut self, raw: &RgbImage, processed: &GrayImage, regions: &[ParkingRegion]) -> FrameClassification {
        let mut frame = raw.clone();
        let mut spots = Vec::with_capacity(regions.len());

        for (index, region) in regions.iter().enumerate() {
            let Some(crops) = crop_region(raw, processed, region) else {
                log::warn!("region {index} {region:?} is outside the frame, skipped");
                continue;
            };
            let state = self.states.entry(index).or_default();
            let (verdict, next) = self.scorer.score(&crops, index, state);
            *state = next;
            self.rendering_spot(&mut frame, region, &verdict);
            spots.push(verdict);
        }

        let free = spots.iter().filter(|s| s.is_empty).count();
        let total = spots.len();
        self.rendering_summary(&mut frame, free, total);
        log::debug!("frame classified: {free}/{total} free");

        FrameClassification { frame, free, total, spots }
    }

    /// 预处理加分类
    pub fn classify_frame(&mut self, raw: &RgbImage, regions: &[ParkingRegion]) -> FrameClassification {
        let processed = self.preprocess(raw);
        self.classify(raw, &processed, regions)
    }
}

impl Default for FrameClassifier {
    fn default() -> Self {
        FrameClassifier::new()
    }
}

/// 截取一个车位的三张图，任一截图为空时返回None
fn crop_region(raw: &RgbImage, processed: &GrayImage, region: &ParkingRegion) -> Option<RegionCrops> {
    let rgb = raw.extract(region);
    let processed = processed.extract(region);
    if rgb.width() == 0 || rgb.height() == 0 || processed.width() == 0 || processed.height() == 0 {
        return None;
    }
    Some(RegionCrops { gray: to_gray(&rgb), rgb, processed })
}

/// 空闲车位下标
pub fn free_spots(spots: &[SpotVerdict]) -> Vec<usize> {
    spots.iter().filter(|s| s.is_empty).map(|s| s.index).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::{Luma, Rgb};

    fn classifier() -> FrameClassifier {
        FrameClassifier::with_config(Config::default())
    }

    #[test]
    fn regions_outside_frame_are_skipped() {
        let raw = RgbImage::from_pixel(200, 100, Rgb([120, 120, 120]));
        let processed = GrayImage::new(200, 100);
        let regions = vec![
            ParkingRegion::new(10, 10, 50, 30, 0.0),
            ParkingRegion::new(180, 80, 50, 30, 0.0),
            ParkingRegion::new(100, 40, 50, 30, 0.0),
        ];
        let mut engine = classifier();
        let result = engine.classify(&raw, &processed, &regions);
        assert_eq!(result.total, 2);
        assert_eq!(result.free, 2);
        assert_eq!(free_spots(&result.spots), vec![0, 2]);
        assert!(engine.region_state(1).is_none());
        assert_eq!(result.frame.dimensions(), (200, 100));
    }

    #[test]
    fn rotated_region_off_frame_is_not_counted() {
        let raw = RgbImage::from_pixel(400, 200, Rgb([120, 120, 120]));
        let processed = GrayImage::new(400, 200);
        let regions = vec![
            ParkingRegion::new(5000, 5000, 107, 48, 30.0),
            ParkingRegion::new(5000, 5000, 107, 48, 0.0),
            ParkingRegion::new(150, 60, 107, 48, 30.0),
        ];
        let mut engine = classifier();
        let result = engine.classify(&raw, &processed, &regions);
        assert_eq!((result.free, result.total), (1, 1));
        assert_eq!(free_spots(&result.spots), vec![2]);
        assert!(engine.region_state(0).is_none());
    }

    #[test]
    fn state_is_kept_per_region_until_reset() {
        let raw = RgbImage::from_pixel(120, 60, Rgb([80, 80, 80]));
        let processed = GrayImage::from_fn(120, 60, |x, _| Luma([if x < 20 { 255 } else { 0 }]));
        let regions = vec![ParkingRegion::new(0, 0, 50, 30, 0.0), ParkingRegion::new(60, 0, 50, 30, 0.0)];
        let mut engine = classifier();
        engine.classify(&raw, &processed, &regions);
        engine.classify(&raw, &processed, &regions);
        assert_relative_eq!(engine.region_state(0).unwrap().empty_reference.unwrap(), 600.0, epsilon = 1e-2);
        assert_eq!(engine.region_state(1).unwrap().empty_reference, Some(0.0));
        assert_eq!(engine.region_state(0).unwrap().motion_history().len(), 2);

        engine.reset();
        assert!(engine.region_state(0).is_none());
    }

    #[test]
    fn drawing_does_not_leak_into_neighbour_crops() {
        // 两个区域重叠，前一个区域的边框不应影响后一个的判断
        let raw = RgbImage::from_pixel(200, 100, Rgb([100, 100, 100]));
        let processed = GrayImage::new(200, 100);
        let regions = vec![ParkingRegion::new(20, 20, 80, 40, 0.0), ParkingRegion::new(60, 30, 80, 40, 0.0)];
        let result = classifier().classify(&raw, &processed, &regions);
        assert_eq!(result.spots[1].color_std, 0.0);
        assert_eq!(result.spots[1].edge_density, 0.0);
        assert_ne!(result.frame, raw);
    }
}
