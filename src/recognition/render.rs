use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::models::classification::SpotVerdict;
use crate::models::region::ParkingRegion;
use super::engine::FrameClassifier;

pub const EMPTY_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const OCCUPIED_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
pub const SUMMARY_COLOR: Rgb<u8> = Rgb([180, 0, 180]);
/// 标注工具里未分类区域的颜色
pub const MARKED_COLOR: Rgb<u8> = Rgb([255, 200, 0]);

pub trait RecRendering {
    /// 画一个车位的边框和置信度
    fn rendering_spot(&self, img: &mut RgbImage, region: &ParkingRegion, verdict: &SpotVerdict);
    /// 左上角汇总框
    fn rendering_summary(&self, img: &mut RgbImage, free: usize, total: usize);
}

impl RecRendering for FrameClassifier {
    fn rendering_spot(&self, img: &mut RgbImage, region: &ParkingRegion, verdict: &SpotVerdict) {
        let args = &self.get_config().rendering;
        let (color, thickness) = if verdict.is_empty {
            (EMPTY_COLOR, args.empty_thickness)
        } else {
            (OCCUPIED_COLOR, args.occupied_thickness)
        };
        draw_region_outline(img, region, color, thickness);

        let Some(font) = self.get_font() else { return };
        let (x, y) = if region.is_rotated() {
            let c = region.center();
            (c.x as i32 - 15, c.y as i32 - 7)
        } else {
            (region.x + 5, region.y + 3)
        };
        draw_text_mut(img, TEXT_COLOR, x, y, PxScale::from(args.confidence_scale), font, &format!("{}%", verdict.confidence));
    }

    fn rendering_summary(&self, img: &mut RgbImage, free: usize, total: usize) {
        let args = &self.get_config().rendering;
        let [x1, y1, x2, y2] = args.summary_box;
        if x2 > x1 && y2 > y1 {
            draw_filled_rect_mut(img, Rect::at(x1, y1).of_size((x2 - x1) as u32, (y2 - y1) as u32), SUMMARY_COLOR);
        }
        if let Some(font) = self.get_font() {
            draw_text(img, font, x1 + 5, y1 + 8, args.summary_scale, &format!("Free: {free}/{total}"));
        }
    }
}

fn draw_text(img: &mut RgbImage, font: &FontArc, x: i32, y: i32, scale: f32, text: &str) {
    draw_text_mut(img, TEXT_COLOR, x, y, PxScale::from(scale), font, text);
}

/// 按粗细画区域外框，旋转区域画旋转后的四条边
pub fn draw_region_outline(img: &mut RgbImage, region: &ParkingRegion, color: Rgb<u8>, thickness: u32) {
    if !region.has_area() {
        return;
    }
    let thickness = thickness.max(1) as i32;
    // 以原边框为中心向内外各扩展
    for offset in -((thickness - 1) / 2)..=(thickness / 2) {
        let grown = ParkingRegion::new(
            region.x - offset,
            region.y - offset,
            region.width + 2 * offset,
            region.height + 2 * offset,
            region.angle,
        );
        if !grown.has_area() {
            continue;
        }
        if grown.is_rotated() {
            let outline = grown.outline();
            for i in 0..4 {
                let (a, b) = (outline[i], outline[(i + 1) % 4]);
                draw_line_segment_mut(img, (a.x, a.y), (b.x, b.y), color);
            }
        } else {
            let rect = Rect::at(grown.x, grown.y).of_size(grown.width as u32, grown.height as u32);
            draw_hollow_rect_mut(img, rect, color);
        }
    }
}

/// 标注预览：只画区域框和序号，不做分类
pub fn rendering_regions(img: &mut RgbImage, regions: &[ParkingRegion], font: Option<&FontArc>) {
    for (index, region) in regions.iter().enumerate() {
        draw_region_outline(img, region, MARKED_COLOR, 2);
        if let Some(font) = font {
            let c = region.center();
            draw_text(img, font, c.x as i32 - 5, c.y as i32 - 7, 14.0, &index.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::geom::Point2f;

    fn verdict(is_empty: bool) -> SpotVerdict {
        SpotVerdict {
            index: 0,
            is_empty,
            confidence: if is_empty { 100 } else { 0 },
            pixel_count: 0,
            dynamic_threshold: 900,
            edge_density: 0.0,
            texture: 0.0,
            color_std: 0.0,
        }
    }

    #[test]
    fn empty_spot_gets_thick_green_border() {
        let engine = FrameClassifier::with_config(Config::default());
        let mut img = RgbImage::new(100, 100);
        let region = ParkingRegion::new(20, 20, 40, 30, 0.0);
        engine.rendering_spot(&mut img, &region, &verdict(true));
        // 粗细5，向外扩2像素，向内扩2像素
        assert_eq!(*img.get_pixel(18, 30), EMPTY_COLOR);
        assert_eq!(*img.get_pixel(22, 30), EMPTY_COLOR);
        assert_eq!(*img.get_pixel(23, 30), Rgb([0, 0, 0]));
        assert_eq!(*img.get_pixel(40, 44), Rgb([0, 0, 0]));
    }

    #[test]
    fn occupied_spot_gets_thin_red_border() {
        let engine = FrameClassifier::with_config(Config::default());
        let mut img = RgbImage::new(100, 100);
        let region = ParkingRegion::new(20, 20, 40, 30, 0.0);
        engine.rendering_spot(&mut img, &region, &verdict(false));
        assert_eq!(*img.get_pixel(19, 30), OCCUPIED_COLOR);
        assert_eq!(*img.get_pixel(20, 30), OCCUPIED_COLOR);
        assert_eq!(*img.get_pixel(18, 30), Rgb([0, 0, 0]));
        assert_eq!(*img.get_pixel(21, 30), Rgb([0, 0, 0]));
    }

    #[test]
    fn rotated_outline_passes_through_corners() {
        let mut img = RgbImage::new(200, 200);
        let region = ParkingRegion::new(50, 80, 100, 40, 30.0);
        draw_region_outline(&mut img, &region, OCCUPIED_COLOR, 1);
        let corner: Point2f = region.outline()[0];
        let hit = (-1..=1).any(|dx| {
            (-1..=1).any(|dy| {
                *img.get_pixel((corner.x.round() as i32 + dx) as u32, (corner.y.round() as i32 + dy) as u32) == OCCUPIED_COLOR
            })
        });
        assert!(hit);
        // 中心不被填充
        assert_eq!(*img.get_pixel(100, 100), Rgb([0, 0, 0]));
    }

    #[test]
    fn summary_text_is_drawn_when_font_available() {
        let engine = FrameClassifier::with_config(Config::default());
        if engine.get_font().is_none() {
            // 机器上没有可用字体
            assert!(crate::my_utils::io::find_system_font().is_none());
            return;
        }
        let mut img = RgbImage::new(320, 100);
        engine.rendering_summary(&mut img, 2, 5);
        let [x1, y1, x2, y2] = engine.get_config().rendering.summary_box;
        let text_pixels = (x1..x2)
            .flat_map(|x| (y1..y2).map(move |y| (x as u32, y as u32)))
            .filter(|&(x, y)| *img.get_pixel(x, y) != SUMMARY_COLOR)
            .count();
        assert!(text_pixels > 0);

        let mut img = RgbImage::new(100, 100);
        engine.rendering_spot(&mut img, &ParkingRegion::new(10, 10, 80, 60, 0.0), &verdict(true));
        assert!(img.pixels().any(|p| p[0] > 0 && p[1] > 0 && p[2] > 0));
    }

    #[test]
    fn summary_box_is_filled() {
        let engine = FrameClassifier::with_config(Config::default());
        let mut img = RgbImage::new(320, 100);
        engine.rendering_summary(&mut img, 2, 5);
        assert_eq!(*img.get_pixel(45, 30), SUMMARY_COLOR);
        assert_eq!(*img.get_pixel(299, 74), SUMMARY_COLOR);
        assert_eq!(*img.get_pixel(300, 75), Rgb([0, 0, 0]));
    }
}
