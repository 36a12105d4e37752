/*
    车位区域结构，标注工具生成、存储文件读出后统一转成ParkingRegion
*/

use serde::{Deserialize, Serialize};

use crate::config::RegionDefaults;
use crate::error::ParkingError;
use crate::models::geom::{MyPoint, Point2f};
use crate::my_utils::math::{is_simple_quad, min_area_rect, normalize_degrees, rotate_point};

/// 存储文件里的一条记录，兼容历史上的几种格式
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum RegionRecord {
    /// 旧格式，只有左上角，宽高取默认值
    Point(i32, i32),
    Rect(i32, i32, i32, i32),
    Rotated(i32, i32, i32, i32, f32),
    Quad { corners: [[f32; 2]; 4] },
}

/// 区域来源，加载时确定，分类时不再按字段个数分支
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    PointDefault,
    AxisAligned,
    Rotated,
    Quad,
}

/// 一个车位
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ParkingRegion {
    /// 未旋转时的左上角
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    /// 角度制，[0, 360)，0 表示不旋转
    pub angle: f32,
    /// 四点标注时的原始角点
    pub corners: Option<[Point2f; 4]>,
    pub kind: RegionKind,
}

impl ParkingRegion {
    pub fn new(x: i32, y: i32, width: i32, height: i32, angle: f32) -> Self {
        let angle = normalize_degrees(angle);
        ParkingRegion {
            x,
            y,
            width,
            height,
            angle,
            corners: None,
            kind: if angle == 0.0 { RegionKind::AxisAligned } else { RegionKind::Rotated },
        }
    }

    /// 单击一个点，使用默认宽高
    pub fn from_point(x: i32, y: i32, defaults: &RegionDefaults) -> Self {
        ParkingRegion {
            kind: RegionKind::PointDefault,
            ..ParkingRegion::new(x, y, defaults.width, defaults.height, 0.0)
        }
    }

    /// 拖拽画框，两个端点任意顺序
    pub fn from_drag(start: MyPoint, end: MyPoint, min_size: i32) -> Result<Self, ParkingError> {
        let x = start.x.min(end.x);
        let y = start.y.min(end.y);
        let width = (end.x - start.x).abs();
        let height = (end.y - start.y).abs();
        if width < min_size || height < min_size {
            return Err(ParkingError::InvalidRegion(format!(
                "rectangle {width}x{height} is smaller than {min_size}px"
            )));
        }
        Ok(ParkingRegion::new(x, y, width, height, 0.0))
    }

    /// 四点标注，取最小外接旋转矩形
    pub fn from_corners(corners: [Point2f; 4]) -> Result<Self, ParkingError> {
        if !is_simple_quad(&corners) {
            return Err(ParkingError::InvalidRegion(format!(
                "corners {corners:?} do not form a simple quadrilateral"
            )));
        }
        let rect = min_area_rect(&corners)
            .ok_or_else(|| ParkingRegion::degenerate(&corners))?;
        let width = rect.width.round() as i32;
        let height = rect.height.round() as i32;
        if width <= 0 || height <= 0 {
            return Err(ParkingRegion::degenerate(&corners));
        }
        // 中心按整数除法回推左上角，保证 center() 与标注中心一致
        let x = (rect.center.x - (width / 2) as f32).round() as i32;
        let y = (rect.center.y - (height / 2) as f32).round() as i32;
        Ok(ParkingRegion {
            corners: Some(corners),
            kind: RegionKind::Quad,
            ..ParkingRegion::new(x, y, width, height, rect.angle)
        })
    }

    fn degenerate(corners: &[Point2f; 4]) -> ParkingError {
        ParkingError::InvalidRegion(format!("corners {corners:?} enclose no area"))
    }

    /// 存储记录转成区域
    pub fn from_record(record: &RegionRecord, defaults: &RegionDefaults) -> Result<Self, ParkingError> {
        match *record {
            RegionRecord::Point(x, y) => Ok(ParkingRegion::from_point(x, y, defaults)),
            RegionRecord::Rect(x, y, w, h) => Ok(ParkingRegion::new(x, y, w, h, 0.0)),
            RegionRecord::Rotated(x, y, w, h, angle) => Ok(ParkingRegion::new(x, y, w, h, angle)),
            RegionRecord::Quad { corners } => {
                ParkingRegion::from_corners(corners.map(|[x, y]| Point2f::new(x, y)))
            }
        }
    }

    /// 区域转回存储记录，尽量保持原来的格式
    pub fn to_record(&self) -> RegionRecord {
        match (self.kind, self.corners) {
            (RegionKind::Quad, Some(corners)) => RegionRecord::Quad {
                corners: corners.map(|p| [p.x, p.y]),
            },
            (RegionKind::PointDefault, _) => RegionRecord::Point(self.x, self.y),
            _ if self.angle == 0.0 => RegionRecord::Rect(self.x, self.y, self.width, self.height),
            _ => RegionRecord::Rotated(self.x, self.y, self.width, self.height, self.angle),
        }
    }

    pub fn is_rotated(&self) -> bool {
        self.angle != 0.0
    }

    pub fn has_area(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// 旋转中心，按整数除法取
    pub fn center(&self) -> Point2f {
        Point2f::new((self.x + self.width / 2) as f32, (self.y + self.height / 2) as f32)
    }

    /// 外框四个角点，顺序：左上、右上、右下、左下（旋转前）
    pub fn outline(&self) -> [Point2f; 4] {
        let (x, y, w, h) = (self.x as f32, self.y as f32, self.width as f32, self.height as f32);
        if !self.is_rotated() {
            return [
                Point2f::new(x, y),
                Point2f::new(x + w, y),
                Point2f::new(x + w, y + h),
                Point2f::new(x, y + h),
            ];
        }
        let c = self.center();
        let (hw, hh) = (w / 2.0, h / 2.0);
        let theta = self.angle.to_radians();
        [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)]
            .map(|(dx, dy)| rotate_point(Point2f::new(c.x + dx, c.y + dy), c, theta))
    }

    /// 点是否落在区域内（含边界）
    pub fn contains(&self, point: Point2f) -> bool {
        if !self.is_rotated() {
            let (x, y) = (self.x as f32, self.y as f32);
            return x <= point.x
                && point.x <= x + self.width as f32
                && y <= point.y
                && point.y <= y + self.height as f32;
        }
        let c = self.center();
        let local = rotate_point(point, c, -self.angle.to_radians());
        (local.x - c.x).abs() <= self.width as f32 / 2.0 && (local.y - c.y).abs() <= self.height as f32 / 2.0
    }
}

/// 删除第一个包含该点的区域
pub fn remove_region_at(regions: &mut Vec<ParkingRegion>, point: Point2f) -> Option<ParkingRegion> {
    let index = regions.iter().position(|r| r.contains(point))?;
    Some(regions.remove(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn records_parse_by_length() {
        let json = r#"[[10, 20], [1, 2, 30, 40], [5, 6, 70, 80, 15], [5, 6, 70, 80, 12.5],
            {"corners": [[0, 0], [100, 0], [100, 50], [0, 50]]}]"#;
        let records: Vec<RegionRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records[0], RegionRecord::Point(10, 20));
        assert_eq!(records[1], RegionRecord::Rect(1, 2, 30, 40));
        assert_eq!(records[2], RegionRecord::Rotated(5, 6, 70, 80, 15.0));
        assert_eq!(records[3], RegionRecord::Rotated(5, 6, 70, 80, 12.5));
        assert!(matches!(records[4], RegionRecord::Quad { .. }));
    }

    #[test]
    fn legacy_point_uses_defaults() {
        let defaults = RegionDefaults::default();
        let region = ParkingRegion::from_record(&RegionRecord::Point(3, 4), &defaults).unwrap();
        assert_eq!((region.x, region.y, region.width, region.height), (3, 4, 107, 48));
        assert_eq!(region.angle, 0.0);
        assert_eq!(region.kind, RegionKind::PointDefault);
        assert_eq!(region.to_record(), RegionRecord::Point(3, 4));
    }

    #[test]
    fn angle_is_normalized() {
        let region = ParkingRegion::new(0, 0, 10, 10, -90.0);
        assert_relative_eq!(region.angle, 270.0);
        assert_eq!(ParkingRegion::new(0, 0, 10, 10, 360.0).angle, 0.0);
        assert_eq!(ParkingRegion::new(0, 0, 10, 10, 360.0).kind, RegionKind::AxisAligned);
    }

    #[test]
    fn drag_in_any_direction() {
        let region = ParkingRegion::from_drag(MyPoint::new(120, 80), MyPoint::new(20, 40), 10).unwrap();
        assert_eq!((region.x, region.y, region.width, region.height), (20, 40, 100, 40));
        assert!(ParkingRegion::from_drag(MyPoint::new(0, 0), MyPoint::new(5, 50), 10).is_err());
    }

    #[test]
    fn corners_become_rotated_rect() {
        let c = Point2f::new(200.0, 150.0);
        let theta = 20f32.to_radians();
        let corners = [(-50.0f32, -20.0f32), (50.0, -20.0), (50.0, 20.0), (-50.0, 20.0)]
            .map(|(dx, dy)| rotate_point(Point2f::new(c.x + dx, c.y + dy), c, theta));
        let region = ParkingRegion::from_corners(corners).unwrap();
        assert_eq!(region.kind, RegionKind::Quad);
        assert_relative_eq!(region.angle, 20.0, epsilon = 0.1);
        assert_eq!((region.width, region.height), (100, 40));
        assert_relative_eq!(region.center().x, 200.0, epsilon = 1.0);
        assert_relative_eq!(region.center().y, 150.0, epsilon = 1.0);
        assert!(region.contains(c));
    }

    #[test]
    fn self_intersecting_corners_are_rejected() {
        let corners = [(0.0f32, 0.0f32), (10.0, 10.0), (10.0, 0.0), (0.0, 10.0)].map(|(x, y)| Point2f::new(x, y));
        assert!(ParkingRegion::from_corners(corners).is_err());
    }

    #[test]
    fn rotated_contains_follows_rotation() {
        let region = ParkingRegion::new(0, 90, 200, 20, 90.0);
        // 中心 (100, 100)，旋转90度后竖直，高200宽20
        assert!(region.contains(Point2f::new(100.0, 10.0)));
        assert!(!region.contains(Point2f::new(10.0, 100.0)));
    }

    #[test]
    fn remove_hits_first_containing_region() {
        let mut regions = vec![
            ParkingRegion::new(0, 0, 50, 50, 0.0),
            ParkingRegion::new(100, 0, 50, 50, 0.0),
        ];
        let removed = remove_region_at(&mut regions, Point2f::new(120.0, 10.0)).unwrap();
        assert_eq!(removed.x, 100);
        assert_eq!(regions.len(), 1);
        assert!(remove_region_at(&mut regions, Point2f::new(300.0, 300.0)).is_none());
    }
}
