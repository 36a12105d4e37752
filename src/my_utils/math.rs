use crate::models::geom::Point2f;

/// 像素值的总体标准差，直接在u8上累加
pub fn standard_deviation_u8(data: &[u8]) -> f32 {
    if data.is_empty() {
        return 0.0;
    }
    let n = data.len() as f64;
    let (sum, sum_sq) = data.iter().fold((0f64, 0f64), |(s, sq), &v| {
        let v = v as f64;
        (s + v, sq + v * v)
    });
    let mean = sum / n;
    let variance = (sum_sq / n - mean * mean).max(0.0);
    variance.sqrt() as f32
}

/// 欧氏距离
pub fn euclidean_distance(point1: (f32, f32), point2: (f32, f32)) -> f32 {
    let dx = point2.0 - point1.0;
    let dy = point2.1 - point1.1;

    (dx.powi(2) + dy.powi(2)).sqrt()
}

/// 根据给定的中心点center按角度angle_rad旋转（图像坐标系，y向下时为顺时针）
pub fn rotate_point(point: Point2f, center: Point2f, angle_rad: f32) -> Point2f {
    let (sin_theta, cos_theta) = angle_rad.sin_cos();
    let x_diff = point.x - center.x;
    let y_diff = point.y - center.y;
    Point2f::new(
        center.x + x_diff * cos_theta - y_diff * sin_theta,
        center.y + x_diff * sin_theta + y_diff * cos_theta,
    )
}

/// 角度归一化到 [0, 360)
pub fn normalize_degrees(angle: f32) -> f32 {
    let a = angle.rem_euclid(360.0);
    if a >= 360.0 { 0.0 } else { a }
}

/// 多边形有向面积，鞋带公式
pub fn polygon_area(points: &[Point2f]) -> f32 {
    let n = points.len();
    let mut area = 0f32;
    for i in 0..n {
        let p = points[i];
        let q = points[(i + 1) % n];
        area += p.x * q.y - q.x * p.y;
    }
    area / 2.0
}

fn cross(o: Point2f, a: Point2f, b: Point2f) -> f32 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// 两条线段是否相交（含端点接触）
pub fn segments_intersect(p1: Point2f, p2: Point2f, q1: Point2f, q2: Point2f) -> bool {
    let d1 = cross(q1, q2, p1);
    let d2 = cross(q1, q2, p2);
    let d3 = cross(p1, p2, q1);
    let d4 = cross(p1, p2, q2);
    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }
    let on_segment = |a: Point2f, b: Point2f, p: Point2f| {
        p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
    };
    (d1 == 0.0 && on_segment(q1, q2, p1))
        || (d2 == 0.0 && on_segment(q1, q2, p2))
        || (d3 == 0.0 && on_segment(p1, p2, q1))
        || (d4 == 0.0 && on_segment(p1, p2, q2))
}

/// 四边形是否为简单多边形：对边不相交且面积不为零
pub fn is_simple_quad(points: &[Point2f; 4]) -> bool {
    if polygon_area(points).abs() < f32::EPSILON {
        return false;
    }
    !segments_intersect(points[0], points[1], points[2], points[3])
        && !segments_intersect(points[1], points[2], points[3], points[0])
}

/// 凸包，单调链算法，返回逆时针顺序
pub fn convex_hull(points: &[Point2f]) -> Vec<Point2f> {
    let mut pts = points.to_vec();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }
    let mut lower: Vec<Point2f> = Vec::new();
    for &p in pts.iter() {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }
    let mut upper: Vec<Point2f> = Vec::new();
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// 最小外接旋转矩形
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinAreaRect {
    pub center: Point2f,
    /// 沿 angle 方向的边长
    pub width: f32,
    pub height: f32,
    /// 宽边方向，角度制，[0, 180)
    pub angle: f32,
}

/// 以凸包每条边的方向为候选，求面积最小的外接矩形
pub fn min_area_rect(points: &[Point2f]) -> Option<MinAreaRect> {
    let hull = convex_hull(points);
    if hull.len() < 3 {
        return None;
    }
    let mut best: Option<(f32, MinAreaRect)> = None;
    for i in 0..hull.len() {
        let a = hull[i];
        let b = hull[(i + 1) % hull.len()];
        let len = euclidean_distance((a.x, a.y), (b.x, b.y));
        if len <= f32::EPSILON {
            continue;
        }
        let (ux, uy) = ((b.x - a.x) / len, (b.y - a.y) / len);
        let (mut min_u, mut max_u, mut min_v, mut max_v) = (f32::MAX, f32::MIN, f32::MAX, f32::MIN);
        for p in hull.iter() {
            let u = p.x * ux + p.y * uy;
            let v = -p.x * uy + p.y * ux;
            min_u = min_u.min(u);
            max_u = max_u.max(u);
            min_v = min_v.min(v);
            max_v = max_v.max(v);
        }
        let area = (max_u - min_u) * (max_v - min_v);
        let mut angle = uy.atan2(ux).to_degrees().rem_euclid(180.0);
        if angle >= 180.0 - 1e-3 {
            angle = 0.0;
        }
        let mid_u = (min_u + max_u) / 2.0;
        let mid_v = (min_v + max_v) / 2.0;
        // u/v 坐标转回图像坐标
        let center = Point2f::new(mid_u * ux - mid_v * uy, mid_u * uy + mid_v * ux);
        let rect = MinAreaRect {
            center,
            width: max_u - min_u,
            height: max_v - min_v,
            angle,
        };
        let tolerance = 1e-3 * area.max(1.0);
        let better = match &best {
            None => true,
            Some((best_area, best_rect)) => {
                area < best_area - tolerance
                    || ((area - best_area).abs() <= tolerance && angle < best_rect.angle)
            }
        };
        if better {
            best = Some((area, rect));
        }
    }
    best.map(|(_, rect)| rect)
}

/// OpenCV 默认的 BORDER_REFLECT_101 下标映射
fn reflect_101(index: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let last = len as isize - 1;
    let mut i = index;
    while i < 0 || i > last {
        if i < 0 {
            i = -i;
        }
        if i > last {
            i = 2 * last - i;
        }
    }
    i as usize
}

/// 盒式均值滤波，核大小为 2*radius+1，边界反射
pub fn box_mean(values: &[f32], width: usize, height: usize, radius: usize) -> Vec<f32> {
    if values.is_empty() || width == 0 || height == 0 {
        return Vec::new();
    }
    let r = radius as isize;
    let norm = (2 * radius + 1) as f32;
    let mut horizontal = vec![0f32; values.len()];
    for y in 0..height {
        let row = &values[y * width..(y + 1) * width];
        for x in 0..width {
            let sum: f32 = (-r..=r)
                .map(|dx| row[reflect_101(x as isize + dx, width)])
                .sum();
            horizontal[y * width + x] = sum / norm;
        }
    }
    let mut out = vec![0f32; values.len()];
    for y in 0..height {
        for x in 0..width {
            let sum: f32 = (-r..=r)
                .map(|dy| horizontal[reflect_101(y as isize + dy, height) * width + x])
                .sum();
            out[y * width + x] = sum / norm;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quad(points: [(f32, f32); 4]) -> [Point2f; 4] {
        points.map(|(x, y)| Point2f::new(x, y))
    }

    #[test]
    fn std_of_constant_is_zero() {
        assert_eq!(standard_deviation_u8(&[7; 20]), 0.0);
        assert_relative_eq!(standard_deviation_u8(&[0, 255]), 127.5, epsilon = 1e-3);
        assert_eq!(standard_deviation_u8(&[]), 0.0);
    }

    #[test]
    fn reflect_index_mirrors_without_edge() {
        assert_eq!(reflect_101(-1, 5), 1);
        assert_eq!(reflect_101(-2, 5), 2);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(6, 5), 2);
        assert_eq!(reflect_101(-3, 2), 1);
        assert_eq!(reflect_101(4, 1), 0);
    }

    #[test]
    fn box_mean_of_constant_is_constant() {
        let values = vec![4.0f32; 6 * 3];
        let out = box_mean(&values, 6, 3, 2);
        assert!(out.iter().all(|&v| (v - 4.0).abs() < 1e-5));
    }

    #[test]
    fn crossing_quad_is_rejected() {
        let square = quad([(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        let bowtie = quad([(0.0, 0.0), (10.0, 10.0), (10.0, 0.0), (0.0, 10.0)]);
        let flat = quad([(0.0, 0.0), (5.0, 0.0), (10.0, 0.0), (20.0, 0.0)]);
        assert!(is_simple_quad(&square));
        assert!(!is_simple_quad(&bowtie));
        assert!(!is_simple_quad(&flat));
    }

    #[test]
    fn min_area_rect_of_axis_aligned_box() {
        let pts = quad([(10.0, 20.0), (110.0, 20.0), (110.0, 70.0), (10.0, 70.0)]);
        let rect = min_area_rect(&pts).unwrap();
        assert_relative_eq!(rect.angle, 0.0, epsilon = 1e-3);
        assert_relative_eq!(rect.width, 100.0, epsilon = 1e-2);
        assert_relative_eq!(rect.height, 50.0, epsilon = 1e-2);
        assert_relative_eq!(rect.center.x, 60.0, epsilon = 1e-2);
        assert_relative_eq!(rect.center.y, 45.0, epsilon = 1e-2);
    }

    #[test]
    fn min_area_rect_of_rotated_box() {
        let center = Point2f::new(100.0, 100.0);
        let angle = 30f32.to_radians();
        let pts = [(-40.0f32, -15.0f32), (40.0, -15.0), (40.0, 15.0), (-40.0, 15.0)]
            .map(|(dx, dy)| rotate_point(Point2f::new(100.0 + dx, 100.0 + dy), center, angle));
        let rect = min_area_rect(&pts).unwrap();
        assert_relative_eq!(rect.width * rect.height, 80.0 * 30.0, epsilon = 1.0);
        assert_relative_eq!(rect.center.x, 100.0, epsilon = 1e-2);
        assert_relative_eq!(rect.center.y, 100.0, epsilon = 1e-2);
        // 宽边方向为30度或其垂直方向
        let a = rect.angle;
        assert!((a - 30.0).abs() < 0.1 || (a - 120.0).abs() < 0.1, "angle {a}");
    }
}
