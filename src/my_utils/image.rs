use image::{GrayImage, ImageBuffer, Luma, Pixel, Rgb, RgbImage};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometric_transformations::{warp, warp_into, Interpolation, Projection};

use crate::models::geom::Point2f;
use crate::models::region::ParkingRegion;
use super::math::{box_mean, standard_deviation_u8};

/// 按区域截取图像的能力，灰度图和rgb图都需要
pub trait ExtractRegion: Sized {
    /// 截取车位区域，越界或尺寸非法时返回 0x0 的空图
    fn extract(&self, region: &ParkingRegion) -> Self;
    /// 整图绕center旋转angle_deg度（正角度在画面上逆时针），尺寸不变
    fn rotate_about(&self, center: Point2f, angle_deg: f32) -> Self;
}

/// 旋转截取的布局：外接框尺寸和截取起点
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedLayout {
    pub bound_w: i32,
    pub bound_h: i32,
    pub start_x: i32,
    pub start_y: i32,
}

/// 旋转后矩形的外接框，截取框在外接框内居中
pub fn rotated_layout(region: &ParkingRegion) -> RotatedLayout {
    let theta = region.angle.to_radians();
    let (sin, cos) = (theta.sin().abs(), theta.cos().abs());
    let (w, h) = (region.width as f32, region.height as f32);
    let bound_w = (h * sin + w * cos) as i32;
    let bound_h = (h * cos + w * sin) as i32;
    RotatedLayout {
        bound_w,
        bound_h,
        start_x: (bound_w - region.width).div_euclid(2),
        start_y: (bound_h - region.height).div_euclid(2),
    }
}

/// 源图到目标图的投影：绕center旋转后把center平移到target
pub fn rotation_projection(center: Point2f, angle_deg: f32, target: Point2f) -> Projection {
    // 图像坐标系y向下，取负角度使画面上逆时针
    Projection::translate(target.x, target.y)
        * Projection::rotate(-angle_deg.to_radians())
        * Projection::translate(-center.x, -center.y)
}

/// 把车位中心映射到截取图内对应位置的投影
fn region_projection(region: &ParkingRegion) -> Projection {
    let layout = rotated_layout(region);
    let target = Point2f::new(
        layout.bound_w as f32 / 2.0 - layout.start_x as f32,
        layout.bound_h as f32 / 2.0 - layout.start_y as f32,
    );
    rotation_projection(region.center(), region.angle, target)
}

/// 轴对齐区域是否完整落在图内
fn fits_inside(width: u32, height: u32, region: &ParkingRegion) -> bool {
    region.has_area()
        && region.x >= 0
        && region.y >= 0
        && region.x as i64 + region.width as i64 <= width as i64
        && region.y as i64 + region.height as i64 <= height as i64
}

/// 旋转区域外接框与图像有重叠，且边长不超过图像对角线
fn overlaps_frame(width: u32, height: u32, region: &ParkingRegion) -> bool {
    let diagonal = (width as f32).hypot(height as f32);
    if !region.has_area() || region.width as f32 > diagonal || region.height as f32 > diagonal {
        return false;
    }
    let outline = region.outline();
    let min_x = outline.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
    let max_x = outline.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max);
    let min_y = outline.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
    let max_y = outline.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);
    max_x > 0.0 && max_y > 0.0 && min_x < width as f32 && min_y < height as f32
}

/**
 * 截取图像，越界返回空图
 */
pub fn crop_image<P>(input_image: &ImageBuffer<P, Vec<P::Subpixel>>, region: &ParkingRegion) -> ImageBuffer<P, Vec<P::Subpixel>>
where
    P: Pixel + 'static,
    P::Subpixel: 'static,
{
    if !fits_inside(input_image.width(), input_image.height(), region) {
        return ImageBuffer::new(0, 0);
    }
    image::imageops::crop_imm(
        input_image,
        region.x as u32,
        region.y as u32,
        region.width as u32,
        region.height as u32,
    )
    .to_image()
}

// 定义一个宏来为灰度图和rgb图实现 ExtractRegion trait
macro_rules! impl_extract_region {
    ($($type:ty => $black:expr),*) => {
        $(impl ExtractRegion for $type {
            fn extract(&self, region: &ParkingRegion) -> Self {
                if !region.has_area() {
                    return <$type>::new(0, 0);
                }
                if !region.is_rotated() {
                    return crop_image(self, region);
                }
                // 部分越界时照常采样，超出部分填黑
                if !overlaps_frame(self.width(), self.height(), region) {
                    return <$type>::new(0, 0);
                }
                let mut out = <$type>::from_pixel(region.width as u32, region.height as u32, $black);
                warp_into(self, &region_projection(region), Interpolation::Bilinear, $black, &mut out);
                out
            }

            fn rotate_about(&self, center: Point2f, angle_deg: f32) -> Self {
                warp(self, &rotation_projection(center, angle_deg, center), Interpolation::Bilinear, $black)
            }
        })*
    };
}
impl_extract_region!(GrayImage => Luma([0u8]), RgbImage => Rgb([0u8; 3]));

/// rgb转灰度
pub fn to_gray(img: &RgbImage) -> GrayImage {
    image::imageops::grayscale(img)
}

/// 按 OpenCV 规则由核大小求高斯 sigma
pub fn gaussian_sigma_for_kernel(kernel_size: u32) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// 高斯加权的局部自适应阈值，反相：比邻域均值暗 bias 以上的像素为前景(255)
pub fn adaptive_threshold_inv(img: &GrayImage, block_size: u32, bias: i32) -> GrayImage {
    let local_mean = gaussian_blur_f32(img, gaussian_sigma_for_kernel(block_size));
    let mut out = GrayImage::new(img.width(), img.height());
    for ((src, mean), dst) in img.pixels().zip(local_mean.pixels()).zip(out.pixels_mut()) {
        let foreground = (src[0] as i32) <= (mean[0] as i32) - bias;
        *dst = Luma([if foreground { 255 } else { 0 }]);
    }
    out
}

/// 非零像素个数
pub fn count_non_zero(img: &GrayImage) -> u32 {
    img.pixels().filter(|p| p[0] != 0).count() as u32
}

/// 像素值标准差
pub fn pixel_std(img: &GrayImage) -> f32 {
    standard_deviation_u8(img.as_raw())
}

/// 所有通道值一起求标准差
pub fn color_std(img: &RgbImage) -> f32 {
    standard_deviation_u8(img.as_raw())
}

/// 边缘密度：canny边缘图像素值之和除以面积
pub fn edge_density(gray: &GrayImage, low: f32, high: f32) -> f32 {
    let area = gray.width() as u64 * gray.height() as u64;
    if area == 0 {
        return 0.0;
    }
    let edges = canny(gray, low, high);
    let sum: u64 = edges.pixels().map(|p| p[0] as u64).sum();
    (sum as f64 / area as f64) as f32
}

/// 纹理分数：盒式滤波求局部均值和局部方差，再取方差均值
pub fn texture_score(gray: &GrayImage, kernel_size: u32) -> f32 {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    if w == 0 || h == 0 {
        return 0.0;
    }
    let radius = (kernel_size / 2) as usize;
    let values: Vec<f32> = gray.as_raw().iter().map(|&v| v as f32).collect();
    let local_mean = box_mean(&values, w, h, radius);
    let squared: Vec<f32> = values
        .iter()
        .zip(local_mean.iter())
        .map(|(v, m)| (v - m) * (v - m))
        .collect();
    let local_var = box_mean(&squared, w, h, radius);
    let sum: f64 = local_var.iter().map(|&v| v as f64).sum();
    (sum / local_var.len() as f64) as f32
}
