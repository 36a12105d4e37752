use image::{GrayImage, RgbImage};
use imageproc::contrast::equalize_histogram;
use imageproc::distance_transform::Norm;
use imageproc::filter::{gaussian_blur_f32, median_filter};
use imageproc::morphology::{close, dilate};

use crate::config::{ImageProcess, ProcessingProfile};
use crate::my_utils::image::{adaptive_threshold_inv, to_gray};

/// 帧预处理：彩色帧转成用来数前景像素的二值图
/// 每次调用互不影响，不保存状态
#[derive(Debug, Clone)]
pub struct Preprocessor {
    args: ImageProcess,
}

impl Preprocessor {
    pub fn new(args: ImageProcess) -> Self {
        Preprocessor { args }
    }

    pub fn with_profile(profile: ProcessingProfile) -> Self {
        Preprocessor::new(ImageProcess { profile, ..ImageProcess::default() })
    }

    pub fn profile(&self) -> ProcessingProfile {
        self.args.profile
    }

    /// 灰度 -> (直方图均衡) -> 高斯模糊 -> 反相自适应阈值 -> 中值滤波 -> (闭运算) -> 膨胀
    pub fn process(&self, frame: &RgbImage) -> GrayImage {
        let params = self.args.profile.params();

        let mut gray = to_gray(frame);
        if params.equalize {
            gray = equalize_histogram(&gray);
        }
        let blurred = gaussian_blur_f32(&gray, params.blur_sigma);
        let binary = adaptive_threshold_inv(&blurred, self.args.adaptive_block_size, params.threshold_bias);

        // 去掉椒盐噪点
        let radius = self.args.median_kernel / 2;
        let mut mor_img = median_filter(&binary, radius, radius);
        if params.close {
            // 3x3 结构元素
            mor_img = close(&mor_img, Norm::LInf, 1);
        }
        for _ in 0..self.args.dilate_iterations {
            mor_img = dilate(&mor_img, Norm::LInf, 1);
        }
        mor_img
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Preprocessor::new(ImageProcess::default())
    }
}
