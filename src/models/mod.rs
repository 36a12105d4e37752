//! 定义输入输出和公用结构体

pub mod region;
pub mod classification;

/// 定义常用结构体
pub mod geom {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq)]
    pub struct MyPoint {
        pub x: i32, // 标注坐标均使用i32
        pub y: i32,
    }

    impl MyPoint {
        pub fn new(x: i32, y: i32) -> Self {
            MyPoint { x, y }
        }
    }

    /// 浮点坐标，旋转框的角点使用
    #[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq)]
    pub struct Point2f {
        pub x: f32,
        pub y: f32,
    }

    impl Point2f {
        pub fn new(x: f32, y: f32) -> Self {
            Point2f { x, y }
        }
    }

    impl From<MyPoint> for Point2f {
        fn from(p: MyPoint) -> Self {
            Point2f::new(p.x as f32, p.y as f32)
        }
    }
}

/// 定义引擎识别时用到的结构体
pub mod engine_rec {
    use image::{GrayImage, RgbImage};

    /// 单个车位截取出来的各种图片
    #[derive(Clone)]
    pub struct RegionCrops {
        /// 原始rgb截图
        pub rgb: RgbImage,
        /// rgb截图的灰度图，用来算边缘和纹理
        pub gray: GrayImage,
        /// 预处理二值图的截图，用来数前景像素
        pub processed: GrayImage,
    }
}
