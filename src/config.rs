use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::ParkingError;

/// 配置文件路径的环境变量
pub const CONFIG_ENV: &str = "PARKING_CONFIG";
/// 默认配置文件
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// 图片预处理的两种流水线
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingProfile {
    /// 不做直方图均衡，3x3 模糊，偏置 16，无闭运算
    Basic,
    /// 直方图均衡，5x5 模糊，偏置 12，闭运算
    #[default]
    Enhanced,
}

/// 每种流水线对应的固定参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileParams {
    pub equalize: bool,
    pub blur_sigma: f32,
    pub threshold_bias: i32,
    pub close: bool,
}

impl ProcessingProfile {
    pub fn params(&self) -> ProfileParams {
        match self {
            // 3x3 核对应的高斯 sigma: 0.3*((3-1)*0.5-1)+0.8
            ProcessingProfile::Basic => ProfileParams {
                equalize: false,
                blur_sigma: 0.8,
                threshold_bias: 16,
                close: false,
            },
            ProcessingProfile::Enhanced => ProfileParams {
                equalize: true,
                blur_sigma: 1.5,
                threshold_bias: 12,
                close: true,
            },
        }
    }
}

impl std::str::FromStr for ProcessingProfile {
    type Err = ParkingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "basic" => Ok(ProcessingProfile::Basic),
            "enhanced" => Ok(ProcessingProfile::Enhanced),
            other => Err(ParkingError::InvalidConfig(format!("unknown profile `{other}`"))),
        }
    }
}

/// 图片预处理参数
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ImageProcess {
    pub profile: ProcessingProfile,
    /// 自适应阈值邻域大小，奇数
    pub adaptive_block_size: u32,
    /// 中值滤波核大小，奇数
    pub median_kernel: u32,
    pub dilate_iterations: u32,
}

impl Default for ImageProcess {
    fn default() -> Self {
        ImageProcess {
            profile: ProcessingProfile::Enhanced,
            adaptive_block_size: 25,
            median_kernel: 5,
            dilate_iterations: 1,
        }
    }
}

/// 四个信号的权重，和必须为 1
#[derive(Debug, Deserialize, Serialize, Clone, Copy)]
#[serde(default)]
pub struct SignalWeights {
    pub pixel_count: f32,
    pub edge_density: f32,
    pub texture: f32,
    pub color: f32,
}

impl Default for SignalWeights {
    fn default() -> Self {
        SignalWeights {
            pixel_count: 0.4,
            edge_density: 0.3,
            texture: 0.2,
            color: 0.1,
        }
    }
}

impl SignalWeights {
    /// 转成百分比整数，避免浮点累加误差
    pub fn as_percent(&self) -> [u32; 4] {
        [
            to_percent(self.pixel_count),
            to_percent(self.edge_density),
            to_percent(self.texture),
            to_percent(self.color),
        ]
    }
}

pub fn to_percent(value: f32) -> u32 {
    (value * 100.0).round().max(0.0) as u32
}

/// 车位占用判断参数
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Scoring {
    /// 没有空位参照时的基础阈值
    pub threshold_base: f32,
    /// 空位参照的上浮比例
    pub threshold_margin: f32,
    /// 空位参照的指数平滑系数
    pub reference_smoothing: f32,
    pub motion_history_len: usize,
    pub canny_low: f32,
    pub canny_high: f32,
    pub edge_density_max: f32,
    pub texture_kernel: u32,
    pub texture_max: f32,
    pub color_std_max: f32,
    pub weights: SignalWeights,
    /// 权重和达到该值判为空位
    pub empty_score: f32,
}

impl Default for Scoring {
    fn default() -> Self {
        Scoring {
            threshold_base: 900.0,
            threshold_margin: 0.15,
            reference_smoothing: 0.1,
            motion_history_len: 30,
            canny_low: 50.0,
            canny_high: 150.0,
            edge_density_max: 0.15,
            texture_kernel: 5,
            texture_max: 150.0,
            color_std_max: 30.0,
            weights: SignalWeights::default(),
            empty_score: 0.5,
        }
    }
}

/// 车位区域默认参数
#[derive(Debug, Deserialize, Serialize, Clone, Copy)]
#[serde(default)]
pub struct RegionDefaults {
    /// 旧格式只有坐标点时使用的宽高
    pub width: i32,
    pub height: i32,
    /// 拖拽画框的最小边长
    pub min_drag_size: i32,
}

impl Default for RegionDefaults {
    fn default() -> Self {
        RegionDefaults {
            width: 107,
            height: 48,
            min_drag_size: 10,
        }
    }
}

/// 渲染参数
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Rendering {
    /// ttf 字体路径，为空时不绘制文字
    pub font_path: Option<String>,
    pub empty_thickness: u32,
    pub occupied_thickness: u32,
    pub confidence_scale: f32,
    /// 汇总框左上角和右下角
    pub summary_box: [i32; 4],
    pub summary_scale: f32,
}

impl Default for Rendering {
    fn default() -> Self {
        Rendering {
            font_path: None,
            empty_thickness: 5,
            occupied_thickness: 2,
            confidence_scale: 14.0,
            summary_box: [45, 30, 300, 75],
            summary_scale: 30.0,
        }
    }
}

/// 配置参数
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub image_process: ImageProcess,
    pub scoring: Scoring,
    pub regions: RegionDefaults,
    pub rendering: Rendering,
}

impl Config {
    pub fn from_yaml_file(path: &Path) -> Result<Config, ParkingError> {
        let file = File::open(path)
            .map_err(|e| ParkingError::InvalidConfig(format!("{}: {e}", path.display())))?;
        let reader = BufReader::new(file);
        let config: Config = serde_yaml::from_reader(reader)
            .map_err(|e| ParkingError::InvalidConfig(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ParkingError> {
        let invalid = |msg: &str| Err(ParkingError::InvalidConfig(msg.to_string()));

        let weight_sum: u32 = self.scoring.weights.as_percent().iter().sum();
        if weight_sum != 100 {
            return invalid("signal weights must sum to 1.0");
        }
        if self.regions.width <= 0 || self.regions.height <= 0 {
            return invalid("default region size must be positive");
        }
        if self.image_process.adaptive_block_size < 3 || self.image_process.adaptive_block_size % 2 == 0 {
            return invalid("adaptive_block_size must be odd and >= 3");
        }
        if self.image_process.median_kernel % 2 == 0 {
            return invalid("median_kernel must be odd");
        }
        if self.scoring.canny_low > self.scoring.canny_high {
            return invalid("canny_low must not exceed canny_high");
        }
        if self.scoring.motion_history_len == 0 {
            return invalid("motion_history_len must be at least 1");
        }
        if !(self.scoring.reference_smoothing > 0.0 && self.scoring.reference_smoothing <= 1.0) {
            return invalid("reference_smoothing must be in (0, 1]");
        }
        if self.scoring.texture_kernel == 0 {
            return invalid("texture_kernel must be positive");
        }
        Ok(())
    }
}

// 全局配置单例，读取失败时退回默认参数
pub static CONFIG: Lazy<Config> = Lazy::new(|| {
    let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let path = Path::new(&path);
    if !path.exists() {
        return Config::default();
    }
    match Config::from_yaml_file(path) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("{e}, falling back to default config");
            Config::default()
        }
    }
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
        assert_eq!(Config::default().scoring.weights.as_percent(), [40, 30, 20, 10]);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = "image_process:\n  profile: basic\nscoring:\n  threshold_base: 1000\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.image_process.profile, ProcessingProfile::Basic);
        assert_eq!(config.scoring.threshold_base, 1000.0);
        assert_eq!(config.scoring.motion_history_len, 30);
        assert_eq!(config.regions.width, 107);
    }

    #[test]
    fn weights_must_sum_to_one() {
        let mut config = Config::default();
        config.scoring.weights.color = 0.3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn profile_parses_from_str() {
        assert_eq!("Basic".parse::<ProcessingProfile>().unwrap(), ProcessingProfile::Basic);
        assert!("fancy".parse::<ProcessingProfile>().is_err());
        assert!(ProcessingProfile::Enhanced.params().equalize);
        assert!(!ProcessingProfile::Basic.params().close);
    }
}
