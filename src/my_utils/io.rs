use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use ab_glyph::FontArc;
use anyhow::{anyhow, Context, Result};
use image::RgbImage;

use crate::config::RegionDefaults;
use crate::error::ParkingError;
use crate::models::region::{ParkingRegion, RegionRecord};

/// 读取ttf字体
pub fn load_font(path: &Path) -> Result<FontArc> {
    let data = fs::read(path).with_context(|| format!("reading font {}", path.display()))?;
    FontArc::try_from_vec(data).map_err(|e| anyhow!("invalid font {}: {e}", path.display()))
}

/// 未配置字体时依次尝试的系统字体
pub const SYSTEM_FONTS: [&str; 6] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// 第一个存在的系统字体
pub fn find_system_font() -> Option<PathBuf> {
    SYSTEM_FONTS.iter().map(PathBuf::from).find(|p| p.is_file())
}

/// 按配置路径加载字体，失败或未配置时退回系统字体，都没有时返回None
pub fn resolve_font(font_path: Option<&str>) -> Option<FontArc> {
    if let Some(path) = font_path {
        match load_font(Path::new(path)) {
            Ok(font) => return Some(font),
            Err(e) => log::warn!("failed to load font {path}: {e:#}"),
        }
    }
    let found = find_system_font().and_then(|path| match load_font(&path) {
        Ok(font) => {
            log::debug!("using system font {}", path.display());
            Some(font)
        }
        Err(e) => {
            log::warn!("{e:#}");
            None
        }
    });
    if found.is_none() {
        log::warn!("no usable font found, confidence and summary labels disabled");
    }
    found
}

/// 车位区域的存储文件
/// 同时维护两份：只有左上角的坐标文件，和保存完整几何信息的 `_full` 文件
#[derive(Debug, Clone)]
pub struct RegionStore {
    path: PathBuf,
}

impl RegionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        RegionStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `regions.json` -> `regions_full.json`
    pub fn full_path(&self) -> PathBuf {
        let stem = self.path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let name = match self.path.extension() {
            Some(ext) => format!("{stem}_full.{}", ext.to_string_lossy()),
            None => format!("{stem}_full"),
        };
        self.path.with_file_name(name)
    }

    /// 加载区域，出错时记录日志并返回空列表
    pub fn load(&self, defaults: &RegionDefaults) -> Vec<ParkingRegion> {
        match self.try_load(defaults) {
            Ok(regions) => {
                log::info!("loaded {} regions from {}", regions.len(), self.path.display());
                regions
            }
            Err(e) => {
                log::error!("failed to load regions from {}: {e}", self.path.display());
                Vec::new()
            }
        }
    }

    /// 优先读完整文件，读不到再读坐标文件
    /// 无法转换的单条记录跳过
    pub fn try_load(&self, defaults: &RegionDefaults) -> Result<Vec<ParkingRegion>, ParkingError> {
        let full_path = self.full_path();
        let records = if full_path.exists() {
            match read_records(&full_path) {
                Ok(records) => records,
                Err(e) => {
                    log::error!("{} is unreadable ({e}), using {}", full_path.display(), self.path.display());
                    read_records(&self.path)?
                }
            }
        } else {
            read_records(&self.path)?
        };

        let regions = records
            .iter()
            .enumerate()
            .filter_map(|(i, record)| match ParkingRegion::from_record(record, defaults) {
                Ok(region) => Some(region),
                Err(e) => {
                    log::warn!("skipping region record {i}: {e}");
                    None
                }
            })
            .collect();
        Ok(regions)
    }

    /// 写坐标文件和完整文件
    pub fn save(&self, regions: &[ParkingRegion]) -> Result<(), ParkingError> {
        let coords: Vec<RegionRecord> = regions.iter().map(|r| RegionRecord::Point(r.x, r.y)).collect();
        let full: Vec<RegionRecord> = regions.iter().map(|r| r.to_record()).collect();
        write_records(&self.path, &coords)?;
        write_records(&self.full_path(), &full)?;
        log::info!("saved {} regions to {}", regions.len(), self.path.display());
        Ok(())
    }
}

fn read_records(path: &Path) -> Result<Vec<RegionRecord>, ParkingError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn write_records(path: &Path, records: &[RegionRecord]) -> Result<(), ParkingError> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(writer, records)?;
    Ok(())
}

/// 帧来源，视频解码不在本库范围内，由目录序列或单张图片代替
pub trait FrameSource {
    /// 下一帧，结束时返回None
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;
    /// 回到第一帧
    fn rewind(&mut self) -> Result<()>;
}

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

/// 目录下按文件名排序的图片序列
#[derive(Debug)]
pub struct ImageSequence {
    files: Vec<PathBuf>,
    cursor: usize,
}

impl ImageSequence {
    pub fn open(dir: &Path) -> Result<Self> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir).with_context(|| format!("reading frame directory {}", dir.display()))? {
            let path = entry?.path();
            let is_image = path
                .extension()
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_string_lossy().to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if path.is_file() && is_image {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(ParkingError::FrameSource(format!("no images in {}", dir.display())).into());
        }
        files.sort();
        Ok(ImageSequence { files, cursor: 0 })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let Some(path) = self.files.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;
        let frame = image::open(path).with_context(|| format!("decoding frame {}", path.display()))?;
        Ok(Some(frame.to_rgb8()))
    }

    fn rewind(&mut self) -> Result<()> {
        self.cursor = 0;
        Ok(())
    }
}

/// 单张图片重复输出，repeat为None时无限重复
#[derive(Debug, Clone)]
pub struct StillImage {
    frame: RgbImage,
    repeat: Option<usize>,
    emitted: usize,
}

impl StillImage {
    pub fn new(frame: RgbImage, repeat: Option<usize>) -> Self {
        StillImage { frame, repeat, emitted: 0 }
    }

    pub fn open(path: &Path, repeat: Option<usize>) -> Result<Self> {
        let frame = image::open(path).with_context(|| format!("decoding image {}", path.display()))?;
        Ok(StillImage::new(frame.to_rgb8(), repeat))
    }
}

impl FrameSource for StillImage {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.repeat.is_some_and(|n| self.emitted >= n) {
            return Ok(None);
        }
        self.emitted += 1;
        Ok(Some(self.frame.clone()))
    }

    fn rewind(&mut self) -> Result<()> {
        self.emitted = 0;
        Ok(())
    }
}

/// 目录按图片序列打开，文件按单张图片打开
pub fn open_frame_source(path: &Path, repeat: Option<usize>) -> Result<Box<dyn FrameSource>> {
    if path.is_dir() {
        Ok(Box::new(ImageSequence::open(path)?))
    } else {
        Ok(Box::new(StillImage::open(path, repeat)?))
    }
}
