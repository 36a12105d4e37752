//! parking - 车位占用识别命令行
//!
//! classify 对帧序列逐帧分类并输出标注图，regions 维护车位区域文件，
//! preview 在静态图上预览已标注的区域。

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use parking_vision::config::{Config, ProcessingProfile, CONFIG};
use parking_vision::models::geom::{MyPoint, Point2f};
use parking_vision::models::region::{remove_region_at, ParkingRegion};
use parking_vision::my_utils::io::{open_frame_source, resolve_font, RegionStore};
use parking_vision::recognition::engine::FrameClassifier;
use parking_vision::recognition::render::rendering_regions;
use parking_vision::FrameSummary;

#[derive(Parser, Debug)]
#[command(name = "parking", version, about = "Parking space occupancy classifier")]
struct Args {
    /// yaml配置文件，不指定时读取 PARKING_CONFIG 或 config.yaml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify every frame of an image directory or a still image
    Classify {
        #[arg(long)]
        regions: PathBuf,
        /// 图片目录（按文件名排序）或单张图片
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = "output")]
        output: PathBuf,
        #[arg(long)]
        profile: Option<ProcessingProfile>,
        /// 最多处理的帧数
        #[arg(long)]
        frames: Option<usize>,
        /// 序列播放完后从头重播的次数
        #[arg(long, default_value_t = 0)]
        loop_count: usize,
    },

    /// Edit the stored parking regions
    Regions {
        #[arg(long)]
        regions: PathBuf,
        #[command(subcommand)]
        action: RegionAction,
    },

    /// Draw the stored regions on a still image
    Preview {
        #[arg(long)]
        regions: PathBuf,
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum RegionAction {
    /// Print every region
    List,
    /// Add a default-sized region at its top-left corner
    AddPoint {
        #[arg(long, allow_hyphen_values = true)]
        x: i32,
        #[arg(long, allow_hyphen_values = true)]
        y: i32,
    },
    /// Add an axis-aligned region from two opposite corners
    AddRect {
        #[arg(long, allow_hyphen_values = true)]
        x1: i32,
        #[arg(long, allow_hyphen_values = true)]
        y1: i32,
        #[arg(long, allow_hyphen_values = true)]
        x2: i32,
        #[arg(long, allow_hyphen_values = true)]
        y2: i32,
    },
    /// Add a rotated region, angle in degrees clockwise on screen
    AddRotated {
        #[arg(long, allow_hyphen_values = true)]
        x: i32,
        #[arg(long, allow_hyphen_values = true)]
        y: i32,
        #[arg(long)]
        width: i32,
        #[arg(long)]
        height: i32,
        #[arg(long, allow_hyphen_values = true)]
        angle: f32,
    },
    /// Add a region from four corners: x1,y1,x2,y2,x3,y3,x4,y4
    AddQuad {
        #[arg(long, value_delimiter = ',', num_args = 8, allow_hyphen_values = true)]
        corners: Vec<f32>,
    },
    /// Remove the first region containing the point
    Remove {
        #[arg(long, allow_hyphen_values = true)]
        x: f32,
        #[arg(long, allow_hyphen_values = true)]
        y: f32,
    },
    /// Remove every region
    Clear,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_yaml_file(path)?,
        None => CONFIG.clone(),
    };

    match args.command {
        Command::Classify { regions, input, output, profile, frames, loop_count } => {
            classify(config, &regions, &input, &output, profile, frames, loop_count)
        }
        Command::Regions { regions, action } => edit_regions(&config, &regions, action),
        Command::Preview { regions, image, output } => preview(&config, &regions, &image, &output),
    }
}

fn classify(
    mut config: Config,
    regions_path: &Path,
    input: &Path,
    output: &Path,
    profile: Option<ProcessingProfile>,
    frames: Option<usize>,
    loop_count: usize,
) -> Result<()> {
    if let Some(profile) = profile {
        config.image_process.profile = profile;
    }
    let regions = RegionStore::new(regions_path).load(&config.regions);
    if regions.is_empty() {
        log::warn!("no parking regions loaded, every frame will report 0/0");
    }
    fs::create_dir_all(output).with_context(|| format!("creating {}", output.display()))?;

    // 单张图片默认只分类一次
    let mut source = open_frame_source(input, Some(frames.unwrap_or(1)))?;
    let mut engine = FrameClassifier::with_config(config);
    log::info!("profile {:?}, {} regions", engine.preprocessor().profile(), regions.len());

    let mut summaries: Vec<FrameSummary> = Vec::new();
    let mut passes = 0;
    loop {
        if frames.is_some_and(|n| summaries.len() >= n) {
            break;
        }
        let Some(frame) = source.next_frame()? else {
            if passes >= loop_count {
                break;
            }
            passes += 1;
            log::info!("end of input, restarting (pass {passes})");
            source.rewind()?;
            continue;
        };

        let index = summaries.len();
        let result = engine.classify_frame(&frame, &regions);
        log::info!("frame {index}: Free: {}/{}", result.free, result.total);
        let frame_path = output.join(format!("frame_{index:05}.jpg"));
        result
            .frame
            .save(&frame_path)
            .with_context(|| format!("writing {}", frame_path.display()))?;
        summaries.push(result.summary(index));
    }

    if summaries.is_empty() {
        bail!("no frames read from {}", input.display());
    }
    let summary_path = output.join("summary.json");
    let writer = BufWriter::new(File::create(&summary_path)?);
    serde_json::to_writer_pretty(writer, &summaries)?;
    log::info!("classified {} frames, summary written to {}", summaries.len(), summary_path.display());
    Ok(())
}

fn edit_regions(config: &Config, path: &Path, action: RegionAction) -> Result<()> {
    let store = RegionStore::new(path);
    let defaults = &config.regions;
    // 新文件从空列表开始
    let mut regions = if path.exists() { store.try_load(defaults)? } else { Vec::new() };

    let region = match action {
        RegionAction::List => {
            for (index, region) in regions.iter().enumerate() {
                println!("{index}: {}", serde_json::to_string(&region.to_record())?);
            }
            return Ok(());
        }
        RegionAction::AddPoint { x, y } => Some(ParkingRegion::from_point(x, y, defaults)),
        RegionAction::AddRect { x1, y1, x2, y2 } => Some(ParkingRegion::from_drag(
            MyPoint::new(x1, y1),
            MyPoint::new(x2, y2),
            defaults.min_drag_size,
        )?),
        RegionAction::AddRotated { x, y, width, height, angle } => {
            Some(ParkingRegion::new(x, y, width, height, angle))
        }
        RegionAction::AddQuad { corners } => {
            let [x1, y1, x2, y2, x3, y3, x4, y4] = corners[..] else {
                bail!("expected 8 corner values, got {}", corners.len());
            };
            Some(ParkingRegion::from_corners([
                Point2f::new(x1, y1),
                Point2f::new(x2, y2),
                Point2f::new(x3, y3),
                Point2f::new(x4, y4),
            ])?)
        }
        RegionAction::Remove { x, y } => {
            match remove_region_at(&mut regions, Point2f::new(x, y)) {
                Some(removed) => log::info!("removed region {:?}", removed.to_record()),
                None => log::warn!("no region contains ({x}, {y})"),
            }
            None
        }
        RegionAction::Clear => {
            regions.clear();
            None
        }
    };
    if let Some(region) = region {
        if !region.has_area() {
            bail!("region {:?} has no area", region.to_record());
        }
        log::info!("added region {}", regions.len());
        regions.push(region);
    }
    store.save(&regions)?;
    Ok(())
}

fn preview(config: &Config, regions_path: &Path, image_path: &Path, output: &Path) -> Result<()> {
    let regions = RegionStore::new(regions_path).load(&config.regions);
    let mut img = image::open(image_path)
        .with_context(|| format!("decoding {}", image_path.display()))?
        .to_rgb8();
    let font = resolve_font(config.rendering.font_path.as_deref());
    rendering_regions(&mut img, &regions, font.as_ref());
    img.save(output).with_context(|| format!("writing {}", output.display()))?;
    log::info!("{} regions drawn to {}", regions.len(), output.display());
    Ok(())
}
