pub mod recognition;
pub mod models;
pub mod my_utils;
pub mod config;
pub mod error;

pub use config::{Config, ProcessingProfile, CONFIG};
pub use error::ParkingError;
pub use models::classification::{FrameClassification, FrameSummary, SpotVerdict};
pub use models::region::{ParkingRegion, RegionRecord};
pub use my_utils::io::{FrameSource, RegionStore};
pub use recognition::engine::FrameClassifier;
