//! 库内统一错误类型

/// Errors returned by the parking-space classifier and its collaborators.
#[derive(thiserror::Error, Debug)]
pub enum ParkingError {
    #[error("invalid region: {0}")]
    InvalidRegion(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("region store io: {0}")]
    StoreIo(#[from] std::io::Error),
    #[error("region store decode: {0}")]
    StoreDecode(#[from] serde_json::Error),
    #[error("frame source: {0}")]
    FrameSource(String),
}
