//! 车位识别：预处理、打分、引擎和渲染

pub mod engine;
pub mod occupancy;
pub mod preprocess;
pub mod render;
