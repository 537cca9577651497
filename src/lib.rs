pub mod config;
pub mod image;
pub mod models;
pub mod predict;
pub mod storage;
pub mod utils;
pub mod web;

// 重新导出主要类型
pub use config::Config;
pub use predict::{InferenceEngine, Label, RawImage, Verdict};
pub use utils::error::{PredictError, UploadRejected};

pub type Result<T> = std::result::Result<T, PredictError>;
