pub mod classifier;
pub mod provider;
pub mod source;

use crate::image::InputTensor;
use crate::Result;

pub use classifier::OnnxClassifier;
pub use provider::ModelProvider;
pub use source::{ModelArtifact, ModelSource};

/// 已加载的二分类模型：输入张量 -> 患癌概率
///
/// 实现必须可以被多个请求并发读取，加载完成后不再修改。
pub trait Model: Send + Sync {
    fn predict(&self, input: &InputTensor) -> Result<f32>;

    fn name(&self) -> &str {
        "model"
    }
}
