use crate::image::ImagePreprocessor;
use crate::models::{Model, ModelProvider};
use crate::predict::{Label, Verdict};
use crate::utils::error::PredictError;
use crate::Result;
use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 一次上传的原始图像，只在单个请求内有效
#[derive(Debug, Clone)]
pub struct RawImage {
    pub bytes: Bytes,
    pub content_type: String,
}

impl RawImage {
    pub fn new(bytes: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
        }
    }
}

/// 推理引擎：模型就绪检查 -> 预处理 -> 推理 -> 生成 Verdict
#[derive(Clone)]
pub struct InferenceEngine {
    provider: Arc<ModelProvider>,
    inference_timeout: Duration,
}

impl InferenceEngine {
    pub fn new(provider: Arc<ModelProvider>, inference_timeout: Duration) -> Self {
        Self {
            provider,
            inference_timeout,
        }
    }

    pub fn provider(&self) -> &Arc<ModelProvider> {
        &self.provider
    }

    pub async fn classify(&self, image: RawImage) -> Result<Verdict> {
        let start_time = Instant::now();

        // 先检查模型，未就绪时不做任何预处理
        let model = self.provider.current()?;

        let task = tokio::task::spawn_blocking(move || Self::run(model.as_ref(), &image));

        let label = match tokio::time::timeout(self.inference_timeout, task).await {
            Ok(joined) => joined
                .map_err(|e| PredictError::Inference(format!("Inference task failed: {}", e)))??,
            Err(_) => {
                return Err(PredictError::Inference(format!(
                    "Inference timed out after {:?}",
                    self.inference_timeout
                )))
            }
        };

        let verdict = Verdict::new(label);

        tracing::debug!(
            "Classified image: id={}, result={}, time={:.3}s",
            verdict.id,
            label.as_str(),
            start_time.elapsed().as_secs_f32()
        );

        Ok(verdict)
    }

    /// 同步部分：预处理 + 推理 + 阈值判定
    pub fn run(model: &dyn Model, image: &RawImage) -> Result<Label> {
        let tensor = ImagePreprocessor::preprocess(&image.bytes, &image.content_type)?;

        let probability = model.predict(&tensor).map_err(|e| match e {
            PredictError::Inference(_) => e,
            other => PredictError::Inference(other.to_string()),
        })?;

        if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
            return Err(PredictError::Inference(format!(
                "Model output is not a probability: {}",
                probability
            )));
        }

        tracing::trace!("Model '{}' probability={}", model.name(), probability);
        Ok(Label::from_probability(probability))
    }
}
