use crate::config::OnnxConfig;
use crate::models::{Model, ModelSource, OnnxClassifier};
use crate::utils::error::PredictError;
use crate::Result;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// 模型持有者
///
/// 模型槽位只写一次：加载完成后整体发布，之前的读取一律得到
/// `ModelNotReady`。加载失败不重试，服务保持运行但推理不可用。
pub struct ModelProvider {
    slot: OnceCell<Arc<dyn Model>>,
}

impl ModelProvider {
    pub fn new() -> Self {
        Self {
            slot: OnceCell::new(),
        }
    }

    /// 已经加载好的模型直接发布
    pub fn with_model(model: Arc<dyn Model>) -> Self {
        Self {
            slot: OnceCell::with_value(model),
        }
    }

    /// 获取当前模型，不阻塞
    pub fn current(&self) -> Result<Arc<dyn Model>> {
        self.slot.get().cloned().ok_or(PredictError::ModelNotReady)
    }

    pub fn is_ready(&self) -> bool {
        self.slot.get().is_some()
    }

    /// 发布模型；槽位已有模型时返回错误，原模型保持不变
    pub fn install(&self, model: Arc<dyn Model>) -> Result<()> {
        let name = model.name().to_string();
        self.slot
            .set(model)
            .map_err(|_| PredictError::Internal("Model already loaded".to_string()))?;

        tracing::info!("Model '{}' is ready", name);
        Ok(())
    }

    pub async fn load(&self, source: &ModelSource, config: &OnnxConfig) -> Result<()> {
        if self.is_ready() {
            return Err(PredictError::Internal("Model already loaded".to_string()));
        }

        let artifact = source.resolve().await?;
        let config = config.clone();

        // 构建 session 会做图优化，放到阻塞线程池
        let model = tokio::task::spawn_blocking(move || OnnxClassifier::new(&artifact, &config))
            .await
            .map_err(|e| PredictError::ModelLoad(format!("Model loading task failed: {}", e)))??;

        self.install(Arc::new(model))
    }

    /// 后台加载，不阻塞服务启动。失败只记录日志。
    pub fn spawn_load(self: &Arc<Self>, source: ModelSource, config: OnnxConfig) -> JoinHandle<()> {
        let provider = Arc::clone(self);
        tokio::spawn(async move {
            tracing::info!("Loading model from {}", source);
            match provider.load(&source, &config).await {
                Ok(()) => tracing::info!("Model loaded successfully"),
                Err(e) => tracing::error!(
                    "Failed to load model from {}: {}; inference stays unavailable",
                    source,
                    e
                ),
            }
        })
    }
}

impl Default for ModelProvider {
    fn default() -> Self {
        Self::new()
    }
}
