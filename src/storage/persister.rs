use crate::predict::{HistoryEntry, PredictionRecord, Verdict};
use crate::storage::PredictionStore;
use crate::utils::error::PredictError;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;

/// 预测结果写入器
///
/// 写入失败只影响可审计性，不影响可用性：`persist_best_effort` 记录日志、
/// 计数后吞掉错误，不重试。
#[derive(Clone)]
pub struct ResultPersister {
    store: Arc<dyn PredictionStore>,
    collection: String,
    write_timeout: Duration,
}

impl ResultPersister {
    pub fn new(store: Arc<dyn PredictionStore>, collection: impl Into<String>, write_timeout: Duration) -> Self {
        Self {
            store,
            collection: collection.into(),
            write_timeout,
        }
    }

    /// 以 verdict id 为键写入（覆盖已有记录）
    pub async fn persist(&self, verdict: &Verdict) -> Result<()> {
        let record = PredictionRecord::from(verdict);

        match tokio::time::timeout(
            self.write_timeout,
            self.store.set(&self.collection, &record.id, &record),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(PredictError::Persistence(format!("{:#}", e))),
            Err(_) => Err(PredictError::Persistence(format!(
                "Write timed out after {:?}",
                self.write_timeout
            ))),
        }
    }

    /// 尽力写入，返回是否成功；错误不会向上传播
    pub async fn persist_best_effort(&self, verdict: &Verdict) -> bool {
        match self.persist(verdict).await {
            Ok(()) => {
                tracing::debug!(
                    "Prediction saved to {} ({}): {}",
                    self.store.backend(),
                    self.collection,
                    verdict.id
                );
                true
            }
            Err(e) => {
                metrics::counter!("prediction_persist_failures_total", "backend" => self.store.backend())
                    .increment(1);
                tracing::warn!(
                    prediction_id = %verdict.id,
                    backend = self.store.backend(),
                    "Failed to save prediction: {}",
                    e
                );
                false
            }
        }
    }

    pub async fn list_all(&self) -> Result<Vec<HistoryEntry>> {
        let records = self
            .store
            .get_all(&self.collection)
            .await
            .map_err(|e| PredictError::Persistence(format!("{:#}", e)))?;

        Ok(records
            .into_iter()
            .map(|(id, history)| HistoryEntry { id, history })
            .collect())
    }
}
