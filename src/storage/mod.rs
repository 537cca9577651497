//! 预测记录的持久化。
//!
//! [`PredictionStore`] 是对外部文档存储的最小抽象（按 id 写入、整集合读取），
//! [`ResultPersister`] 在其之上实现“尽力而为”的写入策略。

pub mod firestore;
pub mod memory;
pub mod null;
pub mod persister;

use crate::config::{StoreConfig, StoreKind};
use crate::predict::PredictionRecord;
use crate::utils::error::PredictError;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;
pub use null::NullStore;
pub use persister::ResultPersister;

/// 键值文档存储客户端
#[async_trait]
pub trait PredictionStore: Send + Sync {
    /// 按 id 写入记录，已存在时覆盖
    async fn set(&self, collection: &str, id: &str, record: &PredictionRecord) -> anyhow::Result<()>;

    /// 读取集合中的全部记录，不保证顺序
    async fn get_all(&self, collection: &str) -> anyhow::Result<Vec<(String, PredictionRecord)>>;

    fn backend(&self) -> &'static str;
}

/// 根据配置构建存储客户端。凭据问题在启动阶段直接报错。
pub async fn connect(config: &StoreConfig) -> Result<Arc<dyn PredictionStore>> {
    let store: Arc<dyn PredictionStore> = match config.kind {
        StoreKind::Memory => Arc::new(MemoryStore::new()),
        StoreKind::Disabled => Arc::new(NullStore),
        StoreKind::Firestore => {
            let project = config.firestore_project.clone().ok_or_else(|| {
                PredictError::Config("Firestore store requires a project id".to_string())
            })?;
            let store = FirestoreStore::connect(
                project,
                config.firestore_database.clone(),
                config.firestore_token.clone(),
            )
            .await
            .map_err(|e| PredictError::Config(format!("Failed to connect to Firestore: {:#}", e)))?;
            Arc::new(store)
        }
    };

    tracing::info!("Prediction store: {}", store.backend());
    Ok(store)
}
