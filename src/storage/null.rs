//! 不做持久化的存储：写入直接丢弃，读取返回空。

use crate::predict::PredictionRecord;
use crate::storage::PredictionStore;
use async_trait::async_trait;

pub struct NullStore;

#[async_trait]
impl PredictionStore for NullStore {
    async fn set(&self, _collection: &str, _id: &str, _record: &PredictionRecord) -> anyhow::Result<()> {
        Ok(())
    }

    async fn get_all(&self, _collection: &str) -> anyhow::Result<Vec<(String, PredictionRecord)>> {
        Ok(Vec::new())
    }

    fn backend(&self) -> &'static str {
        "none"
    }
}
