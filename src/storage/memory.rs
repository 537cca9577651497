use crate::predict::PredictionRecord;
use crate::storage::PredictionStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// 进程内存储，重启后数据丢失
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, HashMap<String, PredictionRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, HashMap::len)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<PredictionRecord> {
        self.collections
            .read()
            .get(collection)
            .and_then(|docs| docs.get(id).cloned())
    }
}

#[async_trait]
impl PredictionStore for MemoryStore {
    async fn set(&self, collection: &str, id: &str, record: &PredictionRecord) -> anyhow::Result<()> {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), record.clone());
        Ok(())
    }

    async fn get_all(&self, collection: &str) -> anyhow::Result<Vec<(String, PredictionRecord)>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, record)| (id.clone(), record.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
