use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use crate::storage::{StateStore, StoreResult};

type DocumentKey = (String, String);

/// In-process state store, used for dry runs and tests
#[derive(Default)]
pub struct InMemoryStateStore {
    documents: RwLock<HashMap<DocumentKey, BTreeMap<String, String>>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every field of one document
    pub async fn fields(&self, collection: &str, document: &str) -> BTreeMap<String, String> {
        self.documents
            .read()
            .await
            .get(&(collection.to_string(), document.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get_field(
        &self,
        collection: &str,
        document: &str,
        field: &str,
    ) -> StoreResult<Option<String>> {
        let documents = self.documents.read().await;
        Ok(documents
            .get(&(collection.to_string(), document.to_string()))
            .and_then(|fields| fields.get(field).cloned()))
    }

    async fn put_field(
        &self,
        collection: &str,
        document: &str,
        field: &str,
        value: &str,
    ) -> StoreResult<()> {
        self.documents
            .write()
            .await
            .entry((collection.to_string(), document.to_string()))
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn list_documents(&self, collection: &str) -> StoreResult<Vec<String>> {
        let documents = self.documents.read().await;
        let mut ids: Vec<String> = documents
            .keys()
            .filter(|(c, _)| c == collection)
            .map(|(_, id)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
