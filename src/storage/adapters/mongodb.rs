use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Bson, Document},
    options::{ClientOptions, ServerApi, ServerApiVersion, UpdateOptions},
    Client, Collection, Database,
};
use tracing::info;

use crate::storage::{StateStore, StoreError, StoreResult};

/// MongoDB-backed state store.
///
/// Each deployment is a collection; each persisted key is a document whose
/// `_id` is the key, holding string fields.
#[derive(Clone)]
pub struct MongoStateStore {
    pub client: Client,
    pub database: Database,
}

impl MongoStateStore {
    pub async fn connect(mongodb_uri: &str, database_name: &str) -> StoreResult<Self> {
        info!("🔄 Connecting to MongoDB...");

        let mut client_options = ClientOptions::parse(mongodb_uri)
            .await
            .map_err(|e| StoreError::ConnectionError(format!("Failed to parse MongoDB URI: {}", e)))?;

        let server_api = ServerApi::builder().version(ServerApiVersion::V1).build();
        client_options.server_api = Some(server_api);

        let client = Client::with_options(client_options).map_err(|e| {
            StoreError::ConnectionError(format!("Failed to create MongoDB client: {}", e))
        })?;

        client
            .database("admin")
            .run_command(doc! {"ping": 1}, None)
            .await
            .map_err(|e| StoreError::BackendUnavailable(format!("Failed to ping MongoDB: {}", e)))?;

        info!("✅ Successfully connected to MongoDB!");

        let database = client.database(database_name);

        Ok(Self { client, database })
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection::<Document>(name)
    }
}

fn query_error(collection: &str, document: &str, err: mongodb::error::Error) -> StoreError {
    StoreError::QueryError {
        collection: collection.to_string(),
        document: document.to_string(),
        message: err.to_string(),
    }
}

#[async_trait]
impl StateStore for MongoStateStore {
    async fn get_field(
        &self,
        collection: &str,
        document: &str,
        field: &str,
    ) -> StoreResult<Option<String>> {
        let found = self
            .collection(collection)
            .find_one(doc! {"_id": document}, None)
            .await
            .map_err(|e| query_error(collection, document, e))?;

        Ok(found.and_then(|doc| match doc.get(field) {
            Some(Bson::String(s)) => Some(s.clone()),
            Some(Bson::Int32(n)) => Some(n.to_string()),
            Some(Bson::Int64(n)) => Some(n.to_string()),
            Some(Bson::Double(n)) => Some(n.to_string()),
            _ => None,
        }))
    }

    async fn put_field(
        &self,
        collection: &str,
        document: &str,
        field: &str,
        value: &str,
    ) -> StoreResult<()> {
        let mut fields = Document::new();
        fields.insert(field, value);

        let options = UpdateOptions::builder().upsert(true).build();
        self.collection(collection)
            .update_one(doc! {"_id": document}, doc! {"$set": fields}, options)
            .await
            .map_err(|e| query_error(collection, document, e))?;

        Ok(())
    }

    async fn list_documents(&self, collection: &str) -> StoreResult<Vec<String>> {
        let cursor = self
            .collection(collection)
            .find(None, None)
            .await
            .map_err(|e| query_error(collection, "*", e))?;

        let documents: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(|e| query_error(collection, "*", e))?;

        Ok(documents
            .iter()
            .filter_map(|d| d.get_str("_id").ok().map(str::to_string))
            .collect())
    }

    fn backend_name(&self) -> &'static str {
        "mongodb"
    }
}
