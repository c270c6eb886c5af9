use async_trait::async_trait;

use crate::storage::StoreResult;

/// Durable document store holding flat string fields.
///
/// A store instance is bound to one database; documents are addressed by
/// `(collection, document id)`. Collections are named after deployments.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read one string field of a document. `None` when the document or the
    /// field does not exist.
    async fn get_field(
        &self,
        collection: &str,
        document: &str,
        field: &str,
    ) -> StoreResult<Option<String>>;

    /// Write one string field of a document, creating the document if needed.
    /// Other fields of the document are preserved.
    async fn put_field(
        &self,
        collection: &str,
        document: &str,
        field: &str,
        value: &str,
    ) -> StoreResult<()>;

    /// List the document ids of a collection
    async fn list_documents(&self, collection: &str) -> StoreResult<Vec<String>>;

    /// Get the backend name/type
    fn backend_name(&self) -> &'static str;
}
