use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store unavailable: {0}")]
    Unavailable(String),
    #[error("malformed document {collection}/{id}: {details}")]
    Decode {
        collection: String,
        id: String,
        details: String,
    },
}

/// Document store holding JSON objects under `(collection, id)`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn backend_name(&self) -> &'static str;
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;
    /// All documents of a collection as `(id, document)` pairs, ordered by id.
    async fn list(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError>;
    /// Creates or fully replaces a document.
    async fn put(&self, collection: &str, id: &str, document: Value) -> Result<(), StoreError>;
    /// Returns whether a document was removed.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError>;
}
