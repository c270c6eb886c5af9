use thiserror::Error;

/// Errors that can occur during state store operations
#[derive(Debug, Error, Clone)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    ConnectionError(String),

    #[error("Query failed on {collection}/{document}: {message}")]
    QueryError {
        collection: String,
        document: String,
        message: String,
    },

    #[error("Invalid value for field {field}: {value:?}")]
    InvalidValue { field: String, value: String },

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),
}

/// Result type for state store operations
pub type StoreResult<T> = Result<T, StoreError>;
