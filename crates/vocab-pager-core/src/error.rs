//! Typed errors returned by the pagination layer.
//!
//! Store adapters report failures as `anyhow::Error`; the query service
//! wraps them in [`QueryError::StoreUnavailable`] so callers only ever see
//! this taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    /// Unknown collection, or unknown parent id for a sub-view.
    #[error("{0}")]
    NotFound(String),

    /// A request parameter failed validation. `field` names the parameter
    /// (or filter field) that was rejected.
    #[error("invalid {field}: {message}")]
    InvalidArgument { field: String, message: String },

    /// The backing store failed or did not answer in time.
    #[error("store unavailable during {operation} on '{collection}'")]
    StoreUnavailable {
        collection: String,
        operation: &'static str,
        retryable: bool,
        #[source]
        source: anyhow::Error,
    },
}

pub type QueryResult<T> = Result<T, QueryError>;

impl QueryError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        QueryError::InvalidArgument {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn unknown_collection(name: &str) -> Self {
        QueryError::NotFound(format!("collection not found: {}", name))
    }

    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            QueryError::StoreUnavailable {
                retryable: true,
                ..
            }
        )
    }
}
