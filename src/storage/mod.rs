//! Object store adapters.
//!
//! Every backend exposes the same four primitives keyed by `(bucket, key)`:
//! head, get, put and delete. Backends report failures as [`StoreError`] and
//! never decide HTTP semantics; that translation happens in the file service.

pub mod local;
pub mod memory;
pub mod s3;

use crate::models::object::StoredObject;
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use local::LocalObjectStore;
pub use memory::InMemoryObjectStore;
pub use s3::S3ObjectStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found")]
    NotFound,
    #[error("bucket misconfigured: {0}")]
    BucketMisconfigured(String),
    #[error("invalid object key")]
    InvalidKey,
    #[error("storage backend error ({}): {message}", code.as_deref().unwrap_or("unknown"))]
    Upstream {
        code: Option<String>,
        message: String,
    },
}

impl StoreError {
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            code: None,
            message: message.into(),
        }
    }

    /// Short machine-readable code for log fields.
    pub fn code(&self) -> &str {
        match self {
            StoreError::NotFound => "NotFound",
            StoreError::BucketMisconfigured(_) => "BucketMisconfigured",
            StoreError::InvalidKey => "InvalidKey",
            StoreError::Upstream { code, .. } => code.as_deref().unwrap_or("Upstream"),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Upstream {
            code: Some(format!("{:?}", err.kind())),
            message: err.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of a lightweight existence check.
#[derive(Debug)]
pub enum Existence {
    Found,
    NotFound,
    CheckFailed(StoreError),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Backend label used in logs and readiness output.
    fn backend_name(&self) -> &'static str;

    async fn head(&self, bucket: &str, key: &str) -> Existence;

    async fn get(&self, bucket: &str, key: &str) -> StoreResult<StoredObject>;

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content: Bytes,
        content_type: &str,
    ) -> StoreResult<()>;

    async fn delete(&self, bucket: &str, key: &str) -> StoreResult<()>;
}
