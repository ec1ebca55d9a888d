//! Object storage gateway.
//!
//! Buckets and objects live behind the [`ObjectStore`] trait. The local
//! filesystem backend is always available; the S3-compatible backend
//! requires the `s3` feature.

mod fs;
#[cfg(feature = "s3")]
mod s3;

pub use fs::FsObjectStore;
#[cfg(feature = "s3")]
pub use s3::S3ObjectStore;

use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("bucket does not exist: {0}")]
    NoSuchBucket(String),
    #[error("object does not exist: {0}")]
    NoSuchKey(String),
    #[error("bucket already exists: {0}")]
    BucketAlreadyExists(String),
    #[error("bucket is not empty: {0}")]
    BucketNotEmpty(String),
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = std::result::Result<T, ObjectStoreError>;

/// The operations the file host needs from an object storage service.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn create_bucket(&self, bucket: &str) -> StorageResult<()>;

    /// Lists the keys of every object in `bucket`.
    async fn list_objects(&self, bucket: &str) -> StorageResult<Vec<String>>;

    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<Bytes>;

    /// Stores `data` under `key`, replacing any existing object.
    async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> StorageResult<()>;

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()>;

    /// Deletes an empty bucket.
    async fn delete_bucket(&self, bucket: &str) -> StorageResult<()>;
}
