//! Object store the fixture files are written to.
//!
//! Only `put` is needed: objects are opaque blobs keyed by a hierarchical
//! name, with envelope metadata attached as key/value pairs.

#[cfg(test)]
pub mod memory;
pub mod s3;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

pub use s3::S3ObjectStore;

/// Errors writing to the object store.
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    /// The store rejected or failed the upload.
    #[error("failed to put {bucket}/{key}: {reason}")]
    Put {
        bucket: String,
        key: String,
        reason: String,
    },
}

/// Blob storage keyed by bucket and object key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `body` at `bucket/key` with user metadata `metadata`.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        metadata: HashMap<String, String>,
    ) -> Result<(), ObjectStoreError>;
}
