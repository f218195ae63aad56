//! [`S3ObjectStore`]: the object store backed by the AWS S3 SDK.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::{config::Credentials, error::DisplayErrorContext, primitives::ByteStream};
use tracing::debug;

use super::{ObjectStore, ObjectStoreError};
use crate::config::Config;

/// S3 client configured for an explicit endpoint with static credentials.
#[derive(Clone, Debug)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    /// Build a client for the endpoint, region and credentials in `cfg`.
    ///
    /// Path-style addressing is forced so that S3 emulators which do not
    /// resolve virtual-host bucket names keep working.
    pub async fn from_config(cfg: &Config) -> Self {
        let credentials = Credentials::new(
            &cfg.aws_access_key_id,
            &cfg.aws_secret_access_key,
            None,
            None,
            "aws-init",
        );

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.s3_region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        let client = aws_sdk_s3::Client::from_conf(
            aws_sdk_s3::config::Builder::from(&sdk_config)
                .endpoint_url(&cfg.s3_endpoint_url)
                .force_path_style(true)
                .build(),
        );

        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        metadata: HashMap<String, String>,
    ) -> Result<(), ObjectStoreError> {
        let size = body.len();
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .set_metadata(Some(metadata))
            .send()
            .await
            .map_err(|e| ObjectStoreError::Put {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
                reason: DisplayErrorContext(&e).to_string(),
            })?;
        debug!(bucket, key, size, "object stored");
        Ok(())
    }
}
