//! Fixture generation: build, compress, encrypt and store each file.

use anyhow::{Context, Result};
use common::{envelope, DataKey};
use tracing::info;

use crate::config::Config;
use crate::fixtures::{file_contents, gzip, object_key};
use crate::store::ObjectStore;

/// What to generate and where to put it.
#[derive(Debug, Clone)]
pub struct SeedPlan {
    pub bucket: String,
    pub prefix: String,
    pub file_count: u32,
    pub records_per_file: u32,
}

impl From<&Config> for SeedPlan {
    fn from(cfg: &Config) -> Self {
        Self {
            bucket: cfg.s3_bucket.clone(),
            prefix: cfg.output_prefix.clone(),
            file_count: cfg.file_count,
            records_per_file: cfg.records_per_file,
        }
    }
}

/// Generate and store fixture file `file_number`, returning its object key.
///
/// # Errors
///
/// Returns an error if compression, encryption or the upload fails.
pub async fn seed_file(
    store: &dyn ObjectStore,
    key: &DataKey,
    plan: &SeedPlan,
    file_number: u32,
) -> Result<String> {
    let contents = file_contents(file_number, plan.records_per_file);
    let compressed = gzip(contents.as_bytes()).context("failed to gzip fixture contents")?;
    let sealed = envelope::seal(key, &compressed).context("failed to encrypt fixture contents")?;

    let object_key = object_key(&plan.prefix, file_number);
    store
        .put(
            &plan.bucket,
            &object_key,
            sealed.ciphertext,
            sealed.metadata.to_object_metadata(),
        )
        .await?;

    info!(bucket = %plan.bucket, key = %object_key, "put fixture file");
    Ok(object_key)
}

/// Generate every file in `plan`, in order.
///
/// All files share the one data key; each gets its own IV.
///
/// # Errors
///
/// Stops at, and returns, the first failure.
pub async fn seed_all(store: &dyn ObjectStore, key: &DataKey, plan: &SeedPlan) -> Result<Vec<String>> {
    let mut keys = Vec::with_capacity(plan.file_count as usize);
    for file_number in 0..plan.file_count {
        keys.push(seed_file(store, key, plan, file_number).await?);
    }
    info!(count = keys.len(), bucket = %plan.bucket, "fixture generation complete");
    Ok(keys)
}
