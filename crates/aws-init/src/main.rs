//! `aws-init`: fixture generator entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise structured JSON logging.
//! 3. Obtain one data key from the data key service (or KMS).
//! 4. Generate, compress, encrypt and upload every fixture file.

mod config;
mod fixtures;
mod seed;
mod store;

use anyhow::{Context, Result};
use common::dks::{HttpKeyService, KeyService, KmsKeyService};
use tracing::info;

use config::Config;
use seed::SeedPlan;
use store::S3ObjectStore;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        eprintln!("ERROR: aws-init configuration invalid: {e}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    common::telemetry::init(&cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        bucket = %cfg.s3_bucket,
        files = cfg.file_count,
        "aws-init starting"
    );

    // -----------------------------------------------------------------------
    // 3. Data key
    // -----------------------------------------------------------------------
    let keys = key_service(&cfg).await?;
    let data_key = keys.issue().await.context("failed to obtain data key")?;

    // -----------------------------------------------------------------------
    // 4. Fixtures
    // -----------------------------------------------------------------------
    let store = S3ObjectStore::from_config(&cfg).await;
    seed::seed_all(&store, &data_key, &SeedPlan::from(&cfg)).await?;

    Ok(())
}

async fn key_service(cfg: &Config) -> Result<Box<dyn KeyService>> {
    if let Some(kms_key_id) = cfg.kms_key_id() {
        info!(kms_key_id, "using KMS for data keys");
        let svc = KmsKeyService::from_env(kms_key_id, cfg.kms_endpoint_url.as_deref()).await;
        return Ok(Box::new(svc));
    }

    let svc = match cfg.mutual_tls() {
        Some(paths) => {
            let mut identity = tokio::fs::read(&paths.cert)
                .await
                .with_context(|| format!("failed to read client certificate {}", paths.cert))?;
            identity.push(b'\n');
            identity.extend(
                tokio::fs::read(&paths.key)
                    .await
                    .with_context(|| format!("failed to read client key {}", paths.key))?,
            );
            let ca = tokio::fs::read(&paths.ca)
                .await
                .with_context(|| format!("failed to read CA certificate {}", paths.ca))?;
            HttpKeyService::with_mutual_tls(&cfg.data_key_service_url, &identity, &ca)?
        }
        None => HttpKeyService::new(&cfg.data_key_service_url)?,
    };
    info!(url = %cfg.data_key_service_url, "using data key service");
    Ok(Box::new(svc))
}
