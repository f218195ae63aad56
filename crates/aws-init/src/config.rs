//! Configuration loading and validation for the fixture generator.
//!
//! All values are read from environment variables at startup. Defaults target
//! the docker-compose integration environment (localstack on `aws:4566`, the
//! data key service on `dks-standalone-https:8443`).

use anyhow::{Context, Result};
use serde::Deserialize;

/// Largest file number that still fits the six-digit object name suffix.
pub const MAX_FILE_COUNT: u32 = 1_000_000;

/// Validated fixture generator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Endpoint of the S3-compatible object store.
    #[serde(default = "default_s3_endpoint_url")]
    pub s3_endpoint_url: String,

    /// Bucket receiving the fixture files.
    #[serde(default = "default_s3_bucket")]
    pub s3_bucket: String,

    /// Region reported to the object store.
    #[serde(default = "default_s3_region")]
    pub s3_region: String,

    /// Static access key for the object store.
    #[serde(default = "default_access_key_id")]
    pub aws_access_key_id: String,

    /// Static secret key for the object store.
    #[serde(default = "default_secret_access_key")]
    pub aws_secret_access_key: String,

    /// Key prefix under which fixture files are written.
    #[serde(default = "default_output_prefix")]
    pub output_prefix: String,

    /// Number of files to generate.
    #[serde(default = "default_file_count")]
    pub file_count: u32,

    /// Number of JSON records per file.
    #[serde(default = "default_records_per_file")]
    pub records_per_file: u32,

    /// Base URL of the data key service.
    #[serde(default = "default_data_key_service_url")]
    pub data_key_service_url: String,

    /// PEM client certificate presented to the data key service.
    pub tls_cert_path: Option<String>,

    /// PEM private key matching `tls_cert_path`.
    pub tls_key_path: Option<String>,

    /// PEM CA certificate used to verify the data key service.
    pub tls_ca_cert_path: Option<String>,

    /// When set, data keys come from this KMS key instead of the data key service.
    pub kms_key_id: Option<String>,

    /// Optional KMS endpoint override (e.g. localstack).
    pub kms_endpoint_url: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_s3_endpoint_url() -> String {
    "http://aws:4566".into()
}
fn default_s3_bucket() -> String {
    "demobucket".into()
}
fn default_s3_region() -> String {
    "eu-west-2".into()
}
fn default_access_key_id() -> String {
    "accessKeyId".into()
}
fn default_secret_access_key() -> String {
    "secretAccessKey".into()
}
fn default_output_prefix() -> String {
    "test/output/".into()
}
fn default_file_count() -> u32 {
    100
}
fn default_records_per_file() -> u32 {
    1000
}
fn default_data_key_service_url() -> String {
    "https://dks-standalone-https:8443".into()
}
fn default_log_level() -> String {
    "info".into()
}

/// Client TLS material for the data key service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutualTlsPaths {
    pub cert: String,
    pub key: String,
    pub ca: String,
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable cannot be parsed or fails validation.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// The KMS key to use, ignoring an empty value.
    pub fn kms_key_id(&self) -> Option<&str> {
        non_empty(&self.kms_key_id)
    }

    /// Client TLS paths, when all three are configured.
    pub fn mutual_tls(&self) -> Option<MutualTlsPaths> {
        Some(MutualTlsPaths {
            cert: non_empty(&self.tls_cert_path)?.to_owned(),
            key: non_empty(&self.tls_key_path)?.to_owned(),
            ca: non_empty(&self.tls_ca_cert_path)?.to_owned(),
        })
    }

    fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.s3_endpoint_url, "S3_ENDPOINT_URL")?;
        ensure_non_empty(&self.s3_bucket, "S3_BUCKET")?;
        ensure_non_empty(&self.s3_region, "S3_REGION")?;
        if self.kms_key_id().is_none() {
            ensure_non_empty(&self.data_key_service_url, "DATA_KEY_SERVICE_URL")?;
        }

        let tls = [&self.tls_cert_path, &self.tls_key_path, &self.tls_ca_cert_path];
        let configured = tls.iter().filter(|p| non_empty(p).is_some()).count();
        if configured != 0 && configured != tls.len() {
            anyhow::bail!(
                "TLS_CERT_PATH, TLS_KEY_PATH and TLS_CA_CERT_PATH must be set together"
            );
        }

        if self.file_count > MAX_FILE_COUNT {
            anyhow::bail!("FILE_COUNT must be at most {MAX_FILE_COUNT}");
        }
        if self.records_per_file == 0 {
            anyhow::bail!("RECORDS_PER_FILE must be > 0");
        }
        Ok(())
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}
