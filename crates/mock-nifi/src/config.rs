//! Configuration loading and validation for the mock ingest endpoint.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any variable is missing or invalid.

use anyhow::{Context, Result};
use serde::Deserialize;

/// Validated mock ingest endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Port the HTTPS server listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Directory relative to which uploads are stored.
    #[serde(default = "default_data_root")]
    pub data_root: String,

    /// Output directory under `data_root`; also the first segment of the
    /// path echoed back to clients.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// PEM server certificate chain. Plain HTTP is served when unset.
    pub tls_cert_path: Option<String>,

    /// PEM private key for `tls_cert_path`.
    pub tls_key_path: Option<String>,

    /// PEM CA bundle used to verify client certificates. When set, clients
    /// must present a certificate signed by one of these CAs.
    pub tls_ca_cert_path: Option<String>,

    /// Reject uploads whose content type is not `application/x-bzip2`.
    #[serde(default)]
    pub require_bzip2_content_type: bool,

    /// Reject uploads whose filename does not end with `.bz2`.
    #[serde(default)]
    pub require_bz2_suffix: bool,

    /// OTLP endpoint for span export. Spans are not exported when unset.
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_listen_port() -> u16 {
    5000
}
fn default_data_root() -> String {
    ".".into()
}
fn default_output_dir() -> String {
    "output".into()
}
fn default_log_level() -> String {
    "info".into()
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

    /// Certificate and key paths, when TLS is enabled.
    pub fn tls_paths(&self) -> Option<(&str, &str)> {
        Some((non_empty(&self.tls_cert_path)?, non_empty(&self.tls_key_path)?))
    }

    /// Client CA path, when client authentication is enabled.
    pub fn client_ca_path(&self) -> Option<&str> {
        non_empty(&self.tls_ca_cert_path)
    }

    /// OTLP endpoint, ignoring an empty value.
    pub fn otlp_endpoint(&self) -> Option<&str> {
        non_empty(&self.otel_exporter_otlp_endpoint)
    }

    fn validate(&self) -> Result<()> {
        let cert = non_empty(&self.tls_cert_path).is_some();
        let key = non_empty(&self.tls_key_path).is_some();
        if cert != key {
            anyhow::bail!("TLS_CERT_PATH and TLS_KEY_PATH must be set together");
        }
        if self.client_ca_path().is_some() && !cert {
            anyhow::bail!("TLS_CA_CERT_PATH requires TLS_CERT_PATH and TLS_KEY_PATH");
        }

        let output_dir = self.output_dir.trim();
        if output_dir.is_empty() {
            anyhow::bail!("OUTPUT_DIR is required and must not be empty");
        }
        if output_dir.starts_with('/') || output_dir.split('/').any(|s| s == "..") {
            anyhow::bail!("OUTPUT_DIR must be a relative path inside DATA_ROOT");
        }
        Ok(())
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
