//! [`KmsKeyService`]: data keys generated and unwrapped by AWS KMS.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_kms::{error::DisplayErrorContext, primitives::Blob, types::DataKeySpec};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::info;

use super::{DataKey, KeyService, KeyServiceError};
use crate::crypto::PlaintextKey;

/// Key service backed directly by a KMS master key.
///
/// Issued keys are AES-128, matching the data key service.
#[derive(Debug, Clone)]
pub struct KmsKeyService {
    client: aws_sdk_kms::Client,
    master_key_id: String,
}

impl KmsKeyService {
    /// Use `master_key_id` (key id, ARN or alias) for every generated key.
    pub fn new(client: aws_sdk_kms::Client, master_key_id: impl Into<String>) -> Self {
        Self {
            client,
            master_key_id: master_key_id.into(),
        }
    }

    /// Build a client from the ambient AWS configuration, optionally pointed at
    /// a local endpoint.
    pub async fn from_env(master_key_id: impl Into<String>, endpoint_url: Option<&str>) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        let mut builder = aws_sdk_kms::config::Builder::from(&config);
        if let Some(url) = endpoint_url {
            builder = builder.endpoint_url(url);
        }
        Self::new(aws_sdk_kms::Client::from_conf(builder.build()), master_key_id)
    }
}

#[async_trait]
impl KeyService for KmsKeyService {
    async fn issue(&self) -> Result<DataKey, KeyServiceError> {
        let resp = self
            .client
            .generate_data_key()
            .key_id(&self.master_key_id)
            .key_spec(DataKeySpec::Aes128)
            .send()
            .await
            .map_err(|e| KeyServiceError::Unavailable(DisplayErrorContext(&e).to_string()))?;

        let plaintext = resp
            .plaintext()
            .ok_or_else(|| KeyServiceError::Unavailable("KMS returned no plaintext key".into()))?;
        let ciphertext = resp
            .ciphertext_blob()
            .ok_or_else(|| KeyServiceError::Unavailable("KMS returned no ciphertext blob".into()))?;
        let key_id = resp.key_id().unwrap_or(&self.master_key_id).to_owned();

        info!(key_id = %key_id, "generated data key via KMS");
        Ok(DataKey {
            plaintext: PlaintextKey::from_bytes(plaintext.as_ref())
                .map_err(|e| KeyServiceError::InvalidKey(e.into()))?,
            ciphertext: STANDARD.encode(ciphertext.as_ref()),
            encryption_key_id: key_id,
        })
    }

    async fn unwrap_encoded(&self, key_id: &str, ciphertext: &str) -> Result<String, KeyServiceError> {
        let blob = STANDARD
            .decode(ciphertext.trim())
            .map_err(|e| KeyServiceError::Client(format!("wrapped key is not base64: {e}")))?;

        let resp = self
            .client
            .decrypt()
            .key_id(key_id)
            .ciphertext_blob(Blob::new(blob))
            .send()
            .await
            .map_err(|e| KeyServiceError::Unavailable(DisplayErrorContext(&e).to_string()))?;

        let plaintext = resp
            .plaintext()
            .ok_or_else(|| KeyServiceError::Unavailable("KMS decrypt returned no plaintext".into()))?;
        Ok(STANDARD.encode(plaintext.as_ref()))
    }
}
