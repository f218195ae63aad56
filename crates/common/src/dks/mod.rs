//! Data key service: issue fresh data keys and unwrap encrypted ones.
//!
//! # Lifecycle
//!
//! 1. A batch job calls [`KeyService::issue`] once and receives a [`DataKey`]
//!    holding both the plaintext key and its wrapped form.
//! 2. Every record of the batch is encrypted with the plaintext key; only the
//!    wrapped key and the master key identifier travel with the ciphertext.
//! 3. Readers call [`KeyService::unwrap`] with those two values to recover the
//!    plaintext key.
//!
//! # Implementations
//!
//! - [`HttpKeyService`]: the data key service HTTP API, optionally over mutual TLS.
//! - [`KmsKeyService`]: AWS KMS `GenerateDataKey` / `Decrypt`.
//! - [`StaticKeyService`]: fixed key material for runs without a key service.
//!
//! Plaintext keys are never logged.

pub mod fixed;
pub mod http;
pub mod kms;

pub use fixed::StaticKeyService;
pub use http::{HttpKeyService, RetryPolicy};
pub use kms::KmsKeyService;

use async_trait::async_trait;
use thiserror::Error;

use crate::crypto::{KeyDecodeError, PlaintextKey};
use crate::protocol::DataKeyResponse;

/// Errors produced by key service implementations.
#[derive(Debug, Error)]
pub enum KeyServiceError {
    /// The service refused to unwrap the key (bad ciphertext or unknown master key).
    #[error("data key service could not decrypt key for {key_id}: status {status}")]
    Decryption {
        /// Master key identifier sent with the request.
        key_id: String,
        /// HTTP status returned by the service.
        status: u16,
    },

    /// The service could not be reached or answered with an unexpected status.
    #[error("data key service unavailable: {0}")]
    Unavailable(String),

    /// The service answered, but the key material in the response is unusable.
    #[error("data key service returned an invalid key: {0}")]
    InvalidKey(#[from] KeyDecodeError),

    /// The client could not be constructed (bad TLS material, bad URL).
    #[error("data key service client misconfigured: {0}")]
    Client(String),
}

/// A data key in both its plaintext and wrapped forms.
#[derive(Debug, Clone)]
pub struct DataKey {
    /// Key used to encrypt payloads. Never persisted.
    pub plaintext: PlaintextKey,
    /// Base64 form of the key wrapped by the master key.
    pub ciphertext: String,
    /// Identifier of the master key.
    pub encryption_key_id: String,
}

impl TryFrom<DataKeyResponse> for DataKey {
    type Error = KeyServiceError;

    fn try_from(resp: DataKeyResponse) -> Result<Self, Self::Error> {
        Ok(Self {
            plaintext: PlaintextKey::from_base64(&resp.plaintext_data_key)?,
            ciphertext: resp.ciphertext_data_key,
            encryption_key_id: resp.data_key_encryption_key_id,
        })
    }
}

/// The key-management collaborator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyService: Send + Sync {
    /// Obtain a fresh data key.
    async fn issue(&self) -> Result<DataKey, KeyServiceError>;

    /// Unwrap `ciphertext` (a base64 wrapped data key) using master key
    /// `key_id`, returning the plaintext key text exactly as the service
    /// transmits it.
    async fn unwrap_encoded(&self, key_id: &str, ciphertext: &str) -> Result<String, KeyServiceError>;

    /// Unwrap `ciphertext` and base64-decode the resulting key.
    async fn unwrap(&self, key_id: &str, ciphertext: &str) -> Result<PlaintextKey, KeyServiceError> {
        let text = self.unwrap_encoded(key_id, ciphertext).await?;
        Ok(PlaintextKey::from_base64(&text)?)
    }
}
