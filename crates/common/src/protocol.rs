//! Wire types exchanged with the data key service and carried alongside
//! encrypted payloads.
//!
//! Field names follow the JSON and metadata spellings used across the
//! pipeline (`plaintextDataKey`, `cipherText`, `dataKeyEncryptionKeyId`, ...).

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::IV_LEN;

/// Object metadata key holding the base64 IV.
pub const IV_KEY: &str = "iv";
/// Object metadata key holding the base64 wrapped data key.
pub const CIPHERTEXT_KEY: &str = "cipherText";
/// Object metadata key holding the master key identifier.
pub const KEY_ID_KEY: &str = "dataKeyEncryptionKeyId";

/// Errors decoding envelope metadata.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// A required metadata entry is absent.
    #[error("missing envelope metadata field: {0}")]
    MissingField(&'static str),

    /// The IV is not valid base64 or does not decode to 16 bytes.
    #[error("invalid initialisation vector: {0}")]
    InvalidIv(String),
}

// ---------------------------------------------------------------------------
// Data key service
// ---------------------------------------------------------------------------

/// Response body of `GET /datakey`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataKeyResponse {
    /// Master key that wrapped the data key.
    pub data_key_encryption_key_id: String,
    /// Base64 plaintext data key.
    pub plaintext_data_key: String,
    /// Base64 data key wrapped by the master key.
    pub ciphertext_data_key: String,
}

/// Response body of `POST /datakey/actions/decrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptKeyResponse {
    /// Master key that wrapped the data key, when the service echoes it.
    #[serde(default)]
    pub data_key_encryption_key_id: Option<String>,
    /// Base64 plaintext data key.
    pub plaintext_data_key: String,
}

// ---------------------------------------------------------------------------
// Envelope metadata
// ---------------------------------------------------------------------------

/// Everything besides the ciphertext that a reader needs to decrypt a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeMetadata {
    /// Base64 IV the payload was encrypted with.
    pub iv: String,
    /// Base64 data key wrapped by the master key.
    pub encrypted_data_key: String,
    /// Identifier of the master key.
    pub data_key_encryption_key_id: String,
}

impl EnvelopeMetadata {
    /// Render as user-defined object metadata.
    pub fn to_object_metadata(&self) -> HashMap<String, String> {
        HashMap::from([
            (IV_KEY.to_owned(), self.iv.clone()),
            (CIPHERTEXT_KEY.to_owned(), self.encrypted_data_key.clone()),
            (
                KEY_ID_KEY.to_owned(),
                self.data_key_encryption_key_id.clone(),
            ),
        ])
    }

    /// Read back metadata produced by [`EnvelopeMetadata::to_object_metadata`].
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MissingField`] naming the first absent entry.
    pub fn from_object_metadata(metadata: &HashMap<String, String>) -> Result<Self, ProtocolError> {
        let field = |name: &'static str| {
            metadata
                .get(name)
                .cloned()
                .ok_or(ProtocolError::MissingField(name))
        };
        Ok(Self {
            iv: field(IV_KEY)?,
            encrypted_data_key: field(CIPHERTEXT_KEY)?,
            data_key_encryption_key_id: field(KEY_ID_KEY)?,
        })
    }

    /// Decode the base64 IV.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidIv`] if the IV is malformed.
    pub fn iv_bytes(&self) -> Result<[u8; IV_LEN], ProtocolError> {
        decode_iv(&self.iv)
    }
}

/// Decode a base64 IV into exactly [`IV_LEN`] bytes.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidIv`] for bad base64 or a wrong length.
pub fn decode_iv(encoded: &str) -> Result<[u8; IV_LEN], ProtocolError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| ProtocolError::InvalidIv(e.to_string()))?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| ProtocolError::InvalidIv(format!("expected {IV_LEN} bytes, got {len}")))
}
