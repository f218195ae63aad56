//! [`StaticKeyService`]: fixed key material for runs without a key service.

use async_trait::async_trait;

use super::{DataKey, KeyService, KeyServiceError};
use crate::crypto::PlaintextKey;

/// Plaintext key handed out when no data key service is configured.
pub const FAKE_PLAINTEXT_KEY: &str = "czMQLgW/OrzBZwFV9u4EBA==";
/// Master key identifier reported by [`StaticKeyService`].
pub const FAKE_KEY_ID: &str = "1234567890";
/// Wrapped key reported by [`StaticKeyService`].
pub const FAKE_CIPHERTEXT: &str = "blahblah";

/// Key service that always returns the same key, and unwraps any ciphertext to it.
#[derive(Debug, Clone)]
pub struct StaticKeyService {
    plaintext: String,
    ciphertext: String,
    key_id: String,
}

impl StaticKeyService {
    /// Build a service returning the supplied base64 key.
    pub fn new(
        plaintext: impl Into<String>,
        ciphertext: impl Into<String>,
        key_id: impl Into<String>,
    ) -> Self {
        Self {
            plaintext: plaintext.into(),
            ciphertext: ciphertext.into(),
            key_id: key_id.into(),
        }
    }
}

impl Default for StaticKeyService {
    fn default() -> Self {
        Self::new(FAKE_PLAINTEXT_KEY, FAKE_CIPHERTEXT, FAKE_KEY_ID)
    }
}

#[async_trait]
impl KeyService for StaticKeyService {
    async fn issue(&self) -> Result<DataKey, KeyServiceError> {
        Ok(DataKey {
            plaintext: PlaintextKey::from_base64(&self.plaintext)?,
            ciphertext: self.ciphertext.clone(),
            encryption_key_id: self.key_id.clone(),
        })
    }

    async fn unwrap_encoded(&self, _key_id: &str, _ciphertext: &str) -> Result<String, KeyServiceError> {
        Ok(self.plaintext.clone())
    }
}
