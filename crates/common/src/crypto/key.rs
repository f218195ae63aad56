//! [`PlaintextKey`]: in-memory holder for an unwrapped data key.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

use super::cipher::{validate_key_len, CipherError};

/// Errors decoding a transmitted plaintext key.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyDecodeError {
    /// The key text is not valid base64.
    #[error("plaintext data key is not valid base64")]
    InvalidBase64,

    /// The decoded key has an unusable length.
    #[error(transparent)]
    Length(#[from] CipherError),
}

/// How the key text handed out by a key service becomes key bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyEncoding {
    /// The text is the base64 form of the key bytes.
    #[default]
    Base64,
    /// The text itself is the key. Exported pipeline output is encrypted
    /// this way.
    Text,
}

impl KeyEncoding {
    /// Turn transmitted key text into a [`PlaintextKey`].
    ///
    /// # Errors
    ///
    /// Returns [`KeyDecodeError`] if the text is not valid for this encoding.
    pub fn decode(self, transmitted: &str) -> Result<PlaintextKey, KeyDecodeError> {
        match self {
            KeyEncoding::Base64 => PlaintextKey::from_base64(transmitted),
            KeyEncoding::Text => Ok(PlaintextKey::from_text(transmitted)?),
        }
    }
}

/// Plaintext data key bytes.
///
/// The length is validated on construction, so every [`PlaintextKey`] can be
/// handed straight to the cipher. The bytes are overwritten with zeroes on drop
/// and never appear in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct PlaintextKey(Box<[u8]>);

impl PlaintextKey {
    /// Wrap raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidKeyLength`] unless `bytes` is 16, 24 or 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CipherError> {
        validate_key_len(bytes)?;
        Ok(Self(bytes.to_vec().into_boxed_slice()))
    }

    /// Decode the base64 form in which key services transmit plaintext keys.
    ///
    /// # Errors
    ///
    /// Returns [`KeyDecodeError::InvalidBase64`] for malformed text and
    /// [`KeyDecodeError::Length`] if the decoded key has the wrong length.
    pub fn from_base64(encoded: &str) -> Result<Self, KeyDecodeError> {
        let mut bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|_| KeyDecodeError::InvalidBase64)?;
        let key = Self::from_bytes(&bytes);
        bytes.iter_mut().for_each(|b| *b = 0);
        Ok(key?)
    }

    /// Use the UTF-8 bytes of `text` as the key, so a 24-character key text
    /// selects AES-192.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidKeyLength`] unless `text` is 16, 24 or 32 bytes.
    pub fn from_text(text: &str) -> Result<Self, CipherError> {
        Self::from_bytes(text.as_bytes())
    }

    /// Borrow the key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Drop for PlaintextKey {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl std::fmt::Debug for PlaintextKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PlaintextKey([REDACTED])")
    }
}
