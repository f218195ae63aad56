//! Envelope encryption: payload ciphertext plus the metadata needed to open it.

use thiserror::Error;

use crate::crypto::{cipher, CipherError, KeyEncoding};
use crate::dks::{DataKey, KeyService, KeyServiceError};
use crate::protocol::{EnvelopeMetadata, ProtocolError};

/// Errors opening an envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The metadata is malformed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The wrapped data key could not be unwrapped.
    #[error(transparent)]
    KeyService(#[from] KeyServiceError),

    /// The unwrapped key cannot drive the cipher.
    #[error(transparent)]
    Cipher(#[from] CipherError),
}

/// A sealed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    /// Metadata to store next to the ciphertext.
    pub metadata: EnvelopeMetadata,
    /// Raw ciphertext bytes.
    pub ciphertext: Vec<u8>,
}

/// Encrypt `plaintext` under `key` with a fresh IV.
///
/// # Errors
///
/// Returns [`CipherError`] only if the data key has an unusable length.
pub fn seal(key: &DataKey, plaintext: &[u8]) -> Result<Sealed, CipherError> {
    let encrypted = cipher::encrypt(key.plaintext.as_bytes(), plaintext)?;
    Ok(Sealed {
        metadata: EnvelopeMetadata {
            iv: encrypted.iv_base64(),
            encrypted_data_key: key.ciphertext.clone(),
            data_key_encryption_key_id: key.encryption_key_id.clone(),
        },
        ciphertext: encrypted.ciphertext,
    })
}

/// Unwrap the data key named by `metadata` and decrypt `ciphertext`.
///
/// # Errors
///
/// Returns an [`EnvelopeError`] if the IV is malformed or the key service
/// refuses the wrapped key. A wrong IV/ciphertext pairing is *not* detected.
pub async fn open(
    keys: &dyn KeyService,
    metadata: &EnvelopeMetadata,
    ciphertext: &[u8],
) -> Result<Vec<u8>, EnvelopeError> {
    let iv = metadata.iv_bytes()?;
    let key = keys
        .unwrap(
            &metadata.data_key_encryption_key_id,
            &metadata.encrypted_data_key,
        )
        .await?;
    Ok(cipher::decrypt(key.as_bytes(), &iv, ciphertext)?)
}

/// As [`open`], but the unwrapped key text is turned into key bytes by
/// `encoding` rather than always being base64-decoded.
///
/// # Errors
///
/// As [`open`]; a key text that is invalid for `encoding` is an
/// [`EnvelopeError::KeyService`].
pub async fn open_with(
    keys: &dyn KeyService,
    metadata: &EnvelopeMetadata,
    ciphertext: &[u8],
    encoding: KeyEncoding,
) -> Result<Vec<u8>, EnvelopeError> {
    let iv = metadata.iv_bytes()?;
    let text = keys
        .unwrap_encoded(
            &metadata.data_key_encryption_key_id,
            &metadata.encrypted_data_key,
        )
        .await?;
    let key = encoding.decode(&text).map_err(KeyServiceError::from)?;
    Ok(cipher::decrypt(key.as_bytes(), &iv, ciphertext)?)
}
