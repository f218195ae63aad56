//! AES-CTR encryption and decryption of whole payloads.
//!
//! **Algorithm:** AES in counter mode with a 128-bit big-endian counter whose
//! initial value is the 16-byte IV. The key size (AES-128/192/256) follows the
//! length of the data key. This is the scheme every producer and consumer of
//! the pipeline's `.enc` files and `dbObject` fields uses, so it must not change.
//!
//! **No authentication.** A ciphertext decrypted with the wrong IV, or a
//! truncated ciphertext, yields garbage rather than an error. Callers are
//! responsible for keeping each ciphertext paired with its IV.

use aes::{Aes128, Aes192, Aes256};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ctr::cipher::{KeyIvInit, StreamCipher};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

/// Byte length of an initialisation vector (one AES block).
pub const IV_LEN: usize = 16;

/// Data key lengths accepted by [`encrypt`] and [`decrypt`].
pub const KEY_LENS: [usize; 3] = [16, 24, 32];

type Aes128Ctr = ctr::Ctr128BE<Aes128>;
type Aes192Ctr = ctr::Ctr128BE<Aes192>;
type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// Errors produced by the cipher layer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    /// The data key is not 16, 24 or 32 bytes long.
    #[error("invalid data key length: {0} bytes (expected 16, 24 or 32)")]
    InvalidKeyLength(usize),
}

/// Output of [`encrypt`]: the freshly generated IV and the ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encrypted {
    /// IV the counter stream was seeded with.
    pub iv: [u8; IV_LEN],
    /// Ciphertext, same length as the plaintext.
    pub ciphertext: Vec<u8>,
}

impl Encrypted {
    /// Standard base64 encoding of the IV, as carried in envelope metadata.
    pub fn iv_base64(&self) -> String {
        STANDARD.encode(self.iv)
    }

    /// Standard base64 encoding of the ciphertext.
    pub fn ciphertext_base64(&self) -> String {
        STANDARD.encode(&self.ciphertext)
    }
}

/// Generate a random IV from the OS CSPRNG.
pub fn generate_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    iv
}

/// Encrypt `plaintext` under `key` with a freshly generated IV.
///
/// # Errors
///
/// Returns [`CipherError::InvalidKeyLength`] if `key` is not 16, 24 or 32 bytes.
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<Encrypted, CipherError> {
    let iv = generate_iv();
    let ciphertext = encrypt_with_iv(key, &iv, plaintext)?;
    Ok(Encrypted { iv, ciphertext })
}

/// Encrypt `plaintext` under `key`, seeding the counter with a caller-chosen IV.
///
/// The same `(key, iv)` pair must never be used for two different plaintexts.
///
/// # Errors
///
/// Returns [`CipherError::InvalidKeyLength`] if `key` is not 16, 24 or 32 bytes.
pub fn encrypt_with_iv(
    key: &[u8],
    iv: &[u8; IV_LEN],
    plaintext: &[u8],
) -> Result<Vec<u8>, CipherError> {
    let mut buf = plaintext.to_vec();
    apply_keystream(key, iv, &mut buf)?;
    Ok(buf)
}

/// Decrypt `ciphertext` that was produced under `key` and `iv`.
///
/// # Errors
///
/// Returns [`CipherError::InvalidKeyLength`] if `key` is not 16, 24 or 32 bytes.
pub fn decrypt(key: &[u8], iv: &[u8; IV_LEN], ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
    let mut buf = ciphertext.to_vec();
    apply_keystream(key, iv, &mut buf)?;
    Ok(buf)
}

/// Check that `key` has one of the [`KEY_LENS`].
pub fn validate_key_len(key: &[u8]) -> Result<(), CipherError> {
    if KEY_LENS.contains(&key.len()) {
        Ok(())
    } else {
        Err(CipherError::InvalidKeyLength(key.len()))
    }
}

fn apply_keystream(key: &[u8], iv: &[u8; IV_LEN], buf: &mut [u8]) -> Result<(), CipherError> {
    match key.len() {
        16 => keystream::<Aes128Ctr>(key, iv, buf),
        24 => keystream::<Aes192Ctr>(key, iv, buf),
        32 => keystream::<Aes256Ctr>(key, iv, buf),
        n => Err(CipherError::InvalidKeyLength(n)),
    }
}

fn keystream<C>(key: &[u8], iv: &[u8; IV_LEN], buf: &mut [u8]) -> Result<(), CipherError>
where
    C: KeyIvInit + StreamCipher,
{
    let mut cipher =
        C::new_from_slices(key, iv).map_err(|_| CipherError::InvalidKeyLength(key.len()))?;
    cipher.apply_keystream(buf);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_key(len: usize) -> Vec<u8> {
        let mut key = vec![0u8; len];
        OsRng.fill_bytes(&mut key);
        key
    }

    #[test]
    fn nist_ctr_aes128_vector() {
        // SP 800-38A, F.5.1 CTR-AES128.Encrypt, blocks 1 and 2.
        let key = hex::decode("2b7e151628aed2a6abf7158809cf4f3c").unwrap();
        let iv: [u8; IV_LEN] = hex::decode("f0f1f2f3f4f5f6f7f8f9fafbfcfdfeff")
            .unwrap()
            .try_into()
            .unwrap();
        let plaintext =
            hex::decode("6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e51")
                .unwrap();
        let expected =
            hex::decode("874d6191b620e3261bef6864990db6ce9806f66b7970fdff8617187bb9fffdff")
                .unwrap();
        assert_eq!(encrypt_with_iv(&key, &iv, &plaintext).unwrap(), expected);
        assert_eq!(decrypt(&key, &iv, &expected).unwrap(), plaintext);
    }

    #[test]
    fn round_trip_under_fixed_iv() {
        for len in KEY_LENS {
            let key = random_key(len);
            let iv = [7u8; IV_LEN];
            let plaintext = br#"{"_id":{"citizenId":"0/1"}}"#;
            let ciphertext = encrypt_with_iv(&key, &iv, plaintext).unwrap();
            assert_eq!(ciphertext.len(), plaintext.len());
            assert_eq!(decrypt(&key, &iv, &ciphertext).unwrap(), plaintext);
        }
    }

    #[test]
    fn encrypt_round_trip() {
        let key = random_key(16);
        let encrypted = encrypt(&key, b"hello world").unwrap();
        let decrypted = decrypt(&key, &encrypted.iv, &encrypted.ciphertext).unwrap();
        assert_eq!(decrypted, b"hello world");
    }

    #[test]
    fn independent_encryptions_use_distinct_ivs() {
        let key = random_key(32);
        let a = encrypt(&key, b"same plaintext").unwrap();
        let b = encrypt(&key, b"same plaintext").unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn wrong_iv_does_not_recover_plaintext() {
        let key = random_key(16);
        let plaintext = b"a plaintext long enough to span two blocks";
        let encrypted = encrypt(&key, plaintext).unwrap();
        let mut other_iv = encrypted.iv;
        other_iv[IV_LEN - 1] ^= 0x01;
        let garbage = decrypt(&key, &other_iv, &encrypted.ciphertext).unwrap();
        assert_ne!(garbage, plaintext);
    }

    #[test]
    fn empty_plaintext_is_allowed() {
        let key = random_key(24);
        let encrypted = encrypt(&key, b"").unwrap();
        assert!(encrypted.ciphertext.is_empty());
    }

    #[test]
    fn invalid_key_length_rejected() {
        assert_eq!(
            encrypt(&[0u8; 15], b"x").unwrap_err(),
            CipherError::InvalidKeyLength(15)
        );
        assert_eq!(
            decrypt(&[0u8; 33], &[0u8; IV_LEN], b"x").unwrap_err(),
            CipherError::InvalidKeyLength(33)
        );
        assert!(validate_key_len(&[0u8; 32]).is_ok());
    }

    #[test]
    fn base64_iv_is_24_characters() {
        let encrypted = encrypt(&random_key(16), b"x").unwrap();
        assert_eq!(encrypted.iv_base64().len(), 24);
    }
}
