//! AES-CTR payload encryption primitives.
//!
//! This module is free of network and storage dependencies. It provides the
//! low-level encrypt/decrypt operations used by the envelope layer.
//!
//! # Envelope layout
//!
//! ```text
//! ciphertext                 raw bytes, or base64 where carried in JSON
//! iv                         base64(16 random bytes)
//! cipherText                 base64(data key wrapped by the master key)
//! dataKeyEncryptionKeyId     master key identifier
//! ```

pub mod cipher;
pub mod key;

pub use cipher::{CipherError, Encrypted, IV_LEN};
pub use key::{KeyDecodeError, KeyEncoding, PlaintextKey};
