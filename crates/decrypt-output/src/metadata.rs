//! Metadata files written next to exported ciphertext.
//!
//! One `key=value` pair per line:
//!
//! ```text
//! iv=KnNWUbhcIIl0XJbGFSMgdw==
//! ciphertext=AQIDAHh...
//! dataKeyEncryptionKeyId=arn:aws:kms:eu-west-2:000000000000:alias/dataworks
//! ```

use std::collections::HashMap;

use common::EnvelopeMetadata;
use thiserror::Error;

pub const IV_KEY: &str = "iv";
pub const CIPHERTEXT_KEY: &str = "ciphertext";
pub const KEY_ID_KEY: &str = "dataKeyEncryptionKeyId";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("metadata file has no {0} entry")]
    Missing(&'static str),
}

/// Parse `key=value` lines. Lines without `=` are ignored; a repeated key
/// keeps its last value.
pub fn parse(text: &str) -> HashMap<String, String> {
    text.lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_owned(), value.trim_end_matches('\r').to_owned()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

/// Drop everything up to and including the first `/`, so an ARN-style
/// `.../alias` becomes `alias`.
pub fn master_key_id(key_id: &str) -> &str {
    key_id.split_once('/').map_or(key_id, |(_, rest)| rest)
}

/// Envelope fields named by a parsed metadata file.
pub fn envelope(entries: &HashMap<String, String>) -> Result<EnvelopeMetadata, MetadataError> {
    let get = |key: &'static str| {
        entries
            .get(key)
            .cloned()
            .ok_or(MetadataError::Missing(key))
    };
    Ok(EnvelopeMetadata {
        iv: get(IV_KEY)?,
        encrypted_data_key: get(CIPHERTEXT_KEY)?,
        data_key_encryption_key_id: master_key_id(&get(KEY_ID_KEY)?).to_owned(),
    })
}
