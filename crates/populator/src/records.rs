//! Test records and the column-store cells built from them.
//!
//! A record file is a JSON array of Kafka-style messages:
//!
//! ```json
//! [{"kafka_message_id": "id-1", "kafka_message_timestamp": 1544799662000,
//!   "kafka_message_value": {"message": {"db": "core", "collection": "claimant",
//!     "dbObject": "...", "encryption": {}}}}]
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::crypto::cipher;
use common::fixture::{self, GuidSource};
use common::{CipherError, DataKey};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// `dbObject` value marking a record that must stay unencrypted.
pub const CORRUPT_MARKER: &str = "CORRUPT";
/// IV written for [`CORRUPT_MARKER`] records.
pub const PHONEY_VECTOR: &str = "PHONEYVECTOR";
/// Column every record is stored under.
pub const RECORD_COLUMN: &str = "cf:record";

/// Errors turning a test record into a cell.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record {id}: {field} is missing or not a string")]
    MissingField { id: String, field: &'static str },

    #[error("record {id}: message is not an object")]
    Malformed { id: String },

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// One entry of the record file.
#[derive(Debug, Clone, Deserialize)]
pub struct TestRecord {
    pub kafka_message_id: String,
    #[serde(deserialize_with = "timestamp")]
    pub kafka_message_timestamp: u64,
    pub kafka_message_value: Value,
}

/// A record ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    pub table: String,
    pub topic: String,
    pub row: String,
    pub timestamp: u64,
    /// Serialised message value.
    pub value: Vec<u8>,
}

/// What to do with a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Store(Prepared),
    /// The message has no `dbObject`. Its table is still created.
    Skip { row: String, table: String },
}

impl Outcome {
    /// Table the record belongs to.
    pub fn table(&self) -> &str {
        match self {
            Outcome::Store(prepared) => &prepared.table,
            Outcome::Skip { table, .. } => table,
        }
    }
}

/// Read the JSON array of records at `path`.
pub async fn load(path: &Path) -> Result<Vec<TestRecord>> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

/// `db.<db>.<collection>`.
pub fn topic_name(db: &str, collection: &str) -> String {
    format!("db.{db}.{collection}")
}

/// `<db>:<collection>` with every `-` replaced by `_`.
pub fn table_name(db: &str, collection: &str) -> String {
    format!("{db}:{collection}").replace('-', "_")
}

/// A sample database object with fresh identifiers.
pub fn unique_db_object() -> Value {
    let mut id = fixture::id_object("someId", "RANDOM_GUID");
    id.insert("declarationId".into(), Uuid::new_v4().to_string().into());
    fixture::address_declaration(id, &GuidSource::Random)
}

/// Decide where `record` goes and rewrite its message for storage.
///
/// Messages with a `dbObject` other than [`CORRUPT_MARKER`] get a freshly
/// encrypted sample object and the data key's envelope fields.
pub fn prepare(record: TestRecord, key: &DataKey, data_table: Option<&str>) -> Result<Outcome, RecordError> {
    let TestRecord {
        kafka_message_id: id,
        kafka_message_timestamp: timestamp,
        kafka_message_value: mut value,
    } = record;

    let message = value
        .get_mut("message")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| RecordError::Malformed { id: id.clone() })?;
    let db = string_field(message, "db", &id)?;
    let collection = string_field(message, "collection", &id)?;
    let topic = topic_name(&db, &collection);
    let table = data_table
        .map(str::to_owned)
        .unwrap_or_else(|| table_name(&db, &collection));

    let Some(db_object) = message.get("dbObject") else {
        return Ok(Outcome::Skip { row: id, table });
    };
    let corrupt = db_object.as_str() == Some(CORRUPT_MARKER);

    let mut fields = Map::new();
    if corrupt {
        fields.insert("initialisationVector".into(), PHONEY_VECTOR.into());
    } else {
        let plaintext = serde_json::to_vec(&unique_db_object())?;
        let encrypted = cipher::encrypt(key.plaintext.as_bytes(), &plaintext)?;
        fields.insert("initialisationVector".into(), encrypted.iv_base64().into());
        if !key.encryption_key_id.is_empty() {
            fields.insert("keyEncryptionKeyId".into(), key.encryption_key_id.clone().into());
        }
        if !key.ciphertext.is_empty() {
            fields.insert("encryptedEncryptionKey".into(), key.ciphertext.clone().into());
        }
        message.insert(
            "dbObject".into(),
            STANDARD.encode(&encrypted.ciphertext).into(),
        );
    }

    let encryption = message
        .entry("encryption")
        .or_insert_with(|| Value::Object(Map::new()));
    let encryption = encryption
        .as_object_mut()
        .ok_or_else(|| RecordError::Malformed { id: id.clone() })?;
    encryption.extend(fields);

    Ok(Outcome::Store(Prepared {
        table,
        topic,
        row: id,
        timestamp,
        value: serde_json::to_vec(&value)?,
    }))
}

fn string_field(message: &Map<String, Value>, field: &'static str, id: &str) -> Result<String, RecordError> {
    message
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| RecordError::MissingField {
            id: id.to_owned(),
            field,
        })
}

/// Timestamps appear both as numbers and as numeric strings.
fn timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
