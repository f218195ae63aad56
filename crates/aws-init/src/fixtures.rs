//! Fixture file contents and object naming.

use std::io::{self, Write};

use common::fixture::{address_declaration, id_object, GuidSource};
use flate2::{write::GzEncoder, Compression};
use serde_json::Value;

/// Database, collection and id range encoded in every fixture object name.
pub const OBJECT_NAME_STEM: &str = "db.core.claimant-045-050";

/// Object key of fixture file `file_number` under `prefix`.
pub fn object_key(prefix: &str, file_number: u32) -> String {
    format!("{prefix}{OBJECT_NAME_STEM}-{file_number:06}.txt.gz.enc")
}

/// The record at `record_number` in file `file_number`.
///
/// `_id.citizenId` is `"{file_number}/{record_number}"`, which lets a reader
/// trace every record back to its file.
pub fn citizen_record(file_number: u32, record_number: u32) -> Value {
    address_declaration(
        id_object("citizenId", format!("{file_number}/{record_number}")),
        &GuidSource::Literal("guid".into()),
    )
}

/// Uncompressed file body: one JSON object per line.
pub fn file_contents(file_number: u32, records: u32) -> String {
    (0..records)
        .map(|record_number| citizen_record(file_number, record_number).to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Gzip-compress `data`.
pub fn gzip(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}
