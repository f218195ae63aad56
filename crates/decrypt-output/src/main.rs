//! `decrypt-output`: decrypt one exported file to stdout.
//!
//! ```text
//! decrypt-output <metadata-file> <encrypted-file> [--data-key-service URL] [--raw] [--decode-key]
//! ```
//!
//! The wrapped data key named in the metadata file is unwrapped by the data
//! key service; logs go to stderr so stdout carries only plaintext. Exported
//! files are encrypted with the key text itself as the AES key, so the text
//! is used as-is unless `--decode-key` is given.

mod metadata;

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::Parser;
use common::dks::{HttpKeyService, KeyService};
use common::envelope;
use common::KeyEncoding;
use tracing::info;

/// Decrypt an exported file.
#[derive(Debug, Parser)]
#[command(name = "decrypt-output", version)]
struct Args {
    /// File of `key=value` lines holding `iv`, `ciphertext` and
    /// `dataKeyEncryptionKeyId`.
    metadata_file: PathBuf,

    /// The encrypted file, base64 text unless `--raw`.
    encrypted_file: PathBuf,

    /// Data key service base URL.
    #[arg(short = 'k', long, default_value = "http://localhost:8090")]
    data_key_service: String,

    /// The encrypted file holds raw ciphertext bytes.
    #[arg(long)]
    raw: bool,

    /// Base64-decode the unwrapped key instead of using its text as the key.
    #[arg(long)]
    decode_key: bool,

    /// Log level (overridden by `RUST_LOG`).
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    common::telemetry::init(&args.log_level)?;

    let metadata_text = tokio::fs::read_to_string(&args.metadata_file)
        .await
        .with_context(|| format!("failed to read {}", args.metadata_file.display()))?;
    let contents = tokio::fs::read(&args.encrypted_file)
        .await
        .with_context(|| format!("failed to read {}", args.encrypted_file.display()))?;

    let keys = HttpKeyService::new(&args.data_key_service)?;
    let encoding = if args.decode_key {
        KeyEncoding::Base64
    } else {
        KeyEncoding::Text
    };
    let plaintext = decrypt(&keys, &metadata_text, &contents, args.raw, encoding).await?;
    info!(bytes = plaintext.len(), "decrypted");

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&plaintext).context("failed to write plaintext")?;
    stdout.flush().context("failed to write plaintext")?;
    Ok(())
}

/// Decrypt `contents` using the envelope described by `metadata_text`.
async fn decrypt(
    keys: &dyn KeyService,
    metadata_text: &str,
    contents: &[u8],
    raw: bool,
    encoding: KeyEncoding,
) -> Result<Vec<u8>> {
    let metadata = metadata::envelope(&metadata::parse(metadata_text))?;
    let ciphertext = if raw {
        contents.to_vec()
    } else {
        let text: Vec<u8> = contents
            .iter()
            .copied()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        STANDARD
            .decode(text)
            .context("encrypted file is not valid base64 (use --raw for binary files)")?
    };
    info!(key_id = %metadata.data_key_encryption_key_id, "unwrapping data key");
    Ok(envelope::open_with(keys, &metadata, &ciphertext, encoding).await?)
}
