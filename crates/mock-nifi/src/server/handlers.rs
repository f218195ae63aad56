//! Axum request handlers for all service endpoints.

use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::IntoResponse,
};
use bytes::Bytes;
use tracing::{info, warn};

use super::{error::IngestError, state::AppState};

/// Header naming the collection an upload belongs to.
pub const COLLECTION_HEADER: &str = "collection";
/// Header naming the uploaded file.
pub const FILENAME_HEADER: &str = "filename";
/// Content type accepted when content-type validation is on.
pub const BZIP2_CONTENT_TYPE: &str = "application/x-bzip2";
/// Filename suffix accepted when suffix validation is on.
pub const BZ2_SUFFIX: &str = ".bz2";

/// `POST /collection`: store the request body under the named collection.
///
/// Responds `200` with the stored path, relative to the data root
/// (`output/<collection>/<filename>`), or `400` with a plain-text reason.
pub async fn post_collection(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<String, IngestError> {
    let result = store_upload(&state, &headers, &body).await;
    if let Err(e) = &result {
        warn!(status = e.status().as_u16(), reason = %e, "upload rejected");
    }
    result
}

/// `GET /health`: liveness check.
pub async fn health() -> &'static str {
    "ok"
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}

async fn store_upload(state: &AppState, headers: &HeaderMap, body: &Bytes) -> Result<String, IngestError> {
    let collection = required_header(headers, COLLECTION_HEADER, "Collection")?;
    let filename = required_header(headers, FILENAME_HEADER, "Filename")?;

    if state.validation.require_bzip2_content_type {
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        let media_type = content_type.split(';').next().unwrap_or("").trim();
        if !media_type.eq_ignore_ascii_case(BZIP2_CONTENT_TYPE) {
            return Err(IngestError::BadRequest(format!(
                "Invalid content type: '{content_type}', expected '{BZIP2_CONTENT_TYPE}'"
            )));
        }
    }

    if state.validation.require_bz2_suffix && !filename.ends_with(BZ2_SUFFIX) {
        return Err(IngestError::BadRequest(format!(
            "Invalid filename suffix: '{filename}', expected '{BZ2_SUFFIX}'"
        )));
    }

    ensure_path_segment(collection, "Collection")?;
    ensure_path_segment(filename, "Filename")?;

    let dir = state.data_root.join(state.output_dir.as_str()).join(collection);
    tokio::fs::create_dir_all(&dir).await?;
    tokio::fs::write(dir.join(filename), body).await?;

    let stored = format!("{}/{collection}/{filename}", state.output_dir);
    info!(collection, filename, size = body.len(), path = %stored, "upload stored");
    Ok(stored)
}

fn required_header<'a>(headers: &'a HeaderMap, name: &str, label: &str) -> Result<&'a str, IngestError> {
    let value = headers
        .get(name)
        .ok_or_else(|| IngestError::BadRequest(format!("Missing {label} header")))?;
    value
        .to_str()
        .map_err(|_| IngestError::BadRequest(format!("{label} header contains non-ASCII characters")))
}

/// Uploads land at `<output>/<collection>/<filename>`; neither header may
/// name anything but a single directory entry.
fn ensure_path_segment(value: &str, label: &str) -> Result<(), IngestError> {
    let unsafe_segment = value.trim().is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\', '\0']);
    if unsafe_segment {
        return Err(IngestError::BadRequest(format!(
            "Invalid {label} header: '{value}'"
        )));
    }
    Ok(())
}
