//! Shared application state injected into every Axum handler.

use std::path::PathBuf;
use std::sync::Arc;

/// Optional checks applied to every upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Validation {
    /// Content type must be `application/x-bzip2`.
    pub require_bzip2_content_type: bool,
    /// Filename must end with `.bz2`.
    pub require_bz2_suffix: bool,
}

/// Application state shared across all request handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Directory relative to which `output_dir` is resolved.
    pub data_root: Arc<PathBuf>,
    /// Output directory name, echoed as the first segment of stored paths.
    pub output_dir: Arc<String>,
    /// Upload checks.
    pub validation: Validation,
}

impl AppState {
    /// Create a new [`AppState`].
    pub fn new(data_root: impl Into<PathBuf>, output_dir: impl Into<String>, validation: Validation) -> Self {
        Self {
            data_root: Arc::new(data_root.into()),
            output_dir: Arc::new(output_dir.into().trim_end_matches('/').to_owned()),
            validation,
        }
    }
}
