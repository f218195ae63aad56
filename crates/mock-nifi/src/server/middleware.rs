//! Axum middleware layers applied to the router.
//!
//! Includes request tracing, timeout enforcement, and the upload size limit.

use std::time::Duration;

/// Default per-request timeout applied to all routes.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest accepted upload body.
pub const MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;
