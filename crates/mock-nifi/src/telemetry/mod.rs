//! Structured logging with optional OTLP span export.
//!
//! # Telemetry invariants
//!
//! - Upload bodies never appear in any span attribute or log field.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`).

pub mod init;

pub use init::{init_telemetry, shutdown_telemetry};
