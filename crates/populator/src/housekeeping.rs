//! Files the populator clears before a run and creates after one.

use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

/// Remove a completion flag left by an earlier run, whether it is a
/// directory or a file.
pub async fn remove_completion_flag(flag: Option<&Path>) -> Result<()> {
    let Some(flag) = flag else {
        info!("no completion flag configured; nothing removed");
        return Ok(());
    };
    match tokio::fs::metadata(flag).await {
        Ok(meta) if meta.is_dir() => {
            info!(path = %flag.display(), "removing completion flag directory");
            tokio::fs::remove_dir_all(flag)
                .await
                .with_context(|| format!("failed to remove {}", flag.display()))
        }
        Ok(_) => {
            info!(path = %flag.display(), "removing completion flag file");
            tokio::fs::remove_file(flag)
                .await
                .with_context(|| format!("failed to remove {}", flag.display()))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(path = %flag.display(), "completion flag set but absent; nothing removed");
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("failed to inspect {}", flag.display())),
    }
}

/// Remove the output file of an earlier run.
pub async fn remove_output_file(file: Option<&Path>) -> Result<()> {
    let Some(file) = file else {
        info!("no output file configured; nothing removed");
        return Ok(());
    };
    match tokio::fs::remove_file(file).await {
        Ok(()) => {
            info!(path = %file.display(), "removed output file");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(path = %file.display(), "output file not found; nothing removed");
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("failed to remove {}", file.display())),
    }
}

/// Create the completion flag directory.
pub async fn create_completion_flag(flag: &Path) -> Result<()> {
    info!(path = %flag.display(), "creating completion flag");
    tokio::fs::create_dir_all(flag)
        .await
        .with_context(|| format!("failed to create {}", flag.display()))
}
