//! Output writing: persist the merged PDF atomically.
//!
//! The bytes go to a uniquely named temp file in the target directory, which
//! is then renamed over the target. A rename within one directory is atomic
//! on every platform we support, so readers of `path` see either the previous
//! file or one complete new one, never a truncated PDF. Each call gets its own
//! temp file, so concurrent runs writing the same target do not interfere.

use crate::error::ConsolidateError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Write `bytes` to `path`, creating missing parent directories and
/// replacing any existing file.
///
/// # Errors
/// [`ConsolidateError::WriteFailed`] for any I/O failure. Nothing is retried.
pub async fn write_atomic(path: &Path, bytes: Vec<u8>) -> Result<PathBuf, ConsolidateError> {
    let write_failed = |source: std::io::Error| ConsolidateError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if path.file_name().is_none() {
        return Err(write_failed(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "output path has no file name",
        )));
    }

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    tokio::fs::create_dir_all(&dir).await.map_err(write_failed)?;

    let len = bytes.len();
    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        // Dropped (and deleted) on any early return.
        let mut tmp = tempfile::Builder::new()
            .prefix(".docmerge-")
            .suffix(".tmp")
            .tempfile_in(&dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        debug!("Wrote {} bytes to {}", bytes.len(), tmp.path().display());
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| ConsolidateError::Internal(format!("Write task panicked: {}", e)))?
    .map_err(write_failed)?;

    info!("Wrote {} ({} bytes)", path.display(), len);
    Ok(path.to_path_buf())
}
