//! Upload storage collaborator.
//!
//! Stored filenames are opaque identifiers handed back to the link store as
//! the target of `image` links: millisecond timestamp plus the original
//! extension.

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::codegen::generate_code;

/// Attempts at finding an unclaimed filename before giving up.
const MAX_NAME_ATTEMPTS: u32 = 10;

#[derive(Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Persist uploaded bytes and return the storage-assigned filename.
    ///
    /// Names are claimed with `create_new`, so a same-millisecond upload
    /// cannot overwrite an earlier one; colliding names get a random suffix
    /// and retry.
    pub async fn save(&self, original_name: &str, data: &[u8]) -> Result<String> {
        let ext = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();

        tokio::fs::create_dir_all(&self.dir).await?;

        let millis = chrono::Utc::now().timestamp_millis();
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let filename = if attempt == 0 {
                format!("{millis}{ext}")
            } else {
                format!("{millis}-{}{ext}", generate_code())
            };

            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.dir.join(&filename))
                .await
            {
                Ok(mut file) => {
                    file.write_all(data).await?;
                    file.flush().await?;
                    return Ok(filename);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(anyhow!(
            "could not allocate a fresh upload filename after {MAX_NAME_ATTEMPTS} attempts"
        ))
    }

    /// Read a stored file back; `Ok(None)` when it no longer exists.
    pub async fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        // Stored names never contain path separators; reject anything that
        // could escape the upload directory.
        if name.contains('/') || name.contains('\\') || name.contains("..") {
            return Ok(None);
        }

        match tokio::fs::read(self.dir.join(name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
