//! Blob upload boundary for the memory gallery.
//!
//! # Responsibility
//! - Accept raw bytes under a slash-separated logical path.
//! - Return a URL the gallery can store and render.
//!
//! # Invariants
//! - Logical paths are relative and never escape the blob root.
//! - An upload either fully lands or leaves no file behind.

use crate::store::{StoreError, StoreResult};
use log::{info, warn};
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;

/// Destination for uploaded binary content.
pub trait BlobStore {
    /// Stores `bytes` under `path` and returns a fetchable URL.
    fn upload_blob(&self, path: &str, bytes: &[u8]) -> StoreResult<String>;
}

/// Blob store writing into a local directory and returning `file://` URLs.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Creates a store rooted at `root`; the directory is created on demand.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, logical: &str) -> StoreResult<PathBuf> {
        let relative = Path::new(logical);
        if logical.trim().is_empty() || relative.is_absolute() {
            return Err(StoreError::InvalidBlobPath(logical.to_string()));
        }
        for component in relative.components() {
            if !matches!(component, Component::Normal(_)) {
                return Err(StoreError::InvalidBlobPath(logical.to_string()));
            }
        }
        Ok(self.root.join(relative))
    }
}

impl BlobStore for FsBlobStore {
    fn upload_blob(&self, path: &str, bytes: &[u8]) -> StoreResult<String> {
        let target = self.resolve(path)?;
        let parent = target
            .parent()
            .ok_or_else(|| StoreError::InvalidBlobPath(path.to_string()))?;
        fs::create_dir_all(parent)?;

        // Staging file is unique per upload.
        let written = NamedTempFile::new_in(parent)
            .and_then(|mut staging| {
                staging.write_all(bytes)?;
                staging.as_file().sync_all()?;
                Ok(staging)
            })
            .and_then(|staging| staging.persist(&target).map_err(io::Error::from));
        if let Err(err) = written {
            warn!(
                "event=blob_upload module=store status=error bytes={} error={}",
                bytes.len(),
                err
            );
            return Err(err.into());
        }

        info!(
            "event=blob_upload module=store status=ok bytes={}",
            bytes.len()
        );
        Ok(format!("file://{}", target.display()))
    }
}

/// Sanitizes an uploaded file name into a single safe path segment.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}
