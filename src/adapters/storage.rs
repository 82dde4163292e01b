//! Blob storage for uploaded originals and their preview images.

use crate::batch::InputFile;
use crate::error::AdapterError;
use crate::record::Reference;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Uploads raw bytes and hands back a stable reference to them.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Store `file` and return where it now lives.
    async fn upload(&self, file: &InputFile) -> Result<Reference, AdapterError>;

    /// Read back the bytes behind a reference previously returned by `upload`.
    async fn fetch(&self, reference: &Reference) -> Result<Vec<u8>, AdapterError>;
}

/// Stores blobs as files under a root directory.
///
/// Each upload gets a fresh `<uuid>-<sanitised name>` file, so two résumés
/// both called `cv.pdf` never overwrite each other. References are the
/// absolute file paths.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Create the root directory if needed and canonicalise it.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, AdapterError> {
        let root = root.as_ref();
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| io_err(root, e))?;
        let root = tokio::fs::canonicalize(root)
            .await
            .map_err(|e| io_err(root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a reference to a path, refusing anything outside the root.
    fn resolve(&self, reference: &Reference) -> Result<PathBuf, AdapterError> {
        let path = PathBuf::from(reference.as_str());
        let escapes = path
            .components()
            .any(|c| matches!(c, Component::ParentDir));
        if escapes || !path.starts_with(&self.root) {
            return Err(AdapterError::ForeignReference(reference.to_string()));
        }
        Ok(path)
    }
}

#[async_trait]
impl StorageAdapter for LocalStorage {
    async fn upload(&self, file: &InputFile) -> Result<Reference, AdapterError> {
        if file.is_empty() {
            return Err(AdapterError::Empty { what: "upload" });
        }

        let name = format!("{}-{}", uuid::Uuid::new_v4(), sanitise_file_name(&file.name));
        let path = self.root.join(name);

        let mut out = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| io_err(&path, e))?;
        out.write_all(&file.bytes)
            .await
            .map_err(|e| io_err(&path, e))?;
        out.flush().await.map_err(|e| io_err(&path, e))?;

        debug!("Stored {} → {}", file.name, path.display());
        Ok(Reference::new(path.to_string_lossy().into_owned()))
    }

    async fn fetch(&self, reference: &Reference) -> Result<Vec<u8>, AdapterError> {
        let path = self.resolve(reference)?;
        tokio::fs::read(&path).await.map_err(|e| io_err(&path, e))
    }
}

static RE_UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").unwrap());

/// Keep a file name recognisable while making it safe as a single path segment.
fn sanitise_file_name(name: &str) -> String {
    let replaced = RE_UNSAFE_CHARS.replace_all(name, "_");
    let trimmed = replaced.trim_start_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

fn io_err(path: &Path, source: std::io::Error) -> AdapterError {
    AdapterError::Io {
        path: path.to_path_buf(),
        source,
    }
}
