//! Artifact storage abstraction
//!
//! Every uploaded file (manuscript, revision, review attachment,
//! payment proof, final publication) is written once and addressed
//! by an opaque `ArtifactRef`. Providers:
//! - Local filesystem (default)
//! - In-memory (tests and throwaway environments)

mod policy;

pub use policy::UploadPolicy;

use crate::config::StorageConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Opaque handle to a stored artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file received from a caller, not yet stored
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Lowercased extension of the original file name
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}

/// Descriptive data kept next to every artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub file_name: String,
    pub content_type: String,
    pub size: usize,
    pub sha256: String,
}

/// A stored artifact read back for download
#[derive(Debug, Clone)]
pub struct Artifact {
    pub reference: ArtifactRef,
    pub meta: ArtifactMeta,
    pub bytes: Vec<u8>,
}

/// Trait for artifact persistence
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist an upload and return its reference
    async fn store(&self, upload: &Upload) -> Result<ArtifactRef>;

    /// Read an artifact back
    async fn fetch(&self, reference: &ArtifactRef) -> Result<Artifact>;

    /// Remove an artifact whose owning write was abandoned
    async fn discard(&self, reference: &ArtifactRef) -> Result<()>;

    /// Get the provider name
    fn provider_name(&self) -> &str;
}

fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn meta_for(upload: &Upload) -> ArtifactMeta {
    ArtifactMeta {
        file_name: upload.file_name.clone(),
        content_type: upload.content_type.clone(),
        size: upload.bytes.len(),
        sha256: digest(&upload.bytes),
    }
}

fn new_key(upload: &Upload) -> String {
    let id = Uuid::new_v4().simple().to_string();
    match upload.extension() {
        Some(ext) if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) => {
            format!("{}.{}", id, ext)
        }
        _ => id,
    }
}

/// Keys are generated here; anything else is rejected before touching the filesystem.
fn is_valid_key(key: &str) -> bool {
    let (stem, ext) = match key.split_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (key, None),
    };

    stem.len() == 32
        && stem.chars().all(|c| c.is_ascii_hexdigit())
        && ext.map_or(true, |e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
}

fn store_error(action: &str, e: impl fmt::Display) -> AppError {
    AppError::ArtifactStore {
        message: format!("Failed to {}: {}", action, e),
    }
}

/// Filesystem-backed store: `<root>/<key>` plus `<root>/<key>.meta.json`
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the root directory if needed
    pub async fn init(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| store_error("create artifact root", e))
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.meta.json", key))
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn store(&self, upload: &Upload) -> Result<ArtifactRef> {
        let key = new_key(upload);
        let meta = meta_for(upload);

        tokio::fs::write(self.blob_path(&key), &upload.bytes)
            .await
            .map_err(|e| store_error("write artifact", e))?;

        let meta_json = serde_json::to_vec(&meta)?;
        if let Err(e) = tokio::fs::write(self.meta_path(&key), meta_json).await {
            let _ = tokio::fs::remove_file(self.blob_path(&key)).await;
            return Err(store_error("write artifact metadata", e));
        }

        tracing::debug!(
            reference = %key,
            size = meta.size,
            content_type = %meta.content_type,
            "Artifact stored"
        );

        Ok(ArtifactRef::new(key))
    }

    async fn fetch(&self, reference: &ArtifactRef) -> Result<Artifact> {
        let key = reference.as_str();
        let not_found = || AppError::ArtifactNotFound {
            reference: key.to_string(),
        };

        if !is_valid_key(key) {
            return Err(not_found());
        }

        let meta_json = match tokio::fs::read(self.meta_path(key)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(store_error("read artifact metadata", e)),
        };
        let meta: ArtifactMeta = serde_json::from_slice(&meta_json)?;

        let bytes = match tokio::fs::read(self.blob_path(key)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(store_error("read artifact", e)),
        };

        if digest(&bytes) != meta.sha256 {
            return Err(AppError::ArtifactStore {
                message: format!("Artifact {} failed integrity check", key),
            });
        }

        Ok(Artifact {
            reference: reference.clone(),
            meta,
            bytes,
        })
    }

    async fn discard(&self, reference: &ArtifactRef) -> Result<()> {
        let key = reference.as_str();
        if !is_valid_key(key) {
            return Ok(());
        }

        for path in [self.blob_path(key), self.meta_path(key)] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(store_error("remove artifact", e)),
            }
        }

        Ok(())
    }

    fn provider_name(&self) -> &str {
        "local"
    }
}

/// In-memory store for testing
#[derive(Default)]
pub struct MemoryArtifactStore {
    blobs: RwLock<HashMap<String, (ArtifactMeta, Vec<u8>)>>,
    failing: AtomicBool,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `store` call fail
    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn store(&self, upload: &Upload) -> Result<ArtifactRef> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(store_error("write artifact", "store unavailable"));
        }

        let key = new_key(upload);
        self.blobs
            .write()
            .await
            .insert(key.clone(), (meta_for(upload), upload.bytes.clone()));

        Ok(ArtifactRef::new(key))
    }

    async fn fetch(&self, reference: &ArtifactRef) -> Result<Artifact> {
        let blobs = self.blobs.read().await;
        let (meta, bytes) = blobs
            .get(reference.as_str())
            .ok_or_else(|| AppError::ArtifactNotFound {
                reference: reference.to_string(),
            })?;

        Ok(Artifact {
            reference: reference.clone(),
            meta: meta.clone(),
            bytes: bytes.clone(),
        })
    }

    async fn discard(&self, reference: &ArtifactRef) -> Result<()> {
        self.blobs.write().await.remove(reference.as_str());
        Ok(())
    }

    fn provider_name(&self) -> &str {
        "memory"
    }
}

/// Create an artifact store based on configuration
pub async fn create_artifact_store(config: &StorageConfig) -> Result<Arc<dyn ArtifactStore>> {
    let store = LocalArtifactStore::new(config.root_dir.clone());
    store.init().await?;
    tracing::info!(root = %config.root_dir.display(), "Local artifact store ready");
    Ok(Arc::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("reviewflow-artifacts-{}", Uuid::new_v4()))
    }

    #[test]
    fn test_key_validation() {
        assert!(is_valid_key(&Uuid::new_v4().simple().to_string()));
        assert!(is_valid_key(&format!("{}.pdf", Uuid::new_v4().simple())));
        assert!(!is_valid_key("../etc/passwd"));
        assert!(!is_valid_key(&format!("{}./x", Uuid::new_v4().simple())));
    }

    #[tokio::test]
    async fn test_local_store_fetch_and_discard() {
        let root = temp_root();
        let store = LocalArtifactStore::new(&root);
        store.init().await.unwrap();

        let upload = Upload::new("paper.docx", "application/msword", b"manuscript".to_vec());
        let reference = store.store(&upload).await.unwrap();
        assert!(reference.as_str().ends_with(".docx"));

        let artifact = store.fetch(&reference).await.unwrap();
        assert_eq!(artifact.bytes, b"manuscript");
        assert_eq!(artifact.meta.file_name, "paper.docx");
        assert_eq!(artifact.meta.size, 10);

        store.discard(&reference).await.unwrap();
        let err = store.fetch(&reference).await.unwrap_err();
        assert!(matches!(err, AppError::ArtifactNotFound { .. }));

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn test_local_store_detects_tampering() {
        let root = temp_root();
        let store = LocalArtifactStore::new(&root);
        store.init().await.unwrap();

        let reference = store
            .store(&Upload::new("proof.png", "image/png", vec![1, 2, 3]))
            .await
            .unwrap();
        tokio::fs::write(root.join(reference.as_str()), [9, 9, 9])
            .await
            .unwrap();

        let err = store.fetch(&reference).await.unwrap_err();
        assert!(matches!(err, AppError::ArtifactStore { .. }));

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn test_unknown_reference_is_not_found() {
        let store = LocalArtifactStore::new(temp_root());
        let err = store
            .fetch(&ArtifactRef::new("../../secrets"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ArtifactNotFound { .. }));
    }

    #[tokio::test]
    async fn test_memory_store_failure_switch() {
        let store = MemoryArtifactStore::new();
        let upload = Upload::new("a.pdf", "application/pdf", vec![0u8; 4]);

        store.fail_writes(true);
        assert!(store.store(&upload).await.is_err());

        store.fail_writes(false);
        let reference = store.store(&upload).await.unwrap();
        assert_eq!(store.fetch(&reference).await.unwrap().bytes.len(), 4);
    }
}
