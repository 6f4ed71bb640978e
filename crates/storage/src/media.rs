use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use crate::{StoreError, StoreResult};

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "mp4", "mov", "mp3", "wav", "pdf",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadata {
    pub file_name: String,
    pub content_type: Option<String>,
}

impl UploadMetadata {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
        }
    }

    /// Lower-cased extension of the original file name.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .map(|e| e.to_ascii_lowercase())
    }
}

/// A reference that can be used as a scene or overlay `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMedia {
    pub file_path: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub allowed_extensions: Vec<String>,
    pub max_bytes: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl UploadPolicy {
    /// Parses a comma separated extension list such as `"jpg, .png,MP4"`.
    pub fn parse_extensions(list: &str) -> Vec<String> {
        list.split(',')
            .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect()
    }

    /// Returns the accepted extension, or a validation error naming the problem.
    pub fn check(&self, metadata: &UploadMetadata, size: u64) -> StoreResult<String> {
        if size == 0 {
            return Err(StoreError::Validation("uploaded file is empty".to_string()));
        }
        if size > self.max_bytes {
            return Err(StoreError::Validation(format!(
                "file is {} bytes; the limit is {} bytes",
                size, self.max_bytes
            )));
        }
        let ext = metadata.extension().ok_or_else(|| {
            StoreError::Validation(format!("`{}` has no file extension", metadata.file_name))
        })?;
        if !self.allowed_extensions.iter().any(|a| *a == ext) {
            return Err(StoreError::Validation(format!(
                "`.{}` files are not allowed; allowed formats: {}",
                ext,
                self.allowed_extensions.join(", ")
            )));
        }
        Ok(ext)
    }
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    fn policy(&self) -> &UploadPolicy;

    async fn store(&self, data: Vec<u8>, metadata: UploadMetadata) -> StoreResult<StoredMedia>;
}

/// Saves uploads under a local directory that the server exposes at `/uploads`.
pub struct LocalMediaStore {
    dir: PathBuf,
    policy: UploadPolicy,
}

impl LocalMediaStore {
    pub const PUBLIC_PREFIX: &'static str = "uploads";

    pub fn open(dir: impl AsRef<Path>, policy: UploadPolicy) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, policy })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    async fn store(&self, data: Vec<u8>, metadata: UploadMetadata) -> StoreResult<StoredMedia> {
        let ext = self.policy.check(&metadata, data.len() as u64)?;
        let name = format!("{}.{}", Uuid::new_v4(), ext);
        tokio::fs::write(self.dir.join(&name), &data).await?;
        info!(
            original = %metadata.file_name,
            stored = %name,
            bytes = data.len(),
            "media stored locally"
        );
        Ok(StoredMedia {
            file_path: format!("{}/{}", Self::PUBLIC_PREFIX, name),
            url: format!("/{}/{}", Self::PUBLIC_PREFIX, name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn policy_accepts_default_formats() {
        let policy = UploadPolicy::default();
        let ext = policy.check(&UploadMetadata::new("Clip.MP4"), 10).unwrap();
        assert_eq!(ext, "mp4");
    }

    #[test]
    fn policy_rejects_bad_uploads() {
        let policy = UploadPolicy {
            allowed_extensions: UploadPolicy::parse_extensions("png, .JPG"),
            max_bytes: 100,
        };
        assert_eq!(policy.allowed_extensions, vec!["png", "jpg"]);
        for (name, size) in [("a.png", 0), ("a.png", 101), ("a.exe", 5), ("README", 5)] {
            assert!(
                matches!(
                    policy.check(&UploadMetadata::new(name), size),
                    Err(StoreError::Validation(_))
                ),
                "{} ({} bytes) should be rejected",
                name,
                size
            );
        }
        assert!(policy.check(&UploadMetadata::new("a.jpg"), 100).is_ok());
    }

    #[tokio::test]
    async fn local_store_writes_unique_files() {
        let dir = TempDir::new().unwrap();
        let store = LocalMediaStore::open(dir.path(), UploadPolicy::default()).unwrap();

        let a = store
            .store(b"frame".to_vec(), UploadMetadata::new("shot.png"))
            .await
            .unwrap();
        let b = store
            .store(b"frame".to_vec(), UploadMetadata::new("shot.png"))
            .await
            .unwrap();
        assert_ne!(a.file_path, b.file_path);
        assert!(a.file_path.starts_with("uploads/") && a.file_path.ends_with(".png"));
        assert_eq!(a.url, format!("/{}", a.file_path));

        let stored_name = a.file_path.trim_start_matches("uploads/");
        let bytes = std::fs::read(dir.path().join(stored_name)).unwrap();
        assert_eq!(bytes, b"frame");
    }

    #[tokio::test]
    async fn local_store_rejects_disallowed_type() {
        let dir = TempDir::new().unwrap();
        let store = LocalMediaStore::open(dir.path(), UploadPolicy::default()).unwrap();
        let err = store
            .store(b"MZ".to_vec(), UploadMetadata::new("tool.exe"))
            .await
            .unwrap_err();
        assert!(err.is_client_error());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
