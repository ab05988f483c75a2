//! Where payment-proof images live.
//!
//! Files are written under `<root>/<place>/<uuid>.<ext>` and referred to by
//! the relative handle `<place>/<uuid>.<ext>`, which is what gets stored on
//! the payment row.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Sub-directory for payment proofs.
pub const PAYMENT_PROOFS: &str = "payments";

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Validates and persists an upload, returning its handle.
    async fn save(&self, data: &[u8]) -> Result<String>;
    /// Best-effort removal; failures are logged, never returned.
    async fn delete(&self, handle: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Webp,
}

impl ImageKind {
    /// Sniffs the format from magic bytes; the client-supplied name and
    /// content type are not trusted.
    pub fn detect(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageKind::Jpeg)
        } else if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(ImageKind::Png)
        } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            Some(ImageKind::Webp)
        } else {
            None
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
            ImageKind::Webp => "webp",
        }
    }
}

pub struct LocalFileStorage {
    root: PathBuf,
    place: &'static str,
    max_bytes: usize,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>, place: &'static str, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            place,
            max_bytes,
        }
    }

    /// Resolves a handle to a path, refusing anything that would escape the
    /// storage root.
    fn resolve(&self, handle: &str) -> Option<PathBuf> {
        let relative = Path::new(handle);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe || !handle.starts_with(self.place) {
            return None;
        }
        Some(self.root.join(relative))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn save(&self, data: &[u8]) -> Result<String> {
        if data.is_empty() {
            return Err(AppError::Validation("proof_image: file is empty".to_string()));
        }

        if data.len() > self.max_bytes {
            return Err(AppError::Validation(format!(
                "proof_image: file too large (max {} MB)",
                self.max_bytes / (1024 * 1024)
            )));
        }

        let kind = ImageKind::detect(data).ok_or_else(|| {
            AppError::Validation("proof_image: unsupported file type. Allowed: jpg, png, webp".to_string())
        })?;

        let dir = self.root.join(self.place);
        fs::create_dir_all(&dir).await.map_err(|e| {
            AppError::Storage(format!("Failed to create uploads directory: {}", e))
        })?;

        let file_name = format!("{}.{}", Uuid::new_v4(), kind.extension());
        let file_path = dir.join(&file_name);

        let mut file = fs::File::create(&file_path).await.map_err(|e| {
            AppError::Storage(format!("Failed to create file: {}", e))
        })?;

        file.write_all(data).await.map_err(|e| {
            AppError::Storage(format!("Failed to write file: {}", e))
        })?;
        file.flush().await.map_err(|e| {
            AppError::Storage(format!("Failed to flush file: {}", e))
        })?;

        Ok(format!("{}/{}", self.place, file_name))
    }

    async fn delete(&self, handle: &str) {
        let Some(path) = self.resolve(handle) else {
            tracing::warn!(handle, "Refusing to delete file outside storage root");
            return;
        };

        if let Err(e) = fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove uploaded file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_detect_image_kind() {
        assert_eq!(ImageKind::detect(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::detect(&PNG_HEADER), Some(ImageKind::Png));
        assert_eq!(ImageKind::detect(b"RIFF\x00\x00\x00\x00WEBPVP8 "), Some(ImageKind::Webp));
        assert_eq!(ImageKind::detect(b"%PDF-1.7"), None);
        assert_eq!(ImageKind::detect(b""), None);
    }

    #[tokio::test]
    async fn test_save_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path(), PAYMENT_PROOFS, 1024);

        let handle = storage.save(&PNG_HEADER).await.unwrap();
        assert!(handle.starts_with("payments/"));
        assert!(handle.ends_with(".png"));
        assert!(dir.path().join(&handle).exists());

        storage.delete(&handle).await;
        assert!(!dir.path().join(&handle).exists());

        // Deleting twice is harmless.
        storage.delete(&handle).await;
    }

    #[tokio::test]
    async fn test_rejects_bad_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path(), PAYMENT_PROOFS, 16);

        assert!(matches!(storage.save(b"plain text").await, Err(AppError::Validation(_))));
        assert!(matches!(storage.save(&[0xFF; 64]).await, Err(AppError::Validation(_))));
        assert!(matches!(storage.save(&[]).await, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_resolve_refuses_traversal() {
        let storage = LocalFileStorage::new("/srv/uploads", PAYMENT_PROOFS, 16);
        assert!(storage.resolve("payments/abc.png").is_some());
        assert!(storage.resolve("payments/../../etc/passwd").is_none());
        assert!(storage.resolve("/etc/passwd").is_none());
        assert!(storage.resolve("products/abc.png").is_none());
    }
}
