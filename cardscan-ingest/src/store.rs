//! On-disk storage for uploaded batch files
//!
//! Uploads land under `<root>/<batch_id>/`, one directory per batch, removed
//! wholesale when the batch is archived. Nothing survives a process restart
//! on purpose; the store exists so extraction can stream page images without
//! holding every upload in memory.

use crate::models::FileKind;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// File extensions accepted for upload
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "pdf"];

/// Per-file and whole-batch upload size cap
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Owns the upload root directory
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write one uploaded file under its batch directory
    pub async fn save(&self, batch_id: Uuid, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        let dir = self.root.join(batch_id.to_string());
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create batch dir {}", dir.display()))?;

        let path = dir.join(sanitize_filename(filename));
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write upload {}", path.display()))?;

        debug!(batch_id = %batch_id, file = filename, bytes = bytes.len(), "Upload stored");
        Ok(path)
    }

    /// Remove a batch's directory and everything in it
    pub async fn remove_batch(&self, batch_id: Uuid) -> Result<()> {
        let dir = self.root.join(batch_id.to_string());
        if dir.exists() {
            tokio::fs::remove_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to remove batch dir {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Classify an upload from its extension and sniffed content type.
///
/// Returns `None` for anything not accepted. The sniffed type wins over the
/// extension when both are present, so a renamed executable does not pass as
/// a JPEG.
pub fn detect_kind(filename: &str, bytes: &[u8]) -> Option<FileKind> {
    let ext = filename.rsplit('.').next()?.to_ascii_lowercase();
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }

    if let Some(sniffed) = infer::get(bytes) {
        return match sniffed.mime_type() {
            "image/jpeg" | "image/png" => Some(FileKind::Image),
            "application/pdf" => Some(FileKind::Pdf),
            _ => None,
        };
    }

    // Unsniffable content: fall back to the extension
    match ext.as_str() {
        "pdf" => Some(FileKind::Pdf),
        _ => Some(FileKind::Image),
    }
}

/// Keep the base name only and replace path-hostile characters
fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);
    base.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];
    const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[tokio::test]
    async fn save_and_remove_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().to_path_buf());
        let batch_id = Uuid::new_v4();

        let path = store.save(batch_id, "card.jpg", JPEG_MAGIC).await.unwrap();
        assert!(path.exists());
        assert!(path.starts_with(dir.path().join(batch_id.to_string())));

        store.remove_batch(batch_id).await.unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn detect_kind_honors_sniffed_type() {
        assert_eq!(detect_kind("card.jpg", JPEG_MAGIC), Some(FileKind::Image));
        assert_eq!(detect_kind("card.png", PNG_MAGIC), Some(FileKind::Image));
        assert_eq!(detect_kind("cards.pdf", b"%PDF-1.4 rest"), Some(FileKind::Pdf));
        // Extension says image, content says PDF: content wins
        assert_eq!(detect_kind("card.jpg", b"%PDF-1.4 rest"), Some(FileKind::Pdf));
    }

    #[test]
    fn detect_kind_rejects_unknown_extensions() {
        assert_eq!(detect_kind("notes.txt", b"hello"), None);
        assert_eq!(detect_kind("archive.zip", &[0x50, 0x4B, 0x03, 0x04]), None);
        assert_eq!(detect_kind("no_extension", b""), None);
    }

    #[test]
    fn filenames_are_sanitized() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("my card (1).jpg"), "my_card__1_.jpg");
    }
}
