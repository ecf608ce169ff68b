//! Splitting uploaded documents into per-page images
//!
//! Plain images are a single page. PDFs are rasterized one image per page via
//! the optional `pdfium` feature; without it PDF uploads fail extraction with
//! a clear error rather than silently skipping pages.
//!
//! Note: pdfium-render requires the pdfium library to be installed
//! (apt install libpdfium-dev / brew install pdfium).

use crate::models::{FileKind, FileTask};
use anyhow::{Context, Result};
use async_trait::async_trait;

/// One page of a document, ready for the vision model
#[derive(Debug, Clone)]
pub struct PageImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Collaborator that turns an uploaded file into page images
#[async_trait]
pub trait DocumentPager: Send + Sync {
    async fn pages(&self, task: &FileTask) -> Result<Vec<PageImage>>;
}

/// Pager reading uploads from local storage
#[derive(Debug, Default)]
pub struct LocalPager;

impl LocalPager {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentPager for LocalPager {
    async fn pages(&self, task: &FileTask) -> Result<Vec<PageImage>> {
        let bytes = tokio::fs::read(&task.path)
            .await
            .with_context(|| format!("Failed to read upload {}", task.path.display()))?;

        match task.kind {
            FileKind::Image => {
                let mime_type = infer::get(&bytes)
                    .map(|t| t.mime_type().to_string())
                    .unwrap_or_else(|| "image/jpeg".to_string());
                Ok(vec![PageImage { bytes, mime_type }])
            }
            FileKind::Pdf => rasterize_pdf(bytes).await,
        }
    }
}

#[cfg(feature = "pdfium")]
async fn rasterize_pdf(bytes: Vec<u8>) -> Result<Vec<PageImage>> {
    // CPU-bound; keep it off the runtime workers
    tokio::task::spawn_blocking(move || rasterize_pdf_blocking(&bytes))
        .await
        .context("PDF render task failed")?
}

#[cfg(feature = "pdfium")]
fn rasterize_pdf_blocking(bytes: &[u8]) -> Result<Vec<PageImage>> {
    use pdfium_render::prelude::*;
    use std::io::Cursor;

    // Cap the long edge; card scans don't need more for OCR
    const MAX_PAGE_DIMENSION: f32 = 1600.0;

    let bindings = Pdfium::bind_to_system_library()
        .map_err(|e| anyhow::anyhow!("Failed to bind pdfium: {}", e))?;
    let pdfium = Pdfium::new(bindings);
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| anyhow::anyhow!("Failed to load PDF: {}", e))?;

    let mut pages = Vec::new();
    for page in document.pages().iter() {
        let width = page.width().value;
        let height = page.height().value;
        let scale = (MAX_PAGE_DIMENSION / width.max(height)).min(150.0 / 72.0);

        let config = PdfRenderConfig::new()
            .set_target_width((width * scale) as i32)
            .set_target_height((height * scale) as i32);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| anyhow::anyhow!("Failed to render PDF page: {}", e))?;

        let mut encoded = Vec::new();
        bitmap
            .as_image()
            .into_rgb8()
            .write_to(&mut Cursor::new(&mut encoded), image::ImageFormat::Jpeg)
            .map_err(|e| anyhow::anyhow!("Failed to encode page image: {}", e))?;

        pages.push(PageImage {
            bytes: encoded,
            mime_type: "image/jpeg".to_string(),
        });
    }

    Ok(pages)
}

#[cfg(not(feature = "pdfium"))]
async fn rasterize_pdf(_bytes: Vec<u8>) -> Result<Vec<PageImage>> {
    anyhow::bail!("PDF support not enabled (build with the `pdfium` feature)")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    // Minimal valid JPEG header bytes for type sniffing
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];

    #[tokio::test]
    async fn image_upload_yields_single_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.jpg");
        tokio::fs::write(&path, JPEG_MAGIC).await.unwrap();

        let task = FileTask::new("card.jpg".into(), path, FileKind::Image, 1);
        let pages = LocalPager::new().pages(&task).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].mime_type, "image/jpeg");
    }

    #[cfg(not(feature = "pdfium"))]
    #[tokio::test]
    async fn pdf_without_backend_fails_with_clear_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cards.pdf");
        tokio::fs::write(&path, b"%PDF-1.4").await.unwrap();

        let task = FileTask::new("cards.pdf".into(), path, FileKind::Pdf, 1);
        let err = LocalPager::new().pages(&task).await.unwrap_err();
        assert!(err.to_string().contains("PDF support not enabled"));
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let task = FileTask::new(
            "gone.jpg".into(),
            PathBuf::from("/nonexistent/gone.jpg"),
            FileKind::Image,
            1,
        );
        assert!(LocalPager::new().pages(&task).await.is_err());
    }
}
