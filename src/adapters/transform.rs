//! Derive the preview artifact from a submitted document.

use crate::batch::InputFile;
use crate::error::AdapterError;
use crate::pipeline::{encode, render};
use async_trait::async_trait;
use tracing::debug;

/// Converts an input document into a derived visual artifact.
#[async_trait]
pub trait ArtifactTransform: Send + Sync {
    async fn convert(&self, file: &InputFile) -> Result<InputFile, AdapterError>;
}

/// Renders page 1 of a PDF to a PNG named after the original (`cv.pdf` → `cv.png`).
#[derive(Debug, Clone, Copy)]
pub struct PdfPreviewTransform {
    max_pixels: u32,
}

impl PdfPreviewTransform {
    pub fn new(max_pixels: u32) -> Self {
        Self {
            max_pixels: max_pixels.max(100),
        }
    }
}

impl Default for PdfPreviewTransform {
    fn default() -> Self {
        Self::new(2000)
    }
}

#[async_trait]
impl ArtifactTransform for PdfPreviewTransform {
    async fn convert(&self, file: &InputFile) -> Result<InputFile, AdapterError> {
        let pages = render::render_leading_pages(file.bytes.clone(), self.max_pixels, 1).await?;
        let first = pages.into_iter().next().ok_or(AdapterError::Empty {
            what: "PDF renderer",
        })?;

        let png = encode::encode_png(&first)?;
        debug!("Preview for {}: {} bytes", file.name, png.len());
        Ok(InputFile::png(format!("{}.png", file.stem()), png))
    }
}
