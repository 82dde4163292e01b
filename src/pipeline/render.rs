//! PDF rasterisation: render the first pages of a résumé via pdfium.
//!
//! pdfium wraps a C++ library with thread-local state that must not run on
//! a tokio worker, so every call goes through `spawn_blocking`.
//!
//! The longest edge is capped in pixels rather than set by DPI: résumés are
//! almost always Letter or A4, but the odd poster-sized export would
//! otherwise allocate hundreds of megabytes.

use crate::error::AdapterError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::debug;

/// Rasterise up to `max_pages` leading pages of an in-memory PDF.
///
/// Returns at least one image on success; a document with zero pages is an
/// [`AdapterError::Empty`].
pub async fn render_leading_pages(
    pdf: Vec<u8>,
    max_pixels: u32,
    max_pages: usize,
) -> Result<Vec<DynamicImage>, AdapterError> {
    tokio::task::spawn_blocking(move || render_blocking(&pdf, max_pixels, max_pages))
        .await
        .map_err(|e| AdapterError::Join(format!("Render task panicked: {}", e)))?
}

fn render_blocking(
    pdf: &[u8],
    max_pixels: u32,
    max_pages: usize,
) -> Result<Vec<DynamicImage>, AdapterError> {
    let pdfium = Pdfium::default();

    let document = pdfium
        .load_pdf_from_byte_slice(pdf, None)
        .map_err(|e| AdapterError::Render(format!("cannot open PDF: {:?}", e)))?;

    let pages = document.pages();
    let total = pages.len() as usize;
    if total == 0 {
        return Err(AdapterError::Empty {
            what: "PDF renderer",
        });
    }

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let count = total.min(max_pages.max(1));
    let mut images = Vec::with_capacity(count);

    for idx in 0..count {
        let page = pages
            .get(idx as u16)
            .map_err(|e| AdapterError::Render(format!("page {}: {:?}", idx + 1, e)))?;

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| AdapterError::Render(format!("page {}: {:?}", idx + 1, e)))?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {}/{} → {}x{} px",
            idx + 1,
            total,
            image.width(),
            image.height()
        );
        images.push(image);
    }

    Ok(images)
}
