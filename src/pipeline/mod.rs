//! Building blocks shared by the adapters and the CLI.
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ (scorer) ──▶ feedback
//! (path/URL) (pdfium)   (PNG/b64)              (normalise + parse)
//! ```
//!
//! 1. [`input`]: load a local path or URL as an [`crate::InputFile`],
//!    enforcing the PDF-only and size rules
//! 2. [`render`]: rasterise leading pages; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 3. [`encode`]: PNG-encode pages and wrap them for vision requests
//! 4. [`feedback`]: accept both scorer content shapes and parse the JSON

pub mod encode;
pub mod feedback;
pub mod input;
pub mod render;
