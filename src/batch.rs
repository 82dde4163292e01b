//! Batch request types: the files a user submitted plus their shared job context.

use crate::error::PipelineError;
use crate::record::JobContext;
use std::fmt;
use std::path::Path;

pub const PDF_MIME: &str = "application/pdf";
pub const PNG_MIME: &str = "image/png";

/// An in-memory file travelling through the pipeline: a submitted résumé or
/// a derived preview image.
#[derive(Clone, PartialEq, Eq)]
pub struct InputFile {
    /// Display name, e.g. `"jane-doe.pdf"`. Used in logs and skip reasons.
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl InputFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn pdf(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(name, PDF_MIME, bytes)
    }

    pub fn png(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(name, PNG_MIME, bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File name without its extension (`"cv.pdf"` → `"cv"`).
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("file")
    }
}

// Bytes are elided; a résumé dump in a log line helps nobody.
impl fmt::Debug for InputFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// One submission: an ordered, non-empty list of files sharing a job context.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    context: JobContext,
    files: Vec<InputFile>,
}

impl BatchRequest {
    /// Validate and build a request.
    ///
    /// # Errors
    /// [`PipelineError::EmptyBatch`] when `files` is empty.
    pub fn new(context: JobContext, files: Vec<InputFile>) -> Result<Self, PipelineError> {
        if files.is_empty() {
            return Err(PipelineError::EmptyBatch);
        }
        Ok(Self { context, files })
    }

    pub fn context(&self) -> &JobContext {
        &self.context
    }

    pub fn files(&self) -> &[InputFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Always false for a constructed request.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
