//! Error types for the resume-scan library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`PipelineError`]: **Fatal**: the batch cannot be set up at all
//!   (empty batch, unreadable input, provider not configured, bad config).
//!   Returned as `Err(PipelineError)` from constructors and loaders.
//!
//! * [`AdapterError`]: a single collaborator call (upload, render, store
//!   write, LLM request) failed. Adapters return it; the orchestrator never
//!   lets it escape a file's pipeline.
//!
//! * [`SkipReason`]: **Non-fatal**: one file did not complete. Stored in
//!   [`crate::orchestrator::BatchReport`] so callers can see exactly which
//!   files were skipped, at which stage, and whether a partial record was
//!   left behind.

use crate::progress::FileStage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the resume-scan library.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// A batch was submitted without any file.
    #[error("Please upload at least one resume: the batch contains no files")]
    EmptyBatch,

    /// Input file was not found at the given path.
    #[error("Resume file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a PDF: '{name}'\nFirst bytes: {magic:?}")]
    NotAPdf { name: String, magic: [u8; 4] },

    /// The file is larger than the accepted upload size.
    #[error("File '{name}' is {size} bytes; the limit is {limit} bytes")]
    FileTooLarge { name: String, size: u64, limit: u64 },

    // ── Collaborator setup ────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The record store could not be opened.
    #[error("Failed to open record store '{path}': {detail}")]
    StoreOpenFailed { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A required collaborator was not supplied to the orchestrator builder.
    #[error("Orchestrator is missing its {0} adapter")]
    MissingAdapter(&'static str),
}

/// A failed call to one of the pipeline's collaborators.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The collaborator answered, but with nothing usable.
    #[error("{what} returned no result")]
    Empty { what: &'static str },

    /// Filesystem or network I/O failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A reference does not point inside the storage root.
    #[error("Reference '{0}' is not managed by this storage")]
    ForeignReference(String),

    /// pdfium could not open or rasterise the document.
    #[error("Rendering failed: {0}")]
    Render(String),

    /// Image encoding failed.
    #[error("Image encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    /// The LLM API returned an error.
    #[error("LLM API error: {0}")]
    Llm(String),

    /// The LLM call did not finish within the adapter's timeout.
    #[error("LLM call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// A record could not be (de)serialised.
    #[error("Serialisation failed: {0}")]
    Serde(#[from] serde_json::Error),

    /// A blocking worker task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Join(String),
}

/// Why one file in a batch did not complete.
///
/// Every variant names the file and the stage it was in; variants raised
/// after stage 4 also carry the key of the partial record they left behind.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// Uploading the original or the artifact failed.
    #[error("{file}: upload failed while {stage}: {detail}")]
    UploadFailed {
        file: String,
        stage: FileStage,
        detail: String,
    },

    /// The preview artifact could not be derived.
    #[error("{file}: conversion to image failed: {detail}")]
    ConversionFailed { file: String, detail: String },

    /// Writing the record to the store failed.
    #[error("{file}: record store write failed while {stage}: {detail}")]
    StoreFailed {
        file: String,
        stage: FileStage,
        key: String,
        detail: String,
    },

    /// The scorer returned nothing, a payload that is not valid JSON, or
    /// JSON that is `null` or `""`.
    #[error("{file}: analysis failed: {detail}")]
    ScoringFailed {
        file: String,
        key: String,
        detail: String,
    },

    /// The file's pipeline panicked; the panic was contained. `key` is set
    /// when the panic came after the partial record was written.
    #[error("{file}: processing panicked: {detail}")]
    Panicked {
        file: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
        detail: String,
    },
}

impl SkipReason {
    /// Name of the file that was skipped.
    pub fn file(&self) -> &str {
        match self {
            SkipReason::UploadFailed { file, .. }
            | SkipReason::ConversionFailed { file, .. }
            | SkipReason::StoreFailed { file, .. }
            | SkipReason::ScoringFailed { file, .. }
            | SkipReason::Panicked { file, .. } => file,
        }
    }

    /// Stage the file was in when it failed.
    ///
    /// A contained panic has no reliable stage and reports [`FileStage::Skipped`].
    pub fn stage(&self) -> FileStage {
        match self {
            SkipReason::UploadFailed { stage, .. } | SkipReason::StoreFailed { stage, .. } => {
                *stage
            }
            SkipReason::ConversionFailed { .. } => FileStage::ConvertingArtifact,
            SkipReason::ScoringFailed { .. } => FileStage::Scoring,
            SkipReason::Panicked { .. } => FileStage::Skipped,
        }
    }

    /// Key of the partial record this file left in the store, if any.
    ///
    /// A failed stage-4 write reports the key it attempted, which may or
    /// may not exist depending on how far the store got.
    pub fn record_key(&self) -> Option<&str> {
        match self {
            SkipReason::StoreFailed { key, .. } | SkipReason::ScoringFailed { key, .. } => {
                Some(key)
            }
            SkipReason::Panicked { key, .. } => key.as_deref(),
            _ => None,
        }
    }
}
