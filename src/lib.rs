//! # resume-scan
//!
//! Batch résumé analysis with Vision Language Models (VLMs).
//!
//! Submit one or more PDF résumés together with a job (company, title,
//! description). Each résumé is uploaded, previewed as an image, recorded,
//! and scored by a VLM against the job. Progress is reported as it goes,
//! and a résumé that fails at any step is skipped without stopping the
//! rest of the batch.
//!
//! ## Pipeline Overview
//!
//! ```text
//! résumé.pdf
//!  │
//!  ├─ 1. Upload    store the original, get a reference
//!  ├─ 2. Convert   render page 1 to a PNG preview (pdfium, spawn_blocking)
//!  ├─ 3. Upload    store the preview
//!  ├─ 4. Persist   write the record with empty feedback ("resume:<uuid>")
//!  ├─ 5. Score     send rendered pages + instructions to the VLM
//!  └─ 6. Persist   parse the feedback JSON and rewrite the record
//! ```
//!
//! Each step goes through a trait in [`adapters`], so storage, rendering,
//! persistence and scoring can all be replaced.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use resume_scan::{BatchOrchestrator, BatchRequest, JobContext, PipelineConfig};
//! use resume_scan::pipeline::input::load_input;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = PipelineConfig::default();
//!     let orchestrator = BatchOrchestrator::from_config(&config).await?;
//!
//!     let file = load_input("jane-doe.pdf", config.download_timeout_secs, config.max_file_bytes).await?;
//!     let request = BatchRequest::new(
//!         JobContext::new("Acme", "Backend Engineer", "Rust, Postgres, Kubernetes"),
//!         vec![file],
//!     )?;
//!
//!     let report = orchestrator.run(request).await;
//!     for outcome in &report.completed {
//!         println!("{}: {}", outcome.file, outcome.feedback["overallScore"]);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `resume-scan` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! resume-scan = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod adapters;
pub mod batch;
pub mod config;
pub mod error;
pub mod id;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod record;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use adapters::{
    ArtifactTransform, CompletionNotifier, RecordStore, ScoringAdapter, StorageAdapter,
};
pub use batch::{BatchRequest, InputFile};
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use error::{AdapterError, PipelineError, SkipReason};
pub use id::{IdGenerator, UuidGenerator};
pub use orchestrator::{BatchOrchestrator, BatchOrchestratorBuilder, BatchReport, FileOutcome};
pub use pipeline::feedback::{parse_feedback, ContentPart, MessageContent, ScoringResponse};
pub use progress::{
    BatchState, FileStage, ProgressCallback, ProgressObserver, ProgressState, COMPLETION_LABEL,
};
pub use record::{JobContext, ProcessingRecord, RecordId, Reference};
