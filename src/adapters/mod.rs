//! Collaborators the orchestrator drives, one trait per boundary.
//!
//! | Trait | Shipped implementation |
//! |-------|------------------------|
//! | [`StorageAdapter`]     | [`LocalStorage`] (files under a root dir) |
//! | [`ArtifactTransform`]  | [`PdfPreviewTransform`] (page 1 → PNG) |
//! | [`RecordStore`]        | [`JsonFileStore`], [`MemoryStore`] |
//! | [`ScoringAdapter`]     | [`VisionScorer`] (edgequake-llm) |
//! | [`CompletionNotifier`] | [`LogNotifier`], [`FnNotifier`] |
//!
//! All traits are `Send + Sync` and held as `Arc<dyn _>`, so any of them
//! can be swapped for a test double.

pub mod notify;
pub mod scoring;
pub mod storage;
pub mod store;
pub mod transform;

pub use notify::{CompletionNotifier, FnNotifier, LogNotifier};
pub use scoring::{resolve_provider, ScoringAdapter, VisionScorer};
pub use storage::{LocalStorage, StorageAdapter};
pub use store::{get_record, put_record, JsonFileStore, MemoryStore, RecordStore};
pub use transform::{ArtifactTransform, PdfPreviewTransform};
