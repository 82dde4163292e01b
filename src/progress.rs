//! Progress state, the per-file stage machine, and the observer trait.
//!
//! The orchestrator never shares mutable UI fields. Instead, every stage
//! transition produces a fresh [`ProgressState`] value which is
//!
//! * published on a [`tokio::sync::watch`] channel: poll it with
//!   [`ProgressTracker::current`], await changes with
//!   [`ProgressTracker::subscribe`], or consume it as a stream with
//!   [`ProgressTracker::stream`];
//! * handed to the configured [`ProgressObserver`], which also receives
//!   per-file and per-batch events.
//!
//! The label is published *before* the stage's adapter call is issued, so
//! an observer always sees the stage that is about to run.
//!
//! # Example
//!
//! ```rust
//! use resume_scan::{ProgressObserver, ProgressState};
//! use std::sync::Mutex;
//!
//! #[derive(Default)]
//! struct Labels(Mutex<Vec<String>>);
//!
//! impl ProgressObserver for Labels {
//!     fn on_progress(&self, state: &ProgressState) {
//!         self.0.lock().unwrap().push(state.label.clone());
//!     }
//! }
//! ```

use crate::error::SkipReason;
use crate::orchestrator::{BatchReport, FileOutcome};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// Label shown once every file of the batch has been attempted.
pub const COMPLETION_LABEL: &str = "Analysis complete! Redirecting...";

// ── Per-file stage machine ───────────────────────────────────────────────

/// Where a single file is in its pipeline.
///
/// ```text
/// Idle → UploadingOriginal → ConvertingArtifact → UploadingArtifact
///      → PersistingPartial → Scoring → PersistingFinal → Done
/// ```
///
/// Any non-terminal state may move straight to `Skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStage {
    Idle,
    UploadingOriginal,
    ConvertingArtifact,
    UploadingArtifact,
    PersistingPartial,
    Scoring,
    PersistingFinal,
    Done,
    Skipped,
}

impl FileStage {
    /// The working stages, in execution order.
    pub const PIPELINE: [FileStage; 6] = [
        FileStage::UploadingOriginal,
        FileStage::ConvertingArtifact,
        FileStage::UploadingArtifact,
        FileStage::PersistingPartial,
        FileStage::Scoring,
        FileStage::PersistingFinal,
    ];

    /// Human-readable description shown while the stage runs.
    pub fn label(self) -> Option<&'static str> {
        match self {
            FileStage::UploadingOriginal => Some("Uploading file..."),
            FileStage::ConvertingArtifact => Some("Converting to image..."),
            FileStage::UploadingArtifact => Some("Uploading image..."),
            FileStage::PersistingPartial => Some("Preparing data..."),
            FileStage::Scoring => Some("Analyzing with AI..."),
            FileStage::PersistingFinal => Some("Saving feedback..."),
            FileStage::Idle | FileStage::Done | FileStage::Skipped => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, FileStage::Done | FileStage::Skipped)
    }

    /// The stage that follows this one on the success path.
    ///
    /// Terminal stages map to themselves.
    pub fn next(self) -> FileStage {
        match self {
            FileStage::Idle => FileStage::UploadingOriginal,
            FileStage::UploadingOriginal => FileStage::ConvertingArtifact,
            FileStage::ConvertingArtifact => FileStage::UploadingArtifact,
            FileStage::UploadingArtifact => FileStage::PersistingPartial,
            FileStage::PersistingPartial => FileStage::Scoring,
            FileStage::Scoring => FileStage::PersistingFinal,
            FileStage::PersistingFinal => FileStage::Done,
            FileStage::Done => FileStage::Done,
            FileStage::Skipped => FileStage::Skipped,
        }
    }
}

impl fmt::Display for FileStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileStage::Idle => "idle",
            FileStage::UploadingOriginal => "uploading the original",
            FileStage::ConvertingArtifact => "converting to image",
            FileStage::UploadingArtifact => "uploading the image",
            FileStage::PersistingPartial => "saving the initial record",
            FileStage::Scoring => "analyzing",
            FileStage::PersistingFinal => "saving feedback",
            FileStage::Done => "done",
            FileStage::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

// ── Batch-level state ────────────────────────────────────────────────────

/// Lifecycle of a whole batch. There is no failure terminal: a batch always
/// reaches `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    #[default]
    Idle,
    Running,
    Completed,
}

/// Snapshot of batch progress, recomputed on every stage transition.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgressState {
    /// Files that reached [`FileStage::Done`] so far.
    pub completed: usize,
    /// Files in the batch.
    pub total: usize,
    /// Text for the user, e.g. `"Processing 2 of 3: Uploading image..."`.
    pub label: String,
    pub batch: BatchState,
}

impl ProgressState {
    /// The 1-based position shown in stage labels: `completed + 1`.
    ///
    /// Skipped files do not advance `completed`, so this is not the file's
    /// index in the batch.
    pub fn position(&self) -> usize {
        self.completed + 1
    }
}

/// Format the label for a stage: `"Processing <n> of <total>: <stage>"`.
pub fn stage_label(position: usize, total: usize, stage: FileStage) -> String {
    format!(
        "Processing {} of {}: {}",
        position,
        total,
        stage.label().unwrap_or_default()
    )
}

// ── Observer trait ───────────────────────────────────────────────────────

/// Called by the orchestrator as the batch advances.
///
/// All methods default to no-ops so implementors override only what they
/// need. Files are processed sequentially, so calls never overlap for one
/// orchestrator, but the trait is `Send + Sync` because the orchestrator
/// may be driven from any tokio worker.
pub trait ProgressObserver: Send + Sync {
    /// Called once when a batch starts, after the state has been reset.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called every time a new [`ProgressState`] is published.
    fn on_progress(&self, state: &ProgressState) {
        let _ = state;
    }

    /// Called when a file reaches [`FileStage::Done`].
    ///
    /// `index` is the file's 1-based position in the submitted batch.
    fn on_file_complete(&self, index: usize, total_files: usize, outcome: &FileOutcome) {
        let _ = (index, total_files, outcome);
    }

    /// Called when a file is skipped.
    fn on_file_skipped(&self, index: usize, total_files: usize, reason: &SkipReason) {
        let _ = (index, total_files, reason);
    }

    /// Called once after the terminal label is published, before the
    /// completion delay and the completion notifier.
    fn on_batch_complete(&self, report: &BatchReport) {
        let _ = report;
    }
}

/// A no-op observer; the default when none is configured.
pub struct NoopProgressObserver;

impl ProgressObserver for NoopProgressObserver {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn ProgressObserver>;

// ── Tracker ──────────────────────────────────────────────────────────────

/// Owns the current [`ProgressState`] and fans it out to subscribers.
pub struct ProgressTracker {
    tx: watch::Sender<ProgressState>,
    observer: ProgressCallback,
}

impl ProgressTracker {
    pub fn new(observer: Option<ProgressCallback>) -> Self {
        let (tx, _rx) = watch::channel(ProgressState::default());
        Self {
            tx,
            observer: observer.unwrap_or_else(|| Arc::new(NoopProgressObserver)),
        }
    }

    /// The latest published state.
    pub fn current(&self) -> ProgressState {
        self.tx.borrow().clone()
    }

    /// A receiver that is notified on every published state.
    pub fn subscribe(&self) -> watch::Receiver<ProgressState> {
        self.tx.subscribe()
    }

    /// The published states as a `Stream`, starting with the current one.
    ///
    /// A slow consumer only sees the latest state, never a backlog.
    pub fn stream(&self) -> WatchStream<ProgressState> {
        WatchStream::new(self.tx.subscribe())
    }

    pub(crate) fn observer(&self) -> &ProgressCallback {
        &self.observer
    }

    /// Reset to an empty running state for a new batch of `total` files.
    pub(crate) fn start_batch(&self, total: usize) {
        self.publish(ProgressState {
            completed: 0,
            total,
            label: String::new(),
            batch: BatchState::Running,
        });
        self.observer.on_batch_start(total);
    }

    /// Publish the label for `stage` of the file at position `completed + 1`.
    pub(crate) fn enter_stage(&self, completed: usize, total: usize, stage: FileStage) {
        self.publish(ProgressState {
            completed,
            total,
            label: stage_label(completed + 1, total, stage),
            batch: BatchState::Running,
        });
    }

    /// Publish the terminal label and mark the batch completed.
    pub(crate) fn finish_batch(&self, completed: usize, total: usize) {
        self.publish(ProgressState {
            completed,
            total,
            label: COMPLETION_LABEL.to_string(),
            batch: BatchState::Completed,
        });
    }

    fn publish(&self, state: ProgressState) {
        self.observer.on_progress(&state);
        self.tx.send_replace(state);
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(None)
    }
}
