//! The batch pipeline controller.
//!
//! [`BatchOrchestrator::run`] takes a [`BatchRequest`] and drives each file,
//! one at a time, through six stages:
//!
//! ```text
//! upload original ─▶ convert ─▶ upload artifact ─▶ persist partial ─▶ score ─▶ persist final
//!     (storage)     (transform)     (storage)         (store)       (scorer)     (store)
//! ```
//!
//! A failing stage skips the rest of that file and the batch moves on. The
//! partial record written at stage 4 is never removed, so a file that fails
//! while scoring still leaves its upload references behind.
//!
//! `run` never returns an error. What happened to each file is reported in
//! the returned [`BatchReport`], through the [`ProgressObserver`], and on the
//! progress channel.

use crate::adapters::notify::{CompletionNotifier, LogNotifier};
use crate::adapters::scoring::{ScoringAdapter, VisionScorer};
use crate::adapters::storage::{LocalStorage, StorageAdapter};
use crate::adapters::store::{put_record, JsonFileStore, RecordStore};
use crate::adapters::transform::{ArtifactTransform, PdfPreviewTransform};
use crate::batch::{BatchRequest, InputFile};
use crate::config::PipelineConfig;
use crate::error::{AdapterError, PipelineError, SkipReason};
use crate::id::{IdGenerator, UuidGenerator};
use crate::pipeline::feedback::parse_feedback;
use crate::progress::{FileStage, ProgressCallback, ProgressState, ProgressTracker};
use crate::prompts::prepare_instructions;
use crate::record::{JobContext, ProcessingRecord, RecordId, Reference};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, error, info, warn};

/// A file that went through all six stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOutcome {
    pub file: String,
    pub record_id: RecordId,
    /// Store key the record was written under, twice.
    pub key: String,
    pub feedback: Value,
}

/// Aggregated result of one [`BatchOrchestrator::run`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// Files submitted.
    pub total: usize,
    /// Files that reached `Done`, in submission order.
    pub completed: Vec<FileOutcome>,
    /// Files that were skipped, in submission order.
    pub skipped: Vec<SkipReason>,
    /// Wall time from batch start to the terminal label.
    pub duration_ms: u64,
}

impl BatchReport {
    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// `true` when no file was skipped.
    pub fn all_succeeded(&self) -> bool {
        self.skipped.is_empty() && self.completed.len() == self.total
    }

    /// Keys of every record this batch left in the store, finished or partial.
    pub fn record_keys(&self) -> Vec<&str> {
        let finished = self.completed.iter().map(|o| o.key.as_str());
        let partial = self.skipped.iter().filter_map(SkipReason::record_key);
        finished.chain(partial).collect()
    }
}

/// Drives batches of résumés through the upload → convert → persist → score
/// pipeline.
///
/// Build one with [`BatchOrchestrator::builder`] to plug in your own
/// adapters, or [`BatchOrchestrator::from_config`] for the shipped local
/// implementations.
pub struct BatchOrchestrator {
    storage: Arc<dyn StorageAdapter>,
    transform: Arc<dyn ArtifactTransform>,
    store: Arc<dyn RecordStore>,
    scorer: Arc<dyn ScoringAdapter>,
    notifier: Arc<dyn CompletionNotifier>,
    ids: Arc<dyn IdGenerator>,
    progress: ProgressTracker,
    completion_delay: Duration,
    batch_lock: Mutex<()>,
}

impl BatchOrchestrator {
    pub fn builder() -> BatchOrchestratorBuilder {
        BatchOrchestratorBuilder::default()
    }

    /// Wire the shipped adapters from `config`: [`LocalStorage`],
    /// [`PdfPreviewTransform`], [`JsonFileStore`], [`VisionScorer`] and
    /// [`LogNotifier`].
    ///
    /// # Errors
    /// Fails when the storage directory or record store cannot be opened,
    /// or when no LLM provider can be resolved.
    pub async fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let storage: Arc<dyn StorageAdapter> = Arc::new(
            LocalStorage::open(&config.storage_dir)
                .await
                .map_err(|e| {
                    PipelineError::InvalidConfig(format!(
                        "storage directory {}: {}",
                        config.storage_dir.display(),
                        e
                    ))
                })?,
        );
        let store = JsonFileStore::open(&config.store_path).await?;
        let scorer = VisionScorer::from_config(config, Arc::clone(&storage))?;

        let mut builder = Self::builder()
            .storage(storage)
            .transform(Arc::new(PdfPreviewTransform::new(config.preview_max_pixels)))
            .store(Arc::new(store))
            .scorer(Arc::new(scorer))
            .notifier(Arc::new(LogNotifier))
            .completion_delay(config.completion_delay());
        if let Some(ref cb) = config.progress_callback {
            builder = builder.progress_callback(Arc::clone(cb));
        }
        builder.build()
    }

    /// The latest published progress.
    pub fn progress(&self) -> ProgressState {
        self.progress.current()
    }

    /// Receiver notified on every progress change.
    pub fn subscribe(&self) -> watch::Receiver<ProgressState> {
        self.progress.subscribe()
    }

    /// Progress changes as a `Stream`.
    pub fn progress_stream(&self) -> WatchStream<ProgressState> {
        self.progress.stream()
    }

    /// The record store this orchestrator writes to.
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Process every file in `request`, then fire the completion notifier.
    ///
    /// Files are processed strictly in order; a failure or panic in one
    /// file is recorded as a [`SkipReason`] and never aborts the batch. If
    /// another batch is running on this orchestrator, waits for it first.
    pub async fn run(&self, request: BatchRequest) -> BatchReport {
        let _running = self.batch_lock.lock().await;
        let start = Instant::now();
        let total = request.len();
        let context = request.context();
        let observer = Arc::clone(self.progress.observer());

        info!(
            "Starting batch: {} file(s) for '{}' at '{}'",
            total, context.job_title, context.company_name
        );
        self.progress.start_batch(total);

        let mut report = BatchReport {
            total,
            ..Default::default()
        };

        for (idx, file) in request.files().iter().enumerate() {
            let completed = report.completed.len();
            let mut persisted = None;
            let caught = AssertUnwindSafe(self.process_file(
                file,
                context,
                completed,
                total,
                &mut persisted,
            ))
            .catch_unwind()
            .await;
            let result = caught.unwrap_or_else(|payload| {
                Err(SkipReason::Panicked {
                    file: file.name.clone(),
                    key: persisted.take(),
                    detail: panic_message(payload.as_ref()),
                })
            });

            match result {
                Ok(outcome) => {
                    info!("Analysed {} → {}", outcome.file, outcome.key);
                    observer.on_file_complete(idx + 1, total, &outcome);
                    report.completed.push(outcome);
                }
                Err(reason) => {
                    warn!("Skipping {}: {}", file.name, reason);
                    observer.on_file_skipped(idx + 1, total, &reason);
                    report.skipped.push(reason);
                }
            }
        }

        self.progress.finish_batch(report.completed.len(), total);
        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Batch complete: {}/{} analysed in {}ms",
            report.completed.len(),
            total,
            report.duration_ms
        );
        observer.on_batch_complete(&report);

        if !self.completion_delay.is_zero() {
            tokio::time::sleep(self.completion_delay).await;
        }
        let notify = std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.notifier.on_batch_done(&report)
        }));
        if let Err(payload) = notify {
            error!(
                "Completion notifier panicked: {}",
                panic_message(payload.as_ref())
            );
        }

        report
    }

    /// Run the six stages for one file.
    ///
    /// `completed` is the number of files already done in this batch; it
    /// stays fixed while this file runs, so every label shows the same `n`.
    /// `persisted` receives the record key once stage 4 has succeeded.
    async fn process_file(
        &self,
        file: &InputFile,
        context: &JobContext,
        completed: usize,
        total: usize,
        persisted: &mut Option<String>,
    ) -> Result<FileOutcome, SkipReason> {
        let enter = |stage| self.progress.enter_stage(completed, total, stage);
        let name = || file.name.clone();

        // ── Stage 1: upload original ─────────────────────────────────────
        enter(FileStage::UploadingOriginal);
        let original = self
            .storage
            .upload(file)
            .await
            .and_then(non_empty)
            .map_err(|e| SkipReason::UploadFailed {
                file: name(),
                stage: FileStage::UploadingOriginal,
                detail: e.to_string(),
            })?;
        debug!("{}: original at {}", file.name, original);

        // ── Stage 2: derive artifact ─────────────────────────────────────
        enter(FileStage::ConvertingArtifact);
        let artifact = self
            .transform
            .convert(file)
            .await
            .and_then(|a| {
                if a.is_empty() {
                    Err(AdapterError::Empty { what: "transform" })
                } else {
                    Ok(a)
                }
            })
            .map_err(|e| SkipReason::ConversionFailed {
                file: name(),
                detail: e.to_string(),
            })?;

        // ── Stage 3: upload artifact ─────────────────────────────────────
        enter(FileStage::UploadingArtifact);
        let artifact_path = self
            .storage
            .upload(&artifact)
            .await
            .and_then(non_empty)
            .map_err(|e| SkipReason::UploadFailed {
                file: name(),
                stage: FileStage::UploadingArtifact,
                detail: e.to_string(),
            })?;
        debug!("{}: artifact at {}", file.name, artifact_path);

        // ── Stage 4: persist partial record ──────────────────────────────
        enter(FileStage::PersistingPartial);
        let mut record = ProcessingRecord::partial(
            self.ids.next_id(),
            original.clone(),
            artifact_path,
            context.clone(),
        );
        let key = record.key();
        put_record(self.store.as_ref(), &record)
            .await
            .map_err(|e| SkipReason::StoreFailed {
                file: name(),
                stage: FileStage::PersistingPartial,
                key: key.clone(),
                detail: e.to_string(),
            })?;
        *persisted = Some(key.clone());

        // ── Stage 5: score ───────────────────────────────────────────────
        enter(FileStage::Scoring);
        let instructions = prepare_instructions(&context.job_title, &context.job_description);
        let response = self
            .scorer
            .score(&original, &instructions)
            .await
            .map_err(|e| SkipReason::ScoringFailed {
                file: name(),
                key: key.clone(),
                detail: e.to_string(),
            })?;

        // ── Stage 6: persist final record ────────────────────────────────
        enter(FileStage::PersistingFinal);
        let feedback = parse_feedback(&response).map_err(|e| SkipReason::ScoringFailed {
            file: name(),
            key: key.clone(),
            detail: e.to_string(),
        })?;
        record.feedback = Some(feedback.clone());
        put_record(self.store.as_ref(), &record)
            .await
            .map_err(|e| SkipReason::StoreFailed {
                file: name(),
                stage: FileStage::PersistingFinal,
                key: key.clone(),
                detail: e.to_string(),
            })?;

        Ok(FileOutcome {
            file: name(),
            record_id: record.id,
            key,
            feedback,
        })
    }
}

/// An upload that "succeeded" without a reference counts as a failure.
fn non_empty(reference: Reference) -> Result<Reference, AdapterError> {
    if reference.is_empty() {
        Err(AdapterError::Empty { what: "upload" })
    } else {
        Ok(reference)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ── Builder ──────────────────────────────────────────────────────────────

/// Builder for [`BatchOrchestrator`].
///
/// Storage, transform, store and scorer are required. The notifier defaults
/// to [`LogNotifier`], ids to [`UuidGenerator`], and the completion delay to
/// one second.
pub struct BatchOrchestratorBuilder {
    storage: Option<Arc<dyn StorageAdapter>>,
    transform: Option<Arc<dyn ArtifactTransform>>,
    store: Option<Arc<dyn RecordStore>>,
    scorer: Option<Arc<dyn ScoringAdapter>>,
    notifier: Option<Arc<dyn CompletionNotifier>>,
    ids: Option<Arc<dyn IdGenerator>>,
    progress_callback: Option<ProgressCallback>,
    completion_delay: Duration,
}

impl Default for BatchOrchestratorBuilder {
    fn default() -> Self {
        Self {
            storage: None,
            transform: None,
            store: None,
            scorer: None,
            notifier: None,
            ids: None,
            progress_callback: None,
            completion_delay: Duration::from_millis(1000),
        }
    }
}

impl BatchOrchestratorBuilder {
    pub fn storage(mut self, storage: Arc<dyn StorageAdapter>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn transform(mut self, transform: Arc<dyn ArtifactTransform>) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn scorer(mut self, scorer: Arc<dyn ScoringAdapter>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn CompletionNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.progress_callback = Some(cb);
        self
    }

    pub fn completion_delay(mut self, delay: Duration) -> Self {
        self.completion_delay = delay;
        self
    }

    pub fn build(self) -> Result<BatchOrchestrator, PipelineError> {
        Ok(BatchOrchestrator {
            storage: self.storage.ok_or(PipelineError::MissingAdapter("storage"))?,
            transform: self
                .transform
                .ok_or(PipelineError::MissingAdapter("transform"))?,
            store: self.store.ok_or(PipelineError::MissingAdapter("record store"))?,
            scorer: self.scorer.ok_or(PipelineError::MissingAdapter("scorer"))?,
            notifier: self.notifier.unwrap_or_else(|| Arc::new(LogNotifier)),
            ids: self.ids.unwrap_or_else(|| Arc::new(UuidGenerator)),
            progress: ProgressTracker::new(self.progress_callback),
            completion_delay: self.completion_delay,
            batch_lock: Mutex::new(()),
        })
    }
}
