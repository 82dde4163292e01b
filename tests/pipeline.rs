//! Integration tests for the batch orchestrator.
//!
//! Every collaborator is an in-memory double, so these run without pdfium,
//! network access or an API key. The doubles append to one shared event log
//! alongside the progress labels, which lets the tests check ordering as
//! well as outcomes.

use async_trait::async_trait;
use resume_scan::adapters::{get_record, FnNotifier, MemoryStore};
use resume_scan::{
    AdapterError, ArtifactTransform, BatchOrchestrator, BatchReport, BatchRequest, BatchState,
    ContentPart, FileOutcome, FileStage, IdGenerator, InputFile, JobContext, ProgressObserver,
    ProgressState, RecordId, RecordStore, Reference, ScoringAdapter, ScoringResponse, SkipReason,
    StorageAdapter, COMPLETION_LABEL,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Log = Arc<Mutex<Vec<String>>>;

const FEEDBACK: &str = r#"{"overallScore": 82, "ATS": {"score": 75, "tips": []}}"#;

// ── Doubles ──────────────────────────────────────────────────────────────────

struct MockStorage {
    log: Log,
    fail: HashSet<String>,
    counter: AtomicUsize,
}

#[async_trait]
impl StorageAdapter for MockStorage {
    async fn upload(&self, file: &InputFile) -> Result<Reference, AdapterError> {
        self.log.lock().unwrap().push(format!("upload {}", file.name));
        if self.fail.contains(&file.name) {
            return Err(AdapterError::Empty { what: "upload" });
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(Reference::new(format!("mem://{n}/{}", file.name)))
    }

    async fn fetch(&self, _reference: &Reference) -> Result<Vec<u8>, AdapterError> {
        Ok(b"%PDF-1.7".to_vec())
    }
}

struct MockTransform {
    log: Log,
    fail: HashSet<String>,
}

#[async_trait]
impl ArtifactTransform for MockTransform {
    async fn convert(&self, file: &InputFile) -> Result<InputFile, AdapterError> {
        self.log.lock().unwrap().push(format!("convert {}", file.name));
        if self.fail.contains(&file.name) {
            return Err(AdapterError::Render("unsupported PDF".into()));
        }
        Ok(InputFile::png(
            format!("{}.png", file.stem()),
            vec![0x89, b'P', b'N', b'G'],
        ))
    }
}

/// Wraps `MemoryStore`, remembering every key written. The write attempts
/// numbered in `fail_writes` (1-based, across the whole batch) fail.
struct CountingStore {
    inner: MemoryStore,
    writes: Mutex<Vec<String>>,
    fail_writes: HashSet<usize>,
    log: Log,
}

impl CountingStore {
    fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordStore for CountingStore {
    async fn set(&self, key: &str, value: String) -> Result<(), AdapterError> {
        self.log.lock().unwrap().push(format!("store {key}"));
        let attempt = {
            let mut writes = self.writes.lock().unwrap();
            writes.push(key.to_string());
            writes.len()
        };
        if self.fail_writes.contains(&attempt) {
            return Err(AdapterError::Io {
                path: "records.json".into(),
                source: std::io::Error::other("disk full"),
            });
        }
        self.inner.set(key, value).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, AdapterError> {
        self.inner.get(key).await
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, AdapterError> {
        self.inner.keys(prefix).await
    }
}

#[derive(Clone)]
enum Reply {
    Text(String),
    Parts(String),
    Fail,
    Panic,
}

type Script = Box<dyn Fn(&str) -> Reply + Send + Sync>;

struct ScriptedScorer {
    log: Log,
    script: Script,
}

#[async_trait]
impl ScoringAdapter for ScriptedScorer {
    async fn score(
        &self,
        original: &Reference,
        instructions: &str,
    ) -> Result<ScoringResponse, AdapterError> {
        let name = original.as_str().rsplit('/').next().unwrap_or_default();
        self.log.lock().unwrap().push(format!("score {name}"));
        assert!(instructions.contains("The job title is: Backend Engineer"));

        match (self.script)(name) {
            Reply::Text(s) => Ok(ScoringResponse::text(s)),
            Reply::Parts(s) => Ok(ScoringResponse::parts(vec![ContentPart::text(s)])),
            Reply::Fail => Err(AdapterError::Empty { what: "scorer" }),
            Reply::Panic => panic!("scorer blew up on {name}"),
        }
    }
}

struct SeqIds(AtomicUsize);

impl IdGenerator for SeqIds {
    fn next_id(&self) -> RecordId {
        RecordId::new(format!("id-{}", self.0.fetch_add(1, Ordering::SeqCst) + 1))
    }
}

#[derive(Default)]
struct Recorder {
    log: Log,
    states: Mutex<Vec<ProgressState>>,
    completed: Mutex<Vec<usize>>,
    skipped: Mutex<Vec<usize>>,
    batch_starts: AtomicUsize,
    batch_completes: AtomicUsize,
}

impl ProgressObserver for Recorder {
    fn on_batch_start(&self, _total_files: usize) {
        self.batch_starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_progress(&self, state: &ProgressState) {
        if !state.label.is_empty() {
            self.log.lock().unwrap().push(state.label.clone());
        }
        self.states.lock().unwrap().push(state.clone());
    }

    fn on_file_complete(&self, index: usize, _total: usize, _outcome: &FileOutcome) {
        self.completed.lock().unwrap().push(index);
    }

    fn on_file_skipped(&self, index: usize, _total: usize, _reason: &SkipReason) {
        self.skipped.lock().unwrap().push(index);
    }

    fn on_batch_complete(&self, _report: &BatchReport) {
        self.batch_completes.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Harness ──────────────────────────────────────────────────────────────────

struct Harness {
    orch: BatchOrchestrator,
    store: Arc<CountingStore>,
    recorder: Arc<Recorder>,
    notified: Arc<AtomicUsize>,
    log: Log,
}

impl Harness {
    fn new(
        fail_upload: &[&str],
        fail_convert: &[&str],
        script: impl Fn(&str) -> Reply + Send + Sync + 'static,
    ) -> Self {
        Self::with_store_failures(fail_upload, fail_convert, &[], script)
    }

    fn with_store_failures(
        fail_upload: &[&str],
        fail_convert: &[&str],
        fail_writes: &[usize],
        script: impl Fn(&str) -> Reply + Send + Sync + 'static,
    ) -> Self {
        let log: Log = Arc::default();
        let store = Arc::new(CountingStore {
            inner: MemoryStore::new(),
            writes: Mutex::default(),
            fail_writes: fail_writes.iter().copied().collect(),
            log: log.clone(),
        });
        let recorder = Arc::new(Recorder {
            log: log.clone(),
            ..Default::default()
        });
        let notified = Arc::new(AtomicUsize::new(0));

        let notifier = {
            let notified = notified.clone();
            let log = log.clone();
            FnNotifier(move |_report: &BatchReport| {
                notified.fetch_add(1, Ordering::SeqCst);
                log.lock().unwrap().push("notify".into());
            })
        };

        let orch = BatchOrchestrator::builder()
            .storage(Arc::new(MockStorage {
                log: log.clone(),
                fail: fail_upload.iter().map(|s| s.to_string()).collect(),
                counter: AtomicUsize::new(0),
            }))
            .transform(Arc::new(MockTransform {
                log: log.clone(),
                fail: fail_convert.iter().map(|s| s.to_string()).collect(),
            }))
            .store(store.clone())
            .scorer(Arc::new(ScriptedScorer {
                log: log.clone(),
                script: Box::new(script),
            }))
            .notifier(Arc::new(notifier))
            .id_generator(Arc::new(SeqIds(AtomicUsize::new(0))))
            .progress_callback(recorder.clone())
            .completion_delay(Duration::ZERO)
            .build()
            .unwrap();

        Self {
            orch,
            store,
            recorder,
            notified,
            log,
        }
    }

    fn all_ok() -> Self {
        Self::new(&[], &[], |_| Reply::Text(FEEDBACK.into()))
    }

    fn labels(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.starts_with("Processing") || e.as_str() == COMPLETION_LABEL)
            .cloned()
            .collect()
    }

    async fn stored_keys(&self) -> Vec<String> {
        self.store.keys("resume:").await.unwrap()
    }
}

fn request(names: &[&str]) -> BatchRequest {
    BatchRequest::new(
        JobContext::new("Acme", "Backend Engineer", "Rust and Postgres"),
        names
            .iter()
            .map(|n| InputFile::pdf(*n, b"%PDF-1.7 fake".to_vec()))
            .collect(),
    )
    .unwrap()
}

fn expected_feedback() -> serde_json::Value {
    serde_json::from_str(FEEDBACK).unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn notifier_fires_once_after_every_file() {
    let h = Harness::new(&["b.pdf"], &["c.pdf"], |_| Reply::Text(FEEDBACK.into()));
    let report = h.orch.run(request(&["a.pdf", "b.pdf", "c.pdf", "d.pdf"])).await;

    assert_eq!(h.notified.load(Ordering::SeqCst), 1);
    assert_eq!(report.total, 4);
    assert_eq!(report.completed_count() + report.skipped_count(), 4);

    let log = h.log.lock().unwrap().clone();
    assert_eq!(log.last().map(String::as_str), Some("notify"));
    assert_eq!(log[log.len() - 2], COMPLETION_LABEL);
    assert_eq!(h.recorder.batch_completes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn early_stage_failures_leave_no_record() {
    // original upload, conversion, artifact upload
    let h = Harness::new(&["up.pdf", "art.png"], &["conv.pdf"], |_| {
        Reply::Text(FEEDBACK.into())
    });
    let report = h.orch.run(request(&["up.pdf", "conv.pdf", "art.pdf"])).await;

    assert!(report.completed.is_empty());
    let stages: Vec<FileStage> = report.skipped.iter().map(SkipReason::stage).collect();
    assert_eq!(
        stages,
        [
            FileStage::UploadingOriginal,
            FileStage::ConvertingArtifact,
            FileStage::UploadingArtifact,
        ]
    );
    assert!(report.skipped.iter().all(|s| s.record_key().is_none()));
    assert!(h.store.writes().is_empty());
    assert!(h.stored_keys().await.is_empty());
    assert_eq!(h.notified.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn scoring_failure_leaves_one_partial_record() {
    let h = Harness::new(&[], &[], |_| Reply::Fail);
    let report = h.orch.run(request(&["a.pdf"])).await;

    assert_eq!(report.skipped.len(), 1);
    let skip = &report.skipped[0];
    assert!(matches!(skip, SkipReason::ScoringFailed { .. }));
    assert_eq!(skip.file(), "a.pdf");
    assert_eq!(skip.record_key(), Some("resume:id-1"));

    assert_eq!(h.store.writes(), ["resume:id-1"]);
    let record = get_record(h.store.as_ref(), &RecordId::new("id-1"))
        .await
        .unwrap()
        .unwrap();
    assert!(!record.original_path.is_empty());
    assert!(!record.artifact_path.is_empty());
    assert!(record.feedback.is_none());
    assert_eq!(record.context.company_name, "Acme");
}

#[tokio::test]
async fn unparseable_feedback_leaves_partial_record() {
    let h = Harness::new(&[], &[], |_| Reply::Text("Sorry, I cannot help with that.".into()));
    let report = h.orch.run(request(&["a.pdf"])).await;

    assert!(matches!(
        report.skipped.as_slice(),
        [SkipReason::ScoringFailed { .. }]
    ));
    assert_eq!(h.stored_keys().await, ["resume:id-1"]);
    let record = get_record(h.store.as_ref(), &RecordId::new("id-1"))
        .await
        .unwrap()
        .unwrap();
    assert!(!record.has_feedback());
}

#[tokio::test]
async fn null_or_empty_feedback_is_a_scoring_failure() {
    let h = Harness::new(&[], &[], |name| match name {
        "null.pdf" => Reply::Text("null".into()),
        "empty.pdf" => Reply::Text("\"\"".into()),
        _ => Reply::Parts("```json\nnull\n```".into()),
    });
    let report = h
        .orch
        .run(request(&["null.pdf", "empty.pdf", "fenced.pdf"]))
        .await;

    assert!(report.completed.is_empty());
    assert_eq!(report.skipped.len(), 3);
    assert!(report
        .skipped
        .iter()
        .all(|s| matches!(s, SkipReason::ScoringFailed { .. })));

    // Only the stage-4 writes happened, and they remain the final state.
    assert_eq!(
        h.store.writes(),
        ["resume:id-1", "resume:id-2", "resume:id-3"]
    );
    for id in ["id-1", "id-2", "id-3"] {
        let record = get_record(h.store.as_ref(), &RecordId::new(id))
            .await
            .unwrap()
            .unwrap();
        assert!(!record.has_feedback());
    }
    let states = h.recorder.states.lock().unwrap();
    assert_eq!(states.last().unwrap().completed, 0);
}

#[tokio::test]
async fn store_failures_skip_the_file_and_keep_going() {
    // Writes: a.pdf 1,2; b.pdf 3,4 (final fails); c.pdf 5 (partial fails).
    let h = Harness::with_store_failures(&[], &[], &[4, 5], |_| Reply::Text(FEEDBACK.into()));
    let report = h.orch.run(request(&["a.pdf", "b.pdf", "c.pdf"])).await;

    assert_eq!(report.completed.len(), 1);
    assert_eq!(report.completed[0].file, "a.pdf");

    let [final_failed, partial_failed] = report.skipped.as_slice() else {
        panic!("expected two skips, got {:?}", report.skipped);
    };
    assert!(matches!(final_failed, SkipReason::StoreFailed { .. }));
    assert_eq!(final_failed.file(), "b.pdf");
    assert_eq!(final_failed.stage(), FileStage::PersistingFinal);
    assert_eq!(final_failed.record_key(), Some("resume:id-2"));

    assert!(matches!(partial_failed, SkipReason::StoreFailed { .. }));
    assert_eq!(partial_failed.file(), "c.pdf");
    assert_eq!(partial_failed.stage(), FileStage::PersistingPartial);
    assert_eq!(partial_failed.record_key(), Some("resume:id-3"));

    // b.pdf keeps its stage-4 record; c.pdf never got one.
    assert_eq!(h.stored_keys().await, ["resume:id-1", "resume:id-2"]);
    let partial = get_record(h.store.as_ref(), &RecordId::new("id-2"))
        .await
        .unwrap()
        .unwrap();
    assert!(!partial.has_feedback());
    assert!(partial.original_path.as_str().ends_with("/b.pdf"));

    let log = h.log.lock().unwrap().clone();
    assert!(!log.contains(&"score c.pdf".to_string()));
    assert_eq!(log.last().map(String::as_str), Some("notify"));
    assert_eq!(h.notified.load(Ordering::SeqCst), 1);
    assert_eq!(*h.recorder.completed.lock().unwrap(), [1]);
    assert_eq!(*h.recorder.skipped.lock().unwrap(), [2, 3]);
}

#[tokio::test]
async fn success_writes_the_same_key_twice() {
    let h = Harness::all_ok();
    let report = h.orch.run(request(&["a.pdf"])).await;

    assert!(report.all_succeeded());
    let outcome = &report.completed[0];
    assert_eq!(outcome.key, "resume:id-1");
    assert_eq!(h.store.writes(), ["resume:id-1", "resume:id-1"]);
    assert_eq!(h.stored_keys().await.len(), 1);

    let record = get_record(h.store.as_ref(), &outcome.record_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.feedback, Some(expected_feedback()));
    assert_eq!(record.feedback.as_ref(), Some(&outcome.feedback));
    assert!(record.original_path.as_str().ends_with("/a.pdf"));
    assert!(record.artifact_path.as_str().ends_with("/a.png"));
}

#[tokio::test]
async fn progress_counter_is_monotonic_and_bounded() {
    let h = Harness::new(&["b.pdf"], &[], |name| match name {
        "d.pdf" => Reply::Fail,
        _ => Reply::Text(FEEDBACK.into()),
    });
    h.orch
        .run(request(&["a.pdf", "b.pdf", "c.pdf", "d.pdf", "e.pdf"]))
        .await;

    let positions: Vec<usize> = h
        .labels()
        .iter()
        .filter_map(|l| l.strip_prefix("Processing "))
        .map(|rest| {
            let (n, tail) = rest.split_once(" of ").unwrap();
            assert!(tail.starts_with("5: "), "unexpected label tail: {tail}");
            n.parse().unwrap()
        })
        .collect();

    assert!(!positions.is_empty());
    assert!(positions.windows(2).all(|w| w[0] <= w[1]));
    assert!(positions.iter().all(|&n| (1..=5).contains(&n)));

    let states = h.recorder.states.lock().unwrap();
    assert!(states.windows(2).all(|w| w[0].completed <= w[1].completed));
    assert!(states.iter().all(|s| s.completed <= s.total));
    assert_eq!(states.last().unwrap().completed, 3);
}

#[tokio::test]
async fn upload_failure_scenario_label_sequence() {
    let h = Harness::new(&["B.pdf"], &[], |_| Reply::Text(FEEDBACK.into()));
    let report = h.orch.run(request(&["A.pdf", "B.pdf"])).await;

    assert_eq!(
        h.labels(),
        [
            "Processing 1 of 2: Uploading file...",
            "Processing 1 of 2: Converting to image...",
            "Processing 1 of 2: Uploading image...",
            "Processing 1 of 2: Preparing data...",
            "Processing 1 of 2: Analyzing with AI...",
            "Processing 1 of 2: Saving feedback...",
            "Processing 2 of 2: Uploading file...",
            COMPLETION_LABEL,
        ]
    );
    assert_eq!(h.stored_keys().await, ["resume:id-1"]);
    assert_eq!(report.completed[0].file, "A.pdf");
    assert_eq!(report.skipped[0].file(), "B.pdf");
    assert_eq!(*h.recorder.completed.lock().unwrap(), [1]);
    assert_eq!(*h.recorder.skipped.lock().unwrap(), [2]);
    assert_eq!(h.notified.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn labels_are_published_before_each_call() {
    let h = Harness::all_ok();
    h.orch.run(request(&["a.pdf"])).await;

    let log = h.log.lock().unwrap().clone();
    assert_eq!(
        log,
        [
            "Processing 1 of 1: Uploading file...",
            "upload a.pdf",
            "Processing 1 of 1: Converting to image...",
            "convert a.pdf",
            "Processing 1 of 1: Uploading image...",
            "upload a.png",
            "Processing 1 of 1: Preparing data...",
            "store resume:id-1",
            "Processing 1 of 1: Analyzing with AI...",
            "score a.pdf",
            "Processing 1 of 1: Saving feedback...",
            "store resume:id-1",
            COMPLETION_LABEL,
            "notify",
        ]
    );
}

#[tokio::test]
async fn string_and_list_content_persist_identical_feedback() {
    let fenced = format!("```json\n{FEEDBACK}\n```");
    let h = Harness::new(&[], &[], move |name| match name {
        "text.pdf" => Reply::Text(FEEDBACK.into()),
        "parts.pdf" => Reply::Parts(FEEDBACK.into()),
        _ => Reply::Text(fenced.clone()),
    });
    let report = h
        .orch
        .run(request(&["text.pdf", "parts.pdf", "fenced.pdf"]))
        .await;
    assert!(report.all_succeeded());

    let mut persisted = Vec::new();
    for outcome in &report.completed {
        let record = get_record(h.store.as_ref(), &outcome.record_id)
            .await
            .unwrap()
            .unwrap();
        persisted.push(record.feedback.unwrap());
    }
    assert_eq!(persisted[0], expected_feedback());
    assert_eq!(persisted[0], persisted[1]);
    assert_eq!(persisted[1], persisted[2]);
}

#[tokio::test]
async fn panic_in_adapter_is_contained() {
    let h = Harness::new(&[], &[], |name| match name {
        "a.pdf" => Reply::Panic,
        _ => Reply::Text(FEEDBACK.into()),
    });
    let report = h.orch.run(request(&["a.pdf", "b.pdf"])).await;

    assert!(matches!(
        &report.skipped[0],
        SkipReason::Panicked { file, detail, .. } if file == "a.pdf" && detail.contains("blew up")
    ));
    assert_eq!(report.skipped[0].record_key(), Some("resume:id-1"));
    assert_eq!(report.completed.len(), 1);
    assert_eq!(report.completed[0].file, "b.pdf");
    // a.pdf panicked after stage 4, so its partial record is still there
    assert_eq!(h.stored_keys().await, ["resume:id-1", "resume:id-2"]);
    let mut reported = report.record_keys();
    reported.sort_unstable();
    assert_eq!(reported, ["resume:id-1", "resume:id-2"]);
    assert_eq!(h.notified.load(Ordering::SeqCst), 1);
    assert_eq!(h.orch.progress().batch, BatchState::Completed);
}

#[tokio::test]
async fn progress_is_observable_by_subscription() {
    use tokio_stream::StreamExt;

    let h = Harness::all_ok();
    let rx = h.orch.subscribe();
    let mut stream = h.orch.progress_stream();

    let initial = stream.next().await.unwrap();
    assert_eq!(initial.batch, BatchState::Idle);
    assert!(initial.label.is_empty());

    h.orch.run(request(&["a.pdf", "b.pdf"])).await;

    let last = stream.next().await.unwrap();
    assert_eq!(last.batch, BatchState::Completed);
    assert_eq!(last.label, COMPLETION_LABEL);
    assert_eq!(*rx.borrow(), last);
    assert_eq!(h.orch.progress(), last);
    assert_eq!((last.completed, last.total), (2, 2));
}

#[tokio::test]
async fn each_batch_starts_from_empty_progress() {
    let h = Harness::all_ok();
    h.orch.run(request(&["a.pdf", "b.pdf"])).await;
    let second = h.orch.run(request(&["c.pdf"])).await;

    assert_eq!(second.total, 1);
    assert_eq!(h.recorder.batch_starts.load(Ordering::SeqCst), 2);
    assert_eq!(h.notified.load(Ordering::SeqCst), 2);
    assert!(h
        .labels()
        .contains(&"Processing 1 of 1: Uploading file...".to_string()));

    let states = h.recorder.states.lock().unwrap();
    let resets = states
        .iter()
        .filter(|s| s.batch == BatchState::Running && s.label.is_empty())
        .count();
    assert_eq!(resets, 2);
    assert_eq!(h.stored_keys().await.len(), 3);
}

#[tokio::test]
async fn default_ids_are_unique_per_file() {
    let log: Log = Arc::default();
    let store = Arc::new(MemoryStore::new());
    let orch = BatchOrchestrator::builder()
        .storage(Arc::new(MockStorage {
            log: log.clone(),
            fail: HashSet::new(),
            counter: AtomicUsize::new(0),
        }))
        .transform(Arc::new(MockTransform {
            log: log.clone(),
            fail: HashSet::new(),
        }))
        .store(store.clone())
        .scorer(Arc::new(ScriptedScorer {
            log,
            script: Box::new(|_| Reply::Text(FEEDBACK.into())),
        }))
        .completion_delay(Duration::ZERO)
        .build()
        .unwrap();

    // Same file name twice: records must still be distinct.
    let report = orch.run(request(&["cv.pdf", "cv.pdf"])).await;
    assert_eq!(report.completed.len(), 2);
    assert_ne!(report.completed[0].key, report.completed[1].key);
    assert_eq!(store.keys("resume:").await.unwrap().len(), 2);
}
