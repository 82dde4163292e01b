//! CLI binary for resume-scan.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig`, loads the résumés, runs one batch and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use resume_scan::adapters::store::{get_record, JsonFileStore};
use resume_scan::pipeline::input::load_inputs;
use resume_scan::{
    BatchOrchestrator, BatchReport, BatchRequest, FileOutcome, JobContext, PipelineConfig,
    ProgressCallback, ProgressObserver, ProgressState, RecordId, SkipReason,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress observer using indicatif ────────────────────────────────────

/// Terminal progress: one bar whose message is the current stage label and
/// whose position is the number of finished résumés.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} [{bar:30.green/238}] {pos}/{len}  {msg}  ⏱ {elapsed}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ProgressObserver for CliProgress {
    fn on_batch_start(&self, total_files: usize) {
        self.bar.set_length(total_files as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Analysing {total_files} résumé(s)…"))
        ));
    }

    fn on_progress(&self, state: &ProgressState) {
        self.bar.set_position(state.completed as u64);
        self.bar.set_message(state.label.clone());
    }

    fn on_file_complete(&self, index: usize, total: usize, outcome: &FileOutcome) {
        let score = outcome
            .feedback
            .get("overallScore")
            .map(|s| s.to_string())
            .unwrap_or_else(|| "?".into());
        self.bar.println(format!(
            "  {} {:>2}/{:<2}  {}  score {}  {}",
            green("✓"),
            index,
            total,
            outcome.file,
            bold(&score),
            dim(&outcome.record_id.to_string()),
        ));
    }

    fn on_file_skipped(&self, index: usize, total: usize, reason: &SkipReason) {
        let msg = reason.to_string();
        let msg = if msg.chars().count() > 100 {
            format!("{}\u{2026}", msg.chars().take(99).collect::<String>())
        } else {
            msg
        };
        self.bar.println(format!(
            "  {} {:>2}/{:<2}  {}",
            red("✗"),
            index,
            total,
            red(&msg)
        ));
    }

    fn on_batch_complete(&self, report: &BatchReport) {
        self.bar.finish_and_clear();
        let mark = if report.skipped.is_empty() {
            green("✔")
        } else if report.completed.is_empty() {
            red("✘")
        } else {
            cyan("⚠")
        };
        eprintln!(
            "{} {}/{} résumés analysed  ({} skipped, {}ms)",
            mark,
            bold(&report.completed_count().to_string()),
            report.total,
            report.skipped_count(),
            report.duration_ms
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyse one résumé against a job
  resume-scan cv.pdf --company Acme --job-title "Backend Engineer" \
      --job-description "Rust, Postgres, Kubernetes"

  # Several résumés, job description from a file, JSON report on stdout
  resume-scan a.pdf b.pdf c.pdf --job-title "Data Engineer" \
      --job-description-file jd.txt --json > report.json

  # Résumé from a URL with a specific model
  resume-scan https://example.com/cv.pdf --provider anthropic \
      --model claude-sonnet-4-20250514 --job-title "SRE"

  # Print a stored record
  resume-scan --show 3f2a9c1e-8d4b-4e6f-9a7c-1b2d3e4f5a6b

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RESUME_SCAN_*           Fallback for every flag, e.g. RESUME_SCAN_STORE
"#;

/// Score PDF résumés against a job description using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "resume-scan",
    version,
    about = "Score PDF résumés against a job description using Vision LLMs",
    long_about = "Upload one or more PDF résumés, render a preview of each, store a record, \
and ask a Vision Language Model for ATS-style feedback against the job you are applying to. \
A résumé that fails at any step is skipped; the rest of the batch carries on.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF paths or HTTP/HTTPS URLs.
    #[arg(required_unless_present = "show")]
    files: Vec<String>,

    /// Company the résumés are submitted to.
    #[arg(long, env = "RESUME_SCAN_COMPANY", default_value = "")]
    company: String,

    /// Title of the job applied for.
    #[arg(long, env = "RESUME_SCAN_JOB_TITLE", default_value = "")]
    job_title: String,

    /// Job description text.
    #[arg(long, env = "RESUME_SCAN_JOB_DESCRIPTION", conflicts_with = "job_description_file")]
    job_description: Option<String>,

    /// Read the job description from this file.
    #[arg(long, env = "RESUME_SCAN_JOB_DESCRIPTION_FILE")]
    job_description_file: Option<PathBuf>,

    /// Directory for uploaded originals and previews.
    #[arg(long, env = "RESUME_SCAN_STORAGE_DIR", default_value = ".resume-scan/files")]
    storage_dir: PathBuf,

    /// JSON file holding the records.
    #[arg(long, env = "RESUME_SCAN_STORE", default_value = ".resume-scan/records.json")]
    store: PathBuf,

    /// LLM model ID (e.g. gpt-4.1-mini, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "RESUME_SCAN_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "RESUME_SCAN_PROVIDER")]
    provider: Option<String>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "RESUME_SCAN_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "RESUME_SCAN_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max LLM output tokens per résumé.
    #[arg(long, env = "RESUME_SCAN_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Pages of each résumé sent to the model (1–10).
    #[arg(long, env = "RESUME_SCAN_PAGES", default_value_t = 2)]
    pages: usize,

    /// Per-résumé LLM call timeout in seconds.
    #[arg(long, env = "RESUME_SCAN_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "RESUME_SCAN_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Largest accepted résumé in bytes.
    #[arg(long, env = "RESUME_SCAN_MAX_FILE_BYTES", default_value_t = resume_scan::config::DEFAULT_MAX_FILE_BYTES)]
    max_file_bytes: u64,

    /// Pause after the final label before finishing, in milliseconds.
    #[arg(long, env = "RESUME_SCAN_COMPLETION_DELAY_MS", default_value_t = 1000)]
    completion_delay_ms: u64,

    /// Print the BatchReport as JSON on stdout.
    #[arg(long, env = "RESUME_SCAN_JSON")]
    json: bool,

    /// Print the stored record with this ID and exit.
    #[arg(long, value_name = "ID")]
    show: Option<String>,

    /// Disable progress bar.
    #[arg(long, env = "RESUME_SCAN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "RESUME_SCAN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "RESUME_SCAN_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; -v brings them back.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && cli.show.is_none();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Show mode ────────────────────────────────────────────────────────
    if let Some(ref id) = cli.show {
        let store = JsonFileStore::open(&cli.store)
            .await
            .context("Failed to open record store")?;
        let record = get_record(&store, &RecordId::new(id.as_str()))
            .await
            .context("Failed to read record")?
            .with_context(|| format!("No record with id '{id}' in {}", cli.store.display()))?;
        println!(
            "{}",
            serde_json::to_string_pretty(&record).context("Failed to serialise record")?
        );
        return Ok(());
    }

    // ── Load résumés ─────────────────────────────────────────────────────
    let loaded = load_inputs(&cli.files, cli.download_timeout, cli.max_file_bytes).await;
    if !cli.quiet {
        for (input, err) in &loaded.rejected {
            eprintln!("{} skipping {}: {}", red("✗"), input, err);
        }
    }
    if loaded.files.is_empty() {
        anyhow::bail!(
            "No valid résumé to analyse ({} input(s) rejected)",
            loaded.rejected.len()
        );
    }
    let files = loaded.files;

    let job_description = match (&cli.job_description, &cli.job_description_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read job description from {:?}", path))?,
        (None, None) => String::new(),
    };
    let context = JobContext::new(cli.company.clone(), cli.job_title.clone(), job_description);
    let request = BatchRequest::new(context, files).context("Nothing to analyse")?;

    // ── Build config + orchestrator ──────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgress::new() as Arc<dyn ProgressObserver>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;
    let orchestrator = BatchOrchestrator::from_config(&config)
        .await
        .context("Failed to set up the pipeline")?;

    // ── Run ──────────────────────────────────────────────────────────────
    let report = orchestrator.run(request).await;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet && !show_progress {
        eprintln!(
            "Analysed {}/{} résumés in {}ms",
            report.completed_count(),
            report.total,
            report.duration_ms
        );
        for skip in &report.skipped {
            eprintln!("  skipped: {skip}");
        }
    }

    if !cli.quiet && !cli.json {
        for outcome in &report.completed {
            println!("{}\t{}", outcome.record_id, outcome.file);
        }
    }

    if report.completed.is_empty() {
        anyhow::bail!("No résumé could be analysed ({} skipped)", report.skipped_count());
    }
    Ok(())
}

/// Map CLI args to `PipelineConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .storage_dir(cli.storage_dir.clone())
        .store_path(cli.store.clone())
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .scoring_pages(cli.pages)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .max_file_bytes(cli.max_file_bytes)
        .completion_delay_ms(cli.completion_delay_ms);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
