//! Configuration for a résumé batch.
//!
//! Every knob lives in [`PipelineConfig`], built via
//! [`PipelineConfigBuilder`]. The orchestrator itself reads only the
//! completion delay and the progress observer; the remaining fields
//! configure the shipped adapters wired up by
//! [`crate::orchestrator::BatchOrchestrator::from_config`].

use crate::error::PipelineError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Largest file accepted for upload: 20 MiB.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 20 * 1024 * 1024;

/// Configuration for a résumé batch.
///
/// # Example
/// ```rust
/// use resume_scan::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .storage_dir("/var/lib/resume-scan/files")
///     .store_path("/var/lib/resume-scan/records.json")
///     .model("gpt-4.1-mini")
///     .completion_delay_ms(0)
///     .build()
///     .unwrap();
/// assert_eq!(config.scoring_pages, 2);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Pause between publishing the terminal label and firing the
    /// completion notifier, in milliseconds. Default: 1000.
    ///
    /// Gives observers time to show "Analysis complete!" before whatever
    /// transition the notifier performs.
    pub completion_delay_ms: u64,

    /// Root directory for uploaded originals and previews. Default: `.resume-scan/files`.
    pub storage_dir: PathBuf,

    /// JSON file backing the record store. Default: `.resume-scan/records.json`.
    pub store_path: PathBuf,

    /// Largest accepted input file in bytes. Default: 20 MiB.
    pub max_file_bytes: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Longest edge of the preview image in pixels. Default: 2000.
    pub preview_max_pixels: u32,

    /// Pages of each résumé rendered and sent to the scorer. Range: 1–10. Default: 2.
    ///
    /// Most résumés fit on one or two pages; later pages add tokens and
    /// rarely change the assessment.
    pub scoring_pages: usize,

    /// Longest edge of each page image sent to the scorer. Default: 1600.
    pub scoring_max_pixels: u32,

    /// LLM model identifier, e.g. "gpt-4.1-mini". If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the scorer. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens the scorer may generate per résumé. Default: 4096.
    ///
    /// The feedback object with four tip lists runs to roughly 1 500 tokens;
    /// a low cap truncates the JSON and every file fails to parse.
    pub max_tokens: usize,

    /// Per-call scorer timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Custom scorer system prompt. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Observer receiving progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            completion_delay_ms: 1000,
            storage_dir: PathBuf::from(".resume-scan/files"),
            store_path: PathBuf::from(".resume-scan/records.json"),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            download_timeout_secs: 120,
            preview_max_pixels: 2000,
            scoring_pages: 2,
            scoring_max_pixels: 1600,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 4096,
            api_timeout_secs: 120,
            system_prompt: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("completion_delay_ms", &self.completion_delay_ms)
            .field("storage_dir", &self.storage_dir)
            .field("store_path", &self.store_path)
            .field("max_file_bytes", &self.max_file_bytes)
            .field("preview_max_pixels", &self.preview_max_pixels)
            .field("scoring_pages", &self.scoring_pages)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ProgressObserver>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn completion_delay(&self) -> Duration {
        Duration::from_millis(self.completion_delay_ms)
    }
}

/// Builder for [`PipelineConfig`].
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl fmt::Debug for PipelineConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl PipelineConfigBuilder {
    pub fn completion_delay_ms(mut self, ms: u64) -> Self {
        self.config.completion_delay_ms = ms;
        self
    }

    pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.storage_dir = dir.into();
        self
    }

    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.store_path = path.into();
        self
    }

    pub fn max_file_bytes(mut self, n: u64) -> Self {
        self.config.max_file_bytes = n;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn preview_max_pixels(mut self, px: u32) -> Self {
        self.config.preview_max_pixels = px.max(100);
        self
    }

    pub fn scoring_pages(mut self, n: usize) -> Self {
        self.config.scoring_pages = n.clamp(1, 10);
        self
    }

    pub fn scoring_max_pixels(mut self, px: u32) -> Self {
        self.config.scoring_max_pixels = px.max(100);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        let c = &self.config;
        if c.max_file_bytes == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_file_bytes must be ≥ 1".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(PipelineError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(PipelineError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        if c.storage_dir.as_os_str().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "storage_dir must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = PipelineConfig::default();
        assert_eq!(c.completion_delay(), Duration::from_millis(1000));
        assert_eq!(c.max_file_bytes, 20 * 1024 * 1024);
        assert_eq!(c.scoring_pages, 2);
        assert!(c.provider.is_none());
    }

    #[test]
    fn builder_clamps() {
        let c = PipelineConfig::builder()
            .scoring_pages(0)
            .temperature(9.0)
            .preview_max_pixels(3)
            .build()
            .unwrap();
        assert_eq!(c.scoring_pages, 1);
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.preview_max_pixels, 100);
    }

    #[test]
    fn builder_rejects_zero_limits() {
        assert!(PipelineConfig::builder().max_file_bytes(0).build().is_err());
        assert!(PipelineConfig::builder().max_tokens(0).build().is_err());
        assert!(PipelineConfig::builder().api_timeout_secs(0).build().is_err());
        assert!(PipelineConfig::builder().storage_dir("").build().is_err());
    }

    #[test]
    fn debug_hides_provider() {
        let c = PipelineConfig::default();
        let s = format!("{c:?}");
        assert!(s.contains("PipelineConfig"));
        assert!(s.contains("provider: None"));
    }
}
