//! Scoring: send an uploaded résumé plus instructions to a vision LLM.
//!
//! The orchestrator only sees [`ScoringAdapter`]. [`VisionScorer`] is the
//! shipped implementation: it reads the original back from storage,
//! rasterises its first pages, and asks the model for the feedback JSON.
//! Parsing that JSON is the orchestrator's job (stage 6), so the scorer
//! returns the raw content untouched.

use crate::adapters::storage::StorageAdapter;
use crate::config::PipelineConfig;
use crate::error::{AdapterError, PipelineError};
use crate::pipeline::feedback::ScoringResponse;
use crate::pipeline::{encode, render};
use crate::prompts::DEFAULT_SYSTEM_PROMPT;
use crate::record::Reference;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Submits an uploaded original plus instructions and returns raw feedback.
#[async_trait]
pub trait ScoringAdapter: Send + Sync {
    async fn score(
        &self,
        original: &Reference,
        instructions: &str,
    ) -> Result<ScoringResponse, AdapterError>;
}

/// Scores résumés with a vision LLM via `edgequake-llm`.
pub struct VisionScorer {
    provider: Arc<dyn LLMProvider>,
    storage: Arc<dyn StorageAdapter>,
    system_prompt: String,
    pages: usize,
    max_pixels: u32,
    temperature: f32,
    max_tokens: usize,
    timeout: Duration,
}

impl VisionScorer {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        storage: Arc<dyn StorageAdapter>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            provider,
            storage,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            pages: config.scoring_pages,
            max_pixels: config.scoring_max_pixels,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: Duration::from_secs(config.api_timeout_secs),
        }
    }

    /// Resolve the provider from `config` and build a scorer.
    pub fn from_config(
        config: &PipelineConfig,
        storage: Arc<dyn StorageAdapter>,
    ) -> Result<Self, PipelineError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, storage, config))
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ScoringAdapter for VisionScorer {
    async fn score(
        &self,
        original: &Reference,
        instructions: &str,
    ) -> Result<ScoringResponse, AdapterError> {
        let start = Instant::now();

        let pdf = self.storage.fetch(original).await?;
        let pages = render::render_leading_pages(pdf, self.max_pixels, self.pages).await?;
        let images = pages
            .iter()
            .map(|img| encode::encode_png(img).map(|png| encode::to_image_data(&png)))
            .collect::<Result<Vec<_>, _>>()?;

        let messages = vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user_with_images(instructions, images),
        ];
        let options = self.options();

        let response = tokio::time::timeout(self.timeout, self.provider.chat(&messages, Some(&options)))
            .await
            .map_err(|_| AdapterError::Timeout {
                secs: self.timeout.as_secs(),
            })?
            .map_err(|e| AdapterError::Llm(e.to_string()))?;

        debug!(
            "Scored {}: {} input tokens, {} output tokens, {:?}",
            original,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        if response.content.trim().is_empty() {
            return Err(AdapterError::Empty { what: "scorer" });
        }
        Ok(ScoringResponse::text(response.content))
    }
}

// ── Provider resolution ──────────────────────────────────────────────────

const DEFAULT_MODEL: &str = "gpt-4.1-mini";

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, PipelineError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        PipelineError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. `config.provider`: a pre-built provider, used as-is.
/// 2. `config.provider_name` (+ `config.model`): built by the factory,
///    which reads the matching API key from the environment.
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set.
/// 4. OpenAI, when `OPENAI_API_KEY` is set.
/// 5. `ProviderFactory::from_env` auto-detection.
pub fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, PipelineError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| PipelineError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
