//! The vision-analysis service boundary.
//!
//! The pipeline depends only on [`VisionService`]: image in, description out,
//! or one of three failure classes. [`LlmVisionService`] is the production
//! implementation on top of any `edgequake_llm` provider with vision support;
//! tests substitute scripted stubs.

use crate::config::ConversionConfig;
use crate::error::Pdf2TxtError;
use crate::pipeline::encode;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, LlmError, ProviderFactory};
use image::DynamicImage;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Model used when a provider name is given without a model.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// The three outcomes a vision call can fail with.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VisionError {
    /// The service's own quota or rate limit was hit (HTTP 429 and friends).
    #[error("rate limited: {0}")]
    RateLimited(String),
    /// Anything that might succeed on a later attempt.
    #[error("{0}")]
    Transient(String),
    /// Retrying cannot help (bad credentials, forbidden model).
    #[error("fatal: {0}")]
    Fatal(String),
}

/// Describe one image under a fixed instruction prompt.
#[async_trait]
pub trait VisionService: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &str {
        "vision"
    }

    async fn describe(&self, image: &DynamicImage, prompt: &str) -> Result<String, VisionError>;
}

static RATE_LIMIT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b429\b|rate[ _-]?limit|too many requests|quota|resource[ _]?exhausted")
        .expect("valid rate-limit regex")
});

static FATAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b40[13]\b|unauthori[sz]ed|forbidden|permission[ _]denied|invalid[ _-]?(api[ _-]?)?key|api key not valid|authentication",
    )
    .expect("valid fatal-error regex")
});

/// Classify a provider error message into the three-outcome contract.
///
/// Rate-limit markers win over credential markers: "quota exceeded for
/// project" style messages sometimes also carry a 403.
pub fn classify_error(message: &str) -> VisionError {
    if RATE_LIMIT_RE.is_match(message) {
        VisionError::RateLimited(message.to_string())
    } else if FATAL_RE.is_match(message) {
        VisionError::Fatal(message.to_string())
    } else {
        VisionError::Transient(message.to_string())
    }
}

/// Classify a typed provider error.
///
/// Only `ApiError` and `ProviderError` carry free-form upstream text (an HTTP
/// status, a vendor message); those fall back to [`classify_error`].
pub fn classify_llm_error(error: &LlmError) -> VisionError {
    let message = error.to_string();
    match error {
        LlmError::RateLimited(_) => VisionError::RateLimited(message),
        LlmError::AuthError(_)
        | LlmError::ModelNotFound(_)
        | LlmError::InvalidRequest(_)
        | LlmError::ConfigError(_)
        | LlmError::NotSupported(_)
        | LlmError::TokenLimitExceeded { .. } => VisionError::Fatal(message),
        LlmError::ApiError(_) | LlmError::ProviderError(_) => classify_error(&message),
        _ => VisionError::Transient(message),
    }
}

/// [`VisionService`] backed by an `edgequake_llm` chat provider.
pub struct LlmVisionService {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    label: String,
}

impl LlmVisionService {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ConversionConfig) -> Self {
        let label = config
            .provider_name
            .clone()
            .unwrap_or_else(|| "llm".to_string());
        Self {
            provider,
            options: build_options(config),
            label,
        }
    }

    /// Build from the provider settings in `config`.
    ///
    /// A pre-built provider wins; otherwise `provider_name` + `model` are
    /// passed to [`ProviderFactory`], which reads that provider's API key.
    pub fn from_config(config: &ConversionConfig) -> Result<Self, Pdf2TxtError> {
        if let Some(ref provider) = config.provider {
            return Ok(Self::new(Arc::clone(provider), config));
        }

        let Some(ref name) = config.provider_name else {
            return Err(Pdf2TxtError::ProviderNotConfigured {
                provider: "none".to_string(),
                hint: "Set a provider name (e.g. \"gemini\", \"openai\") or pass a pre-built provider."
                    .to_string(),
            });
        };

        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
            Pdf2TxtError::ProviderNotConfigured {
                provider: name.clone(),
                hint: format!("{e}"),
            }
        })?;
        Ok(Self::new(provider, config))
    }
}

#[async_trait]
impl VisionService for LlmVisionService {
    fn name(&self) -> &str {
        &self.label
    }

    async fn describe(&self, image: &DynamicImage, prompt: &str) -> Result<String, VisionError> {
        let data = encode::to_image_data(image)
            .map_err(|e| VisionError::Fatal(format!("image encoding failed: {e}")))?;
        let messages = vec![ChatMessage::user_with_images(prompt, vec![data])];

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| classify_llm_error(&e))?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.label, response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Build `CompletionOptions` from the conversion config.
fn build_options(config: &ConversionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
