//! Configuration types for PDF-to-text conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The library never reads environment
//! variables itself; the `pdf2txt` binary maps flags and env vars onto the
//! builder.

use crate::error::Pdf2TxtError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a PDF-to-text conversion.
///
/// # Example
/// ```rust
/// use edgequake_pdf2txt::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .max_requests(9)
///     .window_secs(60)
///     .max_retries(3)
///     .build()
///     .unwrap();
/// assert_eq!(config.cache_capacity, 1000);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Maximum vision requests accepted inside one rate window. Default: 9.
    ///
    /// Stays under the 10 requests/minute free-tier quota of most vision APIs.
    pub max_requests: usize,

    /// Length of the sliding rate window in seconds. Default: 60.
    pub window_secs: u64,

    /// Minimum gap between the starts of two consecutive requests, in
    /// milliseconds. Default: 1000.
    pub min_delay_ms: u64,

    /// Total attempts per image, including the first one. Default: 3.
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds. Default: 5000.
    ///
    /// Attempt `n` failing waits `base × 2^(n−1)`: 5 s → 10 s → 20 s.
    pub retry_base_delay_ms: u64,

    /// Number of image fingerprints remembered by the deduplication cache.
    /// Default: 1000.
    pub cache_capacity: usize,

    /// Per-attempt vision call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Skip images that look like logos or decorative artwork. Default: true.
    pub skip_decorative: bool,

    /// LLM model identifier, e.g. "gemini-2.0-flash", "gpt-4.1-nano".
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "anthropic").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the description request. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens generated per image description. Default: 1024.
    pub max_tokens: usize,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Directory or file path of the pdfium shared library. When `None` the
    /// current directory is tried first, then the system library path.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Optional progress events sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            max_requests: 9,
            window_secs: 60,
            min_delay_ms: 1000,
            max_retries: 3,
            retry_base_delay_ms: 5000,
            cache_capacity: 1000,
            api_timeout_secs: 60,
            skip_decorative: true,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 1024,
            password: None,
            pdfium_lib_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("max_requests", &self.max_requests)
            .field("window_secs", &self.window_secs)
            .field("min_delay_ms", &self.min_delay_ms)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .field("cache_capacity", &self.cache_capacity)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("skip_decorative", &self.skip_decorative)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn max_requests(mut self, n: usize) -> Self {
        self.config.max_requests = n.max(1);
        self
    }

    pub fn window_secs(mut self, secs: u64) -> Self {
        self.config.window_secs = secs;
        self
    }

    pub fn min_delay_ms(mut self, ms: u64) -> Self {
        self.config.min_delay_ms = ms;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.max(1);
        self
    }

    pub fn retry_base_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_base_delay_ms = ms;
        self
    }

    pub fn cache_capacity(mut self, n: usize) -> Self {
        self.config.cache_capacity = n.max(1);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn skip_decorative(mut self, v: bool) -> Self {
        self.config.skip_decorative = v;
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

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2TxtError> {
        let c = &self.config;
        if c.window_secs == 0 {
            return Err(Pdf2TxtError::InvalidConfig(
                "Rate window must be at least 1 second".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(Pdf2TxtError::InvalidConfig(
                "API timeout must be at least 1 second".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(Pdf2TxtError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_free_tier_budget() {
        let c = ConversionConfig::default();
        assert_eq!(c.max_requests, 9);
        assert_eq!(c.window(), Duration::from_secs(60));
        assert_eq!(c.min_delay(), Duration::from_secs(1));
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.retry_base_delay(), Duration::from_secs(5));
        assert_eq!(c.cache_capacity, 1000);
        assert!(c.skip_decorative);
    }

    #[test]
    fn builder_clamps_degenerate_values() {
        let c = ConversionConfig::builder()
            .max_requests(0)
            .max_retries(0)
            .cache_capacity(0)
            .temperature(9.0)
            .build()
            .unwrap();
        assert_eq!(c.max_requests, 1);
        assert_eq!(c.max_retries, 1);
        assert_eq!(c.cache_capacity, 1);
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn zero_window_is_rejected() {
        let err = ConversionConfig::builder().window_secs(0).build().unwrap_err();
        assert!(matches!(err, Pdf2TxtError::InvalidConfig(_)));
    }

    #[test]
    fn debug_hides_provider() {
        let c = ConversionConfig::default();
        let s = format!("{c:?}");
        assert!(s.contains("max_requests"));
        assert!(!s.contains("password"));
    }
}
