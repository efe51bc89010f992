//! Single-image analysis: cache → decode → logo gate → rate-limited retries.
//!
//! ## Retry Strategy
//!
//! Each attempt first waits on the shared [`RateLimiter`], then calls the
//! vision service under a per-attempt timeout. Rate-limit, transient and
//! timeout failures back off `base × 2^(attempt−1)` and retry; credential
//! style (fatal) failures stop immediately. With the defaults (3 attempts,
//! 5 s base) a persistently failing image costs 5 s + 10 s of backoff.
//!
//! Only terminal successes and decorative skips are cached. A failure is
//! returned to the pipeline uncached, so the same image can succeed in a
//! later conversion.
//!
//! ## Concurrent documents
//!
//! With several documents in flight, two of them can reach the same image
//! before either has stored a result. Lookups for one fingerprint are
//! serialised through an in-flight slot: the second caller waits for the
//! first and then reads the cache instead of issuing its own request.

use crate::config::ConversionConfig;
use crate::error::AnalysisError;
use crate::pipeline::backoff::BackoffPolicy;
use crate::pipeline::cache::{CacheEntry, DeduplicationCache};
use crate::pipeline::fingerprint::Fingerprint;
use crate::pipeline::logo::LogoFilter;
use crate::pipeline::rate_limit::RateLimiter;
use crate::pipeline::vision::{VisionError, VisionService};
use crate::prompts::{EMPTY_ANALYSIS, IMAGE_ANALYSIS_PROMPT};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

/// Why an image was left out of the transcript without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Matched the logo / decorative-artwork heuristic.
    Decorative,
}

/// Terminal result of analysing one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisOutcome {
    Description(String),
    Skipped(SkipReason),
    Failed(AnalysisError),
}

impl From<CacheEntry> for AnalysisOutcome {
    fn from(entry: CacheEntry) -> Self {
        match entry {
            CacheEntry::Description(text) => AnalysisOutcome::Description(text),
            CacheEntry::Skipped(reason) => AnalysisOutcome::Skipped(reason),
        }
    }
}

impl From<VisionError> for AnalysisError {
    fn from(e: VisionError) -> Self {
        match e {
            VisionError::RateLimited(m) => AnalysisError::RateLimited(m),
            VisionError::Transient(m) => AnalysisError::Transient(m),
            VisionError::Fatal(m) => AnalysisError::Fatal(m),
        }
    }
}

/// One async lock per fingerprint currently being analysed.
#[derive(Debug, Default)]
struct InFlight {
    slots: Mutex<HashMap<Fingerprint, Arc<tokio::sync::Mutex<()>>>>,
}

impl InFlight {
    fn claim(&self, fingerprint: Fingerprint) -> InFlightTicket<'_> {
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let slot = Arc::clone(slots.entry(fingerprint).or_default());
        InFlightTicket {
            owner: self,
            fingerprint,
            slot,
        }
    }

    fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// Holds a share of an in-flight slot; the last holder removes it.
struct InFlightTicket<'a> {
    owner: &'a InFlight,
    fingerprint: Fingerprint,
    slot: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for InFlightTicket<'_> {
    fn drop(&mut self) {
        let mut slots = self
            .owner
            .slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Map entry plus this ticket.
        if Arc::strong_count(&self.slot) <= 2 {
            slots.remove(&self.fingerprint);
        }
    }
}

/// Describes images through a [`VisionService`], safely and at most once.
///
/// Cloning is cheap and clones share the cache and the rate limiter.
#[derive(Clone)]
pub struct AnalysisClient {
    vision: Arc<dyn VisionService>,
    cache: Arc<DeduplicationCache>,
    limiter: Arc<RateLimiter>,
    in_flight: Arc<InFlight>,
    backoff: BackoffPolicy,
    max_retries: u32,
    api_timeout: Duration,
    logo_filter: Option<LogoFilter>,
}

impl AnalysisClient {
    /// Create a client with a fresh cache and limiter sized from `config`.
    pub fn new(vision: Arc<dyn VisionService>, config: &ConversionConfig) -> Self {
        let cache = Arc::new(DeduplicationCache::new(config.cache_capacity));
        let limiter = Arc::new(RateLimiter::new(
            config.max_requests,
            config.window(),
            config.min_delay(),
        ));
        Self::with_shared(vision, cache, limiter, config)
    }

    /// Create a client around an existing cache and limiter, e.g. to share
    /// one request budget between several converters.
    pub fn with_shared(
        vision: Arc<dyn VisionService>,
        cache: Arc<DeduplicationCache>,
        limiter: Arc<RateLimiter>,
        config: &ConversionConfig,
    ) -> Self {
        Self {
            vision,
            cache,
            limiter,
            in_flight: Arc::new(InFlight::default()),
            backoff: BackoffPolicy::new(config.retry_base_delay()),
            max_retries: config.max_retries.max(1),
            api_timeout: config.api_timeout(),
            logo_filter: config.skip_decorative.then(LogoFilter::default),
        }
    }

    pub fn cache(&self) -> &Arc<DeduplicationCache> {
        &self.cache
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Analyse one image.
    ///
    /// Never returns an error type: every failure is folded into
    /// [`AnalysisOutcome::Failed`] so one bad image cannot abort a document.
    pub async fn analyze(&self, image_bytes: &[u8]) -> AnalysisOutcome {
        let fingerprint = Fingerprint::of(image_bytes);
        let ticket = self.in_flight.claim(fingerprint);
        let _guard = ticket.slot.lock().await;

        if let Some(entry) = self.cache.lookup(&fingerprint) {
            info!("Using cached analysis for duplicate image {:?}", fingerprint);
            return entry.into();
        }
        self.analyze_uncached(fingerprint, image_bytes).await
    }

    async fn analyze_uncached(
        &self,
        fingerprint: Fingerprint,
        image_bytes: &[u8],
    ) -> AnalysisOutcome {
        let image = match image::load_from_memory(image_bytes) {
            Ok(image) => image,
            Err(e) => {
                error!("Image {:?} could not be decoded: {}", fingerprint, e);
                return AnalysisOutcome::Failed(AnalysisError::Decode(e.to_string()));
            }
        };

        if let Some(ref filter) = self.logo_filter {
            if filter.is_decorative_image(&image) {
                info!("Decorative image detected, skipping analysis");
                self.cache
                    .store(fingerprint, CacheEntry::Skipped(SkipReason::Decorative));
                return AnalysisOutcome::Skipped(SkipReason::Decorative);
            }
        }

        let mut last_err: Option<AnalysisError> = None;

        for attempt in 1..=self.max_retries {
            debug!(
                "Analyzing image {:?} (attempt {}/{}) via {}",
                fingerprint,
                attempt,
                self.max_retries,
                self.vision.name()
            );
            self.limiter.acquire().await;

            let result = match timeout(
                self.api_timeout,
                self.vision.describe(&image, IMAGE_ANALYSIS_PROMPT),
            )
            .await
            {
                Ok(Ok(text)) => Ok(text),
                Ok(Err(e)) => Err(AnalysisError::from(e)),
                Err(_) => Err(AnalysisError::Timeout {
                    secs: self.api_timeout.as_secs(),
                }),
            };

            let err = match result {
                Ok(text) => {
                    let text = if text.trim().is_empty() {
                        EMPTY_ANALYSIS.to_string()
                    } else {
                        text
                    };
                    self.cache
                        .store(fingerprint, CacheEntry::Description(text.clone()));
                    return AnalysisOutcome::Description(text);
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                error!("Vision service rejected request, not retrying: {}", err);
                return AnalysisOutcome::Failed(err);
            }
            if matches!(err, AnalysisError::RateLimited(_)) {
                warn!(
                    "Rate limit exceeded (attempt {}/{})",
                    attempt, self.max_retries
                );
            } else {
                warn!(
                    "API error (attempt {}/{}): {}",
                    attempt, self.max_retries, err
                );
            }

            if attempt < self.max_retries {
                let wait = self.backoff.delay(attempt);
                info!("Retrying in {:.1} seconds...", wait.as_secs_f64());
                sleep(wait).await;
            }
            last_err = Some(err);
        }

        let err = last_err.unwrap_or_else(|| AnalysisError::Transient("no attempt made".into()));
        error!(
            "Failed to analyze image after {} attempts: {}",
            self.max_retries, err
        );
        AnalysisOutcome::Failed(err)
    }
}
