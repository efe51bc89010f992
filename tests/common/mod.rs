//! Shared fixtures for the integration tests: a scripted vision service and
//! synthetic images with known statistics.

#![allow(dead_code)]

use async_trait::async_trait;
use edgequake_pdf2txt::{ConversionConfig, VisionError, VisionService};
use image::{DynamicImage, GrayImage, Luma};
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

// ── Logging ──────────────────────────────────────────────────────────────────

/// Route library logs through the test harness; `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// ── Scripted vision service ──────────────────────────────────────────────────

/// Vision stub that replays queued answers, then falls back to a fixed one.
///
/// Records the (virtual) instant of every call so tests can check pacing.
pub struct ScriptedVision {
    script: Mutex<VecDeque<Result<String, VisionError>>>,
    fallback: Result<String, VisionError>,
    calls: Mutex<Vec<Instant>>,
    latency: Duration,
}

impl ScriptedVision {
    /// Answers `fallback` to every call.
    pub fn always(fallback: Result<String, VisionError>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            calls: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
        }
    }

    /// Replays `script` in order, then answers "described".
    pub fn scripted(script: Vec<Result<String, VisionError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: Ok("described".to_string()),
            calls: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
        }
    }

    /// Each answer takes `latency` of (virtual) time to arrive.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VisionService for ScriptedVision {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn describe(&self, _image: &DynamicImage, _prompt: &str) -> Result<String, VisionError> {
        self.calls.lock().unwrap().push(Instant::now());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

// ── Images ───────────────────────────────────────────────────────────────────

pub fn png_bytes(img: &DynamicImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// A wide, high-contrast gradient: never decorative. `seed` changes the
/// pixels, and so the fingerprint.
pub fn chart_png(seed: u32) -> Vec<u8> {
    let img = GrayImage::from_fn(120, 60, |x, y| {
        Luma([((x * 3 + y * 5 + seed * 17) % 256) as u8])
    });
    png_bytes(&DynamicImage::ImageLuma8(img))
}

/// 240×240 checkerboard of 210/230: mean 220, standard deviation 10, which
/// the logo heuristic classifies as decorative.
pub fn logo_png() -> Vec<u8> {
    let img = GrayImage::from_fn(240, 240, |x, y| {
        Luma([if (x + y) % 2 == 0 { 210 } else { 230 }])
    });
    png_bytes(&DynamicImage::ImageLuma8(img))
}

// ── Config ───────────────────────────────────────────────────────────────────

/// Default budget (9 per 60 s, 1 s spacing, 3 attempts, 5 s backoff base).
pub fn default_config() -> ConversionConfig {
    ConversionConfig::builder().build().unwrap()
}

/// Same pacing rules, but without spacing, for tests that only care about
/// transcript content.
pub fn fast_config() -> ConversionConfig {
    ConversionConfig::builder()
        .min_delay_ms(0)
        .retry_base_delay_ms(10)
        .max_requests(1000)
        .build()
        .unwrap()
}
