//! # edgequake-pdf2txt
//!
//! Convert PDF documents to plain-text transcripts in which every embedded
//! image is replaced by a description from a vision model.
//!
//! ## Why this crate?
//!
//! Text extraction alone loses charts, diagrams and scanned figures. This
//! crate keeps the PDF's own text layer and asks a vision model to describe
//! each image, while staying inside a provider's request budget: identical
//! images are described once, decorative logos are skipped, requests are
//! paced through a sliding window, and failed calls back off exponentially.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Source     open via pdfium (spawn_blocking), snapshot text + images
//!  ├─ 2. Pages      sequential walk, one header / text / images block each
//!  ├─ 3. Images     fingerprint → cache → logo filter → rate limit → VLM
//!  └─ 4. Output     transcript segments + stats, rendered as plain text
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2txt::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .provider_name("gemini")
//!         .model("gemini-2.0-flash")
//!         .build()?;
//!     let output = convert("document.pdf", &config).await?;
//!     println!("{}", output.text());
//!     eprintln!("{} images described, {} skipped",
//!         output.stats.images_described,
//!         output.stats.images_skipped);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2txt` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ## Request Budget
//!
//! | Setting | Default | Meaning |
//! |---------|---------|---------|
//! | `max_requests` | 9 | calls allowed per window |
//! | `window_secs` | 60 | sliding window length |
//! | `min_delay_ms` | 1000 | spacing between consecutive calls |
//! | `max_retries` | 3 | attempts per image, including the first |
//! | `retry_base_delay_ms` | 5000 | backoff base, doubled per attempt |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod cancel;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{BatchJob, BatchOptions, BatchPlan, Destination};
pub use cancel::CancellationFlag;
pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use convert::{convert, convert_sync, convert_to_file, write_transcript, Converter};
pub use error::{AnalysisError, Pdf2TxtError, SourceError};
pub use output::{ConversionOutput, ConversionStats, DocumentStatus, Segment, Transcript};
pub use pipeline::analysis::{AnalysisClient, AnalysisOutcome, SkipReason};
pub use pipeline::backoff::BackoffPolicy;
pub use pipeline::cache::{CacheEntry, CacheStats, DeduplicationCache};
pub use pipeline::fingerprint::Fingerprint;
pub use pipeline::logo::{ImageStats, LogoFilter};
pub use pipeline::pdf::PdfiumSource;
pub use pipeline::rate_limit::RateLimiter;
pub use pipeline::source::{
    Document, DocumentSource, ImageRef, MemoryDocument, MemoryPage, MemorySource,
};
pub use pipeline::vision::{classify_llm_error, LlmVisionService, VisionError, VisionService};
pub use progress::{ConversionProgressCallback, ImageStatus, NoopProgressCallback, ProgressCallback};
