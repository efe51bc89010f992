//! Pipeline stages for PDF-to-text conversion.
//!
//! Each submodule implements one concern and is testable on its own. The
//! orchestration that ties them together lives in [`crate::convert`].
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ fingerprint ──▶ cache ──▶ logo ──▶ rate_limit ──▶ vision
//! (pages,     (SHA-256)      (hit?)    (skip?)   (wait)         (describe,
//!  images)                                                       backoff)
//! ```
//!
//! 1. [`source`] / [`pdf`]: open a document; pages, text and image bytes
//! 2. [`fingerprint`]: content key for each image
//! 3. [`cache`]: bounded FIFO store of finished analyses
//! 4. [`logo`]: pure heuristic that skips decorative images
//! 5. [`rate_limit`]: sliding window + minimum spacing of requests
//! 6. [`backoff`]: delay schedule between failed attempts
//! 7. [`vision`]: the external service contract and its LLM implementation
//! 8. [`analysis`]: the per-image state machine combining 2–7

pub mod analysis;
pub mod backoff;
pub mod cache;
pub mod encode;
pub mod fingerprint;
pub mod logo;
pub mod pdf;
pub mod rate_limit;
pub mod source;
pub mod vision;
