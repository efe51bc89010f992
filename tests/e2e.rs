//! End-to-end integration tests for edgequake-pdf2txt.
//!
//! These tests use real PDF files in `./test_cases/`, a pdfium shared
//! library and live vision API calls. They are gated behind the
//! `E2E_ENABLED` environment variable so they do not run in CI unless
//! explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 GEMINI_API_KEY=... DYLD_LIBRARY_PATH=. cargo test --test e2e -- --nocapture

mod common;

use edgequake_pdf2txt::{
    convert, convert_to_file, ConversionConfig, Document, DocumentSource, DocumentStatus,
    Pdf2TxtError, PdfiumSource,
};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            return;
        }
        p
    }};
}

fn live_config() -> ConversionConfig {
    common::init_tracing();
    let provider = std::env::var("EDGEQUAKE_LLM_PROVIDER").unwrap_or_else(|_| "gemini".into());
    let mut builder = ConversionConfig::builder().provider_name(provider);
    if let Ok(model) = std::env::var("EDGEQUAKE_MODEL") {
        builder = builder.model(model);
    }
    if let Ok(lib) = std::env::var("PDFIUM_LIB_PATH") {
        builder = builder.pdfium_lib_path(lib);
    }
    builder.build().expect("valid config")
}

/// Basic sanity checks on a rendered transcript.
fn assert_transcript_shape(text: &str, pages: usize, context: &str) {
    assert!(!text.trim().is_empty(), "[{context}] transcript is empty");
    for page in 1..=pages {
        assert!(
            text.contains(&format!("=== Page {page} ===")),
            "[{context}] missing header for page {page}"
        );
    }
    assert_eq!(
        text.matches(&"=".repeat(50)).count(),
        pages,
        "[{context}] expected one rule per page"
    );
    println!("[{context}] ✓  {} bytes, {} pages", text.len(), pages);
}

// ── Source tests (pdfium only, no LLM) ───────────────────────────────────────

#[tokio::test]
async fn test_pdfium_snapshot_sample() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("sample.pdf"));
    let source = PdfiumSource::new(&live_config());

    let doc = source.open(&path).await.expect("open() should succeed");
    assert!(doc.page_count() > 0);
    for page in 1..=doc.page_count() {
        let _ = doc.page_text(page);
        let _ = doc.page_images(page);
    }
}

#[tokio::test]
async fn test_not_a_pdf_is_rejected() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
        return;
    }
    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml");
    let err = convert(&manifest, &live_config()).await.unwrap_err();
    assert!(matches!(err, Pdf2TxtError::NotAPdf { .. }), "got {err}");
}

// ── Conversion tests (live vision calls) ─────────────────────────────────────

#[tokio::test]
async fn test_convert_sample_with_images() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("sample.pdf"));

    let output = convert(&path, &live_config())
        .await
        .expect("convert() should succeed");

    assert_eq!(output.status, DocumentStatus::Completed);
    assert_transcript_shape(&output.text(), output.stats.total_pages, "sample");
    println!("stats: {:?}", output.stats);
}

#[tokio::test]
async fn test_convert_to_file_roundtrip() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("sample.pdf"));
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("sample.txt");

    let output = convert_to_file(&path, &out, &live_config())
        .await
        .expect("convert_to_file() should succeed");

    let written = std::fs::read_to_string(&out).unwrap();
    assert_eq!(written, output.text());
}
