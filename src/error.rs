//! Error types for the edgequake-pdf2txt library.
//!
//! Failures live at three levels, each with its own type:
//!
//! * [`Pdf2TxtError`]: **Fatal**: the document cannot be converted at all
//!   (missing file, corrupt PDF, provider not configured). Returned as
//!   `Err(Pdf2TxtError)` from the top-level `convert*` functions.
//!
//! * [`SourceError`]: a single page or image could not be read from the
//!   parsed document. Recorded as an `[Error]` segment in the transcript.
//!
//! * [`AnalysisError`]: a single image could not be described. Retryable
//!   variants are retried by [`crate::pipeline::analysis::AnalysisClient`];
//!   whatever survives the retry loop ends up as an `[Error]` segment.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf2txt library.
#[derive(Debug, Error)]
pub enum Pdf2TxtError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Provider errors ───────────────────────────────────────────────────
    /// The vision provider is not initialised (missing API key etc.).
    #[error("Vision provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output transcript.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A directory given as input could not be listed.
    #[error("Failed to read input directory '{path}': {source}")]
    InputDirUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Two inputs would write their transcripts to the same file.
    #[error(
        "'{first}' and '{second}' would both be written to '{path}'\n\
Pass the containing directory instead so relative paths are kept."
    )]
    DuplicateDestination {
        path: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2TxtError {
    /// `true` when the document itself could not be opened or parsed.
    ///
    /// These are the errors a batch run reports per input and moves past;
    /// everything else (binding, provider, config) affects every document.
    pub fn is_open_failure(&self) -> bool {
        matches!(
            self,
            Pdf2TxtError::FileNotFound { .. }
                | Pdf2TxtError::PermissionDenied { .. }
                | Pdf2TxtError::NotAPdf { .. }
                | Pdf2TxtError::CorruptPdf { .. }
                | Pdf2TxtError::PasswordRequired { .. }
                | Pdf2TxtError::WrongPassword { .. }
        )
    }
}

/// A page or image that the document parser could not produce.
#[derive(Debug, Clone, Error, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SourceError {
    /// Text extraction failed for the page.
    #[error("text extraction failed: {0}")]
    PageText(String),

    /// The page's image objects could not be enumerated.
    #[error("image enumeration failed: {0}")]
    ImageEnumeration(String),

    /// Raw bytes for one image could not be retrieved.
    #[error("image retrieval failed: {0}")]
    ImageRetrieval(String),
}

/// Why a single image analysis did not produce a description.
#[derive(Debug, Clone, Error, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AnalysisError {
    /// Image bytes are not a decodable image. Never retried.
    #[error("image could not be decoded: {0}")]
    Decode(String),

    /// The vision service reported its own quota / rate limit.
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    /// Any other recoverable service failure.
    #[error("vision service error: {0}")]
    Transient(String),

    /// Non-retryable service failure (bad credentials, forbidden model).
    #[error("vision service rejected the request: {0}")]
    Fatal(String),

    /// A single attempt exceeded the per-call timeout.
    #[error("vision call timed out after {secs}s")]
    Timeout { secs: u64 },
}

impl AnalysisError {
    /// Whether the retry loop should make another attempt after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AnalysisError::RateLimited(_) | AnalysisError::Transient(_) | AnalysisError::Timeout { .. }
        )
    }
}
