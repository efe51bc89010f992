//! Conversion results: the transcript and its statistics.
//!
//! A [`Transcript`] is an ordered list of [`Segment`]s. The pipeline only
//! ever appends to it; once [`crate::Converter::convert`] returns, the
//! transcript is handed to the caller and never touched again.
//! [`Transcript::render`] produces the plain-text file layout.

use serde::{Deserialize, Serialize};

/// Width of the `=` rule written after every page.
pub const PAGE_RULE_WIDTH: usize = 50;

/// One piece of a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    /// `=== Page N ===`
    PageHeader { page: usize },
    /// Text extracted from the page, verbatim.
    Text { page: usize, text: String },
    /// `--- Images on Page N ---`, emitted when a page has images.
    ImagesHeader { page: usize, count: usize },
    /// Description of one embedded image.
    ImageAnalysis {
        page: usize,
        image: usize,
        description: String,
    },
    /// A page- or image-level failure, kept visible in the output.
    Error {
        page: usize,
        image: Option<usize>,
        message: String,
    },
    /// Rule line closing a page.
    Separator { page: usize },
}

impl Segment {
    /// Render this segment in the plain-text layout.
    pub fn render(&self) -> String {
        match self {
            Segment::PageHeader { page } => format!("\n=== Page {page} ===\n"),
            Segment::Text { text, .. } => text.clone(),
            Segment::ImagesHeader { page, .. } => format!("\n--- Images on Page {page} ---\n"),
            Segment::ImageAnalysis {
                image, description, ..
            } => format!("\n[Image {image} Analysis]\n{description}\n"),
            Segment::Error { message, .. } => format!("\n[Error] {message}\n"),
            Segment::Separator { .. } => format!("\n{}\n", "=".repeat(PAGE_RULE_WIDTH)),
        }
    }
}

/// Ordered segments for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    segments: Vec<Segment>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segments belonging to one page (1-indexed).
    pub fn page(&self, page_num: usize) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(move |s| s.page() == page_num)
    }

    /// All error segments, in order.
    pub fn errors(&self) -> impl Iterator<Item = &Segment> {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Error { .. }))
    }

    /// Render the whole transcript as UTF-8 text, segments joined by newlines.
    pub fn render(&self) -> String {
        self.segments
            .iter()
            .map(Segment::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Segment {
    /// Page this segment belongs to.
    pub fn page(&self) -> usize {
        match self {
            Segment::PageHeader { page }
            | Segment::Text { page, .. }
            | Segment::ImagesHeader { page, .. }
            | Segment::ImageAnalysis { page, .. }
            | Segment::Error { page, .. }
            | Segment::Separator { page } => *page,
        }
    }
}

/// How the document-level state machine ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentStatus {
    /// Every page was visited. The transcript may still carry error segments.
    Completed,
    /// The cancellation flag was raised; the transcript stops at that point.
    Cancelled,
}

/// Aggregate counters for one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Pages in the document.
    pub total_pages: usize,
    /// Pages visited before completion or cancellation.
    pub processed_pages: usize,
    /// Pages that recorded at least one page-level error.
    pub failed_pages: usize,
    /// Embedded images enumerated across visited pages.
    pub images_found: usize,
    /// Images with a description in the transcript.
    pub images_described: usize,
    /// Images skipped as decorative.
    pub images_skipped: usize,
    /// Images whose retrieval or analysis failed.
    pub images_failed: usize,
    /// Wall-clock duration of the conversion.
    pub total_duration_ms: u64,
}

/// Everything a conversion produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Path the document was opened from, when it came from disk.
    pub source: Option<String>,
    pub status: DocumentStatus,
    pub transcript: Transcript,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    /// Rendered plain-text transcript.
    pub fn text(&self) -> String {
        self.transcript.render()
    }
}
