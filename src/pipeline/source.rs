//! Document sources: where pages, text and image bytes come from.
//!
//! The pipeline never talks to a PDF library directly. A [`DocumentSource`]
//! opens a path into a [`Document`], which answers three per-page questions
//! (text, image list, image bytes), each allowed to fail on its own so the
//! pipeline can isolate the failure to that page or image.
//!
//! [`MemoryDocument`] is the in-memory implementation. The pdfium source
//! snapshots a PDF into one, and tests build them by hand with failure
//! injection.

use crate::error::{Pdf2TxtError, SourceError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Handle to one embedded image: 1-indexed page and 1-indexed position on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageRef {
    pub page: usize,
    pub index: usize,
}

/// A parsed, read-only paginated document.
pub trait Document: Send {
    /// Display name, usually the source path.
    fn name(&self) -> &str;

    fn page_count(&self) -> usize;

    /// Extracted text of page `page` (1-indexed). May be empty.
    fn page_text(&self, page: usize) -> Result<String, SourceError>;

    /// Embedded images of page `page`, in content-stream order.
    fn page_images(&self, page: usize) -> Result<Vec<ImageRef>, SourceError>;

    /// Raw encoded bytes of one image.
    ///
    /// Bytes are handed over, not shared: a second retrieval of the same
    /// reference fails.
    fn image_bytes(&mut self, image: &ImageRef) -> Result<Vec<u8>, SourceError>;
}

/// Opens documents by path.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Open `path`. Failure here is the whole-document `OpenFailed` outcome.
    async fn open(&self, path: &Path) -> Result<Box<dyn Document>, Pdf2TxtError>;
}

/// One page of a [`MemoryDocument`].
#[derive(Debug, Clone)]
pub struct MemoryPage {
    text: Result<String, String>,
    images: Result<Vec<Option<Result<Vec<u8>, String>>>, String>,
}

impl MemoryPage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Ok(text.into()),
            images: Ok(Vec::new()),
        }
    }

    /// A page whose text extraction fails with `reason`.
    pub fn failing_text(reason: impl Into<String>) -> Self {
        Self {
            text: Err(reason.into()),
            images: Ok(Vec::new()),
        }
    }

    pub fn with_image(mut self, bytes: Vec<u8>) -> Self {
        if let Ok(ref mut images) = self.images {
            images.push(Some(Ok(bytes)));
        }
        self
    }

    /// Add an image whose bytes cannot be retrieved.
    pub fn with_broken_image(mut self, reason: impl Into<String>) -> Self {
        if let Ok(ref mut images) = self.images {
            images.push(Some(Err(reason.into())));
        }
        self
    }

    /// Make image enumeration for this page fail.
    pub fn with_image_enumeration_error(mut self, reason: impl Into<String>) -> Self {
        self.images = Err(reason.into());
        self
    }

    pub fn image_count(&self) -> usize {
        self.images.as_ref().map(Vec::len).unwrap_or(0)
    }
}

/// A [`Document`] fully held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocument {
    name: String,
    pages: Vec<MemoryPage>,
}

impl MemoryDocument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pages: Vec::new(),
        }
    }

    pub fn with_page(mut self, page: MemoryPage) -> Self {
        self.pages.push(page);
        self
    }

    pub fn push_page(&mut self, page: MemoryPage) {
        self.pages.push(page);
    }

    fn page(&self, page: usize) -> Result<&MemoryPage, SourceError> {
        page.checked_sub(1)
            .and_then(|i| self.pages.get(i))
            .ok_or_else(|| {
                SourceError::PageText(format!(
                    "page {page} out of range (document has {} pages)",
                    self.pages.len()
                ))
            })
    }
}

impl Document for MemoryDocument {
    fn name(&self) -> &str {
        &self.name
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, page: usize) -> Result<String, SourceError> {
        self.page(page)?
            .text
            .clone()
            .map_err(SourceError::PageText)
    }

    fn page_images(&self, page: usize) -> Result<Vec<ImageRef>, SourceError> {
        let images = self
            .page(page)
            .map_err(|e| SourceError::ImageEnumeration(e.to_string()))?
            .images
            .as_ref()
            .map_err(|e| SourceError::ImageEnumeration(e.clone()))?;
        Ok((1..=images.len())
            .map(|index| ImageRef { page, index })
            .collect())
    }

    fn image_bytes(&mut self, image: &ImageRef) -> Result<Vec<u8>, SourceError> {
        let slot = image
            .page
            .checked_sub(1)
            .and_then(|p| self.pages.get_mut(p))
            .and_then(|p| p.images.as_mut().ok())
            .and_then(|images| image.index.checked_sub(1).and_then(|i| images.get_mut(i)))
            .ok_or_else(|| {
                SourceError::ImageRetrieval(format!(
                    "no image {} on page {}",
                    image.index, image.page
                ))
            })?;

        match slot.take() {
            Some(Ok(bytes)) => Ok(bytes),
            Some(Err(reason)) => Err(SourceError::ImageRetrieval(reason)),
            None => Err(SourceError::ImageRetrieval(format!(
                "image {} on page {} was already retrieved",
                image.index, image.page
            ))),
        }
    }
}

/// A [`DocumentSource`] serving pre-built [`MemoryDocument`]s by path.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    documents: HashMap<PathBuf, MemoryDocument>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, path: impl Into<PathBuf>, document: MemoryDocument) -> Self {
        self.documents.insert(path.into(), document);
        self
    }
}

#[async_trait]
impl DocumentSource for MemorySource {
    async fn open(&self, path: &Path) -> Result<Box<dyn Document>, Pdf2TxtError> {
        self.documents
            .get(path)
            .cloned()
            .map(|doc| Box::new(doc) as Box<dyn Document>)
            .ok_or_else(|| Pdf2TxtError::FileNotFound {
                path: path.to_path_buf(),
            })
    }
}
