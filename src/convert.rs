//! Document conversion: walk pages in order, describe images, build the
//! transcript.
//!
//! ## Why a `Converter` and not just a function?
//!
//! The deduplication cache and the rate limiter must outlive a single
//! document: a logo repeated across a batch of reports should be described
//! once, and the request budget belongs to the service account. A
//! [`Converter`] owns both (through its [`AnalysisClient`]) and every
//! document converted through it shares them. The free functions
//! [`convert`], [`convert_to_file`] and [`convert_sync`] build a one-shot
//! converter for the common single-document case.
//!
//! ## Failure isolation
//!
//! ```text
//! open ──▶ page 1 ──▶ page 2 ──▶ … ──▶ Completed
//!  │         │ text error      → [Error] segment, images still processed
//!  │         │ image list error → [Error] segment, next page
//!  │         └ image error      → [Error] segment, next image
//!  └ OpenFailed (Err), no partial output
//! ```

use crate::cancel::CancellationFlag;
use crate::config::ConversionConfig;
use crate::error::Pdf2TxtError;
use crate::output::{ConversionOutput, ConversionStats, DocumentStatus, Segment, Transcript};
use crate::pipeline::analysis::{AnalysisClient, AnalysisOutcome};
use crate::pipeline::cache::CacheStats;
use crate::pipeline::pdf::PdfiumSource;
use crate::pipeline::source::{Document, DocumentSource, ImageRef};
use crate::pipeline::vision::{LlmVisionService, VisionService};
use crate::progress::{notify, ImageStatus, ProgressCallback};
use futures::stream::{self, Stream, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Whether the page loop should keep going.
enum PageFlow {
    Continue,
    Cancelled,
}

/// Converts documents through one shared cache and rate budget.
pub struct Converter {
    source: Arc<dyn DocumentSource>,
    client: AnalysisClient,
    progress: Option<ProgressCallback>,
    cancel: CancellationFlag,
}

impl Converter {
    /// Build a converter for PDFs on disk, with the LLM provider from `config`.
    pub fn new(config: &ConversionConfig) -> Result<Self, Pdf2TxtError> {
        let vision = LlmVisionService::from_config(config)?;
        Ok(Self::with_vision(config, Arc::new(vision)))
    }

    /// Build a converter for PDFs on disk around any [`VisionService`].
    pub fn with_vision(config: &ConversionConfig, vision: Arc<dyn VisionService>) -> Self {
        Self::with_source(config, vision, Arc::new(PdfiumSource::new(config)))
    }

    /// Build a converter from explicit collaborators.
    pub fn with_source(
        config: &ConversionConfig,
        vision: Arc<dyn VisionService>,
        source: Arc<dyn DocumentSource>,
    ) -> Self {
        Self::from_client(config, AnalysisClient::new(vision, config), source)
    }

    /// Build a converter around an existing client, sharing its cache and
    /// rate limiter with every other holder of a clone.
    pub fn from_client(
        config: &ConversionConfig,
        client: AnalysisClient,
        source: Arc<dyn DocumentSource>,
    ) -> Self {
        Self {
            source,
            client,
            progress: config.progress_callback.clone(),
            cancel: CancellationFlag::new(),
        }
    }

    /// Handle that stops running conversions at the next page or image.
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    pub fn client(&self) -> &AnalysisClient {
        &self.client
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.client.cache().stats()
    }

    /// Open and convert the document at `input`.
    ///
    /// # Errors
    /// Only when the document cannot be opened (missing, not a PDF, corrupt,
    /// locked) or pdfium cannot be loaded. Page and image failures are
    /// recorded inside the transcript instead.
    pub async fn convert(&self, input: impl AsRef<Path>) -> Result<ConversionOutput, Pdf2TxtError> {
        let path = input.as_ref();
        info!("Starting conversion of: {}", path.display());

        let mut document = self.source.open(path).await.map_err(|e| {
            error!("Could not open {}: {}", path.display(), e);
            e
        })?;

        let mut output = self.convert_document(document.as_mut()).await;
        output.source = Some(path.display().to_string());
        Ok(output)
    }

    /// Convert an already-open document.
    pub async fn convert_document(&self, document: &mut dyn Document) -> ConversionOutput {
        let start = Instant::now();
        let total_pages = document.page_count();
        let progress = self.progress.as_ref();
        notify(progress, |cb| cb.on_conversion_start(total_pages));

        let mut transcript = Transcript::new();
        let mut stats = ConversionStats {
            total_pages,
            ..Default::default()
        };
        let mut status = DocumentStatus::Completed;

        for page_num in 1..=total_pages {
            if self.cancel.is_cancelled() {
                warn!("Conversion of {} cancelled before page {}", document.name(), page_num);
                status = DocumentStatus::Cancelled;
                break;
            }
            let flow = self
                .convert_page(document, page_num, &mut transcript, &mut stats)
                .await;
            if let PageFlow::Cancelled = flow {
                warn!("Conversion of {} cancelled on page {}", document.name(), page_num);
                status = DocumentStatus::Cancelled;
                break;
            }
        }

        stats.total_duration_ms = start.elapsed().as_millis() as u64;
        notify(progress, |cb| {
            cb.on_conversion_complete(total_pages, stats.failed_pages)
        });

        info!(
            "Converted {}: {}/{} pages, {} images described, {} skipped, {} failed, {}ms",
            document.name(),
            stats.processed_pages,
            total_pages,
            stats.images_described,
            stats.images_skipped,
            stats.images_failed,
            stats.total_duration_ms
        );

        ConversionOutput {
            source: None,
            status,
            transcript,
            stats,
        }
    }

    async fn convert_page(
        &self,
        document: &mut dyn Document,
        page_num: usize,
        transcript: &mut Transcript,
        stats: &mut ConversionStats,
    ) -> PageFlow {
        let total_pages = stats.total_pages;
        let progress = self.progress.as_ref();
        info!("Processing page {}/{}", page_num, total_pages);
        notify(progress, |cb| cb.on_page_start(page_num, total_pages));

        transcript.push(Segment::PageHeader { page: page_num });
        let mut page_failed = false;

        match document.page_text(page_num) {
            Ok(text) => transcript.push(Segment::Text {
                page: page_num,
                text,
            }),
            Err(e) => {
                self.record_page_error(transcript, page_num, total_pages, &e.to_string());
                page_failed = true;
            }
        }

        let mut image_count = 0;
        match document.page_images(page_num) {
            Ok(images) => {
                image_count = images.len();
                if !images.is_empty() {
                    info!("Found {} images on page {}", images.len(), page_num);
                    transcript.push(Segment::ImagesHeader {
                        page: page_num,
                        count: images.len(),
                    });
                    stats.images_found += images.len();
                }

                for image in &images {
                    if self.cancel.is_cancelled() {
                        return PageFlow::Cancelled;
                    }
                    let status = self.convert_image(document, image, transcript, stats).await;
                    notify(progress, |cb| {
                        cb.on_image_complete(image.page, image.index, status)
                    });
                }
            }
            Err(e) => {
                self.record_page_error(transcript, page_num, total_pages, &e.to_string());
                page_failed = true;
            }
        }

        transcript.push(Segment::Separator { page: page_num });
        stats.processed_pages += 1;
        if page_failed {
            stats.failed_pages += 1;
        }
        notify(progress, |cb| {
            cb.on_page_complete(page_num, total_pages, image_count)
        });
        PageFlow::Continue
    }

    async fn convert_image(
        &self,
        document: &mut dyn Document,
        image: &ImageRef,
        transcript: &mut Transcript,
        stats: &mut ConversionStats,
    ) -> ImageStatus {
        let outcome = match document.image_bytes(image) {
            Ok(bytes) => self.client.analyze(&bytes).await,
            Err(e) => {
                self.record_image_error(transcript, image, &e.to_string());
                stats.images_failed += 1;
                return ImageStatus::Failed;
            }
        };

        match outcome {
            AnalysisOutcome::Description(description) => {
                transcript.push(Segment::ImageAnalysis {
                    page: image.page,
                    image: image.index,
                    description,
                });
                stats.images_described += 1;
                ImageStatus::Described
            }
            AnalysisOutcome::Skipped(reason) => {
                info!(
                    "Image {} on page {} skipped ({:?})",
                    image.index, image.page, reason
                );
                stats.images_skipped += 1;
                ImageStatus::Skipped
            }
            AnalysisOutcome::Failed(e) => {
                self.record_image_error(transcript, image, &e.to_string());
                stats.images_failed += 1;
                ImageStatus::Failed
            }
        }
    }

    fn record_page_error(
        &self,
        transcript: &mut Transcript,
        page_num: usize,
        total_pages: usize,
        detail: &str,
    ) {
        let message = format!("Error processing page {}: {}", page_num, detail);
        error!("{}", message);
        notify(self.progress.as_ref(), |cb| {
            cb.on_page_error(page_num, total_pages, &message)
        });
        transcript.push(Segment::Error {
            page: page_num,
            image: None,
            message,
        });
    }

    fn record_image_error(&self, transcript: &mut Transcript, image: &ImageRef, detail: &str) {
        let message = format!(
            "Error processing image {} on page {}: {}",
            image.index, image.page, detail
        );
        error!("{}", message);
        transcript.push(Segment::Error {
            page: image.page,
            image: Some(image.index),
            message,
        });
    }

    /// Convert `input` and write the rendered transcript to `output_path`.
    ///
    /// A cancelled conversion writes nothing; the partial output is still
    /// returned so the caller can decide what to keep.
    pub async fn convert_to_file(
        &self,
        input: impl AsRef<Path>,
        output_path: impl AsRef<Path>,
    ) -> Result<ConversionOutput, Pdf2TxtError> {
        let output = self.convert(input).await?;
        if output.status == DocumentStatus::Completed {
            write_transcript(output_path.as_ref(), &output.transcript).await?;
            info!(
                "Successfully converted PDF to: {}",
                output_path.as_ref().display()
            );
        }
        Ok(output)
    }

    /// Convert several documents, at most `concurrency` at a time, yielding
    /// each result as soon as it and every earlier input are done.
    ///
    /// Pages within each document stay sequential; documents share the cache
    /// and the rate budget. Results come out in input order.
    pub fn convert_stream(
        &self,
        inputs: Vec<PathBuf>,
        concurrency: usize,
    ) -> impl Stream<Item = (PathBuf, Result<ConversionOutput, Pdf2TxtError>)> + '_ {
        stream::iter(inputs.into_iter().map(move |path| async move {
            let result = self.convert(&path).await;
            (path, result)
        }))
        .buffered(concurrency.max(1))
    }

    /// Collect [`Converter::convert_stream`] into a vector.
    pub async fn convert_batch(
        &self,
        inputs: Vec<PathBuf>,
        concurrency: usize,
    ) -> Vec<(PathBuf, Result<ConversionOutput, Pdf2TxtError>)> {
        self.convert_stream(inputs, concurrency).collect().await
    }
}

/// Write a rendered transcript atomically (temp file + rename).
pub async fn write_transcript(path: &Path, transcript: &Transcript) -> Result<(), Pdf2TxtError> {
    let write_err = |source| Pdf2TxtError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
    }

    let tmp_path = path.with_extension("txt.tmp");
    tokio::fs::write(&tmp_path, transcript.render())
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

/// Convert a PDF file to a transcript using the provider in `config`.
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdf2txt::{convert, ConversionConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = ConversionConfig::builder()
///         .provider_name("gemini")
///         .model("gemini-2.0-flash")
///         .build()?;
///     let output = convert("report.pdf", &config).await?;
///     println!("{}", output.text());
///     Ok(())
/// }
/// ```
pub async fn convert(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2TxtError> {
    Converter::new(config)?.convert(input).await
}

/// Convert a PDF and write the transcript to `output_path`.
pub async fn convert_to_file(
    input: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2TxtError> {
    Converter::new(config)?
        .convert_to_file(input, output_path)
        .await
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2TxtError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2TxtError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input, config))
}
