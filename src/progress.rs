//! Progress-callback trait for per-page and per-image conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline walks the document.
//!
//! Callbacks run on the conversion task. A panicking callback is caught and
//! logged; it never aborts the conversion.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2txt::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     pages: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, images: usize) {
//!         self.pages.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Page {}/{} done ({} images)", page_num, total_pages, images);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { pages: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::error;

/// Terminal state of one embedded image, as reported to callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageStatus {
    /// A description was produced (freshly or from the cache).
    Described,
    /// The image was classified as decorative and left out.
    Skipped,
    /// Retrieval, decoding or analysis failed.
    Failed,
}

/// Called by the conversion pipeline as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Implementations must be `Send + Sync`: a
/// [`crate::Converter`] may run several documents at once in batch mode.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once after the document is opened.
    fn on_conversion_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called before a page's text is extracted.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called after each embedded image reaches a terminal state.
    fn on_image_complete(&self, page_num: usize, image_num: usize, status: ImageStatus) {
        let _ = (page_num, image_num, status);
    }

    /// Called when a page finishes, with the number of images found on it.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, images: usize) {
        let _ = (page_num, total_pages, images);
    }

    /// Called when a page-level failure is recorded (text or image enumeration).
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after all pages have been visited (or cancellation hit).
    fn on_conversion_complete(&self, total_pages: usize, failed_pages: usize) {
        let _ = (total_pages, failed_pages);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

/// Deliver one event, containing any panic raised by the sink.
pub(crate) fn notify<F>(callback: Option<&ProgressCallback>, event: F)
where
    F: FnOnce(&dyn ConversionProgressCallback),
{
    let Some(cb) = callback else {
        return;
    };
    if catch_unwind(AssertUnwindSafe(|| event(cb.as_ref()))).is_err() {
        error!("Progress callback panicked; event dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        images: AtomicUsize,
        errors: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_page_start(&self, _page_num: usize, _total_pages: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_image_complete(&self, _page_num: usize, _image_num: usize, _status: ImageStatus) {
            self.images.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_error(&self, _page_num: usize, _total_pages: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct PanickingCallback;

    impl ConversionProgressCallback for PanickingCallback {
        fn on_page_start(&self, _page_num: usize, _total_pages: usize) {
            panic!("sink exploded");
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_conversion_start(5);
        cb.on_page_start(1, 5);
        cb.on_image_complete(1, 1, ImageStatus::Skipped);
        cb.on_page_complete(1, 5, 2);
        cb.on_page_error(2, 5, "some error");
        cb.on_conversion_complete(5, 1);
    }

    #[test]
    fn notify_delivers_events() {
        let tracker = Arc::new(TrackingCallback::default());
        let cb: ProgressCallback = tracker.clone();
        notify(Some(&cb), |c| c.on_page_start(1, 2));
        notify(Some(&cb), |c| c.on_image_complete(1, 1, ImageStatus::Described));
        notify(Some(&cb), |c| c.on_page_error(2, 2, "boom"));
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.images.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn notify_contains_panicking_sink() {
        let cb: ProgressCallback = Arc::new(PanickingCallback);
        notify(Some(&cb), |c| c.on_page_start(1, 1));
        notify(None, |c| c.on_page_start(1, 1));
    }
}
