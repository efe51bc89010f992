//! PDF document source backed by pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and must not run on async worker threads. Opening a PDF runs on the
//! blocking pool and produces a [`MemoryDocument`] snapshot: per page the
//! extracted text (or its error) and every image object re-encoded as PNG
//! (or the per-image error). The pipeline then walks the snapshot without
//! touching pdfium again.

use crate::config::ConversionConfig;
use crate::error::Pdf2TxtError;
use crate::pipeline::encode;
use crate::pipeline::source::{Document, DocumentSource, MemoryDocument, MemoryPage};
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Opens local PDF files through pdfium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumSource {
    password: Option<String>,
    library_path: Option<PathBuf>,
}

impl PdfiumSource {
    pub fn new(config: &ConversionConfig) -> Self {
        Self {
            password: config.password.clone(),
            library_path: config.pdfium_lib_path.clone(),
        }
    }
}

#[async_trait]
impl DocumentSource for PdfiumSource {
    async fn open(&self, path: &Path) -> Result<Box<dyn Document>, Pdf2TxtError> {
        check_local(path)?;

        let path = path.to_path_buf();
        let password = self.password.clone();
        let library = self.library_path.clone();

        let snapshot = tokio::task::spawn_blocking(move || {
            snapshot_blocking(&path, password.as_deref(), library.as_deref())
        })
        .await
        .map_err(|e| Pdf2TxtError::Internal(format!("PDF load task panicked: {}", e)))??;

        Ok(Box::new(snapshot))
    }
}

/// Validate existence, read permission and `%PDF` magic bytes.
pub fn check_local(path: &Path) -> Result<(), Pdf2TxtError> {
    if !path.exists() {
        return Err(Pdf2TxtError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    match std::fs::File::open(path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(Pdf2TxtError::NotAPdf {
                    path: path.to_path_buf(),
                    magic,
                });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2TxtError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(Pdf2TxtError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(())
}

/// Bind pdfium from `library` (file or directory), else `./`, else the
/// system library path.
fn bind_pdfium(library: Option<&Path>) -> Result<Pdfium, Pdf2TxtError> {
    let bindings = match library {
        Some(p) if p.is_dir() => {
            let dir = p.to_string_lossy().to_string();
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
        }
        Some(p) => Pdfium::bind_to_library(p.to_string_lossy().to_string()),
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| Pdf2TxtError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

fn map_load_error(path: &Path, had_password: bool, e: PdfiumError) -> Pdf2TxtError {
    let err_str = format!("{:?}", e);
    if err_str.contains("Password") || err_str.contains("password") {
        if had_password {
            Pdf2TxtError::WrongPassword {
                path: path.to_path_buf(),
            }
        } else {
            Pdf2TxtError::PasswordRequired {
                path: path.to_path_buf(),
            }
        }
    } else {
        Pdf2TxtError::CorruptPdf {
            path: path.to_path_buf(),
            detail: err_str,
        }
    }
}

/// Blocking implementation: load the PDF and copy out text and images.
fn snapshot_blocking(
    pdf_path: &Path,
    password: Option<&str>,
    library: Option<&Path>,
) -> Result<MemoryDocument, Pdf2TxtError> {
    let pdfium = bind_pdfium(library)?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| map_load_error(pdf_path, password.is_some(), e))?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let mut snapshot = MemoryDocument::new(pdf_path.display().to_string());

    for (idx, page) in pages.iter().enumerate() {
        let page_num = idx + 1;

        let mut snap_page = match page.text() {
            Ok(text) => MemoryPage::new(text.all()),
            Err(e) => {
                warn!("Page {}: text extraction failed: {:?}", page_num, e);
                MemoryPage::failing_text(format!("{:?}", e))
            }
        };

        for object in page.objects().iter() {
            let Some(image_object) = object.as_image_object() else {
                continue;
            };
            let bytes = image_object
                .get_raw_image()
                .map_err(|e| format!("{:?}", e))
                .and_then(|img| encode::encode_png(&img).map_err(|e| e.to_string()));
            snap_page = match bytes {
                Ok(bytes) => snap_page.with_image(bytes),
                Err(reason) => {
                    warn!("Page {}: image extraction failed: {}", page_num, reason);
                    snap_page.with_broken_image(reason)
                }
            };
        }

        debug!(
            "Page {}: {} image objects",
            page_num,
            snap_page.image_count()
        );
        snapshot.push_page(snap_page);
    }

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_is_not_found() {
        let err = check_local(Path::new("/definitely/not/a/real/file.pdf")).unwrap_err();
        assert!(matches!(err, Pdf2TxtError::FileNotFound { .. }));
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"GIF89a not a pdf").unwrap();
        let err = check_local(tmp.path()).unwrap_err();
        match err {
            Pdf2TxtError::NotAPdf { magic, .. } => assert_eq!(&magic, b"GIF8"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn pdf_magic_is_accepted() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n").unwrap();
        assert!(check_local(tmp.path()).is_ok());
    }

    #[tokio::test]
    async fn open_fails_before_touching_pdfium() {
        let source = PdfiumSource::default();
        let err = source
            .open(Path::new("/no/such/dir/report.pdf"))
            .await
            .err()
            .expect("missing file");
        assert!(err.is_open_failure());
    }
}
