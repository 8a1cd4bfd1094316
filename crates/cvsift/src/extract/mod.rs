pub mod docx;
pub mod ocr;
pub mod pdf;

use std::path::Path;

use log::warn;

use crate::config::{OcrConfig, ResumeFormat};
use crate::error::ExtractError;
pub use ocr::OcrEngine;

/// Produces the best available plain text for a resume document.
///
/// Dispatch is by file extension. PDFs get the full fallback chain (native
/// text layer, sparse-page content-stream harvest, OCR escalation); DOCX is
/// unzipped and parsed. Legacy `.doc` and unknown extensions yield empty
/// text rather than an error so a single odd file never aborts a batch.
pub struct TextExtractor {
    ocr: Option<OcrEngine>,
}

impl TextExtractor {
    pub fn new(ocr_config: &OcrConfig) -> Self {
        let ocr = if ocr_config.enabled {
            Some(OcrEngine::new(&ocr_config.languages, ocr_config.dpi))
        } else {
            None
        };
        Self { ocr }
    }

    pub fn without_ocr() -> Self {
        Self { ocr: None }
    }

    /// The shared OCR engine, if OCR is enabled.
    pub fn ocr_engine(&self) -> Option<&OcrEngine> {
        self.ocr.as_ref()
    }

    pub fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        match ResumeFormat::from_path(path) {
            Some(ResumeFormat::Pdf) => pdf::extract_pdf_text(path, self.ocr.as_ref()),
            Some(ResumeFormat::Docx) => docx::extract_docx_text(path),
            Some(ResumeFormat::Doc) => {
                warn!(
                    ".doc format not supported: {}. Convert to .docx or .pdf.",
                    path.display()
                );
                Ok(String::new())
            }
            None => {
                warn!("Unsupported file type skipped: {}", path.display());
                Ok(String::new())
            }
        }
    }
}
