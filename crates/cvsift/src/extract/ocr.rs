use std::io::Cursor;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use log::debug;

use crate::error::ExtractError;

/// Tesseract-backed OCR engine shared across workers.
///
/// Page rasterization shells out to `pdftoppm` (poppler-utils). A missing
/// binary or missing Tesseract language data surfaces as
/// `ExtractError::OcrUnavailable` so callers can tell "OCR not installed"
/// from "OCR ran and failed".
#[derive(Clone)]
pub struct OcrEngine {
    inner: Arc<OcrEngineInner>,
}

struct OcrEngineInner {
    languages: String,
    dpi: u32,
}

impl OcrEngine {
    pub fn new(languages: &[String], dpi: u32) -> Self {
        let lang_str = if languages.is_empty() {
            "eng".to_string()
        } else {
            languages.join("+")
        };

        Self {
            inner: Arc::new(OcrEngineInner {
                languages: lang_str,
                dpi,
            }),
        }
    }

    pub fn dpi(&self) -> u32 {
        self.inner.dpi
    }

    /// OCRs an entire PDF: rasterize each page at the configured DPI, run
    /// Tesseract per page, concatenate the results.
    pub fn ocr_pdf(&self, path: &Path) -> Result<String, ExtractError> {
        let _span = tracing::info_span!("extract.ocr_pdf").entered();

        let pdf_bytes = std::fs::read(path).map_err(|e| ExtractError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;

        let page_count = count_pdf_pages(&pdf_bytes)?;
        debug!("OCR over {} page(s) of {}", page_count, path.display());

        let mut all_text = String::new();
        for page_num in 1..=page_count {
            let image_data = render_pdf_page(&pdf_bytes, page_num as u32, self.inner.dpi)?;
            let page_text = self.ocr_image_bytes(&image_data)?;
            all_text.push_str(&page_text);
            all_text.push('\n');
        }

        Ok(all_text.trim().to_string())
    }

    /// Runs Tesseract over in-memory image data.
    pub fn ocr_image_bytes(&self, image_data: &[u8]) -> Result<String, ExtractError> {
        let _span = tracing::info_span!("extract.ocr").entered();

        let img = image::load_from_memory(image_data)
            .map_err(|e| ExtractError::OcrFailed(format!("Failed to load image: {}", e)))?;

        // Tesseract wants a single well-known container; re-encode as PNG.
        let mut png_data = Vec::new();
        let mut cursor = Cursor::new(&mut png_data);
        img.write_to(&mut cursor, image::ImageFormat::Png)
            .map_err(|e| ExtractError::OcrFailed(format!("Failed to convert image: {}", e)))?;

        let mut lt = leptess::LepTess::new(None, &self.inner.languages).map_err(|e| {
            ExtractError::OcrUnavailable(format!(
                "Failed to initialize Tesseract (is it installed with '{}' language data?): {}",
                self.inner.languages, e
            ))
        })?;

        lt.set_image_from_mem(&png_data)
            .map_err(|e| ExtractError::OcrFailed(format!("Failed to set image for OCR: {}", e)))?;

        let text = lt
            .get_utf8_text()
            .map_err(|e| ExtractError::OcrFailed(format!("OCR failed: {}", e)))?;

        Ok(text)
    }
}

/// Distinguishes "pdftoppm is not installed" from other spawn failures.
fn map_spawn_error(tool: &str, e: std::io::Error) -> ExtractError {
    if e.kind() == std::io::ErrorKind::NotFound {
        ExtractError::OcrUnavailable(format!(
            "{} not found. Install poppler-utils to enable OCR.",
            tool
        ))
    } else {
        ExtractError::OcrFailed(format!("Failed to run {}: {}", tool, e))
    }
}

/// Gets the page count of a PDF, preferring lopdf and falling back to
/// pdfinfo for PDFs lopdf cannot parse.
fn count_pdf_pages(pdf_bytes: &[u8]) -> Result<usize, ExtractError> {
    if let Ok(doc) = lopdf::Document::load_mem(pdf_bytes) {
        let pages = doc.get_pages().len();
        if pages > 0 {
            return Ok(pages);
        }
    }

    let temp_dir = std::env::temp_dir();
    let pdf_path = temp_dir.join(format!("cvsift_pagecount_{}.pdf", uuid::Uuid::new_v4()));

    std::fs::write(&pdf_path, pdf_bytes)
        .map_err(|e| ExtractError::OcrFailed(format!("Failed to write temp PDF: {}", e)))?;

    let output = Command::new("pdfinfo").arg(&pdf_path).output();
    let _ = std::fs::remove_file(&pdf_path);

    let output = output.map_err(|e| map_spawn_error("pdfinfo", e))?;

    if !output.status.success() {
        return Err(ExtractError::OcrFailed(format!(
            "pdfinfo failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.lines() {
        if let Some(count_str) = line.strip_prefix("Pages:") {
            if let Ok(count) = count_str.trim().parse::<usize>() {
                return Ok(count);
            }
        }
    }

    // Default to 1 page if we can't determine the count
    Ok(1)
}

/// Renders one PDF page to a PNG via pdftoppm.
fn render_pdf_page(pdf_bytes: &[u8], page_num: u32, dpi: u32) -> Result<Vec<u8>, ExtractError> {
    let temp_dir = std::env::temp_dir();
    let pdf_path = temp_dir.join(format!("cvsift_temp_{}.pdf", uuid::Uuid::new_v4()));
    let output_prefix = temp_dir.join(format!("cvsift_page_{}", uuid::Uuid::new_v4()));

    std::fs::write(&pdf_path, pdf_bytes)
        .map_err(|e| ExtractError::OcrFailed(format!("Failed to write temp PDF: {}", e)))?;

    let output = Command::new("pdftoppm")
        .args([
            "-png",
            "-r",
            &dpi.to_string(),
            "-f",
            &page_num.to_string(),
            "-l",
            &page_num.to_string(),
            pdf_path.to_str().unwrap_or_default(),
            output_prefix.to_str().unwrap_or_default(),
        ])
        .output();

    let _ = std::fs::remove_file(&pdf_path);

    let output = output.map_err(|e| map_spawn_error("pdftoppm", e))?;

    if !output.status.success() {
        return Err(ExtractError::OcrFailed(format!(
            "pdftoppm failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    // pdftoppm pads the page number suffix depending on total page count
    let candidates = [
        format!("{}-{}.png", output_prefix.display(), page_num),
        format!("{}-{:02}.png", output_prefix.display(), page_num),
        format!("{}-{:03}.png", output_prefix.display(), page_num),
    ];
    let image_path = candidates
        .iter()
        .find(|p| Path::new(p).exists())
        .ok_or_else(|| ExtractError::OcrFailed("Failed to find rendered page image".to_string()))?;

    let image_data = std::fs::read(image_path)
        .map_err(|e| ExtractError::OcrFailed(format!("Failed to read rendered image: {}", e)))?;

    let _ = std::fs::remove_file(image_path);

    Ok(image_data)
}
