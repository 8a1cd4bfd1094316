use std::path::Path;

use log::debug;
use lopdf::content::Content;
use lopdf::Object;

use crate::error::ExtractError;
use crate::extract::ocr::OcrEngine;

/// Pages yielding fewer characters than this get a supplementary pass over
/// the raw content stream. Catches scanned forms with a thin text layer.
const MIN_PAGE_TEXT_CHARS: usize = 50;

/// Below this total the text layer is considered unusable and the whole
/// document is escalated to OCR. Very short resumes trade an unnecessary
/// OCR pass for catching image-only PDFs.
const MIN_TOTAL_TEXT_CHARS: usize = 30;

/// Extracts text from a PDF, escalating to OCR when the text layer is
/// missing or too thin. OCR errors are swallowed here; the caller sees the
/// native text (possibly empty) and decides what to do next.
pub fn extract_pdf_text(path: &Path, ocr: Option<&OcrEngine>) -> Result<String, ExtractError> {
    let _span = tracing::info_span!("extract.pdf").entered();

    let pdf_bytes = std::fs::read(path).map_err(|e| ExtractError::ReadDocument {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut text = match lopdf::Document::load_mem(&pdf_bytes) {
        Ok(doc) => extract_native_text(&doc),
        Err(e) => {
            debug!("lopdf failed to parse {}: {}", path.display(), e);
            String::new()
        }
    };

    let trimmed_len = text.trim().len();
    if trimmed_len == 0 || trimmed_len < MIN_TOTAL_TEXT_CHARS {
        if let Some(ocr) = ocr {
            let _ocr_span =
                tracing::info_span!("extract.ocr_fallback", reason = "insufficient_text")
                    .entered();
            match ocr.ocr_pdf(path) {
                Ok(ocr_text) => text = ocr_text,
                Err(e) => {
                    debug!("OCR fallback failed for {}: {}", path.display(), e);
                }
            }
        }
    }

    Ok(text.trim().to_string())
}

/// Per-page native extraction. Sparse pages additionally get their content
/// stream string operands harvested as a supplementary pass.
fn extract_native_text(doc: &lopdf::Document) -> String {
    let mut text = String::new();

    for (page_num, page_id) in doc.get_pages() {
        let page_text = doc.extract_text(&[page_num]).unwrap_or_default();
        if !page_text.is_empty() {
            text.push_str(&page_text);
            text.push('\n');
        }

        if page_text.trim().len() < MIN_PAGE_TEXT_CHARS {
            for fragment in harvest_content_strings(doc, page_id) {
                text.push_str(&fragment);
                text.push(' ');
            }
        }
    }

    text
}

/// Pulls string operands of text-showing operators straight out of a page's
/// content stream. Skips font decoding entirely, so the result is only
/// useful for simple Latin text layers.
fn harvest_content_strings(doc: &lopdf::Document, page_id: lopdf::ObjectId) -> Vec<String> {
    let mut fragments = Vec::new();

    let Ok(data) = doc.get_page_content(page_id) else {
        return fragments;
    };
    let Ok(content) = Content::decode(&data) else {
        return fragments;
    };

    for op in &content.operations {
        match op.operator.as_str() {
            "Tj" | "'" | "\"" => {
                for operand in &op.operands {
                    if let Some(s) = object_string(operand) {
                        fragments.push(s);
                    }
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    let mut run = String::new();
                    for item in items {
                        if let Some(s) = object_string(item) {
                            run.push_str(&s);
                        }
                    }
                    if !run.trim().is_empty() {
                        fragments.push(run);
                    }
                }
            }
            _ => {}
        }
    }

    fragments.retain(|f| !f.trim().is_empty());
    fragments
}

fn object_string(obj: &Object) -> Option<String> {
    match obj {
        Object::String(bytes, _) => Some(String::from_utf8_lossy(bytes).to_string()),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::{dictionary, Document, Stream};
    use tempfile::NamedTempFile;

    /// Builds a single-page PDF whose content stream shows `text`.
    pub(crate) fn build_pdf_with_text(text: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.new_object_id();
        let resources_id = doc.new_object_id();
        let content_id = doc.new_object_id();
        let page_id = doc.new_object_id();

        doc.objects.insert(
            font_id,
            Object::Dictionary(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Courier",
            }),
        );

        doc.objects.insert(
            resources_id,
            Object::Dictionary(dictionary! {
                "Font" => dictionary! {
                    "F1" => font_id,
                },
            }),
        );

        let content = format!("BT /F1 12 Tf 50 700 Td ({}) Tj ET", text);
        let content_stream = Stream::new(dictionary! {}, content.into_bytes());
        doc.objects
            .insert(content_id, Object::Stream(content_stream));

        doc.objects.insert(
            page_id,
            Object::Dictionary(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => resources_id,
                "Contents" => content_id,
            }),
        );

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut pdf_bytes = Vec::new();
        doc.save_to(&mut pdf_bytes).unwrap();
        pdf_bytes
    }

    /// Builds a one-page PDF with no content stream at all.
    pub(crate) fn build_empty_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.new_object_id();

        doc.objects.insert(
            page_id,
            Object::Dictionary(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut pdf_bytes = Vec::new();
        doc.save_to(&mut pdf_bytes).unwrap();
        pdf_bytes
    }

    #[test]
    fn test_extract_embedded_text() {
        let pdf = build_pdf_with_text(
            "Jane Smith - Senior Engineer with ten years of Rust experience",
        );
        let file = NamedTempFile::with_suffix(".pdf").unwrap();
        std::fs::write(file.path(), &pdf).unwrap();

        let text = extract_pdf_text(file.path(), None).unwrap();
        assert!(text.contains("Jane Smith"), "got: {:?}", text);
    }

    #[test]
    fn test_empty_pdf_yields_empty_text_without_ocr() {
        let pdf = build_empty_pdf();
        let file = NamedTempFile::with_suffix(".pdf").unwrap();
        std::fs::write(file.path(), &pdf).unwrap();

        let text = extract_pdf_text(file.path(), None).unwrap();
        assert!(text.is_empty());
    }

    #[test]
    fn test_unparseable_pdf_yields_empty_text_without_ocr() {
        // OCR errors are swallowed at this layer, so garbage in means
        // empty text out rather than an error.
        let file = NamedTempFile::with_suffix(".pdf").unwrap();
        std::fs::write(file.path(), b"definitely not a pdf").unwrap();

        let text = extract_pdf_text(file.path(), None).unwrap();
        assert!(text.is_empty());
    }

    #[test]
    fn test_missing_file_error() {
        let result = extract_pdf_text(Path::new("/nonexistent/cv.pdf"), None);
        assert!(matches!(result, Err(ExtractError::ReadDocument { .. })));
    }

    #[test]
    fn test_sparse_page_supplementary_pass() {
        // A page with a short text layer still gets its content-stream
        // strings harvested, so the fragment shows up even if extract_text
        // already returned it.
        let pdf = build_pdf_with_text("Hi");
        let doc = Document::load_mem(&pdf).unwrap();
        let text = extract_native_text(&doc);
        assert!(text.contains("Hi"));
    }

    #[test]
    fn test_harvest_tj_strings() {
        let pdf = build_pdf_with_text("Fragment");
        let doc = Document::load_mem(&pdf).unwrap();
        let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
        let fragments = harvest_content_strings(&doc, page_id);
        assert!(fragments.iter().any(|f| f.contains("Fragment")));
    }
}
