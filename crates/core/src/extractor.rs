use crate::error::IngestError;
use lopdf::Document;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor: Send + Sync {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let document = Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        // get_pages is keyed by page number, so iteration is already in reading order.
        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(format!("page {page_no}: {error}")))?;

            pages.push(PageText {
                number: page_no,
                text,
            });
        }

        Ok(pages)
    }
}

/// Concatenated text of every page, or an empty string when the file cannot be read.
///
/// Failures are logged rather than returned; an empty result marks the file as
/// ineligible for the knowledge base.
pub fn extract_pdf_text(extractor: &dyn PdfExtractor, path: &Path) -> String {
    match extractor.extract_pages(path) {
        Ok(pages) => {
            let text = pages.into_iter().map(|page| page.text).collect::<String>();
            debug!(path = %path.display(), chars = text.chars().count(), "extracted pdf text");
            if text.trim().is_empty() {
                warn!(path = %path.display(), "pdf contained no extractable text");
                return String::new();
            }
            text
        }
        Err(error) => {
            warn!(path = %path.display(), %error, "error extracting text from pdf");
            String::new()
        }
    }
}
