use lopdf::Document;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// One uploaded PDF as raw bytes. `name` is only used in diagnostics.
#[derive(Debug, Clone)]
pub struct PdfInput {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl PdfInput {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractedCorpus {
    /// Text of every readable page of every document, in input order.
    pub text: String,
    pub documents: u32,
    pub pages_total: u32,
    pub pages_with_text: u32,
}

impl ExtractedCorpus {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Extract text from a batch of PDFs page by page.
///
/// Pages that fail to decode or yield only whitespace are skipped. A document
/// that cannot be parsed at all fails the whole batch with `PDF_PARSE_FAILED`.
pub fn extract_text(docs: &[PdfInput]) -> Result<ExtractedCorpus, AppError> {
    if docs.is_empty() {
        return Err(AppError::new(
            "INGEST_NO_DOCUMENTS",
            "At least one PDF document is required",
        ));
    }

    let mut corpus = ExtractedCorpus {
        text: String::new(),
        documents: 0,
        pages_total: 0,
        pages_with_text: 0,
    };

    for input in docs {
        let doc = Document::load_mem(&input.bytes).map_err(|e| {
            AppError::new("PDF_PARSE_FAILED", "Failed to parse PDF document")
                .with_details(format!("name={}; err={}", input.name, e))
        })?;
        corpus.documents += 1;

        for page_number in doc.get_pages().keys().copied() {
            corpus.pages_total += 1;
            let page_text = match doc.extract_text(&[page_number]) {
                Ok(t) => t,
                Err(e) => {
                    tracing::debug!(
                        name = %input.name,
                        page = page_number,
                        error = %e,
                        "skipping unreadable page"
                    );
                    continue;
                }
            };
            if page_text.trim().is_empty() {
                tracing::debug!(
                    name = %input.name,
                    page = page_number,
                    "skipping page without text"
                );
                continue;
            }
            corpus.pages_with_text += 1;
            corpus.text.push_str(&page_text);
            if !page_text.ends_with('\n') {
                corpus.text.push('\n');
            }
        }
    }

    tracing::info!(
        documents = corpus.documents,
        pages_total = corpus.pages_total,
        pages_with_text = corpus.pages_with_text,
        chars = corpus.text.chars().count(),
        "extracted pdf text"
    );
    Ok(corpus)
}
