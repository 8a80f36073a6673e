//! PDF parser backed by pdf-extract.
//!
//! pdf-extract separates pages with form feeds; each page becomes its own span
//! so provenance can carry the page number.

use super::{ParsedDocument, Parser, SourceSpan};
use crate::error::{FileragError, Result};
use crate::registry::FileKind;

const PAGE_BREAK: char = '\x0C';

pub struct PdfParser;

impl Parser for PdfParser {
    fn kind(&self) -> FileKind {
        FileKind::Pdf
    }

    fn parse(&self, bytes: &[u8], source: &str) -> Result<ParsedDocument> {
        // pdf-extract panics on some malformed inputs
        let text = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
            .map_err(|_| FileragError::Parse(format!("PDF extraction panicked for {}", source)))?
            .map_err(|e| FileragError::Parse(format!("PDF extraction failed for {}: {}", source, e)))?;

        Ok(ParsedDocument {
            kind: FileKind::Pdf,
            spans: split_pages(&text, source),
        })
    }
}

/// Split extracted text into one span per non-blank page.
fn split_pages(text: &str, source: &str) -> Vec<SourceSpan> {
    text.split(PAGE_BREAK)
        .enumerate()
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(idx, page)| SourceSpan {
            text: page.to_string(),
            source: source.to_string(),
            page: Some(idx + 1),
        })
        .collect()
}
