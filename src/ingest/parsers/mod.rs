pub mod pdf;
pub mod plaintext;

use crate::error::{FileragError, Result};
use crate::registry::FileKind;

/// A loaded document, decoded into text spans
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub kind: FileKind,
    pub spans: Vec<SourceSpan>,
}

impl ParsedDocument {
    /// Total characters across all spans
    pub fn char_len(&self) -> usize {
        self.spans.iter().map(|s| s.text.chars().count()).sum()
    }
}

/// A contiguous run of decoded text and where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSpan {
    pub text: String,
    /// Path of the originating file (used for provenance)
    pub source: String,
    /// 1-based page number for paginated formats
    pub page: Option<usize>,
}

/// Trait for document parsers
pub trait Parser: Send + Sync {
    /// The file kind this parser decodes
    fn kind(&self) -> FileKind;

    /// Decode raw file bytes into text spans
    fn parse(&self, bytes: &[u8], source: &str) -> Result<ParsedDocument>;
}

/// Parser registry that selects the parser by file kind
pub struct ParserRegistry {
    parsers: Vec<Box<dyn Parser>>,
}

impl ParserRegistry {
    /// Create a new parser registry with all built-in parsers
    pub fn new() -> Self {
        let mut registry = Self {
            parsers: Vec::new(),
        };

        registry.register(Box::new(plaintext::PlainTextParser));
        registry.register(Box::new(pdf::PdfParser));

        registry
    }

    /// Register a parser (later registrations do not shadow earlier ones)
    pub fn register(&mut self, parser: Box<dyn Parser>) {
        self.parsers.push(parser);
    }

    pub fn find_parser(&self, kind: FileKind) -> Option<&dyn Parser> {
        self.parsers
            .iter()
            .find(|p| p.kind() == kind)
            .map(|p| p.as_ref())
    }

    /// Parse bytes with the parser registered for `kind`
    pub fn parse(&self, bytes: &[u8], source: &str, kind: FileKind) -> Result<ParsedDocument> {
        let parser = self.find_parser(kind).ok_or_else(|| {
            FileragError::UnsupportedFileType(format!("no parser registered for {}", kind))
        })?;
        parser.parse(bytes, source)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_registry() {
        let registry = ParserRegistry::new();
        assert!(registry.find_parser(FileKind::Text).is_some());
        assert!(registry.find_parser(FileKind::Pdf).is_some());
    }

    #[test]
    fn test_parse_dispatches_by_kind() {
        let registry = ParserRegistry::new();
        let doc = registry
            .parse(b"hello world", "notes.txt", FileKind::Text)
            .unwrap();
        assert_eq!(doc.kind, FileKind::Text);
        assert_eq!(doc.spans.len(), 1);
        assert_eq!(doc.char_len(), 11);

        // Plain text bytes are not a PDF
        assert!(registry.parse(b"hello world", "fake.pdf", FileKind::Pdf).is_err());
    }

    #[test]
    fn test_empty_registry_has_no_parser() {
        let registry = ParserRegistry { parsers: Vec::new() };
        let err = registry.parse(b"x", "a.txt", FileKind::Text).unwrap_err();
        assert!(matches!(err, FileragError::UnsupportedFileType(_)));
    }
}
