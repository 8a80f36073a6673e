use super::{ParsedDocument, Parser, SourceSpan};
use crate::error::{FileragError, Result};
use crate::registry::FileKind;

/// UTF-8 plain text parser
///
/// Treats the entire file as a single span.
pub struct PlainTextParser;

impl Parser for PlainTextParser {
    fn kind(&self) -> FileKind {
        FileKind::Text
    }

    fn parse(&self, bytes: &[u8], source: &str) -> Result<ParsedDocument> {
        let text = std::str::from_utf8(bytes).map_err(|e| {
            FileragError::Parse(format!("{} is not valid UTF-8: {}", source, e))
        })?;

        // Strip a UTF-8 byte order mark if present
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        Ok(ParsedDocument {
            kind: FileKind::Text,
            spans: vec![SourceSpan {
                text: text.to_string(),
                source: source.to_string(),
                page: None,
            }],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_span_with_source() {
        let doc = PlainTextParser.parse("line one\nline two".as_bytes(), "/tmp/notes.txt").unwrap();
        assert_eq!(doc.spans.len(), 1);
        assert_eq!(doc.spans[0].text, "line one\nline two");
        assert_eq!(doc.spans[0].source, "/tmp/notes.txt");
        assert_eq!(doc.spans[0].page, None);
    }

    #[test]
    fn test_bom_is_stripped() {
        let doc = PlainTextParser.parse("\u{feff}hello".as_bytes(), "a.txt").unwrap();
        assert_eq!(doc.spans[0].text, "hello");
    }

    #[test]
    fn test_invalid_utf8_is_parse_error() {
        let err = PlainTextParser.parse(&[0xff, 0xfe, 0xfd], "bad.txt").unwrap_err();
        assert!(matches!(err, FileragError::Parse(_)));
        assert!(err.to_string().contains("bad.txt"));
    }
}
