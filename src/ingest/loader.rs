use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use super::parsers::{ParsedDocument, ParserRegistry};
use crate::error::{FileragError, Result};
use crate::registry::FileKind;

/// Turns a path into decoded text spans
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn load(&self, path: &Path, kind: FileKind) -> Result<ParsedDocument>;
}

/// Filesystem loader backed by the built-in parsers
///
/// Reads with `tokio::fs` and decodes on the blocking pool (PDF extraction
/// is CPU-bound).
#[derive(Clone)]
pub struct FsLoader {
    parsers: Arc<ParserRegistry>,
}

impl FsLoader {
    pub fn new(parsers: Arc<ParserRegistry>) -> Self {
        Self { parsers }
    }
}

impl Default for FsLoader {
    fn default() -> Self {
        Self::new(Arc::new(ParserRegistry::new()))
    }
}

#[async_trait]
impl DocumentLoader for FsLoader {
    async fn load(&self, path: &Path, kind: FileKind) -> Result<ParsedDocument> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FileragError::FileNotFound(path.display().to_string())
            } else {
                FileragError::Io(e)
            }
        })?;

        let parsers = Arc::clone(&self.parsers);
        let source = path.to_string_lossy().into_owned();
        tokio::task::spawn_blocking(move || parsers.parse(&bytes, &source, kind))
            .await
            .map_err(|e| FileragError::Parse(format!("Loader task failed: {}", e)))?
    }
}
