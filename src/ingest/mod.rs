//! Ingestion coordinator: path → registry record → units in the index.
//!
//! Ingestion is at-most-once and not transactional. Once a document is
//! registered its record stays, even when loading, chunking or indexing fails
//! afterwards: the caller sees [`IngestError::Failed`] carrying the new
//! `file_id`, and the record remains `registered` until deleted.

pub mod chunker;
pub mod loader;
pub mod parsers;

pub use chunker::{chunk_document, TextSplitter};
pub use loader::{DocumentLoader, FsLoader};
pub use parsers::{ParsedDocument, ParserRegistry, SourceSpan};

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

use crate::error::{with_timeout, FileragError};
use crate::index::VectorIndex;
use crate::lifecycle::{DocumentStatus, FileLocks};
use crate::registry::{FileKind, MetadataRegistry};

/// Outcome of a successful ingestion
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub file_id: String,
    pub filename: String,
    pub kind: FileKind,
    pub chunks: usize,
}

#[derive(Error, Debug)]
pub enum IngestError {
    /// Refused before any side effect (missing file, unsupported kind)
    #[error(transparent)]
    Rejected(FileragError),

    /// Failed after registration; the record is kept as `registered`
    #[error("{source}")]
    Failed {
        file_id: String,
        filename: String,
        source: FileragError,
    },
}

pub struct Ingestor {
    registry: Arc<Mutex<MetadataRegistry>>,
    index: Arc<dyn VectorIndex>,
    loader: Arc<dyn DocumentLoader>,
    locks: Arc<FileLocks>,
    splitter: TextSplitter,
    index_timeout_secs: u64,
}

impl Ingestor {
    pub fn new(
        registry: Arc<Mutex<MetadataRegistry>>,
        index: Arc<dyn VectorIndex>,
        loader: Arc<dyn DocumentLoader>,
        locks: Arc<FileLocks>,
        splitter: TextSplitter,
        index_timeout_secs: u64,
    ) -> Self {
        Self {
            registry,
            index,
            loader,
            locks,
            splitter,
            index_timeout_secs,
        }
    }

    /// Ingest `path`, detecting its kind from the extension.
    pub async fn ingest(&self, path: &Path) -> Result<IngestReport, IngestError> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(IngestError::Rejected(FileragError::FileNotFound(
                path.display().to_string(),
            )));
        }
        let kind = FileKind::from_path(path).map_err(IngestError::Rejected)?;
        self.ingest_kind(path, kind).await
    }

    /// Ingest `path` as a document of `kind`.
    pub async fn ingest_kind(&self, path: &Path, kind: FileKind) -> Result<IngestReport, IngestError> {
        let (file_id, filename, _guard) = {
            let mut registry = self.registry.lock().await;
            let file_id = registry.register(path, kind).map_err(IngestError::Rejected)?;
            let filename = registry
                .get(&file_id)
                .map(|r| r.filename.clone())
                .unwrap_or_else(|| path.display().to_string());
            // Uncontended: nobody else knows this id yet
            let guard = self.locks.write(&file_id).await;
            (file_id, filename, guard)
        };

        let failed = |source: FileragError| {
            log::warn!("Ingestion of {} ({}) failed: {}", filename, file_id, source);
            IngestError::Failed {
                file_id: file_id.clone(),
                filename: filename.clone(),
                source,
            }
        };

        let parsed = self.loader.load(path, kind).await.map_err(failed)?;
        let units = chunk_document(&parsed, &file_id, &self.splitter);
        if units.is_empty() {
            return Err(failed(FileragError::Parse(format!(
                "No text content could be extracted from {}",
                filename
            ))));
        }
        log::info!("Split {} into {} chunks", filename, units.len());

        with_timeout(self.index_timeout_secs, "adding chunks to the index", self.index.upsert(&units))
            .await
            .map_err(failed)?;

        self.registry
            .lock()
            .await
            .set_status(&file_id, DocumentStatus::Processed)
            .map_err(failed)?;

        Ok(IngestReport {
            file_id,
            filename,
            kind,
            chunks: units.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashEmbedder;
    use crate::index::{InMemoryIndex, MetadataFilter};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        root: std::path::PathBuf,
        registry: Arc<Mutex<MetadataRegistry>>,
        index: Arc<InMemoryIndex>,
        ingestor: Ingestor,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        let registry = Arc::new(Mutex::new(
            MetadataRegistry::open(root.join("file_metadata.json")).unwrap(),
        ));
        let index = Arc::new(InMemoryIndex::new(Arc::new(HashEmbedder::new(64))));
        let ingestor = Ingestor::new(
            Arc::clone(&registry),
            index.clone(),
            Arc::new(FsLoader::default()),
            Arc::new(FileLocks::new()),
            TextSplitter::new(500, 50).unwrap(),
            5,
        );
        Fixture {
            _dir: dir,
            root,
            registry,
            index,
            ingestor,
        }
    }

    #[tokio::test]
    async fn test_ingest_text_marks_processed() {
        let fx = fixture();
        let path = fx.root.join("notes.txt");
        std::fs::write(&path, "AI is the study of intelligent agents. ".repeat(40)).unwrap();

        let report = fx.ingestor.ingest(&path).await.unwrap();
        assert_eq!(report.filename, "notes.txt");
        assert_eq!(report.kind, FileKind::Text);
        assert!(report.chunks > 1);

        let registry = fx.registry.lock().await;
        assert_eq!(registry.get(&report.file_id).unwrap().status, DocumentStatus::Processed);
        let indexed = fx.index.count(&MetadataFilter::file_id(&report.file_id)).await.unwrap();
        assert_eq!(indexed, report.chunks);
    }

    #[tokio::test]
    async fn test_missing_file_has_no_side_effects() {
        let fx = fixture();
        let err = fx.ingestor.ingest(Path::new("notes.txt")).await.unwrap_err();
        assert_eq!(err.to_string(), "File not found: notes.txt");
        assert!(fx.registry.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_kind_has_no_side_effects() {
        let fx = fixture();
        let path = fx.root.join("slides.docx");
        std::fs::write(&path, "x").unwrap();

        let err = fx.ingestor.ingest(&path).await.unwrap_err();
        assert!(matches!(err, IngestError::Rejected(FileragError::UnsupportedFileType(ref ext)) if ext == ".docx"));
        assert!(fx.registry.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_document_keeps_registered_record() {
        let fx = fixture();
        let path = fx.root.join("blank.txt");
        std::fs::write(&path, "   \n\n  ").unwrap();

        let err = fx.ingestor.ingest(&path).await.unwrap_err();
        let IngestError::Failed { file_id, .. } = err else {
            panic!("expected a post-registration failure");
        };
        let registry = fx.registry.lock().await;
        assert_eq!(registry.get(&file_id).unwrap().status, DocumentStatus::Registered);
    }

    #[tokio::test]
    async fn test_reingesting_same_path_creates_new_identity() {
        let fx = fixture();
        let path = fx.root.join("notes.txt");
        std::fs::write(&path, "Some content about neural networks.").unwrap();

        let first = fx.ingestor.ingest(&path).await.unwrap();
        let second = fx.ingestor.ingest(&path).await.unwrap();
        assert_ne!(first.file_id, second.file_id);
        assert_eq!(fx.registry.lock().await.len(), 2);
        assert_eq!(fx.index.count(&MetadataFilter::file_id(&first.file_id)).await.unwrap(), 1);
    }
}
