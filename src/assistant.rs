//! Dispatcher from parsed commands to coordinator calls and reply text.
//!
//! Every outcome, including failures of the index or the generator, becomes a
//! reply string; nothing here returns an error to the REPL.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::answer::{AnswerComposer, AnswerOutcome, NO_RELEVANT_INFORMATION};
use crate::config::Config;
use crate::delete::{DeleteReport, DeletionCoordinator};
use crate::embeddings::build_embedder;
use crate::error::{FileragError, Result};
use crate::generate::{ChatCompletionsGenerator, Generator};
use crate::index::{SqliteIndex, VectorIndex};
use crate::ingest::{DocumentLoader, FsLoader, IngestError, Ingestor, TextSplitter};
use crate::lifecycle::FileLocks;
use crate::registry::{resolve_ordinal, MetadataRegistry};
use crate::router::{parse_command, Command};

pub const UNKNOWN_REPLY: &str = "Type 'help' to see what I can do.";
const LOAD_USAGE: &str = r"Please provide a file path. Example: load C:\path\to\file.pdf";
const DELETE_USAGE: &str = "Please provide a file number to delete. Example: delete 1";
const EMPTY_LISTING: &str = "No files loaded yet. Use 'load [file_path]' to add a file.";

pub struct Assistant {
    registry: Arc<Mutex<MetadataRegistry>>,
    ingestor: Ingestor,
    composer: AnswerComposer,
    deleter: DeletionCoordinator,
}

impl Assistant {
    /// Wire the coordinators around injected collaborators.
    pub fn new(
        config: &Config,
        registry: MetadataRegistry,
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn Generator>,
        loader: Arc<dyn DocumentLoader>,
    ) -> Result<Self> {
        let registry = Arc::new(Mutex::new(registry));
        let locks = Arc::new(FileLocks::new());
        let retrieval = &config.retrieval;
        let splitter = TextSplitter::new(retrieval.chunk_size, retrieval.chunk_overlap)?;

        Ok(Self {
            ingestor: Ingestor::new(
                Arc::clone(&registry),
                Arc::clone(&index),
                loader,
                Arc::clone(&locks),
                splitter,
                retrieval.index_timeout_secs,
            ),
            composer: AnswerComposer::new(
                Arc::clone(&registry),
                Arc::clone(&index),
                generator,
                Arc::clone(&locks),
                config.generator.clone(),
                retrieval.top_k,
                retrieval.index_timeout_secs,
            ),
            deleter: DeletionCoordinator::new(
                Arc::clone(&registry),
                index,
                locks,
                retrieval.index_timeout_secs,
            ),
            registry,
        })
    }

    /// Open the configured registry and SQLite index and build the HTTP clients.
    pub fn from_config(config: &Config) -> Result<Self> {
        let registry = MetadataRegistry::open(config.registry_path())?;
        let embedder = build_embedder(&config.embeddings)?;
        let index = Arc::new(SqliteIndex::open(config.index_path(), embedder)?);
        let generator = Arc::new(ChatCompletionsGenerator::from_config(&config.generator)?);
        Self::new(config, registry, index, generator, Arc::new(FsLoader::default()))
    }

    /// Finish deletions a previous run left in `deleting`.
    pub async fn recover(&self) -> Vec<DeleteReport> {
        self.deleter.recover_interrupted().await
    }

    pub async fn file_count(&self) -> usize {
        self.registry.lock().await.len()
    }

    /// Handle one line of user input and produce the reply.
    pub async fn process_input(&self, input: &str) -> String {
        let command = parse_command(input);
        log::debug!("Routed {:?} to {:?}", input, command);

        match command {
            Command::Help => self.help().await,
            Command::Load { path: Some(path) } => self.load(&path).await,
            Command::Load { path: None } => LOAD_USAGE.to_string(),
            Command::List => self.list().await,
            Command::Delete { ordinal: Some(ordinal) } => self.delete(&ordinal).await,
            Command::Delete { ordinal: None } => DELETE_USAGE.to_string(),
            Command::Query { ordinal, question } => self.query(&ordinal, &question).await,
            Command::Unknown => UNKNOWN_REPLY.to_string(),
        }
    }

    async fn help(&self) -> String {
        format!(
            "RAG Assistant - Here's what I can do:\n\
             1. Load PDF or text files: \"load C:\\path\\to\\file.pdf\"\n\
             2. List loaded files: \"list\"\n\
             3. Ask about a specific file: \"[number] your question\" (e.g., \"1 what is AI\")\n\
             4. Delete a file: \"delete [number]\" (e.g., \"delete 1\")\n\
             Current status: {} files loaded",
            self.file_count().await
        )
    }

    async fn load(&self, path: &str) -> String {
        match self.ingestor.ingest(Path::new(path)).await {
            Ok(report) => {
                log::info!(
                    "Successfully processed {} file! Created {} chunks.",
                    report.kind,
                    report.chunks
                );
                format!(
                    "Data loaded successfully. File: {}, Unique ID: {}",
                    report.filename, report.file_id
                )
            }
            Err(IngestError::Rejected(FileragError::FileNotFound(path))) => {
                format!("File not found: {}", path)
            }
            Err(IngestError::Rejected(FileragError::UnsupportedFileType(ext))) => {
                format!("Only PDF and TXT files are supported. You provided: {}", ext)
            }
            Err(IngestError::Rejected(e)) => format!("Failed to load file: {}", describe(&e)),
            Err(IngestError::Failed { source, .. }) => {
                format!("Failed to load file: {}", describe(&source))
            }
        }
    }

    async fn list(&self) -> String {
        let registry = self.registry.lock().await;
        if registry.is_empty() {
            return EMPTY_LISTING.to_string();
        }

        let mut lines = vec!["Loaded files:".to_string()];
        for (idx, entry) in registry.list().iter().enumerate() {
            lines.push(format!("{}. {} (ID: {})", idx + 1, entry.record.filename, entry.file_id));
        }
        lines.join("\n")
    }

    async fn delete(&self, ordinal: &str) -> String {
        let file_id = match self.resolve(ordinal).await {
            Ok(id) => id,
            Err(reply) => return reply,
        };

        match self.deleter.delete(&file_id).await {
            Ok(report) => report.render(),
            Err(FileragError::DocumentNotFound(id)) => format!("File ID not found: {}", id),
            Err(e) => format!("Error deleting file: {}", describe(&e)),
        }
    }

    async fn query(&self, ordinal: &str, question: &str) -> String {
        let file_id = match self.resolve(ordinal).await {
            Ok(id) => id,
            Err(reply) => return reply,
        };

        if question.trim().is_empty() {
            let registry = self.registry.lock().await;
            let filename = registry.get(&file_id).map(|r| r.filename.as_str()).unwrap_or("this file");
            return format!("Please ask a specific question about {}.", filename);
        }

        match self.composer.answer(&file_id, question).await {
            Ok(AnswerOutcome::Answered(answer)) => answer.render(),
            Ok(AnswerOutcome::NoRelevantInformation) => NO_RELEVANT_INFORMATION.to_string(),
            Ok(AnswerOutcome::BeingDeleted { filename }) => format!(
                "File is being deleted: {}. Run 'delete {}' again to finish.",
                filename, ordinal
            ),
            Err(FileragError::DocumentNotFound(id)) => format!("File ID not found: {}", id),
            Err(e) => format!("Error while searching: {}", describe(&e)),
        }
    }

    /// Ordinal → file_id against a fresh listing, or the reply explaining why not.
    async fn resolve(&self, ordinal: &str) -> std::result::Result<String, String> {
        let registry = self.registry.lock().await;
        resolve_ordinal(registry.list(), ordinal).map_err(|e| e.to_string())
    }
}

fn describe(error: &FileragError) -> String {
    if error.is_retryable() {
        format!("{} (this may be temporary; please try again)", error)
    } else {
        error.to_string()
    }
}
