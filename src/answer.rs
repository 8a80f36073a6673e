//! Retrieval and answer composition scoped to one document.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::GeneratorConfig;
use crate::error::{with_timeout, FileragError, Result};
use crate::generate::{GenerationRequest, Generator};
use crate::index::{MetadataFilter, ScoredUnit, VectorIndex};
use crate::lifecycle::FileLocks;
use crate::registry::MetadataRegistry;

pub const NO_RELEVANT_INFORMATION: &str =
    "No relevant information found for your question.Try rephrasing or asking about something else.";

/// Separator placed between retrieved chunks in the prompt context
const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

const PROMPT_HEADER: &str = "Answer the question based only on the following context:";

const PROMPT_QUESTION: &str = "Answer the question based on the above context:";

/// A generated answer and where its context came from
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    /// `Source: <basename>` strings, deduplicated, first-seen order
    pub sources: Vec<String>,
}

impl Answer {
    pub fn render(&self) -> String {
        format!("{}\n\nSources:\n {}", self.text, self.sources.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    Answered(Answer),
    /// The filtered search matched nothing; a normal outcome
    NoRelevantInformation,
    /// The record is mid-deletion and no longer searchable
    BeingDeleted { filename: String },
}

pub struct AnswerComposer {
    registry: Arc<Mutex<MetadataRegistry>>,
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn Generator>,
    locks: Arc<FileLocks>,
    generation: GeneratorConfig,
    top_k: usize,
    index_timeout_secs: u64,
}

impl AnswerComposer {
    pub fn new(
        registry: Arc<Mutex<MetadataRegistry>>,
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn Generator>,
        locks: Arc<FileLocks>,
        generation: GeneratorConfig,
        top_k: usize,
        index_timeout_secs: u64,
    ) -> Self {
        Self {
            registry,
            index,
            generator,
            locks,
            generation,
            top_k,
            index_timeout_secs,
        }
    }

    /// Answer `question` from the units of `file_id` only.
    ///
    /// Fails with [`FileragError::DocumentNotFound`] when the id has no record.
    pub async fn answer(&self, file_id: &str, question: &str) -> Result<AnswerOutcome> {
        let results = {
            let guard = self.locks.read(file_id).await;

            let record = self
                .registry
                .lock()
                .await
                .get(file_id)
                .map(|r| (r.status, r.filename.clone()));
            let Some((status, filename)) = record else {
                drop(guard);
                self.locks.forget(file_id);
                return Err(FileragError::DocumentNotFound(file_id.to_string()));
            };
            if !status.is_queryable() {
                return Ok(AnswerOutcome::BeingDeleted { filename });
            }

            with_timeout(
                self.index_timeout_secs,
                "searching the index",
                self.index.query(question, self.top_k, &MetadataFilter::file_id(file_id)),
            )
            .await?
        };

        if results.is_empty() {
            log::debug!("No units matched query for {}", file_id);
            return Ok(AnswerOutcome::NoRelevantInformation);
        }

        let prompt = build_prompt(&results, question);
        let request = GenerationRequest::from_config(prompt, &self.generation);
        let text = with_timeout(
            self.generation.timeout_secs,
            "waiting for the generator",
            self.generator.generate(&request),
        )
        .await?;

        Ok(AnswerOutcome::Answered(Answer {
            text,
            sources: collect_sources(&results),
        }))
    }
}

/// Assemble the prompt from the retrieved context, preserving result order.
///
/// Chunk text is inserted verbatim, placeholders included.
pub fn build_prompt(results: &[ScoredUnit], question: &str) -> String {
    let context = results
        .iter()
        .map(|r| r.unit.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_DELIMITER);
    format!("{}\n\n{}\n\n---\n\n{} {}", PROMPT_HEADER, context, PROMPT_QUESTION, question)
}

fn collect_sources(results: &[ScoredUnit]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for result in results {
        let basename = Path::new(&result.unit.source)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| result.unit.source.clone());
        let source = format!("Source: {}", basename);
        if !sources.contains(&source) {
            sources.push(source);
        }
    }
    sources
}
