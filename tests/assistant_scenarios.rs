//! End-to-end conversations against the assistant with local collaborators.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use filerag::answer::NO_RELEVANT_INFORMATION;
use filerag::embeddings::HashEmbedder;
use filerag::generate::{GenerationRequest, Generator};
use filerag::index::{InMemoryIndex, MetadataFilter, SqliteIndex, VectorIndex};
use filerag::ingest::FsLoader;
use filerag::lifecycle::DocumentStatus;
use filerag::registry::{FileKind, MetadataRegistry};
use filerag::{Assistant, Config, FileragError, Result};
use tempfile::TempDir;

/// Replies with a fixed answer and keeps every prompt it was given
#[derive(Default)]
struct ScriptedGenerator {
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        Ok("AI is the simulation of human intelligence by machines.".to_string())
    }
}

/// Fails every call the way an exhausted API quota would
struct UnavailableGenerator;

#[async_trait]
impl Generator for UnavailableGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
        Err(FileragError::Generation("API error 429: quota exceeded".to_string()))
    }
}

struct Harness {
    dir: TempDir,
    index: Arc<InMemoryIndex>,
    generator: Arc<ScriptedGenerator>,
    assistant: Assistant,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let registry = MetadataRegistry::open(dir.path().join("file_metadata.json")).unwrap();
        let index = Arc::new(InMemoryIndex::new(Arc::new(HashEmbedder::new(256))));
        let generator = Arc::new(ScriptedGenerator::default());
        let assistant = Assistant::new(
            &Config::default(),
            registry,
            index.clone(),
            generator.clone(),
            Arc::new(FsLoader::default()),
        )
        .unwrap();
        Self {
            dir,
            index,
            generator,
            assistant,
        }
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    async fn say(&self, input: &str) -> String {
        self.assistant.process_input(input).await
    }

    async fn load(&self, path: &Path) -> String {
        let reply = self.say(&format!("load {}", path.display())).await;
        assert!(reply.starts_with("Data loaded successfully."), "{}", reply);
        reply
    }
}

fn file_id_from_load_reply(reply: &str) -> String {
    reply
        .rsplit("Unique ID: ")
        .next()
        .unwrap()
        .trim()
        .to_string()
}

const AI_TEXT: &str = "Artificial intelligence (AI) is intelligence demonstrated by machines. \
AI research studies intelligent agents that perceive their environment and act to achieve goals.";

const BREAD_TEXT: &str = "Sourdough bread is leavened by wild yeast and lactobacilli. \
Bakers feed the starter with flour and water every day.";

#[tokio::test]
async fn scenario_a_query_by_ordinal() {
    let h = Harness::new();
    let path = h.write("ai.txt", AI_TEXT);
    h.load(&path).await;

    let reply = h.say("1 what is AI").await;
    assert_eq!(
        reply,
        "AI is the simulation of human intelligence by machines.\n\nSources:\n Source: ai.txt"
    );

    let prompts = h.generator.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("intelligent agents"));
    assert!(prompts[0].ends_with("Answer the question based on the above context: what is AI"));
}

#[tokio::test]
async fn query_never_sees_other_documents() {
    let h = Harness::new();
    h.load(&h.write("ai.txt", AI_TEXT)).await;
    h.load(&h.write("bread.txt", BREAD_TEXT)).await;

    let reply = h.say("2 how is sourdough leavened").await;
    assert!(reply.ends_with("Sources:\n Source: bread.txt"), "{}", reply);

    let prompts = h.generator.prompts.lock().unwrap();
    assert!(prompts[0].contains("wild yeast"));
    assert!(!prompts[0].contains("intelligent agents"));
}

#[tokio::test]
async fn scenario_b_delete_renumbers_listing() {
    let h = Harness::new();
    let first = file_id_from_load_reply(&h.load(&h.write("ai.txt", AI_TEXT)).await);
    let second = file_id_from_load_reply(&h.load(&h.write("bread.txt", BREAD_TEXT)).await);

    let reply = h.say("delete 2").await;
    assert_eq!(reply, format!("Successfully deleted file: bread.txt (ID: {})", second));
    assert_eq!(h.index.count(&MetadataFilter::file_id(&second)).await.unwrap(), 0);
    assert!(h.index.count(&MetadataFilter::file_id(&first)).await.unwrap() > 0);

    assert_eq!(h.say("list").await, format!("Loaded files:\n1. ai.txt (ID: {})", first));
}

#[tokio::test]
async fn scenario_c_missing_file_leaves_registry_untouched() {
    let h = Harness::new();
    assert_eq!(h.say("load notes.txt").await, "File not found: notes.txt");
    assert_eq!(
        h.say("list").await,
        "No files loaded yet. Use 'load [file_path]' to add a file."
    );
    assert_eq!(h.assistant.file_count().await, 0);
}

#[tokio::test]
async fn scenario_d_failed_ingestion_answers_no_information() {
    let h = Harness::new();
    let path = h.write("empty.txt", "  \n\n   \n");

    let reply = h.say(&format!("load {}", path.display())).await;
    assert!(reply.starts_with("Failed to load file:"), "{}", reply);

    // The record survives as `registered` with zero units
    let listing = h.say("list").await;
    assert!(listing.starts_with("Loaded files:\n1. empty.txt (ID: "), "{}", listing);

    assert_eq!(h.say("1 what is AI").await, NO_RELEVANT_INFORMATION);
    assert!(h.generator.prompts.lock().unwrap().is_empty());

    // And it can still be deleted
    let reply = h.say("delete 1").await;
    assert!(reply.starts_with("No documents found in vector database for this file\nSuccessfully deleted file: empty.txt"));
}

#[tokio::test]
async fn ordinals_are_stable_without_deletions() {
    let h = Harness::new();
    h.load(&h.write("a.txt", AI_TEXT)).await;
    h.load(&h.write("b.txt", BREAD_TEXT)).await;

    let first = h.say("list").await;
    h.say("1 what is AI").await;
    assert_eq!(h.say("list").await, first);
}

#[tokio::test]
async fn invalid_ordinals_are_reported() {
    let h = Harness::new();
    h.load(&h.write("a.txt", AI_TEXT)).await;

    assert_eq!(
        h.say("5 what is AI").await,
        "Invalid file number: 5. Use 'list' to see available files."
    );
    assert_eq!(
        h.say("delete 0").await,
        "Invalid file number: 0. Use 'list' to see available files."
    );
    assert_eq!(h.say("delete").await, "Please provide a file number to delete. Example: delete 1");
    assert_eq!(
        h.say("99999999999999999999 what is AI").await,
        "Invalid file number: 99999999999999999999. Use 'list' to see available files."
    );
}

#[tokio::test]
async fn deleting_same_ordinal_twice_does_not_crash() {
    let h = Harness::new();
    h.load(&h.write("a.txt", AI_TEXT)).await;

    assert!(h.say("delete 1").await.starts_with("Successfully deleted file: a.txt"));
    assert_eq!(
        h.say("delete 1").await,
        "Invalid file number: 1. Use 'list' to see available files."
    );
    assert_eq!(
        h.say("1 what is AI").await,
        "Invalid file number: 1. Use 'list' to see available files."
    );
}

#[tokio::test]
async fn sqlite_backed_state_survives_restart() {
    let dir = TempDir::new().unwrap();
    let registry_path = dir.path().join("file_metadata.json");
    let index_path = dir.path().join("index.db");
    let doc = dir.path().join("ai.txt");
    std::fs::write(&doc, AI_TEXT).unwrap();

    let build = || {
        let embedder = Arc::new(HashEmbedder::new(128));
        Assistant::new(
            &Config::default(),
            MetadataRegistry::open(&registry_path).unwrap(),
            Arc::new(SqliteIndex::open(&index_path, embedder).unwrap()),
            Arc::new(ScriptedGenerator::default()),
            Arc::new(FsLoader::default()),
        )
        .unwrap()
    };

    let listing = {
        let assistant = build();
        let reply = assistant.process_input(&format!("load {}", doc.display())).await;
        assert!(reply.starts_with("Data loaded successfully."), "{}", reply);
        assistant.process_input("list").await
    };

    let assistant = build();
    assert_eq!(assistant.process_input("list").await, listing);
    let reply = assistant.process_input("1 what is AI").await;
    assert!(reply.ends_with("Sources:\n Source: ai.txt"), "{}", reply);
}

#[tokio::test]
async fn interrupted_deletion_is_finished_on_startup() {
    let dir = TempDir::new().unwrap();
    let registry_path = dir.path().join("file_metadata.json");
    let index = Arc::new(InMemoryIndex::new(Arc::new(HashEmbedder::new(64))));

    let (stuck, kept) = {
        let mut registry = MetadataRegistry::open(&registry_path).unwrap();
        let stuck = registry.register(Path::new("/docs/stuck.txt"), FileKind::Text).unwrap();
        let kept = registry.register(Path::new("/docs/kept.txt"), FileKind::Text).unwrap();
        registry.set_status(&stuck, DocumentStatus::Deleting).unwrap();
        (stuck, kept)
    };

    let assistant = Assistant::new(
        &Config::default(),
        MetadataRegistry::open(&registry_path).unwrap(),
        index.clone(),
        Arc::new(ScriptedGenerator::default()),
        Arc::new(FsLoader::default()),
    )
    .unwrap();

    let finished = assistant.recover().await;
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].file_id, stuck);
    assert_eq!(
        assistant.process_input("list").await,
        format!("Loaded files:\n1. kept.txt (ID: {})", kept)
    );

    let reopened = MetadataRegistry::open(&registry_path).unwrap();
    assert!(!reopened.contains(&stuck));
}

#[tokio::test]
async fn help_and_unknown_replies() {
    let h = Harness::new();
    h.load(&h.write("a.txt", AI_TEXT)).await;

    let help = h.say("hello").await;
    assert!(help.contains("Current status: 1 files loaded"));
    assert_eq!(h.say("tell me a joke").await, "Type 'help' to see what I can do.");
}

#[tokio::test]
async fn generator_failure_is_reported_as_retryable_search_error() {
    let dir = TempDir::new().unwrap();
    let doc = dir.path().join("ai.txt");
    std::fs::write(&doc, AI_TEXT).unwrap();

    let assistant = Assistant::new(
        &Config::default(),
        MetadataRegistry::open(dir.path().join("file_metadata.json")).unwrap(),
        Arc::new(InMemoryIndex::new(Arc::new(HashEmbedder::new(128)))),
        Arc::new(UnavailableGenerator),
        Arc::new(FsLoader::default()),
    )
    .unwrap();

    let reply = assistant.process_input(&format!("load {}", doc.display())).await;
    assert!(reply.starts_with("Data loaded successfully."), "{}", reply);

    let reply = assistant.process_input("1 what is AI").await;
    assert!(reply.starts_with("Error while searching: "), "{}", reply);
    assert!(reply.contains("quota exceeded"), "{}", reply);
    assert!(reply.ends_with("(this may be temporary; please try again)"), "{}", reply);

    // The document is untouched and still listed
    assert!(assistant.process_input("list").await.starts_with("Loaded files:\n1. ai.txt"));
}
