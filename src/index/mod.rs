//! Retrievable index: similarity search over document units.
//!
//! [`VectorIndex`] is the contract the coordinators depend on. Two backends are
//! provided: [`SqliteIndex`] (persistent, default) and [`InMemoryIndex`] (tests
//! and embedding in other tools). Both embed through an injected
//! [`Embedder`](crate::embeddings::Embedder) and score by cosine similarity.

pub mod memory;
pub mod sqlite;

use crate::error::Result;
use crate::registry::FileKind;
use async_trait::async_trait;

pub use memory::InMemoryIndex;
pub use sqlite::SqliteIndex;

/// A contiguous text span from one document, tagged with its owner
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievableUnit {
    pub text: String,
    /// Owning document; immutable once indexed
    pub file_id: String,
    pub file_type: FileKind,
    /// Origin path, shown as provenance
    pub source: String,
    pub page: Option<usize>,
    /// Character offset of `text` within its source span
    pub start_index: usize,
}

/// A unit returned from a similarity query
#[derive(Debug, Clone)]
pub struct ScoredUnit {
    /// Identifier assigned by the index on insertion
    pub unit_id: String,
    pub unit: RetrievableUnit,
    /// Cosine similarity; comparable only within one query
    pub score: f32,
}

/// Metadata field usable in an exact-match filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataField {
    FileId,
    FileType,
    Source,
}

impl MetadataField {
    /// Column name in the SQLite backend
    pub(crate) fn column(&self) -> &'static str {
        match self {
            MetadataField::FileId => "file_id",
            MetadataField::FileType => "file_type",
            MetadataField::Source => "source",
        }
    }
}

/// Exact-match metadata predicate (`field = value`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataFilter {
    pub field: MetadataField,
    pub value: String,
}

impl MetadataFilter {
    pub fn new(field: MetadataField, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }

    pub fn file_id(file_id: impl Into<String>) -> Self {
        Self::new(MetadataField::FileId, file_id)
    }

    pub fn matches(&self, unit: &RetrievableUnit) -> bool {
        match self.field {
            MetadataField::FileId => unit.file_id == self.value,
            MetadataField::FileType => unit.file_type.as_str() == self.value,
            MetadataField::Source => unit.source == self.value,
        }
    }
}

/// Similarity-searchable store of retrievable units
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Embed and insert units; returns the identifiers assigned, in input order.
    async fn upsert(&self, units: &[RetrievableUnit]) -> Result<Vec<String>>;

    /// Top-`k` units matching `filter`, most similar first.
    ///
    /// Fewer than `k` results is a normal outcome for small corpora.
    async fn query(&self, text: &str, k: usize, filter: &MetadataFilter) -> Result<Vec<ScoredUnit>>;

    /// Identifiers of all units matching `filter`.
    async fn get_ids(&self, filter: &MetadataFilter) -> Result<Vec<String>>;

    /// Delete units by identifier; returns how many existed.
    async fn delete_ids(&self, ids: &[String]) -> Result<usize>;

    /// Delete every unit matching `filter`; returns how many were removed.
    async fn delete(&self, filter: &MetadataFilter) -> Result<usize>;

    /// Number of units matching `filter`.
    async fn count(&self, filter: &MetadataFilter) -> Result<usize>;
}

/// Cosine similarity, or 0.0 when lengths differ or either vector has zero magnitude
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}

/// Sort by descending score and keep the first `k`.
pub(crate) fn top_k(mut scored: Vec<ScoredUnit>, k: usize) -> Vec<ScoredUnit> {
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    scored
}
