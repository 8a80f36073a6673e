//! In-memory [`VectorIndex`] for tests and short-lived sessions.
//!
//! Brute-force cosine similarity over every stored vector behind a
//! `std::sync::RwLock`. Nothing survives the process.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use super::{cosine_similarity, top_k, MetadataFilter, RetrievableUnit, ScoredUnit, VectorIndex};
use crate::embeddings::Embedder;
use crate::error::{FileragError, Result};

struct StoredUnit {
    unit_id: String,
    unit: RetrievableUnit,
    vector: Vec<f32>,
}

pub struct InMemoryIndex {
    embedder: Arc<dyn Embedder>,
    units: RwLock<Vec<StoredUnit>>,
}

impl InMemoryIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            units: RwLock::new(Vec::new()),
        }
    }

    /// Total number of units across all documents
    pub fn len(&self) -> usize {
        self.units.read().map(|u| u.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned() -> FileragError {
        FileragError::Index("in-memory index lock poisoned".to_string())
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, units: &[RetrievableUnit]) -> Result<Vec<String>> {
        if units.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = units.iter().map(|u| u.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        if vectors.len() != units.len() {
            return Err(FileragError::Embedding(format!(
                "Expected {} embeddings, got {}",
                units.len(),
                vectors.len()
            )));
        }

        let mut stored = self.units.write().map_err(|_| Self::poisoned())?;
        let mut ids = Vec::with_capacity(units.len());
        for (unit, vector) in units.iter().zip(vectors) {
            let unit_id = Uuid::new_v4().to_string();
            ids.push(unit_id.clone());
            stored.push(StoredUnit {
                unit_id,
                unit: unit.clone(),
                vector,
            });
        }
        Ok(ids)
    }

    async fn query(&self, text: &str, k: usize, filter: &MetadataFilter) -> Result<Vec<ScoredUnit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = self.embedder.embed_query(text).await?;

        let stored = self.units.read().map_err(|_| Self::poisoned())?;
        let scored: Vec<ScoredUnit> = stored
            .iter()
            .filter(|s| filter.matches(&s.unit))
            .map(|s| ScoredUnit {
                unit_id: s.unit_id.clone(),
                unit: s.unit.clone(),
                score: cosine_similarity(&query_vec, &s.vector),
            })
            .collect();

        Ok(top_k(scored, k))
    }

    async fn get_ids(&self, filter: &MetadataFilter) -> Result<Vec<String>> {
        let stored = self.units.read().map_err(|_| Self::poisoned())?;
        Ok(stored
            .iter()
            .filter(|s| filter.matches(&s.unit))
            .map(|s| s.unit_id.clone())
            .collect())
    }

    async fn delete_ids(&self, ids: &[String]) -> Result<usize> {
        let mut stored = self.units.write().map_err(|_| Self::poisoned())?;
        let before = stored.len();
        stored.retain(|s| !ids.contains(&s.unit_id));
        Ok(before - stored.len())
    }

    async fn delete(&self, filter: &MetadataFilter) -> Result<usize> {
        let mut stored = self.units.write().map_err(|_| Self::poisoned())?;
        let before = stored.len();
        stored.retain(|s| !filter.matches(&s.unit));
        Ok(before - stored.len())
    }

    async fn count(&self, filter: &MetadataFilter) -> Result<usize> {
        let stored = self.units.read().map_err(|_| Self::poisoned())?;
        Ok(stored.iter().filter(|s| filter.matches(&s.unit)).count())
    }
}
