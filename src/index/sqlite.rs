use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::params;
use uuid::Uuid;

use super::{cosine_similarity, top_k, MetadataFilter, RetrievableUnit, ScoredUnit, VectorIndex};
use crate::db::{migrate, Db};
use crate::embeddings::Embedder;
use crate::error::{FileragError, Result};
use crate::registry::FileKind;

/// SQLite bound-parameter budget per statement
const MAX_PARAMS_PER_STATEMENT: usize = 500;

/// Persistent retrievable index stored in a single SQLite file
///
/// Units live in the `units` table with their embedding as a little-endian
/// f32 BLOB. Filtering happens in SQL, similarity scoring in Rust.
pub struct SqliteIndex {
    db: Db,
    embedder: Arc<dyn Embedder>,
}

impl SqliteIndex {
    /// Open (creating if needed) the index at `path` and apply migrations.
    pub fn open<P: AsRef<Path>>(path: P, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let db = Db::new(path);
        let mut conn = db.open_connection()?;
        migrate::run_migrations(&mut conn)?;
        log::debug!("Opened retrievable index at {}", db.path().display());
        Ok(Self { db, embedder })
    }

    pub fn path(&self) -> &Path {
        self.db.path()
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
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

        let rows: Vec<(String, RetrievableUnit, Vec<u8>)> = units
            .iter()
            .zip(vectors)
            .map(|(unit, vector)| (Uuid::new_v4().to_string(), unit.clone(), embedding_to_blob(&vector)))
            .collect();
        let ids: Vec<String> = rows.iter().map(|(id, _, _)| id.clone()).collect();

        let inserted = rows.len();
        self.db
            .with_connection(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO units (unit_id, file_id, file_type, source, page, start_index, text, embedding)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    )?;
                    for (unit_id, unit, blob) in &rows {
                        stmt.execute(params![
                            unit_id,
                            unit.file_id,
                            unit.file_type.as_str(),
                            unit.source,
                            unit.page.map(|p| p as i64),
                            unit.start_index as i64,
                            unit.text,
                            blob,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await?;

        log::debug!("Inserted {} units into index", inserted);
        Ok(ids)
    }

    async fn query(&self, text: &str, k: usize, filter: &MetadataFilter) -> Result<Vec<ScoredUnit>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let embed_start = std::time::Instant::now();
        let query_vec = self.embedder.embed_query(text).await?;
        log::debug!("Index query: embedding took {:?}", embed_start.elapsed());

        let sql = format!(
            "SELECT unit_id, file_id, file_type, source, page, start_index, text, embedding
             FROM units WHERE {} = ?1",
            filter.field.column()
        );
        let value = filter.value.clone();

        let rows = self
            .db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let mut rows = stmt.query(params![value])?;
                let mut results = Vec::new();
                while let Some(row) = rows.next()? {
                    let unit_id: String = row.get(0)?;
                    let file_id: String = row.get(1)?;
                    let file_type: String = row.get(2)?;
                    let source: String = row.get(3)?;
                    let page: Option<i64> = row.get(4)?;
                    let start_index: i64 = row.get(5)?;
                    let text: String = row.get(6)?;
                    let blob: Vec<u8> = row.get(7)?;
                    results.push((unit_id, file_id, file_type, source, page, start_index, text, blob));
                }
                Ok(results)
            })
            .await?;

        let mut scored = Vec::with_capacity(rows.len());
        for (unit_id, file_id, file_type, source, page, start_index, text, blob) in rows {
            let embedding = match parse_embedding(&blob) {
                Some(e) => e,
                None => {
                    log::warn!("Skipping unit {} with malformed embedding", unit_id);
                    continue;
                }
            };
            let file_type = match parse_kind(&file_type) {
                Some(kind) => kind,
                None => {
                    log::warn!("Skipping unit {} with unknown file type {}", unit_id, file_type);
                    continue;
                }
            };
            scored.push(ScoredUnit {
                score: cosine_similarity(&query_vec, &embedding),
                unit_id,
                unit: RetrievableUnit {
                    text,
                    file_id,
                    file_type,
                    source,
                    page: page.map(|p| p as usize),
                    start_index: start_index as usize,
                },
            });
        }

        Ok(top_k(scored, k))
    }

    async fn get_ids(&self, filter: &MetadataFilter) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT unit_id FROM units WHERE {} = ?1 ORDER BY rowid",
            filter.field.column()
        );
        let value = filter.value.clone();
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let ids = stmt
                    .query_map(params![value], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
                Ok(ids)
            })
            .await
    }

    async fn delete_ids(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let ids = ids.to_vec();
        self.db
            .with_connection(move |conn| {
                let tx = conn.transaction()?;
                let mut removed = 0;
                for batch in ids.chunks(MAX_PARAMS_PER_STATEMENT) {
                    let placeholders = batch.iter().map(|_| "?").collect::<Vec<_>>().join(",");
                    let sql = format!("DELETE FROM units WHERE unit_id IN ({})", placeholders);
                    removed += tx.execute(&sql, rusqlite::params_from_iter(batch.iter()))?;
                }
                tx.commit()?;
                Ok(removed)
            })
            .await
    }

    async fn delete(&self, filter: &MetadataFilter) -> Result<usize> {
        let sql = format!("DELETE FROM units WHERE {} = ?1", filter.field.column());
        let value = filter.value.clone();
        self.db
            .with_connection(move |conn| Ok(conn.execute(&sql, params![value])?))
            .await
    }

    async fn count(&self, filter: &MetadataFilter) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM units WHERE {} = ?1", filter.field.column());
        let value = filter.value.clone();
        self.db
            .with_connection(move |conn| {
                let n: i64 = conn.query_row(&sql, params![value], |row| row.get(0))?;
                Ok(n as usize)
            })
            .await
    }
}

fn parse_kind(value: &str) -> Option<FileKind> {
    match value {
        "pdf" => Some(FileKind::Pdf),
        "txt" => Some(FileKind::Text),
        _ => None,
    }
}

fn embedding_to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Parse embedding BLOB (little-endian f32 array) to Vec<f32>
fn parse_embedding(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return None;
    }

    blob.chunks(4)
        .map(|bytes| {
            let arr: [u8; 4] = bytes.try_into().ok()?;
            Some(f32::from_le_bytes(arr))
        })
        .collect()
}
