//! Metadata registry: durable `file_id → DocumentRecord` store.
//!
//! The registry is the single source of truth for which documents exist and for
//! their insertion order (which the ordinal view in [`ordinal`] is derived from).
//! Every mutation rewrites the full JSON snapshot; the in-memory copy is only
//! updated after the write succeeded.

pub mod ordinal;

use crate::error::{FileragError, Result};
use crate::lifecycle::DocumentStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub use ordinal::{resolve_ordinal, OrdinalError};

/// Length of a generated `file_id` (hex characters taken from a v4 UUID)
const FILE_ID_LEN: usize = 8;
/// Attempts before giving up on finding an unused `file_id`
const MAX_ID_ATTEMPTS: usize = 16;

/// Kind of document accepted for ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    #[serde(rename = "pdf")]
    Pdf,
    #[serde(rename = "txt")]
    Text,
}

impl FileKind {
    /// Detect the kind from a path's extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Ok(FileKind::Pdf),
            "txt" => Ok(FileKind::Text),
            "" => Err(FileragError::UnsupportedFileType("(no extension)".to_string())),
            other => Err(FileragError::UnsupportedFileType(format!(".{}", other))),
        }
    }

    /// Short tag stored in the registry and on every indexed unit
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Text => "txt",
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptive record of one ingestion event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub file_path: String,
    pub file_type: FileKind,
    pub filename: String,
    pub created_at: DateTime<Utc>,
    pub status: DocumentStatus,
}

/// One registry row: identity plus record
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry {
    pub file_id: String,
    pub record: DocumentRecord,
}

/// Durable, insertion-ordered registry of loaded documents
pub struct MetadataRegistry {
    path: PathBuf,
    entries: Vec<RegistryEntry>,
}

impl MetadataRegistry {
    /// Open the registry snapshot at `path`; a missing file means an empty registry.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            load_snapshot(&path)?
        } else {
            Vec::new()
        };
        log::debug!("Registry opened at {} ({} records)", path.display(), entries.len());
        Ok(Self { path, entries })
    }

    /// Register a new document and return its freshly generated `file_id`.
    pub fn register(&mut self, file_path: &Path, kind: FileKind) -> Result<String> {
        let file_id = self.generate_file_id()?;
        let filename = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_path.to_string_lossy().into_owned());

        let record = DocumentRecord {
            file_path: file_path.to_string_lossy().into_owned(),
            file_type: kind,
            filename,
            created_at: Utc::now(),
            status: DocumentStatus::Registered,
        };

        let mut next = self.entries.clone();
        next.push(RegistryEntry {
            file_id: file_id.clone(),
            record,
        });
        self.commit(next)?;

        log::info!("Registered {} as {}", file_path.display(), file_id);
        Ok(file_id)
    }

    pub fn get(&self, file_id: &str) -> Option<&DocumentRecord> {
        self.entries
            .iter()
            .find(|e| e.file_id == file_id)
            .map(|e| &e.record)
    }

    pub fn contains(&self, file_id: &str) -> bool {
        self.get(file_id).is_some()
    }

    /// All records in insertion order (position + 1 is the ordinal).
    pub fn list(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids of records whose status equals `status`.
    pub fn ids_with_status(&self, status: DocumentStatus) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.record.status == status)
            .map(|e| e.file_id.clone())
            .collect()
    }

    /// Advance a record's lifecycle status.
    pub fn set_status(&mut self, file_id: &str, status: DocumentStatus) -> Result<()> {
        let idx = self.position(file_id)?;
        let current = self.entries[idx].record.status;
        if !current.can_transition_to(status) {
            return Err(FileragError::InvalidInput(format!(
                "Cannot move {} from {} to {}",
                file_id, current, status
            )));
        }

        let mut next = self.entries.clone();
        next[idx].record.status = status;
        self.commit(next)
    }

    /// Remove a record; returns it if it existed.
    pub fn remove(&mut self, file_id: &str) -> Result<Option<DocumentRecord>> {
        let Some(idx) = self.entries.iter().position(|e| e.file_id == file_id) else {
            return Ok(None);
        };

        let mut next = self.entries.clone();
        let removed = next.remove(idx);
        self.commit(next)?;
        Ok(Some(removed.record))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn position(&self, file_id: &str) -> Result<usize> {
        self.entries
            .iter()
            .position(|e| e.file_id == file_id)
            .ok_or_else(|| FileragError::DocumentNotFound(file_id.to_string()))
    }

    fn generate_file_id(&self) -> Result<String> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let candidate: String = Uuid::new_v4()
                .simple()
                .to_string()
                .chars()
                .take(FILE_ID_LEN)
                .collect();
            if !self.contains(&candidate) {
                return Ok(candidate);
            }
            log::warn!("file_id collision on {}, regenerating", candidate);
        }
        Err(FileragError::InvalidInput(
            "Could not generate an unused file ID".to_string(),
        ))
    }

    /// Persist `next`, then make it the in-memory state.
    fn commit(&mut self, next: Vec<RegistryEntry>) -> Result<()> {
        write_snapshot(&self.path, &next)?;
        self.entries = next;
        Ok(())
    }
}

fn load_snapshot(path: &Path) -> Result<Vec<RegistryEntry>> {
    let raw = std::fs::read_to_string(path)?;
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&raw)?;
    map.into_iter()
        .map(|(file_id, value)| {
            let record: DocumentRecord = serde_json::from_value(value)?;
            Ok(RegistryEntry { file_id, record })
        })
        .collect()
}

/// Whole-snapshot rewrite through a sibling temp file and rename.
fn write_snapshot(path: &Path, entries: &[RegistryEntry]) -> Result<()> {
    let mut map = serde_json::Map::new();
    for entry in entries {
        map.insert(entry.file_id.clone(), serde_json::to_value(&entry.record)?);
    }
    let json = serde_json::to_string_pretty(&serde_json::Value::Object(map))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
