//! Deletion coordinator: index units first, registry record last.
//!
//! A deletion is a restartable protocol rather than a best-effort sequence:
//!
//! 1. mark the record `deleting` (persisted)
//! 2. list the document's unit ids, delete them, re-count to confirm zero
//! 3. remove the record
//!
//! A failure in step 2 leaves the record in `deleting`; running the deletion
//! again (or [`DeletionCoordinator::recover_interrupted`] at startup) finishes it.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{with_timeout, FileragError, Result};
use crate::index::{MetadataFilter, VectorIndex};
use crate::lifecycle::{DocumentStatus, FileLocks};
use crate::registry::MetadataRegistry;

pub const NO_UNITS_FOUND: &str = "No documents found in vector database for this file";

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteReport {
    pub file_id: String,
    pub filename: String,
    /// Units removed from the index; zero is a confirmed-empty delete
    pub units_removed: usize,
}

impl DeleteReport {
    pub fn render(&self) -> String {
        let done = format!("Successfully deleted file: {} (ID: {})", self.filename, self.file_id);
        if self.units_removed == 0 {
            format!("{}\n{}", NO_UNITS_FOUND, done)
        } else {
            done
        }
    }
}

pub struct DeletionCoordinator {
    registry: Arc<Mutex<MetadataRegistry>>,
    index: Arc<dyn VectorIndex>,
    locks: Arc<FileLocks>,
    index_timeout_secs: u64,
}

impl DeletionCoordinator {
    pub fn new(
        registry: Arc<Mutex<MetadataRegistry>>,
        index: Arc<dyn VectorIndex>,
        locks: Arc<FileLocks>,
        index_timeout_secs: u64,
    ) -> Self {
        Self {
            registry,
            index,
            locks,
            index_timeout_secs,
        }
    }

    /// Remove every unit of `file_id` from the index, then its registry record.
    pub async fn delete(&self, file_id: &str) -> Result<DeleteReport> {
        let guard = self.locks.write(file_id).await;

        let filename = match self.mark_deleting(file_id).await {
            Ok(filename) => filename,
            Err(e) => {
                drop(guard);
                self.locks.forget(file_id);
                return Err(e);
            }
        };

        let units_removed = with_timeout(
            self.index_timeout_secs,
            "deleting chunks from the index",
            self.purge_units(file_id),
        )
        .await?;

        if units_removed == 0 {
            log::info!("{} for {}", NO_UNITS_FOUND, file_id);
        } else {
            log::info!("Deleted {} document chunks from vector database", units_removed);
        }

        self.registry.lock().await.remove(file_id)?;

        drop(guard);
        self.locks.forget(file_id);

        Ok(DeleteReport {
            file_id: file_id.to_string(),
            filename,
            units_removed,
        })
    }

    async fn mark_deleting(&self, file_id: &str) -> Result<String> {
        let mut registry = self.registry.lock().await;
        let record = registry
            .get(file_id)
            .cloned()
            .ok_or_else(|| FileragError::DocumentNotFound(file_id.to_string()))?;
        if record.status != DocumentStatus::Deleting {
            registry.set_status(file_id, DocumentStatus::Deleting)?;
        }
        Ok(record.filename)
    }

    /// Finish deletions interrupted by a crash or an index failure.
    ///
    /// Failures are logged and left in `deleting` for the next attempt.
    pub async fn recover_interrupted(&self) -> Vec<DeleteReport> {
        let pending = self.registry.lock().await.ids_with_status(DocumentStatus::Deleting);
        let mut finished = Vec::with_capacity(pending.len());

        for file_id in pending {
            log::warn!("Resuming interrupted deletion of {}", file_id);
            match self.delete(&file_id).await {
                Ok(report) => finished.push(report),
                Err(e) => log::error!("Could not finish deletion of {}: {}", file_id, e),
            }
        }

        finished
    }

    /// Idempotent: delete by id, then confirm nothing is left.
    async fn purge_units(&self, file_id: &str) -> Result<usize> {
        let filter = MetadataFilter::file_id(file_id);
        let ids = self.index.get_ids(&filter).await?;
        let removed = if ids.is_empty() {
            0
        } else {
            self.index.delete_ids(&ids).await?
        };

        let remaining = self.index.count(&filter).await?;
        if remaining > 0 {
            return Err(FileragError::Index(format!(
                "{} chunks for {} still present after delete",
                remaining, file_id
            )));
        }
        Ok(removed)
    }
}
