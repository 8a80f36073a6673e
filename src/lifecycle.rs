//! Per-document lifecycle: status transitions and the per-`file_id` lock table.
//!
//! A document moves `Registered → Processed → Deleting → gone`. `Deleting` is
//! persisted before any index units are removed, so an interrupted deletion can
//! be finished on the next start by re-running the (idempotent) index cleanup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Lifecycle status stored on every registry record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Identity assigned; units may be absent or partially written
    Registered,
    /// All units written to the retrievable index
    Processed,
    /// Unit removal started; the record goes away once the index is confirmed empty
    Deleting,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Registered => "registered",
            DocumentStatus::Processed => "processed",
            DocumentStatus::Deleting => "deleting",
        }
    }

    /// Whether the registry may move a record from `self` to `next`.
    pub fn can_transition_to(&self, next: DocumentStatus) -> bool {
        use DocumentStatus::*;
        matches!(
            (self, next),
            (Registered, Processed) | (Registered, Deleting) | (Processed, Deleting) | (Deleting, Deleting)
        )
    }

    /// Queries are refused once deletion has begun.
    pub fn is_queryable(&self) -> bool {
        !matches!(self, DocumentStatus::Deleting)
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Table of per-document reader/writer locks.
///
/// Queries hold a read guard for their `file_id`; ingestion and deletion hold the
/// write guard, so a query never filters against units that are mid-deletion.
#[derive(Default)]
pub struct FileLocks {
    locks: Mutex<HashMap<String, Arc<RwLock<()>>>>,
}

impl FileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, file_id: &str) -> Arc<RwLock<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(file_id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    pub async fn read(&self, file_id: &str) -> OwnedRwLockReadGuard<()> {
        self.entry(file_id).read_owned().await
    }

    pub async fn write(&self, file_id: &str) -> OwnedRwLockWriteGuard<()> {
        self.entry(file_id).write_owned().await
    }

    /// Drop the lock entry of a document that no longer exists.
    pub fn forget(&self, file_id: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(lock) = locks.get(file_id) {
            // Only the table itself holds it: nobody is waiting.
            if Arc::strong_count(lock) == 1 {
                locks.remove(file_id);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_transitions() {
        use DocumentStatus::*;
        assert!(Registered.can_transition_to(Processed));
        assert!(Registered.can_transition_to(Deleting));
        assert!(Processed.can_transition_to(Deleting));
        assert!(Deleting.can_transition_to(Deleting));
        assert!(!Processed.can_transition_to(Registered));
        assert!(!Deleting.can_transition_to(Processed));
        assert!(!Processed.can_transition_to(Processed));
    }

    #[test]
    fn test_status_serde_lowercase() {
        let json = serde_json::to_string(&DocumentStatus::Processed).unwrap();
        assert_eq!(json, "\"processed\"");
        let back: DocumentStatus = serde_json::from_str("\"deleting\"").unwrap();
        assert_eq!(back, DocumentStatus::Deleting);
    }

    #[tokio::test]
    async fn test_write_excludes_readers_of_same_file() {
        let locks = Arc::new(FileLocks::new());
        let writer = locks.write("abc").await;

        let pending = tokio::time::timeout(Duration::from_millis(20), locks.read("abc")).await;
        assert!(pending.is_err(), "reader must wait for the writer");

        // A different document is unaffected
        let other = tokio::time::timeout(Duration::from_millis(20), locks.read("xyz")).await;
        assert!(other.is_ok());

        drop(writer);
        let reader = tokio::time::timeout(Duration::from_millis(20), locks.read("abc")).await;
        assert!(reader.is_ok());
    }

    #[tokio::test]
    async fn test_forget_removes_idle_entry() {
        let locks = FileLocks::new();
        {
            let _guard = locks.write("abc").await;
        }
        assert_eq!(locks.len(), 1);
        locks.forget("abc");
        assert!(locks.is_empty());
    }
}
