//! In-memory record store implementation for testing.
//!
//! This module provides [`InMemoryRecordStore`], a simple in-memory
//! implementation of the [`RecordStore`] trait suitable for testing and
//! development.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: No durability, no cross-process
//!   coordination
//! - **Single-process only**: Rows are not shared across process boundaries
//! - **No resumable bookkeeping**: The `resumable` flag is whatever the test
//!   seeded; a real store derives it from checkpoint durability

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use capstan_core::TaskId;

use super::{CasOutcome, RecordStore};
use crate::error::{Error, Result};
use crate::task::{TaskRecord, TaskState};

/// In-memory record store for testing.
///
/// Provides a simple, thread-safe implementation of the [`RecordStore`]
/// trait using `RwLock` for synchronization. Counts CAS attempts so tests
/// can assert that gated or rejected operations never reached the store.
///
/// ## Example
///
/// ```rust
/// use capstan_control::store::memory::InMemoryRecordStore;
///
/// let store = InMemoryRecordStore::new();
/// // Seed rows with `insert` in tests...
/// ```
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    tasks: RwLock<HashMap<TaskId, TaskRecord>>,
    cas_attempts: AtomicU64,
}

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("record store lock poisoned")
}

impl InMemoryRecordStore {
    /// Creates a new, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a row.
    ///
    /// Stands in for the out-of-scope submission path and the worker
    /// subsystem's own writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn insert(&self, record: TaskRecord) -> Result<()> {
        {
            let mut tasks = self.tasks.write().map_err(poison_err)?;
            tasks.insert(record.id, record);
        }
        Ok(())
    }

    /// Returns the number of rows currently stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn task_count(&self) -> Result<usize> {
        let count = {
            let tasks = self.tasks.read().map_err(poison_err)?;
            tasks.len()
        };
        Ok(count)
    }

    /// Returns how many CAS writes have been attempted, applied or not.
    #[must_use]
    pub fn cas_attempts(&self) -> u64 {
        self.cas_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn find(&self, task_id: &TaskId) -> Result<Option<TaskRecord>> {
        let result = {
            let tasks = self.tasks.read().map_err(poison_err)?;
            tasks.get(task_id).cloned()
        };
        Ok(result)
    }

    async fn cas_state(
        &self,
        task_id: &TaskId,
        expected: TaskState,
        target: TaskState,
    ) -> Result<CasOutcome> {
        self.cas_attempts.fetch_add(1, Ordering::SeqCst);

        let mut tasks = self.tasks.write().map_err(poison_err)?;

        let Some(record) = tasks.get_mut(task_id) else {
            drop(tasks);
            return Ok(CasOutcome::NotFound);
        };

        if record.state != expected {
            let actual = record.state;
            drop(tasks);
            return Ok(CasOutcome::StateMismatch { actual });
        }

        record.state = target;
        record.result = target.implied_result();
        if target.is_terminal() && record.ended_at.is_none() {
            record.ended_at = Some(Utc::now());
        }
        drop(tasks);
        Ok(CasOutcome::Applied)
    }

    async fn sub_tasks(&self, parent_id: &TaskId) -> Result<Vec<TaskRecord>> {
        let mut result = {
            let tasks = self.tasks.read().map_err(poison_err)?;
            tasks
                .values()
                .filter(|record| record.parent_id.as_ref() == Some(parent_id))
                .cloned()
                .collect::<Vec<_>>()
        };
        result.sort_by_key(|record| record.id.as_ulid());
        Ok(result)
    }

    async fn recent(&self, since: DateTime<Utc>) -> Result<Vec<TaskRecord>> {
        let mut result = {
            let tasks = self.tasks.read().map_err(poison_err)?;
            tasks
                .values()
                .filter(|record| record.last_activity_at().is_some_and(|at| at >= since))
                .cloned()
                .collect::<Vec<_>>()
        };
        result.sort_by_key(|record| record.id.as_ulid());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskResult;
    use chrono::Duration;

    fn paused_record() -> TaskRecord {
        TaskRecord::new(TaskId::generate(), "Sync repository").with_state(TaskState::Paused)
    }

    #[tokio::test]
    async fn insert_and_find_roundtrip() -> Result<()> {
        let store = InMemoryRecordStore::new();
        let record = paused_record();
        let id = record.id;
        store.insert(record.clone())?;

        let found = store.find(&id).await?;
        assert_eq!(found, Some(record));
        assert_eq!(store.task_count()?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn find_missing_returns_none() -> Result<()> {
        let store = InMemoryRecordStore::new();
        assert_eq!(store.find(&TaskId::generate()).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn cas_applies_on_matching_state() -> Result<()> {
        let store = InMemoryRecordStore::new();
        let record = paused_record();
        let id = record.id;
        store.insert(record)?;

        let outcome = store
            .cas_state(&id, TaskState::Paused, TaskState::Stopped)
            .await?;
        assert!(outcome.is_applied());

        let stored = store.find(&id).await?.expect("row exists");
        assert_eq!(stored.state, TaskState::Stopped);
        assert_eq!(stored.result, Some(TaskResult::Warning));
        assert!(stored.ended_at.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn cas_mismatch_reports_actual_state() -> Result<()> {
        let store = InMemoryRecordStore::new();
        let record =
            TaskRecord::new(TaskId::generate(), "Sync repository").with_state(TaskState::Running);
        let id = record.id;
        store.insert(record)?;

        let outcome = store
            .cas_state(&id, TaskState::Paused, TaskState::Stopped)
            .await?;
        assert_eq!(
            outcome,
            CasOutcome::StateMismatch {
                actual: TaskState::Running
            }
        );

        let stored = store.find(&id).await?.expect("row exists");
        assert_eq!(stored.state, TaskState::Running);
        Ok(())
    }

    #[tokio::test]
    async fn cas_missing_task_is_not_found() -> Result<()> {
        let store = InMemoryRecordStore::new();
        let outcome = store
            .cas_state(&TaskId::generate(), TaskState::Paused, TaskState::Stopped)
            .await?;
        assert!(outcome.is_not_found());
        Ok(())
    }

    #[tokio::test]
    async fn cas_attempts_are_counted() -> Result<()> {
        let store = InMemoryRecordStore::new();
        assert_eq!(store.cas_attempts(), 0);

        let _ = store
            .cas_state(&TaskId::generate(), TaskState::Paused, TaskState::Stopped)
            .await?;
        assert_eq!(store.cas_attempts(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn sub_tasks_filter_by_parent() -> Result<()> {
        let store = InMemoryRecordStore::new();
        let parent = TaskId::generate();

        let child_a = TaskRecord::new(TaskId::generate(), "Sync repository").with_parent(parent);
        let child_b = TaskRecord::new(TaskId::generate(), "Publish metadata").with_parent(parent);
        let unrelated = TaskRecord::new(TaskId::generate(), "Cleanup");
        store.insert(child_a.clone())?;
        store.insert(child_b.clone())?;
        store.insert(unrelated)?;

        let children = store.sub_tasks(&parent).await?;
        assert_eq!(children.len(), 2);
        assert!(children.iter().all(|c| c.parent_id == Some(parent)));
        Ok(())
    }

    #[tokio::test]
    async fn recent_filters_by_activity_window() -> Result<()> {
        let store = InMemoryRecordStore::new();
        let now = Utc::now();

        let mut fresh = TaskRecord::new(TaskId::generate(), "Sync repository");
        fresh.started_at = Some(now - Duration::minutes(5));
        let mut stale = TaskRecord::new(TaskId::generate(), "Sync repository");
        stale.started_at = Some(now - Duration::hours(3));
        let untouched = TaskRecord::new(TaskId::generate(), "Sync repository");

        let fresh_id = fresh.id;
        store.insert(fresh)?;
        store.insert(stale)?;
        store.insert(untouched)?;

        let recent = store.recent(now - Duration::hours(1)).await?;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, fresh_id);
        Ok(())
    }
}
