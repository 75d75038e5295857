//! Task status records kept in the shared keyed store.
//!
//! There is no separate structure: a status is an ordinary cache entry under
//! the task namespace. This is the one place the cache holds process state
//! instead of accelerating reads over a source of truth, so a status lives
//! exactly as long as its entry (no deletion path besides `clear`).

use buildvault_cache::{task_key, KeyedStore};
use buildvault_core::TaskId;

use crate::types::TaskStatus;

#[derive(Debug, Clone)]
pub struct TaskStatusStore<S> {
    store: S,
}

impl<S: KeyedStore> TaskStatusStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Write (or overwrite) the record of `status.task_id()`.
    pub fn put(&self, status: TaskStatus) {
        self.store.put(task_key(status.task_id()), status);
    }

    pub fn get(&self, task_id: TaskId) -> Option<TaskStatus> {
        self.store
            .get::<TaskStatus>(&task_key(task_id))
            .map(|status| (*status).clone())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use buildvault_cache::{EntityType, InMemoryKeyedStore};
    use buildvault_core::BuildId;

    use super::*;
    use crate::types::TaskState;

    #[test]
    fn unknown_task_is_none() {
        let statuses = TaskStatusStore::new(InMemoryKeyedStore::new());
        assert!(statuses.get(TaskId::new()).is_none());
    }

    #[test]
    fn put_then_get_latest() {
        let statuses = TaskStatusStore::new(InMemoryKeyedStore::new());
        let task_id = TaskId::new();
        let pending = TaskStatus::pending(task_id, BuildId::new(1));
        statuses.put(pending.clone());
        assert_eq!(statuses.get(task_id).map(|s| s.state()), Some(TaskState::Pending));

        statuses.put(pending.complete(PathBuf::from("r.txt")).unwrap());
        assert_eq!(statuses.get(task_id).map(|s| s.state()), Some(TaskState::Completed));
    }

    #[test]
    fn bulk_eviction_never_touches_tasks() {
        let cache = InMemoryKeyedStore::arc();
        let statuses = TaskStatusStore::new(Arc::clone(&cache));
        let task_id = TaskId::new();
        statuses.put(TaskStatus::pending(task_id, BuildId::new(1)));

        for label in ["build", "author", "theme", "color", "task"] {
            cache.evict_by_type(EntityType::new(label));
        }
        assert!(statuses.get(task_id).is_some());
    }
}
