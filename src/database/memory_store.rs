//! # In-Memory Task Store
//!
//! A process-local [`TaskStore`] whose every operation runs inside one
//! critical section, giving the same per-row atomicity the PostgreSQL
//! backend gets from row locks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use super::store::TaskStore;
use crate::error::{PollerError, PollerResult};
use crate::models::{Task, TaskId};
use crate::state_machine::{apply_event, TaskEvent};

#[derive(Debug, Default)]
struct StoreState {
    next_id: i64,
    tasks: BTreeMap<TaskId, Task>,
    by_entity: HashMap<String, TaskId>,
}

impl StoreState {
    fn allocate_id(&mut self) -> TaskId {
        self.next_id += 1;
        TaskId(self.next_id)
    }

    fn due_ids(&self, now: DateTime<Utc>, limit: usize) -> Vec<TaskId> {
        let mut due: Vec<&Task> = self.tasks.values().filter(|t| t.is_due(now)).collect();
        due.sort_by_key(|t| (t.next_due_at, t.id));
        due.into_iter().take(limit).map(|t| t.id).collect()
    }

    fn stale_ids(&self, threshold: DateTime<Utc>) -> Vec<TaskId> {
        self.tasks
            .values()
            .filter(|t| t.is_stale(threshold))
            .map(|t| t.id)
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    state: Mutex<StoreState>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a task exactly as given. Keeps ids allocated later above it.
    pub fn seed(&self, task: Task) {
        let mut state = self.state.lock();
        state.next_id = state.next_id.max(task.id.0);
        state.by_entity.insert(task.entity_id.clone(), task.id);
        state.tasks.insert(task.id, task);
    }

    /// Copy of every task, ordered by id.
    pub fn snapshot(&self) -> Vec<Task> {
        self.state.lock().tasks.values().cloned().collect()
    }

    /// Remove a task, as an external cleanup would.
    pub fn remove(&self, id: TaskId) -> Option<Task> {
        let mut state = self.state.lock();
        let task = state.tasks.remove(&id)?;
        state.by_entity.remove(&task.entity_id);
        Some(task)
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn find_by_id(&self, id: TaskId) -> PollerResult<Option<Task>> {
        Ok(self.state.lock().tasks.get(&id).cloned())
    }

    async fn find_by_entity_id(&self, entity_id: &str) -> PollerResult<Option<Task>> {
        let state = self.state.lock();
        Ok(state
            .by_entity
            .get(entity_id)
            .and_then(|id| state.tasks.get(id))
            .cloned())
    }

    async fn upsert_by_entity_id(&self, entity_id: &str, event: &TaskEvent) -> PollerResult<Task> {
        let mut state = self.state.lock();

        let mut task = match state.by_entity.get(entity_id).copied() {
            Some(id) => state
                .tasks
                .get(&id)
                .cloned()
                .ok_or(PollerError::TaskNotFound { task_id: id })?,
            None => {
                let id = state.allocate_id();
                debug!(task_id = %id, entity_id = %entity_id, "Creating task");
                Task::new(id, entity_id, event.occurred_at())
            }
        };

        apply_event(&mut task, event)?;

        state.by_entity.insert(task.entity_id.clone(), task.id);
        state.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn update(&self, id: TaskId, event: &TaskEvent) -> PollerResult<Task> {
        let mut state = self.state.lock();
        let stored = state
            .tasks
            .get_mut(&id)
            .ok_or(PollerError::TaskNotFound { task_id: id })?;

        let mut task = stored.clone();
        apply_event(&mut task, event)?;
        *stored = task.clone();
        Ok(task)
    }

    async fn claim_due_batch(&self, now: DateTime<Utc>, limit: usize) -> PollerResult<Vec<Task>> {
        let mut state = self.state.lock();
        let ids = state.due_ids(now, limit);
        let event = TaskEvent::Claim { at: now };

        let mut claimed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(task) = state.tasks.get_mut(&id) {
                apply_event(task, &event)?;
                claimed.push(task.clone());
            }
        }
        Ok(claimed)
    }

    async fn reclaim_stale(
        &self,
        threshold: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> PollerResult<Vec<Task>> {
        let mut state = self.state.lock();
        let ids = state.stale_ids(threshold);
        let event = TaskEvent::Reclaim { at: now };

        let mut reclaimed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(task) = state.tasks.get_mut(&id) {
                apply_event(task, &event)?;
                reclaimed.push(task.clone());
            }
        }
        Ok(reclaimed)
    }

    async fn find_due_batch(&self, now: DateTime<Utc>, limit: usize) -> PollerResult<Vec<Task>> {
        let state = self.state.lock();
        Ok(state
            .due_ids(now, limit)
            .into_iter()
            .filter_map(|id| state.tasks.get(&id).cloned())
            .collect())
    }

    async fn find_stale_in_flight(&self, threshold: DateTime<Utc>) -> PollerResult<Vec<Task>> {
        let state = self.state.lock();
        Ok(state
            .stale_ids(threshold)
            .into_iter()
            .filter_map(|id| state.tasks.get(&id).cloned())
            .collect())
    }

    async fn count_due(&self, now: DateTime<Utc>) -> PollerResult<u64> {
        let state = self.state.lock();
        Ok(state.tasks.values().filter(|t| t.is_due(now)).count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::TaskStatus;
    use chrono::Duration;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_upsert_creates_once_per_entity() {
        let store = InMemoryTaskStore::new();
        let now = Utc::now();

        let first = store
            .upsert_by_entity_id("event-1", &TaskEvent::Activate { at: now })
            .await
            .unwrap();
        let second = store
            .upsert_by_entity_id("event-1", &TaskEvent::Deactivate { at: now })
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.snapshot().len(), 1);
        assert_eq!(second.status, TaskStatus::Inactive);
    }

    #[tokio::test]
    async fn test_update_unknown_task() {
        let store = InMemoryTaskStore::new();
        let err = store
            .update(TaskId(99), &TaskEvent::Reclaim { at: Utc::now() })
            .await
            .unwrap_err();
        assert_eq!(err, PollerError::TaskNotFound { task_id: TaskId(99) });
    }

    #[tokio::test]
    async fn test_claim_orders_by_due_time_and_respects_limit() {
        let store = InMemoryTaskStore::new();
        let now = Utc::now();

        for (entity, offset) in [("late", 1), ("oldest", 30), ("middle", 10)] {
            store
                .upsert_by_entity_id(
                    entity,
                    &TaskEvent::Activate {
                        at: now - Duration::seconds(offset),
                    },
                )
                .await
                .unwrap();
        }

        let claimed = store.claim_due_batch(now, 2).await.unwrap();
        let entities: Vec<&str> = claimed.iter().map(|t| t.entity_id.as_str()).collect();
        assert_eq!(entities, vec!["oldest", "middle"]);
        assert!(claimed.iter().all(|t| t.status == TaskStatus::InFlight));
        assert_eq!(store.count_due(now).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_read_only_views_do_not_mutate() {
        let store = InMemoryTaskStore::new();
        let now = Utc::now();
        for (entity, offset) in [("b", 5), ("a", 20)] {
            store
                .upsert_by_entity_id(
                    entity,
                    &TaskEvent::Activate {
                        at: now - Duration::seconds(offset),
                    },
                )
                .await
                .unwrap();
        }

        let due = store.find_due_batch(now, 10).await.unwrap();
        let entities: Vec<&str> = due.iter().map(|t| t.entity_id.as_str()).collect();
        assert_eq!(entities, vec!["a", "b"]);
        assert_eq!(store.count_due(now).await.unwrap(), 2);

        store.claim_due_batch(now, 10).await.unwrap();
        let later = now + Duration::seconds(31);
        let stale = store
            .find_stale_in_flight(later - Duration::seconds(30))
            .await
            .unwrap();
        assert_eq!(stale.len(), 2);
        assert!(stale.iter().all(|t| t.status == TaskStatus::InFlight));
        assert!(store.find_due_batch(later, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_claims_never_overlap() {
        let store = Arc::new(InMemoryTaskStore::new());
        let now = Utc::now();
        for i in 0..200 {
            store
                .upsert_by_entity_id(&format!("event-{i}"), &TaskEvent::Activate { at: now })
                .await
                .unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.claim_due_batch(now, 30).await.unwrap()
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for task in handle.await.unwrap() {
                assert!(seen.insert(task.id), "task {} claimed twice", task.id);
            }
        }
        assert_eq!(seen.len(), 200);
    }
}
