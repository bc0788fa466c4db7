//! Lifecycle manager and reclaimer behaviour over the in-memory store.

mod common;

use chrono::Duration as ChronoDuration;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use common::{lifecycle_over, t0};
use livescore_poller::config::TaskConfig;
use livescore_poller::database::{InMemoryTaskStore, TaskStore};
use livescore_poller::orchestration::StaleTaskReclaimer;
use livescore_poller::{PollerError, Task, TaskId, TaskStatus};

fn assert_schedule_invariant(store: &InMemoryTaskStore) {
    for task in store.snapshot() {
        assert!(
            task.satisfies_schedule_invariant(),
            "task {} violates the schedule invariant: {:?}",
            task.id,
            task
        );
    }
}

#[tokio::test]
async fn schedule_invariant_holds_across_operations() {
    let store = Arc::new(InMemoryTaskStore::new());
    let lifecycle = lifecycle_over(store.clone());
    let reclaimer = StaleTaskReclaimer::new(store.clone(), &TaskConfig::default()).unwrap();

    for entity in ["a", "b", "c", "d"] {
        lifecycle.set_active_at(entity, true, t0()).await.unwrap();
        assert_schedule_invariant(&store);
    }

    let claimed = lifecycle.claim_due_batch(t0(), 3).await.unwrap();
    assert_schedule_invariant(&store);

    lifecycle.report_success(claimed[0], t0()).await.unwrap();
    assert_schedule_invariant(&store);
    lifecycle
        .report_failure(claimed[1], t0(), "fetch timed out")
        .await
        .unwrap();
    assert_schedule_invariant(&store);

    lifecycle.set_active_at("d", false, t0()).await.unwrap();
    assert_schedule_invariant(&store);

    let later = t0() + ChronoDuration::minutes(5);
    assert_eq!(reclaimer.reclaim_stuck(later).await.unwrap(), 1);
    assert_schedule_invariant(&store);

    // an outcome racing a deactivation keeps the task out of rotation
    let claimed = lifecycle.claim_due_batch(later, 10).await.unwrap();
    lifecycle.set_active_at("a", false, later).await.unwrap();
    for id in claimed {
        lifecycle.report_success(id, later).await.unwrap();
    }
    assert_schedule_invariant(&store);
}

#[tokio::test]
async fn repeated_activation_matches_single_activation() {
    let store = Arc::new(InMemoryTaskStore::new());
    let lifecycle = lifecycle_over(store.clone());
    let second_call = t0() + ChronoDuration::seconds(7);

    lifecycle.set_active_at("match-9", true, t0()).await.unwrap();
    lifecycle
        .set_active_at("match-9", true, second_call)
        .await
        .unwrap();

    let tasks = store.snapshot();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, TaskStatus::Active);
    assert_eq!(tasks[0].next_due_at, Some(second_call));
    assert_eq!(tasks[0].execution_count, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_never_overlap() {
    let store = Arc::new(InMemoryTaskStore::new());
    let lifecycle = Arc::new(lifecycle_over(store.clone()));
    for i in 0..300 {
        lifecycle
            .set_active_at(&format!("match-{i}"), true, t0())
            .await
            .unwrap();
    }

    let claimers = (0..10).map(|_| {
        let lifecycle = lifecycle.clone();
        tokio::spawn(async move {
            let mut mine = Vec::new();
            loop {
                let batch = lifecycle.claim_due_batch(t0(), 7).await.unwrap();
                if batch.is_empty() {
                    break;
                }
                mine.extend(batch);
                tokio::task::yield_now().await;
            }
            mine
        })
    });

    let mut all = Vec::new();
    for result in futures::future::join_all(claimers).await {
        all.extend(result.unwrap());
    }

    let unique: HashSet<TaskId> = all.iter().copied().collect();
    assert_eq!(all.len(), 300);
    assert_eq!(unique.len(), 300);
    assert!(store
        .snapshot()
        .iter()
        .all(|task| task.status == TaskStatus::InFlight));
}

#[tokio::test]
async fn reclaim_threshold_is_exclusive_of_recent_claims() {
    let store = Arc::new(InMemoryTaskStore::new());
    let stale_after = Duration::from_secs(30);
    let reclaimer = StaleTaskReclaimer::with_timeout(store.clone(), stale_after).unwrap();

    let now = t0();
    let window = ChronoDuration::seconds(30);
    for (id, started) in [
        (1, now - window - ChronoDuration::seconds(1)),
        (2, now - window + ChronoDuration::seconds(1)),
    ] {
        let mut task = Task::new(TaskId(id), format!("match-{id}"), started);
        task.status = TaskStatus::InFlight;
        task.next_due_at = Some(started);
        task.last_attempt_at = Some(started);
        store.seed(task);
    }

    assert_eq!(reclaimer.reclaim_stuck(now).await.unwrap(), 1);

    let stale = store.find_by_id(TaskId(1)).await.unwrap().unwrap();
    assert_eq!(stale.status, TaskStatus::Active);
    assert_eq!(stale.next_due_at, Some(now));

    let recent = store.find_by_id(TaskId(2)).await.unwrap().unwrap();
    assert_eq!(recent.status, TaskStatus::InFlight);
}

#[tokio::test]
async fn success_report_round_trip() {
    let store = Arc::new(InMemoryTaskStore::new());
    let lifecycle = lifecycle_over(store.clone());

    let attempt_time = t0() + ChronoDuration::seconds(2);
    let mut task = Task::new(TaskId(1), "match-1", t0());
    task.status = TaskStatus::InFlight;
    task.next_due_at = Some(t0());
    task.last_attempt_at = Some(attempt_time);
    task.execution_count = 5;
    task.last_error = Some("previous failure".into());
    task.last_error_at = Some(t0());
    store.seed(task);

    let task = lifecycle
        .report_success(TaskId(1), attempt_time)
        .await
        .unwrap();

    assert_eq!(task.execution_count, 6);
    assert_eq!(task.status, TaskStatus::Active);
    assert_eq!(
        task.next_due_at,
        Some(attempt_time + ChronoDuration::seconds(10))
    );
    assert_eq!(task.last_error, None);
}

#[tokio::test]
async fn failure_detail_is_truncated_to_prefix() {
    let store = Arc::new(InMemoryTaskStore::new());
    let lifecycle = lifecycle_over(store.clone());
    lifecycle.set_active_at("match-1", true, t0()).await.unwrap();
    let ids = lifecycle.claim_due_batch(t0(), 1).await.unwrap();

    let detail: String = ('a'..='z').cycle().take(1500).collect();
    lifecycle
        .report_failure(ids[0], t0(), &detail)
        .await
        .unwrap();

    let stored = store.snapshot()[0].last_error.clone().unwrap();
    assert_eq!(stored.chars().count(), 1000);
    assert_eq!(stored, detail[..1000]);
}

#[tokio::test]
async fn reports_for_vanished_tasks_fail_with_not_found() {
    let store = Arc::new(InMemoryTaskStore::new());
    let lifecycle = lifecycle_over(store.clone());
    lifecycle.set_active_at("match-1", true, t0()).await.unwrap();
    let ids = lifecycle.claim_due_batch(t0(), 1).await.unwrap();
    store.remove(ids[0]);

    let err = lifecycle
        .report_failure(ids[0], t0(), "boom")
        .await
        .unwrap_err();
    assert_eq!(err, PollerError::TaskNotFound { task_id: ids[0] });
}

#[tokio::test]
async fn late_report_cannot_release_a_reclaimed_task() {
    let store = Arc::new(InMemoryTaskStore::new());
    let lifecycle = lifecycle_over(store.clone());
    let reclaimer =
        StaleTaskReclaimer::with_timeout(store.clone(), Duration::from_secs(30)).unwrap();

    lifecycle.set_active_at("match-1", true, t0()).await.unwrap();
    let first_attempt = lifecycle.claim_due_batch(t0(), 1).await.unwrap();

    let reclaimed_at = t0() + ChronoDuration::seconds(31);
    assert_eq!(reclaimer.reclaim_stuck(reclaimed_at).await.unwrap(), 1);
    let second_attempt = lifecycle.claim_due_batch(reclaimed_at, 1).await.unwrap();
    assert_eq!(second_attempt, first_attempt);

    let late = lifecycle
        .report_failure(first_attempt[0], t0(), "fetch timed out")
        .await
        .unwrap_err();
    assert_eq!(
        late,
        PollerError::AttemptSuperseded {
            task_id: first_attempt[0]
        }
    );

    let task = store.snapshot().remove(0);
    assert_eq!(task.status, TaskStatus::InFlight);
    assert_eq!(task.last_attempt_at, Some(reclaimed_at));
    assert_eq!(task.last_error, None);

    let third_attempt = lifecycle
        .claim_due_batch(reclaimed_at + ChronoDuration::seconds(1), 1)
        .await
        .unwrap();
    assert!(third_attempt.is_empty());
}
