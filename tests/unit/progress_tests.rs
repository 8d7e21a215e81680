/*!
 * Tests for the progress registry and the translation gate
 */

use std::time::Duration;

use subrelay::progress::{JobStatus, ProgressRegistry};

#[tokio::test]
async fn test_begin_withFreeGate_shouldGoActiveDirectly() {
    let registry = ProgressRegistry::new();
    let permit = registry.begin("a", "first.srt", 10).await;

    let jobs = registry.snapshot();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, JobStatus::Active);
    assert_eq!(jobs[0].queue_position, 0);
    assert_eq!(jobs[0].fingerprint, "a");
    assert_eq!(permit.fingerprint(), "a");
}

#[tokio::test]
async fn test_update_withActiveJob_shouldAdvanceProgress() {
    let registry = ProgressRegistry::new();
    let _permit = registry.begin("a", "first.srt", 10).await;

    registry.update("a", 5);
    let jobs = registry.snapshot();
    assert_eq!(jobs[0].completed_cues, 5);
    assert_eq!(jobs[0].progress_percent, 50);
}

#[tokio::test]
async fn test_drop_withHeldPermit_shouldRemoveJobAndReleaseGate() {
    let registry = ProgressRegistry::new();
    let permit = registry.begin("a", "first.srt", 10).await;
    drop(permit);

    assert!(registry.snapshot().is_empty());
    assert!(!registry.has_active());

    // The gate is free again: a new job goes active immediately.
    let _next = registry.begin("b", "second.srt", 5).await;
    assert_eq!(registry.snapshot()[0].status, JobStatus::Active);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_begin_withBusyGate_shouldQueueAsPendingThenPromote() {
    let registry = ProgressRegistry::new();
    let first = registry.begin("a", "first.srt", 10).await;

    // Second submission must block; run it on its own task.
    let registry_b = registry.clone();
    let second = tokio::spawn(async move {
        let permit = registry_b.begin("b", "second.srt", 20).await;
        // Hold briefly so the promotion is observable.
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(permit);
    });

    // Give task b time to enqueue.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let jobs = registry.snapshot();
    assert_eq!(jobs.len(), 2);
    let active: Vec<_> = jobs.iter().filter(|j| j.status == JobStatus::Active).collect();
    let pending: Vec<_> = jobs.iter().filter(|j| j.status == JobStatus::Pending).collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].fingerprint, "a");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].fingerprint, "b");
    assert_eq!(pending[0].queue_position, 1);

    // Releasing the first permit promotes b.
    drop(first);
    tokio::time::sleep(Duration::from_millis(20)).await;
    let jobs = registry.snapshot();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].fingerprint, "b");
    assert_eq!(jobs[0].status, JobStatus::Active);

    second.await.unwrap();
    assert!(registry.snapshot().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_gate_withManyWaiters_shouldNeverShowTwoActive() {
    let registry = ProgressRegistry::new();

    let mut tasks = Vec::new();
    for i in 0..5 {
        let registry = registry.clone();
        tasks.push(tokio::spawn(async move {
            let permit = registry.begin(&format!("job-{}", i), "file.srt", 1).await;
            tokio::time::sleep(Duration::from_millis(30)).await;
            drop(permit);
        }));
    }

    // While the tasks churn, the snapshot must never show more than one
    // active job.
    for _ in 0..10 {
        let active = registry
            .snapshot()
            .iter()
            .filter(|j| j.status == JobStatus::Active)
            .count();
        assert!(active <= 1, "saw {} active jobs", active);
        tokio::time::sleep(Duration::from_millis(15)).await;
    }

    for task in tasks {
        task.await.unwrap();
    }
    assert!(registry.snapshot().is_empty());
}
