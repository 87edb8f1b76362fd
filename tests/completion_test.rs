use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use coach_client::api::StaticCoachClient;
use coach_client::completion::CompletionOutcome;
use coach_client::course_view::CourseViewService;
use coach_client::error::AppError;
use coach_client::models::TaskStatus;
use coach_client::overlay::RecentlyCompleted;

fn intro_course_payload() -> Value {
    json!({
        "modules": [{
            "id": 1,
            "title": "M1",
            "tasks": [{ "id": 9, "title": "Intro", "status": "pending", "points": 50 }]
        }]
    })
}

fn service_with(client: Arc<StaticCoachClient>, student_id: Option<i64>) -> CourseViewService {
    CourseViewService::with_refresh_delay(
        client,
        RecentlyCompleted::ephemeral(),
        student_id,
        Duration::ZERO,
    )
}

#[tokio::test]
async fn confirmed_completion_updates_tree_overlay_and_signal() {
    let client = Arc::new(StaticCoachClient::new(intro_course_payload()));
    let service = service_with(client.clone(), Some(7));
    service.load_course(1).await.expect("load");

    let before = service.snapshot().expect("tree");
    assert_eq!(before.total_tasks, 1);
    assert_eq!(before.pending_tasks, 1);
    assert_eq!(before.completed_tasks, 0);

    let outcome = service.complete_task(9).await.expect("complete");
    assert_eq!(outcome, CompletionOutcome::Confirmed);
    assert_eq!(client.completion_calls(), 1);

    let after = service.snapshot().expect("tree");
    assert_eq!(after.completed_tasks, 1);
    assert_eq!(after.pending_tasks, 0);
    assert_eq!(after.earned_points, 50);
    let task = &after.modules[0].tasks[0];
    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task.completion_date.is_some());

    assert!(service.overlay_contains("intro"));
    assert_eq!(service.points_epoch(), 1);
    assert!(!service.is_pending_optimistic(9));
}

#[tokio::test]
async fn failed_completion_resyncs_to_server_truth() {
    let client = Arc::new(StaticCoachClient::new(intro_course_payload()).with_ack(false));
    let service = service_with(client.clone(), Some(7));
    service.load_course(1).await.expect("load");

    let outcome = service.complete_task(9).await.expect("complete");
    assert_eq!(outcome, CompletionOutcome::Reverted);
    assert_eq!(client.completion_calls(), 1);

    // The re-fetch returned the same pending payload; the optimistic patch
    // must be gone.
    let after = service.snapshot().expect("tree");
    assert_eq!(after.modules[0].tasks[0].status, TaskStatus::Pending);
    assert_eq!(after.completed_tasks, 0);
    assert_eq!(after.pending_tasks, 1);
    assert!(!service.overlay_contains("intro"));
    assert_eq!(service.points_epoch(), 0);
}

#[tokio::test]
async fn failed_completion_adopts_whatever_the_refetch_returns() {
    let client = Arc::new(StaticCoachClient::new(intro_course_payload()).with_ack(false));
    // Server truth at re-fetch time: task meanwhile marked stuck elsewhere.
    client.push_payload(json!({
        "modules": [{
            "id": 1,
            "title": "M1",
            "tasks": [{ "id": 9, "title": "Intro", "status": "stuck", "points": 50 }]
        }]
    }));
    let service = service_with(client, Some(7));
    service.load_course(1).await.expect("load");

    let outcome = service.complete_task(9).await.expect("complete");
    assert_eq!(outcome, CompletionOutcome::Reverted);
    let after = service.snapshot().expect("tree");
    assert_eq!(after.modules[0].tasks[0].status, TaskStatus::Stuck);
}

#[tokio::test]
async fn failed_ack_with_failed_resync_restores_the_patched_task() {
    let client = Arc::new(
        StaticCoachClient::new(intro_course_payload())
            .with_ack(false)
            .with_failing_refetches(),
    );
    let service = service_with(client.clone(), Some(7));
    service.load_course(1).await.expect("load");

    // Server rejects the completion and the recovery re-fetch errs too.
    let result = service.complete_task(9).await;
    assert!(matches!(result, Err(AppError::ServerError)));
    assert_eq!(client.completion_calls(), 1);

    // The optimistic patch must not survive as a confirmed completion:
    // the task is restored to its prior state and nothing is pending.
    let after = service.snapshot().expect("tree");
    let task = &after.modules[0].tasks[0];
    assert_eq!(task.status, TaskStatus::Pending);
    assert!(task.completion_date.is_none());
    assert_eq!(after.completed_tasks, 0);
    assert_eq!(after.pending_tasks, 1);
    assert!(!service.is_pending_optimistic(9));
    assert!(!service.overlay_contains("intro"));
    assert_eq!(service.points_epoch(), 0);
}

#[tokio::test]
async fn unauthenticated_completion_fails_fast_without_mutation() {
    let client = Arc::new(StaticCoachClient::new(intro_course_payload()));
    let service = service_with(client.clone(), None);
    service.load_course(1).await.expect("load");

    let result = service.complete_task(9).await;
    assert!(matches!(result, Err(AppError::Unauthenticated)));
    assert_eq!(client.completion_calls(), 0);

    // No optimistic patch was applied.
    let tree = service.snapshot().expect("tree");
    assert_eq!(tree.modules[0].tasks[0].status, TaskStatus::Pending);
    assert!(!service.is_pending_optimistic(9));
}

#[tokio::test]
async fn concurrent_duplicate_submission_sends_one_mutation() {
    let client = Arc::new(
        StaticCoachClient::new(intro_course_payload())
            .with_completion_delay(Duration::from_millis(50)),
    );
    let service = Arc::new(service_with(client.clone(), Some(7)));
    service.load_course(1).await.expect("load");

    let first = service.complete_task(9);
    let second = async {
        // Let the first submission reach its in-flight window.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(service.is_pending_optimistic(9));
        service.complete_task(9).await
    };

    let (first, second) = tokio::join!(first, second);
    assert_eq!(first.expect("first"), CompletionOutcome::Confirmed);
    assert_eq!(second.expect("second"), CompletionOutcome::DuplicateInFlight);
    assert_eq!(client.completion_calls(), 1);
}

#[tokio::test]
async fn sequential_repeat_completion_is_idempotent() {
    let client = Arc::new(StaticCoachClient::new(intro_course_payload()));
    let service = service_with(client.clone(), Some(7));
    service.load_course(1).await.expect("load");

    let first = service.complete_task(9).await.expect("first");
    let snapshot_once = service.snapshot().expect("tree");

    let second = service.complete_task(9).await.expect("second");
    let snapshot_twice = service.snapshot().expect("tree");

    assert_eq!(first, CompletionOutcome::Confirmed);
    assert_eq!(second, CompletionOutcome::Confirmed);
    assert_eq!(snapshot_once.completed_tasks, snapshot_twice.completed_tasks);
    assert_eq!(snapshot_once.earned_points, snapshot_twice.earned_points);
    assert_eq!(
        snapshot_twice.modules[0].tasks[0].status,
        TaskStatus::Completed
    );
    assert!(service.overlay_contains("Intro"));
}

#[tokio::test]
async fn optimistic_state_visible_while_in_flight() {
    let client = Arc::new(
        StaticCoachClient::new(intro_course_payload())
            .with_completion_delay(Duration::from_millis(50)),
    );
    let service = Arc::new(service_with(client, Some(7)));
    service.load_course(1).await.expect("load");

    let completion = service.complete_task(9);
    let observer = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let mid = service.snapshot().expect("tree");
        // Patched locally, not yet confirmed.
        assert_eq!(mid.modules[0].tasks[0].status, TaskStatus::Completed);
        assert_eq!(mid.completed_tasks, 1);
        assert!(service.is_pending_optimistic(9));
        assert!(!service.overlay_contains("Intro"));
    };

    let (outcome, ()) = tokio::join!(completion, observer);
    assert_eq!(outcome.expect("complete"), CompletionOutcome::Confirmed);
    assert!(!service.is_pending_optimistic(9));
    assert!(service.overlay_contains("Intro"));
}

#[tokio::test]
async fn completing_unknown_task_makes_no_remote_call() {
    let client = Arc::new(StaticCoachClient::new(intro_course_payload()));
    let service = service_with(client.clone(), Some(7));
    service.load_course(1).await.expect("load");

    let result = service.complete_task(12345).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
    assert_eq!(client.completion_calls(), 0);
}

#[tokio::test]
async fn overlay_keeps_task_completed_across_resynthesis() {
    let client = Arc::new(StaticCoachClient::new(intro_course_payload()));
    let service = service_with(client, Some(7));
    service.load_course(1).await.expect("load");
    service.complete_task(9).await.expect("complete");

    // Server still reports pending; the overlay masks the lag on reload.
    service.load_course(1).await.expect("reload");
    let tree = service.snapshot().expect("tree");
    assert_eq!(tree.modules[0].tasks[0].status, TaskStatus::Completed);
    assert_eq!(tree.completed_tasks, 1);
}
