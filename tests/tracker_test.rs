// Execution tracker integration tests: the cross-session exclusivity
// invariant, task status side effects, and the abandon sweep on session
// close. All against in-memory SQLite.

use devboard::domain::{ExecutionStatus, Priority, TaskStatus};
use devboard::tracker::StopOutcome;
use devboard::{Error, Store, Tracker};

async fn setup() -> (Store, Tracker) {
    let pool = devboard::store::connect("sqlite::memory:", 1)
        .await
        .expect("open in-memory database");
    devboard::store::run_migrations(&pool)
        .await
        .expect("run migrations");
    let store = Store::new(pool);
    let tracker = Tracker::new(store.clone());
    (store, tracker)
}

/// One project, one task, two sessions.
async fn fixtures(store: &Store) -> i64 {
    let project = store
        .create_project("mcp dashboard", None, devboard::domain::ProjectStatus::Active, None)
        .await
        .unwrap();
    let task = store
        .create_task(project.id, "implement websocket updates", Priority::High)
        .await
        .unwrap();
    store.create_session("sess-1", Some(project.id), None).await.unwrap();
    store.create_session("sess-2", Some(project.id), None).await.unwrap();
    task.id
}

#[tokio::test]
async fn start_then_stop_completed() {
    let (store, tracker) = setup().await;
    let task_id = fixtures(&store).await;

    let started = tracker.start_work("sess-1", task_id, Some("picking this up")).await.unwrap();
    assert_eq!(started.execution.status, ExecutionStatus::Active);
    assert!(started.execution.stopped_at.is_none());
    assert_eq!(started.events.len(), 1);
    assert_eq!(started.events[0].category, "task_execution");
    assert_eq!(started.events[0].action, "started");

    let task = store.get_task(task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::InProgress);

    let stopped = tracker
        .stop_work("sess-1", task_id, StopOutcome::Completed, None)
        .await
        .unwrap();
    assert_eq!(stopped.execution.status, ExecutionStatus::Completed);
    let stopped_at = stopped.execution.stopped_at.expect("stopped_at set");
    assert!(stopped_at >= stopped.execution.started_at);

    let task = store.get_task(task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Done);
}

#[tokio::test]
async fn second_session_start_is_conflict() {
    let (store, tracker) = setup().await;
    let task_id = fixtures(&store).await;

    tracker.start_work("sess-1", task_id, None).await.unwrap();

    let err = tracker.start_work("sess-2", task_id, None).await.unwrap_err();
    match err {
        Error::Conflict(message) => {
            assert!(message.contains("sess-1"), "conflict names the holder: {message}");
        }
        other => panic!("expected conflict, got {other:?}"),
    }

    // The original execution is untouched and still the only one.
    let executions = tracker.executions_for_task(task_id).await.unwrap();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].status, ExecutionStatus::Active);
    assert_eq!(executions[0].session_id, "sess-1");
}

#[tokio::test]
async fn stop_from_wrong_session_is_not_found() {
    let (store, tracker) = setup().await;
    let task_id = fixtures(&store).await;

    tracker.start_work("sess-1", task_id, None).await.unwrap();

    let err = tracker
        .stop_work("sess-2", task_id, StopOutcome::Completed, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }), "got {err:?}");

    // Still claimed by sess-1.
    let executions = tracker.executions_for_task(task_id).await.unwrap();
    assert_eq!(executions[0].status, ExecutionStatus::Active);
}

#[tokio::test]
async fn pause_returns_task_to_todo() {
    let (store, tracker) = setup().await;
    let task_id = fixtures(&store).await;

    tracker.start_work("sess-1", task_id, None).await.unwrap();
    let stopped = tracker
        .stop_work("sess-1", task_id, StopOutcome::Paused, Some("blocked on review"))
        .await
        .unwrap();

    assert_eq!(stopped.execution.status, ExecutionStatus::Paused);
    assert_eq!(stopped.execution.notes.as_deref(), Some("blocked on review"));

    let task = store.get_task(task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Todo);

    // The task is claimable again after a pause.
    tracker.start_work("sess-2", task_id, None).await.unwrap();
}

#[tokio::test]
async fn closing_session_abandons_active_executions() {
    let (store, tracker) = setup().await;
    let task_id = fixtures(&store).await;

    tracker.start_work("sess-1", task_id, None).await.unwrap();
    let closed = tracker.close_session("sess-1", None).await.unwrap();

    assert_eq!(closed.abandoned.len(), 1);
    assert_eq!(closed.abandoned[0].status, ExecutionStatus::Abandoned);
    assert!(closed.abandoned[0].stopped_at.is_some());
    assert!(closed.session.end_time.is_some());

    // session/closed first, then one abandoned event per execution.
    assert_eq!(closed.events.len(), 2);
    assert_eq!(closed.events[0].category, "session");
    assert_eq!(closed.events[1].action, "abandoned");

    let executions = tracker.executions_for_task(task_id).await.unwrap();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].status, ExecutionStatus::Abandoned);

    let session = store.get_session("sess-1").await.unwrap().unwrap();
    assert!(session.end_time.is_some());
}

#[tokio::test]
async fn close_session_without_executions_is_clean() {
    let (store, tracker) = setup().await;
    fixtures(&store).await;

    let closed = tracker.close_session("sess-2", Some(1_700_000_000)).await.unwrap();
    assert!(closed.abandoned.is_empty());
    assert_eq!(closed.session.end_time, Some(1_700_000_000));
    assert_eq!(closed.events.len(), 1);
}

#[tokio::test]
async fn start_unknown_task_or_session_is_not_found() {
    let (store, tracker) = setup().await;
    let task_id = fixtures(&store).await;

    let err = tracker.start_work("no-such-session", task_id, None).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { kind: "session", .. }));

    let err = tracker.start_work("sess-1", 9999, None).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { kind: "task", .. }));
}

#[tokio::test]
async fn listings_are_newest_first() {
    let (store, tracker) = setup().await;
    let task_id = fixtures(&store).await;

    tracker.start_work("sess-1", task_id, None).await.unwrap();
    tracker
        .stop_work("sess-1", task_id, StopOutcome::Paused, None)
        .await
        .unwrap();
    tracker.start_work("sess-2", task_id, None).await.unwrap();

    let for_task = tracker.executions_for_task(task_id).await.unwrap();
    assert_eq!(for_task.len(), 2);
    assert_eq!(for_task[0].session_id, "sess-2");
    assert_eq!(for_task[0].status, ExecutionStatus::Active);

    let for_session = tracker.executions_for_session("sess-1").await.unwrap();
    assert_eq!(for_session.len(), 1);
    assert_eq!(for_session[0].status, ExecutionStatus::Paused);
}

#[tokio::test]
async fn stop_outcome_parses_only_valid_statuses() {
    assert!(matches!("completed".parse::<StopOutcome>(), Ok(StopOutcome::Completed)));
    assert!(matches!("paused".parse::<StopOutcome>(), Ok(StopOutcome::Paused)));
    let err = "abandoned".parse::<StopOutcome>().unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}
