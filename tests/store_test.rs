// Persistence gateway tests: patch merges and the recent-session listing.

use devboard::domain::{Priority, ProjectStatus, TaskStatus};
use devboard::store::{SessionPatch, TaskPatch};
use devboard::{Store, Tracker};

async fn setup() -> Store {
    let pool = devboard::store::connect("sqlite::memory:", 1)
        .await
        .expect("open in-memory database");
    devboard::store::run_migrations(&pool)
        .await
        .expect("run migrations");
    Store::new(pool)
}

#[tokio::test]
async fn task_patch_updates_only_given_fields() {
    let store = setup().await;
    let project = store
        .create_project("patchwork", None, ProjectStatus::Active, None)
        .await
        .unwrap();
    let task = store
        .create_task(project.id, "first draft", Priority::Low)
        .await
        .unwrap();

    let updated = store
        .update_task(
            task.id,
            &TaskPatch {
                title: Some("final draft".to_string()),
                status: Some(TaskStatus::Done),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.title, "final draft");
    assert_eq!(updated.status, TaskStatus::Done);
    assert_eq!(updated.priority, Priority::Low);

    // And the row agrees with the merged struct.
    let fetched = store.get_task(task.id).await.unwrap().unwrap();
    assert_eq!(fetched.title, "final draft");
    assert_eq!(fetched.status, TaskStatus::Done);

    assert!(store.update_task(9999, &TaskPatch::default()).await.unwrap().is_none());
}

#[tokio::test]
async fn session_patch_updates_metadata() {
    let store = setup().await;
    store.create_session("sess-1", None, None).await.unwrap();

    let updated = store
        .update_session(
            "sess-1",
            &SessionPatch {
                summary: Some("refactoring afternoon".to_string()),
                token_usage: Some(serde_json::json!({"input_tokens": 1200})),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.summary.as_deref(), Some("refactoring afternoon"));
    assert!(updated.end_time.is_none());

    let fetched = store.get_session("sess-1").await.unwrap().unwrap();
    assert_eq!(fetched.token_usage.unwrap()["input_tokens"], 1200);
}

#[tokio::test]
async fn recent_sessions_filter_by_project_and_open_state() {
    let store = setup().await;
    let tracker = Tracker::new(store.clone());

    let project = store
        .create_project("filters", None, ProjectStatus::Active, None)
        .await
        .unwrap();
    let other = store
        .create_project("other", None, ProjectStatus::Active, None)
        .await
        .unwrap();

    store.create_session("sess-a", Some(project.id), None).await.unwrap();
    store.create_session("sess-b", Some(project.id), None).await.unwrap();
    store.create_session("sess-c", Some(other.id), None).await.unwrap();

    tracker.close_session("sess-b", None).await.unwrap();

    let all = store.list_recent_sessions(Some(project.id), false, 10).await.unwrap();
    assert_eq!(all.len(), 2);

    let open = store.list_recent_sessions(Some(project.id), true, 10).await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].session.id, "sess-a");

    let everywhere = store.list_recent_sessions(None, false, 10).await.unwrap();
    assert_eq!(everywhere.len(), 3);
}
