use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use chrono::{Duration as ChronoDuration, Utc};
use tinumind::api::router;
use tinumind::client::{ClientError, RetryPolicy, TinuMindClient};
use tinumind::db;
use tinumind::models::{NewNoteRequest, TaskStatus, UpdateNoteRequest, UpsertTaskRequest, Visibility};
use tinumind::state::AppState;

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("No local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });
    format!("http://{addr}")
}

async fn spawn_api() -> String {
    let pool = db::memory_pool().await.expect("Failed to create test db");
    serve(router(AppState { db: pool })).await
}

fn fast_retries() -> RetryPolicy {
    RetryPolicy {
        backoff: Duration::from_millis(1),
        ..RetryPolicy::default()
    }
}

fn new_task(id: &str, status: TaskStatus) -> UpsertTaskRequest {
    UpsertTaskRequest {
        id: Some(id.to_string()),
        task: Some(format!("task {id}")),
        status: Some(status.to_string()),
        ..UpsertTaskRequest::default()
    }
}

#[tokio::test]
async fn test_task_workflow() {
    let base = spawn_api().await;
    let client = TinuMindClient::new(base, "alice").unwrap();

    let saved = client.save_task(&new_task("t1", TaskStatus::Planned)).await.unwrap();
    assert_eq!(saved.message, "Task created successfully");
    assert_eq!(saved.task.user_id, "alice");
    client.save_task(&new_task("t2", TaskStatus::Planned)).await.unwrap();

    let task = client.set_status("t1", TaskStatus::Completed).await.unwrap();
    assert!(task.completed_at.is_some());

    let changed = client.move_task("t2", TaskStatus::InProgress, 0).await.unwrap();
    assert!(changed.iter().any(|t| t.id == "t2" && t.status == TaskStatus::InProgress));

    client.delete_task("t1").await.unwrap();
    let tasks = client.list_tasks(false).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, "t2");

    match client.delete_task("t1").await {
        Err(ClientError::Status { status: 404, .. }) => {}
        other => panic!("expected 404, got {other:?}"),
    }
}

#[tokio::test]
async fn test_other_user_sees_nothing() {
    let base = spawn_api().await;
    let alice = TinuMindClient::new(base.clone(), "alice").unwrap();
    let bob = TinuMindClient::new(base, "bob").unwrap();

    alice.save_task(&new_task("t1", TaskStatus::Planned)).await.unwrap();
    assert!(bob.list_tasks(true).await.unwrap().is_empty());
    assert!(matches!(
        bob.set_status("t1", TaskStatus::Completed).await,
        Err(ClientError::Status { status: 404, .. })
    ));
}

#[tokio::test]
async fn test_notes_and_feedback() {
    let base = spawn_api().await;
    let client = TinuMindClient::new(base, "alice").unwrap();

    let note = client
        .create_note(&NewNoteRequest {
            title: Some("Groceries".to_string()),
            content: Some("milk".to_string()),
            ..NewNoteRequest::default()
        })
        .await
        .unwrap();

    let updated = client
        .update_note(&UpdateNoteRequest {
            id: Some(note.id.clone()),
            content: Some("milk, eggs".to_string()),
            ..UpdateNoteRequest::default()
        })
        .await
        .unwrap();
    assert_eq!(updated.content, "milk, eggs");

    client.delete_note(&note.id).await.unwrap();
    assert!(client.list_notes(false).await.unwrap().is_empty());
    assert_eq!(client.list_notes(true).await.unwrap().len(), 1);

    let submitted = client
        .submit_feedback("Alice", "alice@example.com", "Love it", "praise", Visibility::Private)
        .await
        .unwrap();
    assert_eq!(submitted.visibility, Visibility::Private);
    assert_eq!(client.list_feedback().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_sweep_archives_through_api() {
    let base = spawn_api().await;
    let client = Arc::new(TinuMindClient::new(base, "alice").unwrap());

    let mut stale = new_task("stale", TaskStatus::Completed);
    stale.completed_at = Some(Utc::now() - ChronoDuration::days(75));
    client.save_task(&stale).await.unwrap();
    client.save_task(&new_task("open", TaskStatus::Planned)).await.unwrap();

    let stats = client.sweep_archived(Utc::now()).await;
    assert_eq!(stats.scanned, 2);
    assert_eq!(stats.archived, 1);
    assert_eq!(stats.failed, 0);

    let visible = client.list_tasks(false).await.unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, "open");

    let all = client.list_tasks(true).await.unwrap();
    let archived = all.iter().find(|t| t.id == "stale").unwrap();
    assert!(archived.archived);
    assert!(archived.archived_at.is_some());
}

fn flaky_server(hits: Arc<AtomicUsize>, status: StatusCode) -> Router {
    let get_hits = hits.clone();
    Router::new().route(
        "/tasks",
        get(move || {
            let hits = get_hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                status
            }
        })
        .post(move || {
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                status
            }
        }),
    )
}

#[tokio::test]
async fn test_reads_retry_twice() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base = serve(flaky_server(hits.clone(), StatusCode::INTERNAL_SERVER_ERROR)).await;
    let client = TinuMindClient::new(base, "alice")
        .unwrap()
        .with_retry_policy(fast_retries());

    let result = client.list_tasks(false).await;
    assert!(matches!(result, Err(ClientError::Status { status: 500, .. })));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_writes_retry_once() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base = serve(flaky_server(hits.clone(), StatusCode::SERVICE_UNAVAILABLE)).await;
    let client = TinuMindClient::new(base, "alice")
        .unwrap()
        .with_retry_policy(fast_retries());

    let result = client.save_task(&new_task("t1", TaskStatus::Planned)).await;
    assert!(matches!(result, Err(ClientError::Status { status: 503, .. })));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base = serve(flaky_server(hits.clone(), StatusCode::BAD_REQUEST)).await;
    let client = TinuMindClient::new(base, "alice")
        .unwrap()
        .with_retry_policy(fast_retries());

    assert!(client.list_tasks(false).await.is_err());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_sweep_fetch_is_empty() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base = serve(flaky_server(hits.clone(), StatusCode::INTERNAL_SERVER_ERROR)).await;
    let client = Arc::new(
        TinuMindClient::new(base, "alice")
            .unwrap()
            .with_retry_policy(fast_retries()),
    );

    let stats = client.sweep_archived(Utc::now()).await;
    assert_eq!(stats.scanned, 0);
    assert_eq!(stats.archived, 0);
}
