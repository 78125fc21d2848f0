use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::{Value, json};
use sqlx::SqlitePool;
use tinumind::api::router;
use tinumind::db;
use tinumind::services::ArchiveScheduler;
use tinumind::state::AppState;
use tower::ServiceExt;

async fn setup() -> (Router, SqlitePool) {
    let pool = db::memory_pool().await.expect("Failed to create test db");
    let app = router(AppState { db: pool.clone() });
    (app, pool)
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&value).expect("Failed to encode body"))
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).expect("Failed to build request"))
        .await
        .expect("Request failed");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Response was not JSON")
    };
    (status, value)
}

async fn create_task(app: &Router, id: &str, user_id: &str, status: &str) -> Value {
    let (code, body) = call(
        app,
        Method::POST,
        "/tasks",
        Some(json!({"id": id, "userId": user_id, "task": format!("task {id}"), "status": status})),
    )
    .await;
    assert_eq!(code, StatusCode::OK, "{body}");
    body
}

#[tokio::test]
async fn test_health() {
    let (app, _) = setup().await;
    let (code, _) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(code, StatusCode::OK);
}

#[tokio::test]
async fn test_reads_require_user_id() {
    let (app, _) = setup().await;
    for uri in ["/tasks", "/notes", "/feedback", "/tasks?userId=", "/notes?userId=%20"] {
        let (code, body) = call(&app, Method::GET, uri, None).await;
        assert_eq!(code, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["message"], "Missing required fields: userId");
    }
}

#[tokio::test]
async fn test_upsert_same_id_keeps_one_document() {
    let (app, _) = setup().await;

    let first = create_task(&app, "t1", "alice", "Planned").await;
    assert_eq!(first["message"], "Task created successfully");

    tokio::time::sleep(Duration::from_millis(5)).await;
    let (code, second) = call(
        &app,
        Method::POST,
        "/tasks",
        Some(json!({"id": "t1", "userId": "alice", "task": "renamed", "status": "In-Progress",
                    "tags": [{"name": "Work", "color": "#3b82f6"}]})),
    )
    .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(second["message"], "Task updated successfully");

    let (_, tasks) = call(&app, Method::GET, "/tasks?userId=alice", None).await;
    let tasks = tasks.as_array().expect("array");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["task"], "renamed");
    assert_eq!(tasks[0]["tags"][0]["name"], "Work");
    assert_eq!(tasks[0]["createdAt"], first["task"]["createdAt"]);
    assert_ne!(tasks[0]["updatedAt"], first["task"]["updatedAt"]);
}

#[tokio::test]
async fn test_upsert_validation() {
    let (app, _) = setup().await;

    let (code, body) = call(&app, Method::POST, "/tasks", Some(json!({"task": "no id"}))).await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Missing required fields: id, status, userId");

    let (code, _) = call(
        &app,
        Method::POST,
        "/tasks",
        Some(json!({"id": "t1", "userId": "alice", "task": "x", "status": "Done"})),
    )
    .await;
    assert_eq!(code, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, tasks) = call(&app, Method::GET, "/tasks?userId=alice", None).await;
    assert_eq!(tasks, json!([]));
}

#[tokio::test]
async fn test_invalid_json_body() {
    let (app, _) = setup().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/tasks")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_foreign_user_cannot_touch_task() {
    let (app, _) = setup().await;
    create_task(&app, "t1", "alice", "Planned").await;

    let (code, _) = call(
        &app,
        Method::PATCH,
        "/tasks",
        Some(json!({"taskId": "t1", "userId": "bob", "newStatus": "Completed"})),
    )
    .await;
    assert_eq!(code, StatusCode::NOT_FOUND);

    let (code, _) = call(
        &app,
        Method::DELETE,
        "/tasks",
        Some(json!({"taskId": "t1", "userId": "bob"})),
    )
    .await;
    assert_eq!(code, StatusCode::NOT_FOUND);

    let (code, _) = call(
        &app,
        Method::POST,
        "/tasks",
        Some(json!({"id": "t1", "userId": "bob", "task": "stolen", "status": "Completed"})),
    )
    .await;
    assert_eq!(code, StatusCode::NOT_FOUND);

    let (_, tasks) = call(&app, Method::GET, "/tasks?userId=alice", None).await;
    assert_eq!(tasks[0]["status"], "Planned");
    assert_eq!(tasks[0]["task"], "task t1");
}

#[tokio::test]
async fn test_patch_and_delete_task() {
    let (app, _) = setup().await;
    create_task(&app, "t1", "alice", "Planned").await;

    let (code, task) = call(
        &app,
        Method::PATCH,
        "/tasks",
        Some(json!({"taskId": "t1", "userId": "alice", "newStatus": "Completed"})),
    )
    .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(task["status"], "Completed");
    assert!(task["completedAt"].is_string());

    let (code, _) = call(
        &app,
        Method::PATCH,
        "/tasks",
        Some(json!({"taskId": "t1", "userId": "alice"})),
    )
    .await;
    assert_eq!(code, StatusCode::BAD_REQUEST);

    let (code, body) = call(
        &app,
        Method::DELETE,
        "/tasks",
        Some(json!({"taskId": "t1", "userId": "alice"})),
    )
    .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["message"], "Task deleted successfully");

    let (code, _) = call(
        &app,
        Method::DELETE,
        "/tasks",
        Some(json!({"taskId": "t1", "userId": "alice"})),
    )
    .await;
    assert_eq!(code, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reopened_task_leaves_archive() {
    let (app, pool) = setup().await;
    let finished = (Utc::now() - ChronoDuration::days(90)).to_rfc3339();

    for id in ["posted", "patched"] {
        let (code, _) = call(
            &app,
            Method::POST,
            "/tasks",
            Some(json!({"id": id, "userId": "alice", "task": id, "status": "Completed",
                        "completedAt": finished})),
        )
        .await;
        assert_eq!(code, StatusCode::OK);
    }

    let scheduler = ArchiveScheduler::new(pool, Duration::from_secs(3600));
    assert_eq!(scheduler.run_once(Utc::now()).await.unwrap().archived, 2);
    let (_, visible) = call(&app, Method::GET, "/tasks?userId=alice", None).await;
    assert_eq!(visible, json!([]));

    let (_, archived) = call(&app, Method::GET, "/tasks?userId=alice&includeArchived=true", None).await;
    let mut posted = archived
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["id"] == "posted")
        .cloned()
        .unwrap();
    posted["status"] = json!("Planned");
    let (code, saved) = call(&app, Method::POST, "/tasks", Some(posted)).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(saved["task"]["archived"], false);

    let (code, _) = call(
        &app,
        Method::PATCH,
        "/tasks",
        Some(json!({"taskId": "patched", "userId": "alice", "newStatus": "In-Progress"})),
    )
    .await;
    assert_eq!(code, StatusCode::OK);

    let (_, visible) = call(&app, Method::GET, "/tasks?userId=alice", None).await;
    let mut visible: Vec<(String, String)> = visible
        .as_array()
        .unwrap()
        .iter()
        .map(|t| {
            assert_eq!(t["archived"], false);
            assert!(t["archivedAt"].is_null());
            (t["id"].as_str().unwrap().to_string(), t["status"].as_str().unwrap().to_string())
        })
        .collect();
    visible.sort();
    assert_eq!(
        visible,
        vec![
            ("patched".to_string(), "In-Progress".to_string()),
            ("posted".to_string(), "Planned".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_move_task_between_columns() {
    let (app, _) = setup().await;
    create_task(&app, "a", "alice", "Planned").await;
    create_task(&app, "b", "alice", "Planned").await;
    create_task(&app, "c", "alice", "In-Progress").await;

    let (code, changed) = call(
        &app,
        Method::PATCH,
        "/tasks/move",
        Some(json!({"taskId": "b", "userId": "alice", "column": "In-Progress", "index": 0})),
    )
    .await;
    assert_eq!(code, StatusCode::OK, "{changed}");

    let (_, tasks) = call(&app, Method::GET, "/tasks?userId=alice", None).await;
    let column: Vec<&str> = tasks
        .as_array()
        .unwrap()
        .iter()
        .filter(|t| t["status"] == "In-Progress")
        .map(|t| t["id"].as_str().unwrap())
        .collect();
    assert_eq!(column, vec!["b", "c"]);

    let (code, _) = call(
        &app,
        Method::PATCH,
        "/tasks/move",
        Some(json!({"taskId": "a", "userId": "bob", "column": "Completed", "index": 0})),
    )
    .await;
    assert_eq!(code, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_notes_lifecycle() {
    let (app, _) = setup().await;

    let (code, note) = call(
        &app,
        Method::POST,
        "/notes?userId=alice",
        Some(json!({"title": "Ideas", "content": "- ship it", "tags": [{"name": "Work", "color": "#000"}]})),
    )
    .await;
    assert_eq!(code, StatusCode::CREATED);
    let id = note["id"].as_str().unwrap().to_string();

    let (code, _) = call(&app, Method::POST, "/notes?userId=alice", Some(json!({"title": " "}))).await;
    assert_eq!(code, StatusCode::BAD_REQUEST);

    let (code, updated) = call(
        &app,
        Method::PATCH,
        "/notes?userId=alice",
        Some(json!({"id": id, "pinned": true})),
    )
    .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(updated["pinned"], true);
    assert_eq!(updated["title"], "Ideas");

    let (code, _) = call(
        &app,
        Method::PATCH,
        "/notes?userId=bob",
        Some(json!({"id": id, "title": "mine now"})),
    )
    .await;
    assert_eq!(code, StatusCode::NOT_FOUND);

    let (code, _) = call(&app, Method::DELETE, "/notes?userId=alice", Some(json!({"id": id}))).await;
    assert_eq!(code, StatusCode::OK);

    let (_, visible) = call(&app, Method::GET, "/notes?userId=alice", None).await;
    assert_eq!(visible, json!([]));
    let (_, trash) = call(&app, Method::GET, "/notes?userId=alice&includeDeleted=true", None).await;
    assert_eq!(trash[0]["deleted"], true);
    assert!(trash[0]["deletedAt"].is_string());
}

#[tokio::test]
async fn test_feedback_visibility() {
    let (app, _) = setup().await;

    let submissions = [
        ("alice", "public", "first"),
        ("bob", "private", "bob secret"),
        ("alice", "private", "alice secret"),
        ("carol", "public", "last"),
    ];
    for (user, visibility, message) in submissions {
        let (code, body) = call(
            &app,
            Method::POST,
            "/feedback",
            Some(json!({"email": format!("{user}@example.com"), "feedback": message, "name": user,
                        "type": "idea", "userId": user, "visibility": visibility})),
        )
        .await;
        assert_eq!(code, StatusCode::CREATED);
        assert_eq!(body["feedback"], message);
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let (_, list) = call(&app, Method::GET, "/feedback?userId=alice", None).await;
    let messages: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["feedback"].as_str().unwrap())
        .collect();
    assert_eq!(messages, vec!["last", "alice secret", "first"]);

    let (code, body) = call(&app, Method::POST, "/feedback", Some(json!({"feedback": "hi"}))).await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "Missing required fields: email, name, type, userId, visibility"
    );

    let (code, _) = call(
        &app,
        Method::POST,
        "/feedback",
        Some(json!({"email": "a@b.c", "feedback": "hi", "name": "a", "type": "bug",
                    "userId": "alice", "visibility": "friends"})),
    )
    .await;
    assert_eq!(code, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_unsupported_method() {
    let (app, _) = setup().await;
    let (code, body) = call(&app, Method::PUT, "/tasks", Some(json!({}))).await;
    assert_eq!(code, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["message"], "Method not allowed");

    let (code, _) = call(&app, Method::DELETE, "/feedback", None).await;
    assert_eq!(code, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_cors_preflight() {
    let (app, _) = setup().await;
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/tasks")
        .header(header::ORIGIN, "https://tinumind.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PATCH")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
    assert!(methods.contains("PATCH"));
    assert!(methods.contains("DELETE"));
}
