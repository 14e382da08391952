use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

use fidlygrid::daemon::{build_router, AppState};

async fn make_app() -> (Router, TempDir) {
    let temp = tempdir().unwrap();
    let db_path = temp.path().join("data").join("grid.db");
    let theme_path = temp.path().join("theme.json");
    let state = AppState::open(
        &db_path.to_string_lossy(),
        &theme_path.to_string_lossy(),
    )
    .await
    .unwrap();
    (build_router(state), temp)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn health_reports_version() {
    let (app, _temp) = make_app().await;
    let (status, body) = send(&app, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["build"].as_str().is_some());
}

#[tokio::test]
async fn task_soft_delete_restore_and_purge() {
    let (app, _temp) = make_app().await;

    let (status, task) = send(&app, "POST", "/api/tasks", Some(json!({"title": "Buy milk"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["title"], "Buy milk");
    assert_eq!(task["category"], "Tasks");
    assert_eq!(task["completed"], false);
    assert_eq!(task["deleted"], false);
    assert!(task["workspaceId"].is_null());
    let id = task["id"].as_i64().unwrap();

    let (status, task) = send(
        &app,
        "PATCH",
        &format!("/api/tasks/{id}"),
        Some(json!({"completed": true, "emoji": "🥛"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["completed"], true);
    assert_eq!(task["emoji"], "🥛");

    let (status, task) = send(&app, "DELETE", &format!("/api/tasks/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["deleted"], true);

    let (_, view) = send(&app, "GET", "/api/views/Trash", None).await;
    assert_eq!(view["tasks"].as_array().unwrap().len(), 1);
    let (_, view) = send(&app, "GET", "/api/views/Home", None).await;
    assert!(view["tasks"].as_array().unwrap().is_empty());

    let (status, task) = send(
        &app,
        "PATCH",
        &format!("/api/tasks/{id}"),
        Some(json!({"isDeleted": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["deleted"], false);
    assert_eq!(task["completed"], true);

    let (status, body) = send(&app, "DELETE", &format!("/api/tasks/{id}/permanent"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));

    let (_, tasks) = send(&app, "GET", "/api/tasks", None).await;
    assert_eq!(tasks, json!([]));

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/api/tasks/{id}"),
        Some(json!({"completed": false})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Task not found");

    let (status, _) = send(&app, "DELETE", &format!("/api/tasks/{id}/permanent"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_task_input_is_rejected() {
    let (app, _temp) = make_app().await;

    let (status, body) = send(&app, "POST", "/api/tasks", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Title is required");

    let (status, _) = send(&app, "POST", "/api/tasks", Some(json!({"title": "   "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "PATCH",
        "/api/tasks/abc",
        Some(json!({"completed": true})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid task id");

    let (_, task) = send(&app, "POST", "/api/tasks", Some(json!({"title": "Walk dog"}))).await;
    let id = task["id"].as_i64().unwrap();
    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/api/tasks/{id}"),
        Some(json!({"category": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Category cannot be empty");

    let (status, body) = send(
        &app,
        "POST",
        "/api/tasks",
        Some(json!({"title": "Orphan", "workspaceId": 999})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unknown workspace 999");
}

#[tokio::test]
async fn goals_track_favorites_and_reject_workspaces() {
    let (app, _temp) = make_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/goals",
        Some(json!({"title": "Run a marathon", "workspaceId": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Goals cannot belong to a workspace");

    let (status, goal) = send(
        &app,
        "POST",
        "/api/goals",
        Some(json!({"title": "Run a marathon", "emoji": "🏃"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(goal["category"], "Goals");
    let id = goal["id"].as_i64().unwrap();

    let (_, goal) = send(
        &app,
        "PATCH",
        &format!("/api/goals/{id}"),
        Some(json!({"isFavorite": true, "emoji": ""})),
    )
    .await;
    assert_eq!(goal["favorite"], true);
    assert!(goal["emoji"].is_null());

    let (_, counts) = send(&app, "GET", "/api/counts", None).await;
    assert_eq!(counts, json!({"tasks": 0, "goals": 1, "favorites": 1, "trash": 0}));

    let (_, view) = send(&app, "GET", "/api/views/Favorites", None).await;
    assert_eq!(view["goals"].as_array().unwrap().len(), 1);
    assert!(view["emptyMessage"].is_null());

    send(&app, "DELETE", &format!("/api/goals/{id}"), None).await;
    let (_, counts) = send(&app, "GET", "/api/counts", None).await;
    assert_eq!(counts, json!({"tasks": 0, "goals": 0, "favorites": 0, "trash": 1}));

    let (_, view) = send(&app, "GET", "/api/views/Favorites", None).await;
    assert_eq!(view["emptyMessage"], "You don't have any favorites yet");

    let (status, body) = send(&app, "DELETE", &format!("/api/goals/{id}/permanent"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = send(&app, "DELETE", "/api/goals/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Goal not found");
}

#[tokio::test]
async fn deleting_workspace_detaches_tasks() {
    let (app, _temp) = make_app().await;

    let (status, body) = send(&app, "POST", "/api/workspaces", Some(json!({"name": " "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Name is required");

    let (status, workspace) =
        send(&app, "POST", "/api/workspaces", Some(json!({"name": "Garden"}))).await;
    assert_eq!(status, StatusCode::OK);
    let workspace_id = workspace["id"].as_i64().unwrap();

    let (_, task) = send(
        &app,
        "POST",
        "/api/tasks",
        Some(json!({"title": "Plant tulips", "workspaceId": workspace_id})),
    )
    .await;
    assert_eq!(task["workspaceId"], workspace_id);

    let (_, workspaces) = send(&app, "GET", "/api/workspaces", None).await;
    assert_eq!(workspaces.as_array().unwrap().len(), 1);

    let (status, body) = send(
        &app,
        "DELETE",
        &format!("/api/workspaces/{workspace_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (_, tasks) = send(&app, "GET", "/api/tasks", None).await;
    assert_eq!(tasks.as_array().unwrap().len(), 1);
    assert!(tasks[0]["workspaceId"].is_null());

    let (status, body) = send(
        &app,
        "DELETE",
        &format!("/api/workspaces/{workspace_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Workspace not found");
}

#[tokio::test]
async fn views_and_search() {
    let (app, _temp) = make_app().await;
    send(&app, "POST", "/api/tasks", Some(json!({"title": "Buy milk"}))).await;
    send(
        &app,
        "POST",
        "/api/tasks",
        Some(json!({"title": "Sketch logo", "category": "Design"})),
    )
    .await;
    send(&app, "POST", "/api/goals", Some(json!({"title": "Learn piano"}))).await;

    let (status, view) = send(&app, "GET", "/api/views/My%20Tasks", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["category"], "My Tasks");
    assert_eq!(view["tasks"].as_array().unwrap().len(), 1);
    assert!(view["goals"].as_array().unwrap().is_empty());

    let (_, view) = send(&app, "GET", "/api/views/Design", None).await;
    assert_eq!(view["tasks"][0]["title"], "Sketch logo");

    let (_, view) = send(&app, "GET", "/api/views/Home", None).await;
    assert_eq!(view["tasks"].as_array().unwrap().len(), 1);
    assert_eq!(view["goals"].as_array().unwrap().len(), 1);

    let (_, view) = send(&app, "GET", "/api/views/Trash", None).await;
    assert_eq!(view["emptyMessage"], "Trash can is empty");

    let (_, hits) = send(&app, "GET", "/api/search?q=mi", None).await;
    assert_eq!(hits, json!([]));

    let (_, hits) = send(&app, "GET", "/api/search?q=MILK", None).await;
    assert_eq!(hits.as_array().unwrap().len(), 1);
    assert_eq!(hits[0]["type"], "task");
    assert_eq!(hits[0]["title"], "Buy milk");

    let (_, hits) = send(&app, "GET", "/api/search?q=piano", None).await;
    assert_eq!(hits[0]["type"], "goal");
    assert_eq!(hits[0]["category"], "Goals");

    let (_, hits) = send(&app, "GET", "/api/search", None).await;
    assert_eq!(hits, json!([]));
}

#[tokio::test]
async fn theme_round_trip() {
    let (app, temp) = make_app().await;

    let (status, theme) = send(&app, "GET", "/api/theme", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(theme["appearance"], "light");
    assert_eq!(theme["variant"], "professional");

    let (status, theme) = send(&app, "POST", "/api/theme", Some(json!({"appearance": "dark"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(theme["appearance"], "dark");
    assert_eq!(theme["radius"], 0.5);
    assert!(temp.path().join("theme.json").exists());

    let (status, body) = send(&app, "POST", "/api/theme", Some(json!({"appearance": "blue"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid theme value");

    let (_, theme) = send(&app, "GET", "/api/theme", None).await;
    assert_eq!(theme["appearance"], "dark");
}

#[tokio::test]
async fn timer_controls() {
    let (app, _temp) = make_app().await;

    let (status, timer) = send(&app, "GET", "/api/timer", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(timer["mode"], "focus");
    assert_eq!(timer["phase"], "work");
    assert_eq!(timer["display"], "25:00");
    assert_eq!(timer["running"], false);

    let (_, timer) = send(&app, "POST", "/api/timer/toggle", None).await;
    assert_eq!(timer["running"], true);

    let (_, timer) = send(&app, "POST", "/api/timer/reset", None).await;
    assert_eq!(timer["running"], false);
    assert_eq!(timer["remainingSeconds"], 1500);

    let (status, timer) =
        send(&app, "POST", "/api/timer/mode", Some(json!({"mode": "tracker"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(timer["mode"], "tracker");
    assert_eq!(timer["display"], "00:00:00");

    let (status, body) = send(&app, "POST", "/api/timer/mode", Some(json!({"mode": "nap"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid timer mode: nap");
}

#[tokio::test]
async fn clock_snapshot_shape() {
    let (app, _temp) = make_app().await;
    let (status, clock) = send(&app, "GET", "/api/clock", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(clock["time"].as_str().unwrap().len(), 8);
    assert!(clock["date"].as_str().unwrap().contains(", "));
    assert!(clock["timestamp"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn timer_events_stream_is_sse() {
    let (app, _temp) = make_app().await;
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/timer/events")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
}

async fn send_raw(app: &Router, method: &str, uri: &str, body: &str) -> (StatusCode, String, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, content_type, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn malformed_bodies_get_json_errors() {
    let (app, _temp) = make_app().await;

    let (status, content_type, body) =
        send_raw(&app, "POST", "/api/theme", r#"{"appearance":5}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(content_type.starts_with("application/json"));
    assert_eq!(body["error"], "Invalid theme value");

    let (status, _, body) = send_raw(&app, "POST", "/api/theme", "{}").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid theme value");

    let (status, content_type, body) =
        send_raw(&app, "POST", "/api/tasks", r#"{"title":5}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(content_type.starts_with("application/json"));
    assert!(body["error"].as_str().is_some());

    let (status, content_type, body) = send_raw(&app, "POST", "/api/tasks", "not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(content_type.starts_with("application/json"));
    assert!(body["error"].as_str().is_some());

    let (status, _, body) = send_raw(&app, "POST", "/api/timer/mode", r#"{"mode":7}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some());

    let (_, task) = send(&app, "POST", "/api/tasks", Some(json!({"title": "Valid"}))).await;
    let id = task["id"].as_i64().unwrap();
    let (status, _, body) = send_raw(
        &app,
        "PATCH",
        &format!("/api/tasks/{id}"),
        r#"{"completed":"yes"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some());

    let (_, tasks) = send(&app, "GET", "/api/tasks", None).await;
    assert_eq!(tasks[0]["completed"], false);
}
