use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, FromRequest, Json, Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, Mutex};

use crate::clock::ClockSnapshot;
use crate::config::Config;
use crate::db;
use crate::error::{FidlyGridError, Result};
use crate::goals::{Goal, GoalStore};
use crate::interfaces::scheduler::ScheduledJob;
use crate::items::{ItemPatch, NewItem};
use crate::scheduler::{self, Scheduler};
use crate::tasks::{Task, TaskStore};
use crate::theme::{Appearance, ThemeStore};
use crate::timer::{PhaseNotice, Timer, TimerMode};
use crate::views::{self, Category};
use crate::workspaces::{NewWorkspace, WorkspaceStore};

const LOG_LINE_MAX_CHARS: usize = 80;
const TIMER_EVENT_CAPACITY: usize = 32;

#[derive(Clone)]
pub struct AppState {
    pub tasks: Arc<TaskStore>,
    pub goals: Arc<GoalStore>,
    pub workspaces: Arc<WorkspaceStore>,
    pub theme: Arc<ThemeStore>,
    pub timer: Arc<Mutex<Timer>>,
    pub timer_events: broadcast::Sender<PhaseNotice>,
}

impl AppState {
    /// Opens one pool for every store. Migrations run once, inside `connect`.
    pub async fn open(db_path: &str, theme_path: &str) -> Result<Self> {
        let pool = db::connect(db_path).await?;
        let (timer_events, _) = broadcast::channel(TIMER_EVENT_CAPACITY);
        Ok(Self {
            tasks: Arc::new(TaskStore::from_pool(pool.clone())),
            goals: Arc::new(GoalStore::from_pool(pool.clone())),
            workspaces: Arc::new(WorkspaceStore::from_pool(pool)),
            theme: Arc::new(ThemeStore::new(theme_path)),
            timer: Arc::new(Mutex::new(Timer::new())),
            timer_events,
        })
    }

    async fn load_items(&self) -> Result<(Vec<Task>, Vec<Goal>)> {
        tokio::try_join!(self.tasks.list_tasks(), self.goals.list_goals())
    }
}

/// Advances the shared timer and fans phase notices out to SSE listeners.
pub struct TimerTickJob {
    timer: Arc<Mutex<Timer>>,
    events: broadcast::Sender<PhaseNotice>,
    interval: Duration,
}

impl TimerTickJob {
    pub fn new(state: &AppState, interval: Duration) -> Self {
        Self {
            timer: state.timer.clone(),
            events: state.timer_events.clone(),
            interval,
        }
    }
}

#[async_trait::async_trait]
impl ScheduledJob for TimerTickJob {
    fn name(&self) -> &str {
        "timer_tick"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self) -> Result<()> {
        let notice = self.timer.lock().await.tick();
        if let Some(notice) = notice {
            tracing::info!(finished = ?notice.finished, "{}", notice.message);
            // No subscribers is fine; the notice is also kept on the snapshot.
            let _ = self.events.send(notice);
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    build: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct SuccessResponse {
    success: bool,
}

#[derive(Deserialize)]
struct SearchQuery {
    q: Option<String>,
}

// Any JSON value is accepted so a wrongly typed appearance still gets the
// theme-specific error.
#[derive(Deserialize)]
struct ThemeRequest {
    #[serde(default)]
    appearance: Value,
}

#[derive(Deserialize)]
struct TimerModeRequest {
    mode: String,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/{id}", patch(update_task).delete(delete_task))
        .route("/api/tasks/{id}/permanent", delete(purge_task))
        .route("/api/goals", get(list_goals).post(create_goal))
        .route("/api/goals/{id}", patch(update_goal).delete(delete_goal))
        .route("/api/goals/{id}/permanent", delete(purge_goal))
        .route("/api/workspaces", get(list_workspaces).post(create_workspace))
        .route("/api/workspaces/{id}", delete(delete_workspace))
        .route("/api/views/{category}", get(category_view))
        .route("/api/counts", get(counts))
        .route("/api/search", get(search))
        .route("/api/theme", get(get_theme).post(set_theme))
        .route("/api/timer", get(timer_snapshot))
        .route("/api/timer/toggle", post(toggle_timer))
        .route("/api/timer/reset", post(reset_timer))
        .route("/api/timer/mode", post(switch_timer_mode))
        .route("/api/timer/events", get(timer_events))
        .route("/api/clock", get(clock))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        build: env!("FIDLYGRID_GIT_SHA").to_string(),
    })
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Maps a store error onto the public error shape. Internal failures are
/// logged and replaced by `fallback` so storage details never leak.
fn error_response(err: FidlyGridError, entity: &str, fallback: &str) -> Response {
    match err {
        FidlyGridError::NotFound(_) => {
            error_body(StatusCode::NOT_FOUND, format!("{entity} not found"))
        }
        FidlyGridError::InvalidInput(message) => error_body(StatusCode::BAD_REQUEST, message),
        other => {
            tracing::error!(error = %other, "{fallback}");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, fallback)
        }
    }
}

/// `Json` extractor whose rejections use the `{"error": ...}` body with a 400.
struct ApiJson<T>(T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(
        request: Request,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        match Json::<T>::from_request(request, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                tracing::debug!(status = %rejection.status(), "Rejected request body");
                Err(error_body(StatusCode::BAD_REQUEST, rejection.body_text()))
            }
        }
    }
}

fn parse_id(raw: &str, entity: &str) -> std::result::Result<i32, Response> {
    raw.trim().parse::<i32>().map_err(|_| {
        error_body(
            StatusCode::BAD_REQUEST,
            format!("Invalid {} id", entity.to_lowercase()),
        )
    })
}

fn success() -> Response {
    (StatusCode::OK, Json(SuccessResponse { success: true })).into_response()
}

async fn list_tasks(State(state): State<AppState>) -> impl IntoResponse {
    match state.tasks.list_tasks().await {
        Ok(tasks) => (StatusCode::OK, Json(tasks)).into_response(),
        Err(err) => error_response(err, "Task", "Failed to fetch tasks"),
    }
}

async fn create_task(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<NewItem>,
) -> impl IntoResponse {
    match state.tasks.create_task(&payload).await {
        Ok(task) => (StatusCode::OK, Json(task)).into_response(),
        Err(err) => error_response(err, "Task", "Failed to create task"),
    }
}

async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<ItemPatch>,
) -> impl IntoResponse {
    let id = match parse_id(&id, "Task") {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.tasks.update_task(id, &payload).await {
        Ok(task) => (StatusCode::OK, Json(task)).into_response(),
        Err(err) => error_response(err, "Task", "Failed to update task"),
    }
}

async fn delete_task(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let id = match parse_id(&id, "Task") {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.tasks.soft_delete_task(id).await {
        Ok(task) => (StatusCode::OK, Json(task)).into_response(),
        Err(err) => error_response(err, "Task", "Failed to delete task"),
    }
}

async fn purge_task(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let id = match parse_id(&id, "Task") {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.tasks.purge_task(id).await {
        Ok(()) => success(),
        Err(err) => error_response(err, "Task", "Failed to permanently delete task"),
    }
}

async fn list_goals(State(state): State<AppState>) -> impl IntoResponse {
    match state.goals.list_goals().await {
        Ok(goals) => (StatusCode::OK, Json(goals)).into_response(),
        Err(err) => error_response(err, "Goal", "Failed to fetch goals"),
    }
}

async fn create_goal(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<NewItem>,
) -> impl IntoResponse {
    match state.goals.create_goal(&payload).await {
        Ok(goal) => (StatusCode::OK, Json(goal)).into_response(),
        Err(err) => error_response(err, "Goal", "Failed to create goal"),
    }
}

async fn update_goal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<ItemPatch>,
) -> impl IntoResponse {
    let id = match parse_id(&id, "Goal") {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.goals.update_goal(id, &payload).await {
        Ok(goal) => (StatusCode::OK, Json(goal)).into_response(),
        Err(err) => error_response(err, "Goal", "Failed to update goal"),
    }
}

async fn delete_goal(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let id = match parse_id(&id, "Goal") {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.goals.soft_delete_goal(id).await {
        Ok(goal) => (StatusCode::OK, Json(goal)).into_response(),
        Err(err) => error_response(err, "Goal", "Failed to delete goal"),
    }
}

async fn purge_goal(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let id = match parse_id(&id, "Goal") {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.goals.purge_goal(id).await {
        Ok(()) => success(),
        Err(err) => error_response(err, "Goal", "Failed to permanently delete goal"),
    }
}

async fn list_workspaces(State(state): State<AppState>) -> impl IntoResponse {
    match state.workspaces.list_workspaces().await {
        Ok(workspaces) => (StatusCode::OK, Json(workspaces)).into_response(),
        Err(err) => error_response(err, "Workspace", "Failed to fetch workspaces"),
    }
}

async fn create_workspace(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<NewWorkspace>,
) -> impl IntoResponse {
    match state.workspaces.create_workspace(&payload).await {
        Ok(workspace) => (StatusCode::OK, Json(workspace)).into_response(),
        Err(err) => error_response(err, "Workspace", "Failed to create workspace"),
    }
}

async fn delete_workspace(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let id = match parse_id(&id, "Workspace") {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.workspaces.delete_workspace(id).await {
        Ok(_) => success(),
        Err(err) => error_response(err, "Workspace", "Failed to delete workspace"),
    }
}

async fn category_view(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> impl IntoResponse {
    let category = match category.parse::<Category>() {
        Ok(category) => category,
        Err(err) => return error_response(err, "Category", "Failed to load view"),
    };
    match state.load_items().await {
        Ok((tasks, goals)) => {
            let view = views::category_view(&category, tasks, goals);
            (StatusCode::OK, Json(view)).into_response()
        }
        Err(err) => error_response(err, "Category", "Failed to load view"),
    }
}

async fn counts(State(state): State<AppState>) -> impl IntoResponse {
    match state.load_items().await {
        Ok((tasks, goals)) => (StatusCode::OK, Json(views::counts(&tasks, &goals))).into_response(),
        Err(err) => error_response(err, "Item", "Failed to fetch counts"),
    }
}

async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> impl IntoResponse {
    let needle = query.q.unwrap_or_default();
    if needle.trim().chars().count() < views::MIN_SEARCH_LEN {
        return (StatusCode::OK, Json(Vec::<views::SearchHit>::new())).into_response();
    }
    match state.load_items().await {
        Ok((tasks, goals)) => {
            (StatusCode::OK, Json(views::search(&needle, &tasks, &goals))).into_response()
        }
        Err(err) => error_response(err, "Item", "Failed to search"),
    }
}

async fn get_theme(State(state): State<AppState>) -> impl IntoResponse {
    match state.theme.load().await {
        Ok(theme) => (StatusCode::OK, Json(theme)).into_response(),
        Err(err) => error_response(err, "Theme", "Failed to read theme"),
    }
}

async fn set_theme(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ThemeRequest>,
) -> impl IntoResponse {
    let appearance = match payload.appearance.as_str().unwrap_or("").parse::<Appearance>() {
        Ok(appearance) => appearance,
        Err(err) => return error_response(err, "Theme", "Failed to update theme"),
    };
    match state.theme.set_appearance(appearance).await {
        Ok(theme) => (StatusCode::OK, Json(theme)).into_response(),
        Err(err) => error_response(err, "Theme", "Failed to update theme"),
    }
}

async fn timer_snapshot(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.timer.lock().await.snapshot();
    Json(snapshot)
}

async fn toggle_timer(State(state): State<AppState>) -> impl IntoResponse {
    let mut timer = state.timer.lock().await;
    timer.toggle();
    Json(timer.snapshot())
}

async fn reset_timer(State(state): State<AppState>) -> impl IntoResponse {
    let mut timer = state.timer.lock().await;
    timer.reset();
    Json(timer.snapshot())
}

async fn switch_timer_mode(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<TimerModeRequest>,
) -> impl IntoResponse {
    let mode = match payload.mode.parse::<TimerMode>() {
        Ok(mode) => mode,
        Err(err) => return error_response(err, "Timer", "Failed to switch timer mode"),
    };
    let mut timer = state.timer.lock().await;
    timer.switch_mode(mode);
    (StatusCode::OK, Json(timer.snapshot())).into_response()
}

async fn timer_events(State(state): State<AppState>) -> impl IntoResponse {
    let mut receiver = state.timer_events.subscribe();

    let body = Body::from_stream(async_stream::stream! {
        loop {
            match receiver.recv().await {
                Ok(notice) => {
                    let payload = serde_json::to_string(&notice).unwrap_or_default();
                    let line = format!("data: {}\n\n", payload);
                    yield Ok::<Bytes, Infallible>(Bytes::from(line));
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
}

async fn clock() -> Json<ClockSnapshot> {
    Json(ClockSnapshot::now())
}

/// Renders one access-log line: `METHOD path STATUS in Nms :: body`,
/// cut to 80 characters with a trailing ellipsis.
pub fn format_request_log_line(
    method: &str,
    path: &str,
    status: u16,
    elapsed: Duration,
    body: Option<&[u8]>,
) -> String {
    let mut line = format!("{method} {path} {status} in {}ms", elapsed.as_millis());
    if let Some(body) = body.filter(|body| !body.is_empty()) {
        line.push_str(" :: ");
        line.push_str(&String::from_utf8_lossy(body));
    }
    if line.chars().count() > LOG_LINE_MAX_CHARS {
        let mut cut: String = line.chars().take(LOG_LINE_MAX_CHARS - 1).collect();
        cut.push('…');
        return cut;
    }
    line
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(request).await;

    if !path.starts_with("/api") {
        return response;
    }

    let status = response.status().as_u16();
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));
    if !is_json {
        let line =
            format_request_log_line(method.as_str(), &path, status, started.elapsed(), None);
        tracing::info!("{line}");
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(error = %err, path = %path, "Could not buffer response body");
            return error_body(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read response");
        }
    };
    let line = format_request_log_line(
        method.as_str(),
        &path,
        status,
        started.elapsed(),
        Some(&bytes),
    );
    tracing::info!("{line}");
    Response::from_parts(parts, Body::from(bytes))
}

pub async fn run(config: Config) -> Result<()> {
    run_with_shutdown(config, futures::future::pending::<()>()).await
}

pub async fn run_with_shutdown<F>(config: Config, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let config = config.validate()?;
    tracing::info!(
        db_path = %config.db_path,
        theme_path = %config.theme_path,
        "Opening stores"
    );
    let state = AppState::open(&config.db_path, &config.theme_path).await?;

    let tick = scheduler::millis(config.timer_tick_millis);
    let mut scheduler = Scheduler::new();
    scheduler.register_job(Arc::new(TimerTickJob::new(&state, tick)));
    scheduler.start();

    let app = build_router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| FidlyGridError::Runtime(e.to_string()))?;
    tracing::info!(addr = %addr, "Serving FidlyGrid API");
    let shutdown = async move {
        shutdown.await;
        tracing::info!("Shutting down");
        scheduler.stop().await;
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| FidlyGridError::Runtime(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_line_includes_body() {
        let line = format_request_log_line(
            "GET",
            "/api/counts",
            200,
            Duration::from_millis(3),
            Some(br#"{"tasks":1}"#),
        );
        assert_eq!(line, r#"GET /api/counts 200 in 3ms :: {"tasks":1}"#);
    }

    #[test]
    fn log_line_is_truncated_with_ellipsis() {
        let body = format!(r#"{{"title":"{}"}}"#, "x".repeat(200));
        let line = format_request_log_line(
            "POST",
            "/api/tasks",
            200,
            Duration::from_millis(12),
            Some(body.as_bytes()),
        );
        assert_eq!(line.chars().count(), 80);
        assert!(line.ends_with('…'));
        assert!(line.starts_with("POST /api/tasks 200 in 12ms :: "));
    }

    #[test]
    fn log_line_without_body() {
        let line = format_request_log_line("GET", "/api/timer/events", 200, Duration::ZERO, None);
        assert_eq!(line, "GET /api/timer/events 200 in 0ms");
    }

    #[tokio::test]
    async fn tick_job_broadcasts_phase_notices() {
        let (events, mut rx) = broadcast::channel(4);
        let mut timer = Timer::new();
        timer.toggle();
        let job = TimerTickJob {
            timer: Arc::new(Mutex::new(timer)),
            events,
            interval: Duration::from_secs(1),
        };
        for _ in 0..crate::timer::WORK_SECONDS {
            job.run().await.unwrap();
        }
        let notice = rx.try_recv().unwrap();
        assert!(notice.message.starts_with("Time for a break!"));
        assert!(!job.timer.lock().await.is_running());
    }
}
