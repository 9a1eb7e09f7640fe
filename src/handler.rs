use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::{
    error::ApiError,
    lookup::{task_for_update, task_or_404},
    middleware::Payload,
    model::{CurrentUser, Note, Task, TaskView},
    schema::{ListTasksParams, NotePatch, TaskPatch},
    AppState,
};

type ApiResult<T> = Result<T, ApiError>;

fn ok(data: impl serde::Serialize) -> Json<Value> {
    Json(json!({"status": "ok", "data": data}))
}

fn payload_value(payload: &Option<Extension<Payload>>) -> Option<&Value> {
    payload.as_ref().map(|Extension(Payload(value))| value)
}

// Handler for the health checker route
pub async fn health_checker_handler() -> impl IntoResponse {
    const MESSAGE: &str = "busyb task API";

    Json(json!({
        "status": "ok",
        "message": MESSAGE
    }))
}

pub async fn list_tasks(
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<ListTasksParams>,
) -> ApiResult<Json<Value>> {
    let group = params.group()?;
    let tasks = Task::list_owned(&data.db, user.id, group, Utc::now().date_naive()).await?;

    let views: Vec<TaskView> = tasks.iter().map(|task| task.to_view(&data.hashids)).collect();
    Ok(ok(views))
}

pub async fn create_task(
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    payload: Option<Extension<Payload>>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let fields = TaskPatch::from_payload(payload_value(&payload))?.validate()?;
    let task = Task::insert(&data.db, user.id, &fields, Utc::now()).await?;
    tracing::info!(task = task.id, owner = user.id, "task created");

    Ok((StatusCode::CREATED, ok(task.to_view(&data.hashids))))
}

pub async fn get_task(
    Path(hashid): Path<String>,
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    let mut conn = data.db.acquire().await?;
    let task = task_or_404(&mut conn, &data.hashids, &user, &hashid).await?;

    Ok(ok(task.to_view(&data.hashids)))
}

/// Serves both PUT and PATCH: absent fields keep their stored values.
pub async fn update_task(
    Path(hashid): Path<String>,
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    payload: Option<Extension<Payload>>,
) -> ApiResult<Json<Value>> {
    let patch = TaskPatch::from_payload(payload_value(&payload))?;

    let mut tx = data.db.begin().await?;
    let task = task_for_update(&mut tx, &data.hashids, &user, &hashid).await?;
    let fields = patch.merge(&task.fields()).validate()?;
    let completed_at = task.completed_at_after(&fields, Utc::now());
    let task = Task::update(&mut *tx, task.id, &fields, completed_at).await?;
    tx.commit().await?;
    tracing::info!(task = task.id, owner = user.id, "task updated");

    Ok(ok(task.to_view(&data.hashids)))
}

pub async fn delete_task(
    Path(hashid): Path<String>,
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    let mut tx = data.db.begin().await?;
    let task = task_for_update(&mut tx, &data.hashids, &user, &hashid).await?;
    Task::delete(&mut *tx, task.id).await?;
    tx.commit().await?;
    tracing::info!(task = task.id, owner = user.id, "task deleted");

    Ok(ok(json!({"deleted": true})))
}

pub async fn mark_task_complete(
    Path(hashid): Path<String>,
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    set_completed(&data, &user, &hashid, true).await
}

pub async fn mark_task_current(
    Path(hashid): Path<String>,
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    set_completed(&data, &user, &hashid, false).await
}

async fn set_completed(
    data: &AppState,
    user: &CurrentUser,
    hashid: &str,
    completed: bool,
) -> ApiResult<Json<Value>> {
    let mut tx = data.db.begin().await?;
    let task = task_for_update(&mut tx, &data.hashids, user, hashid).await?;
    let mut fields = task.fields();
    fields.completed = completed;
    let completed_at = task.completed_at_after(&fields, Utc::now());
    let task = Task::update(&mut *tx, task.id, &fields, completed_at).await?;
    tx.commit().await?;
    tracing::info!(task = task.id, completed, "task completion changed");

    Ok(ok(task.to_view(&data.hashids)))
}

/// The note is created empty the first time anyone asks for it.
pub async fn get_task_notes(
    Path(hashid): Path<String>,
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    let mut tx = data.db.begin().await?;
    let task = task_for_update(&mut tx, &data.hashids, &user, &hashid).await?;
    let note = Note::get_or_create(&mut tx, task.id, Utc::now()).await?;
    tx.commit().await?;

    Ok(ok(note.to_view(&data.hashids)))
}

pub async fn update_task_notes(
    Path(hashid): Path<String>,
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    payload: Option<Extension<Payload>>,
) -> ApiResult<Json<Value>> {
    let patch = NotePatch::from_payload(payload_value(&payload))?;

    let mut tx = data.db.begin().await?;
    let task = task_for_update(&mut tx, &data.hashids, &user, &hashid).await?;
    let now = Utc::now();
    let note = Note::get_or_create(&mut tx, task.id, now).await?;
    let text = patch.merge(&note.text).validate()?;
    let note = Note::update_text(&mut *tx, note.id, &text, now).await?;
    tx.commit().await?;
    tracing::info!(task = task.id, owner = user.id, "task notes updated");

    Ok(ok(note.to_view(&data.hashids)))
}
