use axum::Json;
use axum::extract::{Query, State};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{JsonBody, MessageResponse, require_fields, require_user};
use crate::db::tasks::{self as repository, UpsertOutcome};
use crate::error::AppError;
use crate::kanban::KanbanBoard;
use crate::models::{
    DeleteTaskRequest, MoveTaskRequest, PatchTaskStatusRequest, Task, TaskStatus, TaskUpsert,
    UpsertTaskRequest,
};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TaskQueryParams {
    user_id: Option<String>,
    #[serde(default)]
    include_archived: bool,
}

/// Response to `POST /tasks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSaved {
    pub message: String,
    pub task: Task,
}

fn parse_status(value: &str) -> Result<TaskStatus, AppError> {
    value
        .trim()
        .parse::<TaskStatus>()
        .map_err(|e| AppError::Unprocessable(e.to_string()))
}

pub(crate) async fn list_tasks(
    State(state): State<AppState>,
    Query(params): Query<TaskQueryParams>,
) -> Result<Json<Vec<Task>>, AppError> {
    let user_id = require_user(params.user_id.as_deref())?;
    let tasks = repository::fetch_tasks(&state.db, user_id, params.include_archived).await?;
    Ok(Json(tasks))
}

pub(crate) async fn upsert_task(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<UpsertTaskRequest>,
) -> Result<Json<TaskSaved>, AppError> {
    require_fields(&[
        ("id", req.id.as_deref()),
        ("task", req.task.as_deref()),
        ("status", req.status.as_deref()),
        ("userId", req.user_id.as_deref()),
    ])?;
    let status = parse_status(req.status.as_deref().unwrap_or_default())?;

    let upsert = TaskUpsert {
        id: req.id.unwrap_or_default().trim().to_string(),
        user_id: req.user_id.unwrap_or_default().trim().to_string(),
        task: req.task.unwrap_or_default(),
        status,
        description: req.description,
        tags: req.tags,
        due_date: req.due_date,
        priority: req.priority,
        checklist: req.checklist,
        expanded: req.expanded,
        position: req.position,
        completed_at: req.completed_at,
        archived: req.archived,
        archived_at: req.archived_at,
    };

    let saved = match repository::upsert_task(&state.db, upsert, Utc::now()).await? {
        UpsertOutcome::Created(task) => {
            info!("created task {} for user {}", task.id, task.user_id);
            TaskSaved {
                message: "Task created successfully".to_string(),
                task,
            }
        }
        UpsertOutcome::Updated(task) => TaskSaved {
            message: "Task updated successfully".to_string(),
            task,
        },
        UpsertOutcome::NotOwned => return Err(AppError::NotFound),
    };

    Ok(Json(saved))
}

pub(crate) async fn patch_task_status(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<PatchTaskStatusRequest>,
) -> Result<Json<Task>, AppError> {
    require_fields(&[
        ("taskId", req.task_id.as_deref()),
        ("userId", req.user_id.as_deref()),
        ("newStatus", req.new_status.as_deref()),
    ])?;
    let status = parse_status(req.new_status.as_deref().unwrap_or_default())?;
    let task_id = req.task_id.as_deref().unwrap_or_default().trim();
    let user_id = req.user_id.as_deref().unwrap_or_default().trim();

    let task = repository::update_status(&state.db, user_id, task_id, status, Utc::now())
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(task))
}

pub(crate) async fn delete_task(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<DeleteTaskRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    require_fields(&[
        ("taskId", req.task_id.as_deref()),
        ("userId", req.user_id.as_deref()),
    ])?;
    let task_id = req.task_id.as_deref().unwrap_or_default().trim();
    let user_id = req.user_id.as_deref().unwrap_or_default().trim();

    if repository::delete_task(&state.db, user_id, task_id).await? {
        info!("deleted task {} for user {}", task_id, user_id);
        Ok(MessageResponse::new("Task deleted successfully"))
    } else {
        Err(AppError::NotFound)
    }
}

/// Applies a board drop and persists every task whose status or position
/// changed. Returns those tasks.
pub(crate) async fn move_task(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<MoveTaskRequest>,
) -> Result<Json<Vec<Task>>, AppError> {
    let index = req.index.map(|i| i.to_string());
    require_fields(&[
        ("taskId", req.task_id.as_deref()),
        ("userId", req.user_id.as_deref()),
        ("column", req.column.as_deref()),
        ("index", index.as_deref()),
    ])?;
    let column = parse_status(req.column.as_deref().unwrap_or_default())?;
    let task_id = req.task_id.as_deref().unwrap_or_default().trim();
    let user_id = req.user_id.as_deref().unwrap_or_default().trim();

    let tasks = repository::fetch_tasks(&state.db, user_id, false).await?;
    let mut board = KanbanBoard::from_tasks(tasks);
    let changed = board
        .move_task(task_id, column, req.index.unwrap_or_default(), Utc::now())
        .ok_or(AppError::NotFound)?;

    repository::save_board_changes(&state.db, user_id, &changed).await?;
    Ok(Json(changed))
}
