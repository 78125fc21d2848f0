use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::Deserialize;

use super::{JsonBody, MessageResponse, require_fields, require_user};
use crate::db::notes as repository;
use crate::error::AppError;
use crate::models::{NewNoteRequest, Note, NoteRef, UpdateNoteRequest};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NoteQueryParams {
    user_id: Option<String>,
    #[serde(default)]
    include_deleted: bool,
}

pub(crate) async fn list_notes(
    State(state): State<AppState>,
    Query(params): Query<NoteQueryParams>,
) -> Result<Json<Vec<Note>>, AppError> {
    let user_id = require_user(params.user_id.as_deref())?;
    let notes = repository::fetch_notes(&state.db, user_id, params.include_deleted).await?;
    Ok(Json(notes))
}

pub(crate) async fn create_note(
    State(state): State<AppState>,
    Query(params): Query<NoteQueryParams>,
    JsonBody(req): JsonBody<NewNoteRequest>,
) -> Result<(StatusCode, Json<Note>), AppError> {
    let user_id = require_user(params.user_id.as_deref())?;
    let blank = |v: &Option<String>| v.as_deref().map(str::trim).is_none_or(str::is_empty);
    if blank(&req.title) && blank(&req.content) {
        return Err(AppError::BadRequest(
            "Missing required fields: title or content".to_string(),
        ));
    }

    let note = repository::insert_note(&state.db, user_id, req, Utc::now())
        .await?
        .ok_or_else(|| AppError::Conflict("A note with this id already exists".to_string()))?;
    Ok((StatusCode::CREATED, Json(note)))
}

pub(crate) async fn update_note(
    State(state): State<AppState>,
    Query(params): Query<NoteQueryParams>,
    JsonBody(req): JsonBody<UpdateNoteRequest>,
) -> Result<Json<Note>, AppError> {
    let user_id = require_user(params.user_id.as_deref())?;
    require_fields(&[("id", req.id.as_deref())])?;
    let id = req.id.clone().unwrap_or_default();

    let note = repository::update_note(&state.db, user_id, id.trim(), req, Utc::now())
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(note))
}

pub(crate) async fn delete_note(
    State(state): State<AppState>,
    Query(params): Query<NoteQueryParams>,
    JsonBody(req): JsonBody<NoteRef>,
) -> Result<Json<MessageResponse>, AppError> {
    let user_id = require_user(params.user_id.as_deref())?;
    require_fields(&[("id", req.id.as_deref())])?;
    let id = req.id.as_deref().unwrap_or_default().trim();

    if repository::soft_delete_note(&state.db, user_id, id, Utc::now()).await? {
        Ok(MessageResponse::new("Note moved to trash"))
    } else {
        Err(AppError::NotFound)
    }
}
