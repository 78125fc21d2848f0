use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::{JsonBody, require_fields, require_user};
use crate::db::feedback as repository;
use crate::error::AppError;
use crate::models::{Feedback, NewFeedbackRequest, Visibility};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FeedbackQueryParams {
    user_id: Option<String>,
}

pub(crate) async fn list_feedback(
    State(state): State<AppState>,
    Query(params): Query<FeedbackQueryParams>,
) -> Result<Json<Vec<Feedback>>, AppError> {
    let user_id = require_user(params.user_id.as_deref())?;
    let feedback = repository::fetch_visible_feedback(&state.db, user_id).await?;
    Ok(Json(feedback))
}

pub(crate) async fn submit_feedback(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<NewFeedbackRequest>,
) -> Result<(StatusCode, Json<Feedback>), AppError> {
    require_fields(&[
        ("email", req.email.as_deref()),
        ("feedback", req.feedback.as_deref()),
        ("name", req.name.as_deref()),
        ("type", req.kind.as_deref()),
        ("userId", req.user_id.as_deref()),
        ("visibility", req.visibility.as_deref()),
    ])?;
    let visibility = req
        .visibility
        .as_deref()
        .unwrap_or_default()
        .trim()
        .parse::<Visibility>()
        .map_err(AppError::Unprocessable)?;

    let feedback = Feedback {
        id: Uuid::new_v4().to_string(),
        user_id: req.user_id.unwrap_or_default().trim().to_string(),
        name: req.name.unwrap_or_default().trim().to_string(),
        email: req.email.unwrap_or_default().trim().to_string(),
        feedback: req.feedback.unwrap_or_default(),
        kind: req.kind.unwrap_or_default().trim().to_string(),
        visibility,
        created_at: Utc::now(),
    };

    repository::insert_feedback(&state.db, &feedback).await?;
    Ok((StatusCode::CREATED, Json(feedback)))
}
