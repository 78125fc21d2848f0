//! Typed client for the TinuMind API.
//!
//! Mirrors the frontend's query layer: reads are retried up to twice and
//! writes at most once, and only for transport failures or 5xx responses.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::api::{MessageResponse, TaskSaved};
use crate::error::{AppError, ErrorResponse};
use crate::models::{
    DeleteTaskRequest, Feedback, MoveTaskRequest, NewFeedbackRequest, NewNoteRequest, Note,
    NoteRef, PatchTaskStatusRequest, Task, TaskStatus, UpdateNoteRequest, UpsertTaskRequest,
    Visibility,
};
use crate::services::{ArchiveManager, SweepStats, TaskArchiver};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error {status}: {message}")]
    Status { status: u16, message: String },
}

impl ClientError {
    fn is_retryable(&self) -> bool {
        match self {
            ClientError::Http(_) => true,
            ClientError::Status { status, .. } => *status >= 500,
            ClientError::InvalidUrl(_) | ClientError::Json(_) => false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub read_retries: u32,
    pub write_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            read_retries: 2,
            write_retries: 1,
            backoff: Duration::from_millis(250),
        }
    }
}

pub struct TinuMindClient {
    http: Client,
    base_url: String,
    user_id: String,
    retry: RetryPolicy,
}

impl TinuMindClient {
    pub fn new(base_url: impl Into<String>, user_id: impl Into<String>) -> Result<Self, ClientError> {
        let http = Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_id: user_id.into(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ClientError> {
        let raw = format!("{}{}", self.base_url, path);
        let url = if query.is_empty() {
            Url::parse(&raw)
        } else {
            Url::parse_with_params(&raw, query)
        };
        url.map_err(|e| ClientError::InvalidUrl(e.to_string()))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<T, ClientError> {
        let retries = if method == Method::GET {
            self.retry.read_retries
        } else {
            self.retry.write_retries
        };

        let mut attempt = 0;
        loop {
            match self.send_once(method.clone(), url.clone(), body.as_ref()).await {
                Err(e) if attempt < retries && e.is_retryable() => {
                    attempt += 1;
                    warn!("{} {} failed ({}), retry {}/{}", method, url.path(), e, attempt, retries);
                    tokio::time::sleep(self.retry.backoff).await;
                }
                result => return result,
            }
        }
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<T, ClientError> {
        debug!("{} {}", method, url);
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| e.message)
                .unwrap_or(text);
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<T>().await?)
    }

    fn user_query(&self) -> [(&str, &str); 1] {
        [("userId", self.user_id.as_str())]
    }

    pub async fn list_tasks(&self, include_archived: bool) -> Result<Vec<Task>, ClientError> {
        let include = if include_archived { "true" } else { "false" };
        let url = self.url(
            "/tasks",
            &[("userId", self.user_id.as_str()), ("includeArchived", include)],
        )?;
        self.send(Method::GET, url, None).await
    }

    /// The unarchived task list as raw JSON.
    pub async fn fetch_task_payload(&self) -> Result<Value, ClientError> {
        let url = self.url("/tasks", &self.user_query())?;
        self.send(Method::GET, url, None).await
    }

    /// Creates or updates a task. The client's user id fills a missing owner.
    pub async fn save_task(&self, req: &UpsertTaskRequest) -> Result<TaskSaved, ClientError> {
        let mut req = req.clone();
        if req.user_id.is_none() {
            req.user_id = Some(self.user_id.clone());
        }
        let url = self.url("/tasks", &[])?;
        self.send(Method::POST, url, Some(to_value(&req)?)).await
    }

    pub async fn set_status(&self, task_id: &str, status: TaskStatus) -> Result<Task, ClientError> {
        let req = PatchTaskStatusRequest {
            task_id: Some(task_id.to_string()),
            user_id: Some(self.user_id.clone()),
            new_status: Some(status.to_string()),
        };
        let url = self.url("/tasks", &[])?;
        self.send(Method::PATCH, url, Some(to_value(&req)?)).await
    }

    pub async fn delete_task(&self, task_id: &str) -> Result<MessageResponse, ClientError> {
        let req = DeleteTaskRequest {
            task_id: Some(task_id.to_string()),
            user_id: Some(self.user_id.clone()),
        };
        let url = self.url("/tasks", &[])?;
        self.send(Method::DELETE, url, Some(to_value(&req)?)).await
    }

    pub async fn move_task(
        &self,
        task_id: &str,
        column: TaskStatus,
        index: usize,
    ) -> Result<Vec<Task>, ClientError> {
        let req = MoveTaskRequest {
            task_id: Some(task_id.to_string()),
            user_id: Some(self.user_id.clone()),
            column: Some(column.to_string()),
            index: Some(index),
        };
        let url = self.url("/tasks/move", &[])?;
        self.send(Method::PATCH, url, Some(to_value(&req)?)).await
    }

    pub async fn list_notes(&self, include_deleted: bool) -> Result<Vec<Note>, ClientError> {
        let include = if include_deleted { "true" } else { "false" };
        let url = self.url(
            "/notes",
            &[("userId", self.user_id.as_str()), ("includeDeleted", include)],
        )?;
        self.send(Method::GET, url, None).await
    }

    pub async fn create_note(&self, req: &NewNoteRequest) -> Result<Note, ClientError> {
        let url = self.url("/notes", &self.user_query())?;
        self.send(Method::POST, url, Some(to_value(req)?)).await
    }

    pub async fn update_note(&self, req: &UpdateNoteRequest) -> Result<Note, ClientError> {
        let url = self.url("/notes", &self.user_query())?;
        self.send(Method::PATCH, url, Some(to_value(req)?)).await
    }

    pub async fn delete_note(&self, note_id: &str) -> Result<MessageResponse, ClientError> {
        let req = NoteRef {
            id: Some(note_id.to_string()),
        };
        let url = self.url("/notes", &self.user_query())?;
        self.send(Method::DELETE, url, Some(to_value(&req)?)).await
    }

    pub async fn list_feedback(&self) -> Result<Vec<Feedback>, ClientError> {
        let url = self.url("/feedback", &self.user_query())?;
        self.send(Method::GET, url, None).await
    }

    pub async fn submit_feedback(
        &self,
        name: &str,
        email: &str,
        message: &str,
        kind: &str,
        visibility: Visibility,
    ) -> Result<Feedback, ClientError> {
        let req = NewFeedbackRequest {
            email: Some(email.to_string()),
            feedback: Some(message.to_string()),
            name: Some(name.to_string()),
            kind: Some(kind.to_string()),
            user_id: Some(self.user_id.clone()),
            visibility: Some(visibility.to_string()),
        };
        let url = self.url("/feedback", &[])?;
        self.send(Method::POST, url, Some(to_value(&req)?)).await
    }

    /// Client-side archive sweep over this user's tasks. A failed fetch is
    /// logged and treated as an empty sweep.
    pub async fn sweep_archived(self: &Arc<Self>, now: DateTime<Utc>) -> SweepStats {
        let payload = match self.fetch_task_payload().await {
            Ok(payload) => payload,
            Err(e) => {
                warn!("archive sweep could not load tasks: {}", e);
                return SweepStats::default();
            }
        };

        let archiver: Arc<dyn TaskArchiver> = self.clone();
        ArchiveManager::new(archiver).sweep_value(&payload, now).await
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, ClientError> {
    Ok(serde_json::to_value(value)?)
}

#[async_trait]
impl TaskArchiver for TinuMindClient {
    async fn archive(&self, task: &Task, archived_at: DateTime<Utc>) -> Result<bool, AppError> {
        let mut req = UpsertTaskRequest::from(task);
        req.archived = Some(true);
        req.archived_at = Some(archived_at);

        match self.save_task(&req).await {
            Ok(_) => Ok(true),
            Err(ClientError::Status { status: 404, .. }) => Ok(false),
            Err(e) => Err(AppError::Upstream(e.to_string())),
        }
    }
}
