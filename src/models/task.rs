use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::types::Json;
use sqlx::{FromRow, Row};

use super::{ChecklistItem, Tag};

/// Board column a task sits in. The wire names are fixed by the frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "Planned")]
    Planned,
    #[serde(rename = "In-Progress")]
    InProgress,
    #[serde(rename = "Completed")]
    Completed,
}

impl TaskStatus {
    /// Columns in board order.
    pub const ALL: [TaskStatus; 3] = [
        TaskStatus::Planned,
        TaskStatus::InProgress,
        TaskStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Planned => "Planned",
            TaskStatus::InProgress => "In-Progress",
            TaskStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid status '{}', expected one of Completed, In-Progress, Planned",
            self.0
        )
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for TaskStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Planned" => Ok(TaskStatus::Planned),
            "In-Progress" => Ok(TaskStatus::InProgress),
            "Completed" => Ok(TaskStatus::Completed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub user_id: String,
    pub task: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub tags: Vec<Tag>,
    pub due_date: Option<String>,
    pub priority: Option<String>,
    #[serde(default)]
    pub checklist: Vec<ChecklistItem>,
    #[serde(default)]
    pub expanded: bool,
    #[serde(default)]
    pub position: i64,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Moves the task to `status`, stamping or clearing `completed_at`.
    /// Leaving `Completed` also brings the task back out of the archive.
    /// Returns false when the status did not change.
    pub fn set_status(&mut self, status: TaskStatus, now: DateTime<Utc>) -> bool {
        if self.status == status {
            return false;
        }
        self.status = status;
        if status == TaskStatus::Completed {
            self.completed_at = Some(now);
        } else {
            self.completed_at = None;
            self.archived = false;
            self.archived_at = None;
        }
        self.updated_at = now;
        true
    }
}

impl<'r> FromRow<'r, SqliteRow> for Task {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let status = status.parse::<TaskStatus>().map_err(|e| sqlx::Error::ColumnDecode {
            index: "status".to_string(),
            source: Box::new(e),
        })?;
        let tags: Json<Vec<Tag>> = row.try_get("tags")?;
        let checklist: Json<Vec<ChecklistItem>> = row.try_get("checklist")?;

        Ok(Task {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            task: row.try_get("task")?,
            description: row.try_get("description")?,
            status,
            tags: tags.0,
            due_date: row.try_get("due_date")?,
            priority: row.try_get("priority")?,
            checklist: checklist.0,
            expanded: row.try_get("expanded")?,
            position: row.try_get("position")?,
            completed_at: row.try_get("completed_at")?,
            archived: row.try_get("archived")?,
            archived_at: row.try_get("archived_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Body of `POST /tasks`. Everything is optional on the wire so that missing
/// fields can be reported together instead of failing deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertTaskRequest {
    pub id: Option<String>,
    pub user_id: Option<String>,
    pub task: Option<String>,
    pub status: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<Tag>>,
    pub due_date: Option<String>,
    pub priority: Option<String>,
    pub checklist: Option<Vec<ChecklistItem>>,
    pub expanded: Option<bool>,
    pub position: Option<i64>,
    pub completed_at: Option<DateTime<Utc>>,
    pub archived: Option<bool>,
    pub archived_at: Option<DateTime<Utc>>,
}

impl From<&Task> for UpsertTaskRequest {
    fn from(task: &Task) -> Self {
        Self {
            id: Some(task.id.clone()),
            user_id: Some(task.user_id.clone()),
            task: Some(task.task.clone()),
            status: Some(task.status.to_string()),
            description: task.description.clone(),
            tags: Some(task.tags.clone()),
            due_date: task.due_date.clone(),
            priority: task.priority.clone(),
            checklist: Some(task.checklist.clone()),
            expanded: Some(task.expanded),
            position: Some(task.position),
            completed_at: task.completed_at,
            archived: Some(task.archived),
            archived_at: task.archived_at,
        }
    }
}

/// A validated upsert. Optional fields left as `None` keep the stored value
/// on update.
#[derive(Debug, Clone)]
pub struct TaskUpsert {
    pub id: String,
    pub user_id: String,
    pub task: String,
    pub status: TaskStatus,
    pub description: Option<String>,
    pub tags: Option<Vec<Tag>>,
    pub due_date: Option<String>,
    pub priority: Option<String>,
    pub checklist: Option<Vec<ChecklistItem>>,
    pub expanded: Option<bool>,
    pub position: Option<i64>,
    pub completed_at: Option<DateTime<Utc>>,
    pub archived: Option<bool>,
    pub archived_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchTaskStatusRequest {
    pub task_id: Option<String>,
    pub user_id: Option<String>,
    pub new_status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteTaskRequest {
    pub task_id: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveTaskRequest {
    pub task_id: Option<String>,
    pub user_id: Option<String>,
    pub column: Option<String>,
    pub index: Option<usize>,
}
