use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};

use crate::models::{Task, TaskStatus, TaskUpsert};

/// Result of `upsert_task`. An id that already belongs to another user is
/// neither updated nor reinserted.
#[derive(Debug)]
pub enum UpsertOutcome {
    Created(Task),
    Updated(Task),
    NotOwned,
}

pub async fn fetch_tasks(
    db: &SqlitePool,
    user_id: &str,
    include_archived: bool,
) -> Result<Vec<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(
        r#"
        SELECT * FROM tasks
        WHERE user_id = ?1 AND (?2 OR archived = 0)
        ORDER BY position ASC, created_at ASC
        "#,
    )
    .bind(user_id)
    .bind(include_archived)
    .fetch_all(db)
    .await
}

pub async fn find_task<'e, E>(db: E, user_id: &str, id: &str) -> Result<Option<Task>, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = ?1 AND user_id = ?2")
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await
}

async fn find_task_by_id(conn: &mut SqliteConnection, id: &str) -> Result<Option<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = ?1")
        .bind(id)
        .fetch_optional(conn)
        .await
}

async fn next_position(
    conn: &mut SqliteConnection,
    user_id: &str,
    status: TaskStatus,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(MAX(position), -1) + 1 FROM tasks WHERE user_id = ?1 AND status = ?2",
    )
    .bind(user_id)
    .bind(status.as_str())
    .fetch_one(conn)
    .await
}

pub async fn upsert_task(
    db: &SqlitePool,
    req: TaskUpsert,
    now: DateTime<Utc>,
) -> Result<UpsertOutcome, sqlx::Error> {
    let mut tx = db.begin().await?;

    let existing = find_task_by_id(&mut tx, &req.id).await?;
    if let Some(existing) = &existing {
        if existing.user_id != req.user_id {
            return Ok(UpsertOutcome::NotOwned);
        }
    }

    let position = match (req.position, &existing) {
        (Some(position), _) => position,
        (None, Some(existing)) if existing.status == req.status => existing.position,
        (None, _) => next_position(&mut tx, &req.user_id, req.status).await?,
    };

    let previous_completed_at = existing.as_ref().and_then(|t| t.completed_at);
    let completed_at = match req.status {
        TaskStatus::Completed => req.completed_at.or(previous_completed_at).or(Some(now)),
        _ => None,
    };

    let created = existing.is_none();
    let mut task = match existing {
        Some(current) => Task {
            id: current.id,
            user_id: current.user_id,
            task: req.task,
            description: req.description.or(current.description),
            status: req.status,
            tags: req.tags.unwrap_or(current.tags),
            due_date: req.due_date.or(current.due_date),
            priority: req.priority.or(current.priority),
            checklist: req.checklist.unwrap_or(current.checklist),
            expanded: req.expanded.unwrap_or(current.expanded),
            position,
            completed_at,
            archived: req.archived.unwrap_or(current.archived),
            archived_at: req.archived_at.or(current.archived_at),
            created_at: current.created_at,
            updated_at: now,
        },
        None => Task {
            id: req.id,
            user_id: req.user_id,
            task: req.task,
            description: req.description,
            status: req.status,
            tags: req.tags.unwrap_or_default(),
            due_date: req.due_date,
            priority: req.priority,
            checklist: req.checklist.unwrap_or_default(),
            expanded: req.expanded.unwrap_or(false),
            position,
            completed_at,
            archived: req.archived.unwrap_or(false),
            archived_at: req.archived_at,
            created_at: now,
            updated_at: now,
        },
    };
    // Only completed tasks can sit in the archive.
    if task.status != TaskStatus::Completed {
        task.archived = false;
        task.archived_at = None;
    }

    sqlx::query(
        r#"
        INSERT INTO tasks
            (id, user_id, task, description, status, tags, due_date, priority,
            checklist, expanded, position, completed_at, archived, archived_at,
            created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
        ON CONFLICT(id) DO UPDATE SET
            task = excluded.task,
            description = excluded.description,
            status = excluded.status,
            tags = excluded.tags,
            due_date = excluded.due_date,
            priority = excluded.priority,
            checklist = excluded.checklist,
            expanded = excluded.expanded,
            position = excluded.position,
            completed_at = excluded.completed_at,
            archived = excluded.archived,
            archived_at = excluded.archived_at,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&task.id)
    .bind(&task.user_id)
    .bind(&task.task)
    .bind(&task.description)
    .bind(task.status.as_str())
    .bind(Json(&task.tags))
    .bind(&task.due_date)
    .bind(&task.priority)
    .bind(Json(&task.checklist))
    .bind(task.expanded)
    .bind(task.position)
    .bind(task.completed_at)
    .bind(task.archived)
    .bind(task.archived_at)
    .bind(task.created_at)
    .bind(task.updated_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(if created {
        UpsertOutcome::Created(task)
    } else {
        UpsertOutcome::Updated(task)
    })
}

pub async fn update_status(
    db: &SqlitePool,
    user_id: &str,
    id: &str,
    status: TaskStatus,
    now: DateTime<Utc>,
) -> Result<Option<Task>, sqlx::Error> {
    let mut tx = db.begin().await?;

    let mut current = match find_task(&mut *tx, user_id, id).await? {
        Some(t) => t,
        None => return Ok(None),
    };

    if !current.set_status(status, now) {
        return Ok(Some(current));
    }
    // Joins the end of its new column.
    current.position = next_position(&mut tx, user_id, status).await?;

    let result = sqlx::query(
        r#"
        UPDATE tasks
        SET status = ?1,
            position = ?2,
            completed_at = ?3,
            archived = ?4,
            archived_at = ?5,
            updated_at = ?6
        WHERE id = ?7 AND user_id = ?8
        "#,
    )
    .bind(current.status.as_str())
    .bind(current.position)
    .bind(current.completed_at)
    .bind(current.archived)
    .bind(current.archived_at)
    .bind(current.updated_at)
    .bind(id)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok((result.rows_affected() > 0).then_some(current))
}

pub async fn delete_task(db: &SqlitePool, user_id: &str, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = ?1 AND user_id = ?2")
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?
        .rows_affected();

    Ok(result > 0)
}

/// Completed tasks that have not been archived yet, across all users.
pub async fn fetch_archive_candidates(db: &SqlitePool) -> Result<Vec<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(
        "SELECT * FROM tasks WHERE status = 'Completed' AND archived = 0 ORDER BY completed_at ASC",
    )
    .fetch_all(db)
    .await
}

pub async fn mark_archived(
    db: &SqlitePool,
    user_id: &str,
    id: &str,
    archived_at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE tasks
        SET archived = 1,
            archived_at = ?1,
            updated_at = ?1
        WHERE id = ?2 AND user_id = ?3 AND archived = 0
        "#,
    )
    .bind(archived_at)
    .bind(id)
    .bind(user_id)
    .execute(db)
    .await?
    .rows_affected();

    Ok(result > 0)
}

/// Writes status and ordering for every task in `changed` in one transaction.
pub async fn save_board_changes(
    db: &SqlitePool,
    user_id: &str,
    changed: &[Task],
) -> Result<(), sqlx::Error> {
    let mut tx = db.begin().await?;

    for task in changed {
        sqlx::query(
            r#"
            UPDATE tasks
            SET status = ?1,
                position = ?2,
                completed_at = ?3,
                archived = ?4,
                archived_at = ?5,
                updated_at = ?6
            WHERE id = ?7 AND user_id = ?8
            "#,
        )
        .bind(task.status.as_str())
        .bind(task.position)
        .bind(task.completed_at)
        .bind(task.archived)
        .bind(task.archived_at)
        .bind(task.updated_at)
        .bind(&task.id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}
