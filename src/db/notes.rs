use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::types::Json;
use uuid::Uuid;

use crate::models::{NewNoteRequest, Note, UpdateNoteRequest};

/// Pinned notes first, then most recently edited.
pub async fn fetch_notes(
    db: &SqlitePool,
    user_id: &str,
    include_deleted: bool,
) -> Result<Vec<Note>, sqlx::Error> {
    sqlx::query_as::<_, Note>(
        r#"
        SELECT * FROM notes
        WHERE user_id = ?1 AND (?2 OR deleted = 0)
        ORDER BY pinned DESC, updated_at DESC
        "#,
    )
    .bind(user_id)
    .bind(include_deleted)
    .fetch_all(db)
    .await
}

pub async fn find_note(db: &SqlitePool, user_id: &str, id: &str) -> Result<Option<Note>, sqlx::Error> {
    sqlx::query_as::<_, Note>("SELECT * FROM notes WHERE id = ?1 AND user_id = ?2")
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await
}

/// Returns `None` when the id is already taken.
pub async fn insert_note(
    db: &SqlitePool,
    user_id: &str,
    req: NewNoteRequest,
    now: DateTime<Utc>,
) -> Result<Option<Note>, sqlx::Error> {
    let note = Note {
        id: req.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        user_id: user_id.to_string(),
        title: req.title.unwrap_or_default(),
        content: req.content.unwrap_or_default(),
        checklist: req.checklist,
        tags: req.tags,
        pinned: req.pinned,
        archived: false,
        deleted: false,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    };

    let result = sqlx::query(
        r#"
        INSERT INTO notes
            (id, user_id, title, content, checklist, tags, pinned,
            archived, deleted, created_at, updated_at, deleted_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, 0, ?8, ?8, NULL)
        ON CONFLICT(id) DO NOTHING
        "#,
    )
    .bind(&note.id)
    .bind(&note.user_id)
    .bind(&note.title)
    .bind(&note.content)
    .bind(Json(&note.checklist))
    .bind(Json(&note.tags))
    .bind(note.pinned)
    .bind(now)
    .execute(db)
    .await?;

    Ok((result.rows_affected() > 0).then_some(note))
}

pub async fn update_note(
    db: &SqlitePool,
    user_id: &str,
    id: &str,
    req: UpdateNoteRequest,
    now: DateTime<Utc>,
) -> Result<Option<Note>, sqlx::Error> {
    let mut current = match find_note(db, user_id, id).await? {
        Some(n) => n,
        None => return Ok(None),
    };

    if let Some(title) = req.title {
        current.title = title;
    }
    if let Some(content) = req.content {
        current.content = content;
    }
    if let Some(checklist) = req.checklist {
        current.checklist = checklist;
    }
    if let Some(tags) = req.tags {
        current.tags = tags;
    }
    if let Some(pinned) = req.pinned {
        current.pinned = pinned;
    }
    if let Some(archived) = req.archived {
        current.archived = archived;
    }
    if let Some(deleted) = req.deleted {
        if deleted != current.deleted {
            current.deleted = deleted;
            current.deleted_at = deleted.then_some(now);
        }
    }
    current.updated_at = now;

    sqlx::query(
        r#"
        UPDATE notes
        SET title = ?1,
            content = ?2,
            checklist = ?3,
            tags = ?4,
            pinned = ?5,
            archived = ?6,
            deleted = ?7,
            deleted_at = ?8,
            updated_at = ?9
        WHERE id = ?10 AND user_id = ?11
        "#,
    )
    .bind(&current.title)
    .bind(&current.content)
    .bind(Json(&current.checklist))
    .bind(Json(&current.tags))
    .bind(current.pinned)
    .bind(current.archived)
    .bind(current.deleted)
    .bind(current.deleted_at)
    .bind(now)
    .bind(id)
    .bind(user_id)
    .execute(db)
    .await?;

    Ok(Some(current))
}

/// Moves the note to the trash.
pub async fn soft_delete_note(
    db: &SqlitePool,
    user_id: &str,
    id: &str,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE notes
        SET deleted = 1,
            deleted_at = COALESCE(deleted_at, ?1),
            updated_at = ?1
        WHERE id = ?2 AND user_id = ?3
        "#,
    )
    .bind(now)
    .bind(id)
    .bind(user_id)
    .execute(db)
    .await?
    .rows_affected();

    Ok(result > 0)
}
