use sqlx::SqlitePool;

use crate::models::Feedback;

/// Every public entry plus the caller's own private ones, newest first.
pub async fn fetch_visible_feedback(
    db: &SqlitePool,
    user_id: &str,
) -> Result<Vec<Feedback>, sqlx::Error> {
    sqlx::query_as::<_, Feedback>(
        r#"
        SELECT * FROM feedback
        WHERE visibility = 'public'
           OR (visibility = 'private' AND user_id = ?1)
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await
}

pub async fn insert_feedback(db: &SqlitePool, feedback: &Feedback) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO feedback
            (id, user_id, name, email, feedback, type, visibility, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&feedback.id)
    .bind(&feedback.user_id)
    .bind(&feedback.name)
    .bind(&feedback.email)
    .bind(&feedback.feedback)
    .bind(&feedback.kind)
    .bind(feedback.visibility.as_str())
    .bind(feedback.created_at)
    .execute(db)
    .await?;

    Ok(())
}
