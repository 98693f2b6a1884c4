//! Attachment storage. Attachments are owned by a message row and removed
//! with it through `ON DELETE CASCADE`.

use anyhow::Result;
use sqlx::SqliteConnection;
#[cfg(test)]
use sqlx::{Row, SqlitePool};

use crate::mail::types::Attachment;

/// Replace the attachments of a message inside an open transaction.
pub async fn replace_attachments(
    conn: &mut SqliteConnection,
    message_id: &str,
    attachments: &[Attachment],
) -> Result<()> {
    sqlx::query("DELETE FROM attachments WHERE message_id = ?")
        .bind(message_id)
        .execute(&mut *conn)
        .await?;

    for attachment in attachments {
        sqlx::query(
            "INSERT INTO attachments (message_id, filename, content_type, size, data) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(message_id)
        .bind(&attachment.filename)
        .bind(&attachment.content_type)
        .bind(attachment.size as i64)
        .bind(&attachment.data)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Get the attachments of a message, in insertion order.
#[cfg(test)]
pub async fn get_attachments(pool: &SqlitePool, message_id: &str) -> Result<Vec<Attachment>> {
    let rows = sqlx::query(
        "SELECT filename, content_type, size, data FROM attachments WHERE message_id = ? ORDER BY id",
    )
    .bind(message_id)
    .fetch_all(pool)
    .await?;

    let attachments = rows
        .into_iter()
        .map(|row| Attachment {
            filename: row.get("filename"),
            content_type: row.get("content_type"),
            size: row.get::<i64, _>("size") as usize,
            data: row.get("data"),
        })
        .collect();

    Ok(attachments)
}

/// Count attachment rows for a message (used to verify cascades).
#[cfg(test)]
pub async fn count_attachments(pool: &SqlitePool, message_id: &str) -> Result<usize> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attachments WHERE message_id = ?")
        .bind(message_id)
        .fetch_one(pool)
        .await?;
    Ok(count as usize)
}
