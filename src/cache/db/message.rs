//! Message record CRUD operations.

use anyhow::Result;
use sqlx::SqlitePool;
#[cfg(test)]
use sqlx::{Row, sqlite::SqliteRow};

use super::attachment;
use crate::mail::types::MessageRecord;
#[cfg(test)]
use crate::mail::types::MessageKey;

/// SQLite's default bound-parameter limit is 999; stay well below it.
const DELETE_BATCH_SIZE: usize = 500;

#[cfg(test)]
const SELECT_COLUMNS: &str = "account_id, folder, uid, from_name, from_addr, subject, text_body, html_body, date, is_read, is_flagged, is_placeholder, classification";

/// Convert a SQLite row to a MessageRecord (attachments loaded separately).
#[cfg(test)]
fn row_to_message(row: SqliteRow) -> MessageRecord {
    MessageRecord {
        key: MessageKey {
            account_id: row.get("account_id"),
            folder: row.get("folder"),
            uid: row.get::<i64, _>("uid") as u32,
        },
        from_name: row.get("from_name"),
        from_addr: row.get("from_addr"),
        subject: row.get("subject"),
        text_body: row.get("text_body"),
        html_body: row.get("html_body"),
        date: row.get("date"),
        is_read: row.get("is_read"),
        is_flagged: row.get("is_flagged"),
        is_placeholder: row.get("is_placeholder"),
        attachments: Vec::new(),
        classification: row.get("classification"),
    }
}

/// Insert or update a message and its attachments in one transaction.
/// An existing classification is left untouched.
pub async fn upsert_message(pool: &SqlitePool, record: &MessageRecord) -> Result<()> {
    let id = record.key.id();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO messages
        (id, account_id, folder, uid, from_name, from_addr, subject, text_body, html_body, date, is_read, is_flagged, is_placeholder)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(account_id, folder, uid) DO UPDATE SET
            from_name = excluded.from_name,
            from_addr = excluded.from_addr,
            subject = excluded.subject,
            text_body = excluded.text_body,
            html_body = excluded.html_body,
            date = excluded.date,
            is_read = excluded.is_read,
            is_flagged = excluded.is_flagged,
            is_placeholder = excluded.is_placeholder
        "#,
    )
    .bind(&id)
    .bind(&record.key.account_id)
    .bind(&record.key.folder)
    .bind(record.key.uid as i64)
    .bind(&record.from_name)
    .bind(&record.from_addr)
    .bind(&record.subject)
    .bind(&record.text_body)
    .bind(&record.html_body)
    .bind(record.date)
    .bind(record.is_read)
    .bind(record.is_flagged)
    .bind(record.is_placeholder)
    .execute(&mut *tx)
    .await?;

    attachment::replace_attachments(&mut tx, &id, &record.attachments).await?;

    tx.commit().await?;
    Ok(())
}

/// All UIDs stored for a folder, ascending.
pub async fn get_uids(pool: &SqlitePool, account_id: &str, folder: &str) -> Result<Vec<u32>> {
    let uids: Vec<i64> = sqlx::query_scalar(
        "SELECT uid FROM messages WHERE account_id = ? AND folder = ? ORDER BY uid ASC",
    )
    .bind(account_id)
    .bind(folder)
    .fetch_all(pool)
    .await?;

    Ok(uids.into_iter().map(|uid| uid as u32).collect())
}

/// Delete the given UIDs from a folder in one transaction. Returns the number
/// of rows removed.
pub async fn delete_by_uids(
    pool: &SqlitePool,
    account_id: &str,
    folder: &str,
    uids: &[u32],
) -> Result<usize> {
    if uids.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    let mut deleted = 0u64;

    for chunk in uids.chunks(DELETE_BATCH_SIZE) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!(
            "DELETE FROM messages WHERE account_id = ? AND folder = ? AND uid IN ({})",
            placeholders
        );

        let mut query = sqlx::query(&sql).bind(account_id).bind(folder);
        for uid in chunk {
            query = query.bind(*uid as i64);
        }

        deleted += query.execute(&mut *tx).await?.rows_affected();
    }

    tx.commit().await?;
    Ok(deleted as usize)
}

/// Get a single message with its attachments.
#[cfg(test)]
pub async fn get_message(pool: &SqlitePool, key: &MessageKey) -> Result<Option<MessageRecord>> {
    let sql = format!(
        "SELECT {} FROM messages WHERE account_id = ? AND folder = ? AND uid = ?",
        SELECT_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(&key.account_id)
        .bind(&key.folder)
        .bind(key.uid as i64)
        .fetch_optional(pool)
        .await?;

    let Some(mut record) = row.map(row_to_message) else {
        return Ok(None);
    };
    record.attachments = attachment::get_attachments(pool, &key.id()).await?;
    Ok(Some(record))
}

/// All messages in a folder ordered by UID, without attachment payloads.
#[cfg(test)]
pub async fn get_messages(
    pool: &SqlitePool,
    account_id: &str,
    folder: &str,
) -> Result<Vec<MessageRecord>> {
    let sql = format!(
        "SELECT {} FROM messages WHERE account_id = ? AND folder = ? ORDER BY uid ASC",
        SELECT_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(account_id)
        .bind(folder)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(row_to_message).collect())
}

/// Set the classification of a message (written by the external classifier).
#[cfg(test)]
pub async fn set_classification(
    pool: &SqlitePool,
    key: &MessageKey,
    classification: &str,
) -> Result<()> {
    sqlx::query("UPDATE messages SET classification = ? WHERE id = ?")
        .bind(classification)
        .bind(key.id())
        .execute(pool)
        .await?;
    Ok(())
}

/// Get total message count for an account, optionally limited to a folder.
pub async fn get_message_count(
    pool: &SqlitePool,
    account_id: &str,
    folder: Option<&str>,
) -> Result<usize> {
    let count: i64 = match folder {
        Some(folder) => {
            sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE account_id = ? AND folder = ?")
                .bind(account_id)
                .bind(folder)
                .fetch_one(pool)
                .await?
        }
        None => {
            sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE account_id = ?")
                .bind(account_id)
                .fetch_one(pool)
                .await?
        }
    };
    Ok(count as usize)
}

/// Get unread message count for one account.
pub async fn get_unread_count(pool: &SqlitePool, account_id: &str) -> Result<usize> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE account_id = ? AND is_read = 0")
            .bind(account_id)
            .fetch_one(pool)
            .await?;
    Ok(count as usize)
}

/// Message and unread counts per folder of one account, by folder name.
pub async fn get_folder_counts(
    pool: &SqlitePool,
    account_id: &str,
) -> Result<Vec<(String, usize, usize)>> {
    let rows: Vec<(String, i64, i64)> = sqlx::query_as(
        r#"
        SELECT folder, COUNT(*), COALESCE(SUM(CASE WHEN is_read = 0 THEN 1 ELSE 0 END), 0)
        FROM messages
        WHERE account_id = ?
        GROUP BY folder
        ORDER BY folder
        "#,
    )
    .bind(account_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(folder, total, unread)| (folder, total as usize, unread as usize))
        .collect())
}

/// Get unread message count across all accounts.
pub async fn get_aggregate_unread_count(pool: &SqlitePool) -> Result<usize> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE is_read = 0")
        .fetch_one(pool)
        .await?;
    Ok(count as usize)
}
