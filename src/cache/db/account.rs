//! Account rows and the sync metadata kept on them.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::mail::types::Account;

/// Insert an account or refresh its connection details. Sync metadata of an
/// existing row is kept.
pub async fn register_account(pool: &SqlitePool, account: &Account) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO accounts (id, email, host, port, max_inbox_uid, last_sync, quota_used_kb, quota_total_kb)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            email = excluded.email,
            host = excluded.host,
            port = excluded.port
        "#,
    )
    .bind(&account.id)
    .bind(&account.email)
    .bind(&account.host)
    .bind(account.port as i64)
    .bind(account.max_inbox_uid.map(|v| v as i64))
    .bind(account.last_sync)
    .bind(account.quota_used_kb.map(|v| v as i64))
    .bind(account.quota_total_kb.map(|v| v as i64))
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_account(pool: &SqlitePool, account_id: &str) -> Result<Option<Account>> {
    let row = sqlx::query(
        "SELECT id, email, host, port, max_inbox_uid, last_sync, quota_used_kb, quota_total_kb FROM accounts WHERE id = ?",
    )
    .bind(account_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| Account {
        id: row.get("id"),
        email: row.get("email"),
        host: row.get("host"),
        port: row.get::<i64, _>("port") as u16,
        max_inbox_uid: row.get::<Option<i64>, _>("max_inbox_uid").map(|v| v as u32),
        last_sync: row.get("last_sync"),
        quota_used_kb: row.get::<Option<i64>, _>("quota_used_kb").map(|v| v as u64),
        quota_total_kb: row.get::<Option<i64>, _>("quota_total_kb").map(|v| v as u64),
    }))
}

/// Record the end of a run. A `None` max UID keeps the stored value.
pub async fn update_sync_state(
    pool: &SqlitePool,
    account_id: &str,
    max_inbox_uid: Option<u32>,
    last_sync: i64,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE accounts SET max_inbox_uid = COALESCE(?, max_inbox_uid), last_sync = ? WHERE id = ?",
    )
    .bind(max_inbox_uid.map(|v| v as i64))
    .bind(last_sync)
    .bind(account_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        anyhow::bail!("Unknown account: {}", account_id);
    }
    Ok(())
}

pub async fn update_quota(
    pool: &SqlitePool,
    account_id: &str,
    used_kb: u64,
    total_kb: u64,
) -> Result<()> {
    let result =
        sqlx::query("UPDATE accounts SET quota_used_kb = ?, quota_total_kb = ? WHERE id = ?")
            .bind(used_kb as i64)
            .bind(total_kb as i64)
            .bind(account_id)
            .execute(pool)
            .await?;

    if result.rows_affected() == 0 {
        anyhow::bail!("Unknown account: {}", account_id);
    }
    Ok(())
}
