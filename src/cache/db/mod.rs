//! SQLite store for accounts, messages and attachments.
//!
//! This module is split into:
//! - `mod.rs` - Cache struct, connection pool, `MailStore` implementation
//! - `schema.rs` - Database schema initialization
//! - `account.rs` - Account rows and sync metadata
//! - `message.rs` - Message record CRUD operations
//! - `attachment.rs` - Attachment storage

mod account;
mod attachment;
mod message;
mod schema;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::mail::folder::CanonicalFolder;
use crate::mail::types::{Account, MessageRecord};
#[cfg(test)]
use crate::mail::types::MessageKey;
use crate::sync::MailStore;

/// Connection pool size. A run is sequential, the extra connections serve
/// readers while a sync is writing.
const POOL_SIZE: u32 = 4;

pub struct Cache {
    pool: SqlitePool,
}

impl Cache {
    pub async fn open(path: &Path) -> Result<Self> {
        let db_url = format!("sqlite:{}?mode=rwc", path.display());

        let options = SqliteConnectOptions::from_str(&db_url)?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(POOL_SIZE)
            .connect_with(options)
            .await
            .context("Failed to create connection pool")?;

        schema::init_schema(&pool).await?;

        Ok(Self { pool })
    }

    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        // A single connection that never expires, otherwise the in-memory
        // database disappears with it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to create in-memory connection pool")?;

        schema::init_schema(&pool).await?;

        Ok(Self { pool })
    }

    //
    // Account Operations
    //

    pub async fn register_account(&self, account: &Account) -> Result<()> {
        account::register_account(&self.pool, account).await
    }

    pub async fn get_account(&self, account_id: &str) -> Result<Option<Account>> {
        account::get_account(&self.pool, account_id).await
    }

    //
    // Message Operations (delegated to message module)
    //

    #[cfg(test)]
    pub async fn get_message(&self, key: &MessageKey) -> Result<Option<MessageRecord>> {
        message::get_message(&self.pool, key).await
    }

    #[cfg(test)]
    pub async fn get_messages(&self, account_id: &str, folder: &str) -> Result<Vec<MessageRecord>> {
        message::get_messages(&self.pool, account_id, folder).await
    }

    pub async fn get_message_count(&self, account_id: &str, folder: Option<&str>) -> Result<usize> {
        message::get_message_count(&self.pool, account_id, folder).await
    }

    pub async fn get_unread_count(&self, account_id: &str) -> Result<usize> {
        message::get_unread_count(&self.pool, account_id).await
    }

    /// `(folder, total, unread)` for every folder holding messages.
    pub async fn get_folder_counts(&self, account_id: &str) -> Result<Vec<(String, usize, usize)>> {
        message::get_folder_counts(&self.pool, account_id).await
    }

    #[cfg(test)]
    pub async fn set_classification(&self, key: &MessageKey, classification: &str) -> Result<()> {
        message::set_classification(&self.pool, key, classification).await
    }

    #[cfg(test)]
    pub async fn count_attachments(&self, key: &MessageKey) -> Result<usize> {
        attachment::count_attachments(&self.pool, &key.id()).await
    }
}

#[async_trait]
impl MailStore for Cache {
    async fn upsert_message(&self, record: &MessageRecord) -> Result<()> {
        message::upsert_message(&self.pool, record).await
    }

    async fn local_uids(&self, account_id: &str, folder: &CanonicalFolder) -> Result<Vec<u32>> {
        message::get_uids(&self.pool, account_id, folder.as_str()).await
    }

    async fn delete_messages_by_uids(
        &self,
        account_id: &str,
        folder: &CanonicalFolder,
        uids: &[u32],
    ) -> Result<usize> {
        message::delete_by_uids(&self.pool, account_id, folder.as_str(), uids).await
    }

    async fn update_account_sync_state(
        &self,
        account_id: &str,
        max_inbox_uid: Option<u32>,
        last_sync: i64,
    ) -> Result<()> {
        account::update_sync_state(&self.pool, account_id, max_inbox_uid, last_sync).await
    }

    async fn update_account_quota(
        &self,
        account_id: &str,
        used_kb: u64,
        total_kb: u64,
    ) -> Result<()> {
        account::update_quota(&self.pool, account_id, used_kb, total_kb).await
    }

    async fn aggregate_unread_count(&self) -> Result<usize> {
        message::get_aggregate_unread_count(&self.pool).await
    }
}
