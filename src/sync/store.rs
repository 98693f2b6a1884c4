use anyhow::Result;
use async_trait::async_trait;

use crate::mail::folder::CanonicalFolder;
use crate::mail::types::{Account, MessageRecord};

/// Local persistence used by a sync run.
#[async_trait]
pub trait MailStore: Send + Sync {
    /// Insert or replace one record (identity: account, folder, uid).
    async fn upsert_message(&self, record: &MessageRecord) -> Result<()>;

    /// UIDs stored for a folder, ascending.
    async fn local_uids(&self, account_id: &str, folder: &CanonicalFolder) -> Result<Vec<u32>>;

    /// Delete the given UIDs in one batch, returning how many were removed.
    async fn delete_messages_by_uids(
        &self,
        account_id: &str,
        folder: &CanonicalFolder,
        uids: &[u32],
    ) -> Result<usize>;

    async fn update_account_sync_state(
        &self,
        account_id: &str,
        max_inbox_uid: Option<u32>,
        last_sync: i64,
    ) -> Result<()>;

    async fn update_account_quota(&self, account_id: &str, used_kb: u64, total_kb: u64)
    -> Result<()>;

    /// Unread messages across all accounts.
    async fn aggregate_unread_count(&self) -> Result<usize>;
}

/// Receives the outcome of a run for badge or notification purposes.
pub trait SyncNotifier: Send + Sync {
    fn sync_finished(&self, account: &Account, new_count: usize, unread_total: usize);
}

/// Notifier that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl SyncNotifier for NoopNotifier {
    fn sync_finished(&self, _account: &Account, _new_count: usize, _unread_total: usize) {}
}
