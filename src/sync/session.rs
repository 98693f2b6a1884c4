use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt;

use crate::mail::folder::FolderDescriptor;
use crate::mail::types::EmailFlags;

/// Inclusive, 1-based range of message sequence numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqRange {
    pub start: u32,
    pub end: u32,
}

impl SeqRange {
    pub fn count(&self) -> u32 {
        self.end - self.start + 1
    }

    pub fn contains(&self, seq: u32) -> bool {
        (self.start..=self.end).contains(&seq)
    }
}

impl fmt::Display for SeqRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

/// Identifier and flags of one remote message, as returned by a window fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub uid: u32,
    pub flags: EmailFlags,
}

/// A message fetched with its full source. `raw` is `None` when the server
/// returned no body section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMessage {
    pub uid: u32,
    pub flags: EmailFlags,
    pub raw: Option<Vec<u8>>,
}

/// Proof that a folder is selected on the session. Hand it back to
/// `MailSession::release_folder` when done.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a locked folder must be released"]
pub struct FolderLock {
    pub path: String,
    /// Message count reported when the folder was opened
    pub exists: u32,
}

/// Unit a server reports storage usage in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaUnit {
    Bytes,
    Kilobytes,
    Megabytes,
}

impl QuotaUnit {
    pub fn to_kb(self, value: u64) -> u64 {
        match self {
            QuotaUnit::Bytes => value / 1024,
            QuotaUnit::Kilobytes => value,
            QuotaUnit::Megabytes => value.saturating_mul(1024),
        }
    }
}

/// Raw storage usage as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaUsage {
    pub used: u64,
    pub limit: u64,
    pub unit: QuotaUnit,
}

/// Lazy, finite stream of fetch results. Each item may fail on its own.
pub type FetchStream<'a, T> = BoxStream<'a, Result<T>>;

/// A stateful connection to one remote mailbox account.
///
/// Calls are issued strictly one after another; streams borrow the session
/// and must be drained or dropped before the next call.
#[async_trait]
pub trait MailSession: Send {
    async fn connect(&mut self) -> Result<()>;

    async fn logout(&mut self) -> Result<()>;

    /// Selectable folders of the account.
    async fn list_folders(&mut self) -> Result<Vec<FolderDescriptor>>;

    /// Open a folder read-only. Neither locking nor releasing may change the
    /// remote mailbox.
    async fn lock_folder(&mut self, path: &str) -> Result<FolderLock>;

    /// Close a folder previously opened with `lock_folder`.
    async fn release_folder(&mut self, lock: FolderLock) -> Result<()>;

    /// UIDs and flags for a sequence range of the locked folder.
    async fn fetch_identifiers_and_flags<'a>(
        &'a mut self,
        range: SeqRange,
    ) -> Result<FetchStream<'a, RemoteEntry>>;

    /// Full sources and flags for the given UIDs of the locked folder.
    async fn fetch_full_messages<'a>(
        &'a mut self,
        uids: &[u32],
    ) -> Result<FetchStream<'a, FetchedMessage>>;

    /// Storage usage for the quota root of `folder`, if the server has one.
    async fn query_quota(&mut self, folder: &str) -> Result<Option<QuotaUsage>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_range() {
        let range = SeqRange {
            start: 5001,
            end: 9999,
        };
        assert_eq!(range.to_string(), "5001:9999");
        assert_eq!(range.count(), 4999);
        assert!(range.contains(5001));
        assert!(range.contains(9999));
        assert!(!range.contains(5000));
    }

    #[test]
    fn test_quota_unit_conversion() {
        assert_eq!(QuotaUnit::Bytes.to_kb(2048), 2);
        assert_eq!(QuotaUnit::Kilobytes.to_kb(2048), 2048);
        assert_eq!(QuotaUnit::Megabytes.to_kb(2), 2048);
    }
}
