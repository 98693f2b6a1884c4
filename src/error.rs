use thiserror::Error;

use crate::sync::SeqRange;

/// Classified failures of a sync run. Only `Connection` (and a failed final
/// account update) ends a run; the others are logged and absorbed.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("connection failed: {0:#}")]
    Connection(anyhow::Error),

    #[error("could not open folder {folder}: {error:#}")]
    FolderLock {
        folder: String,
        error: anyhow::Error,
    },

    #[error("identifier fetch for {range} failed: {error:#}")]
    RangeFetch {
        range: SeqRange,
        error: anyhow::Error,
    },

    #[error("download of {count} messages starting at UID {first} failed: {error:#}")]
    ChunkDownload {
        first: u32,
        count: usize,
        error: anyhow::Error,
    },

    #[error("quota query failed: {0:#}")]
    Quota(anyhow::Error),

    #[error("storage error: {0:#}")]
    Storage(anyhow::Error),

    #[error("logout failed: {0:#}")]
    Logout(anyhow::Error),
}
