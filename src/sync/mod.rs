//! Mailbox-to-store synchronization.
//!
//! A run walks each folder of one account strictly in sequence:
//! - `scanner` - identifier/flag windows over the folder's sequence space
//! - `downloader` - full fetch, parse and upsert of new UIDs in chunks
//! - `reconciler` - removal of local records no longer on the server
//! - `quota` - best-effort quota lookup
//! - `orchestrator` - connection, folder locking and the run result

mod downloader;
mod orchestrator;
mod quota;
mod reconciler;
mod scanner;
mod session;
mod store;

#[cfg(test)]
pub mod testing;

pub use orchestrator::{SyncSettings, Syncer};
pub use session::{
    FetchStream, FetchedMessage, FolderLock, MailSession, QuotaUnit, QuotaUsage, RemoteEntry,
    SeqRange,
};
pub use store::{MailStore, NoopNotifier, SyncNotifier};
