//! Drives one account through a full sync run.

use anyhow::Result;
use futures::future::BoxFuture;
use tracing::Instrument;

use super::downloader::Downloader;
use super::quota;
use super::reconciler;
use super::scanner::{RangeScanner, ScanState};
use super::session::MailSession;
use super::store::{MailStore, SyncNotifier};
use crate::config::SyncConfig;
use crate::constants::{DEFAULT_DOWNLOAD_CHUNK, DEFAULT_SCAN_WINDOW};
use crate::error::SyncError;
use crate::mail::folder::{CanonicalFolder, FolderDescriptor, assign_canonical_names};
use crate::mail::parser::MimeParser;
use crate::mail::types::{Account, FolderReport, SyncResult};
use crate::retry::{RetryConfig, with_retry};

/// Folder whose quota root is queried.
const QUOTA_FOLDER: &str = "INBOX";

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub scan_window: u32,
    pub download_chunk: usize,
    /// Remove orphans even when an identifier window failed this run
    pub reconcile_after_failed_window: bool,
    pub sync_quota: bool,
    pub connect_retry: RetryConfig,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            scan_window: DEFAULT_SCAN_WINDOW,
            download_chunk: DEFAULT_DOWNLOAD_CHUNK,
            reconcile_after_failed_window: false,
            sync_quota: true,
            connect_retry: RetryConfig::default(),
        }
    }
}

impl From<&SyncConfig> for SyncSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            scan_window: config.scan_window,
            download_chunk: config.download_chunk,
            reconcile_after_failed_window: config.reconcile_after_failed_window,
            sync_quota: config.sync_quota,
            connect_retry: RetryConfig::with_max_retries(config.connect_retries),
        }
    }
}

pub struct Syncer<'a> {
    store: &'a dyn MailStore,
    parser: &'a dyn MimeParser,
    notifier: &'a dyn SyncNotifier,
    settings: SyncSettings,
}

impl<'a> Syncer<'a> {
    pub fn new(
        store: &'a dyn MailStore,
        parser: &'a dyn MimeParser,
        notifier: &'a dyn SyncNotifier,
        settings: SyncSettings,
    ) -> Self {
        Self {
            store,
            parser,
            notifier,
            settings,
        }
    }

    /// Sync every folder of `account` over `session`.
    ///
    /// Only a failed connection, a failed folder listing or a failed final
    /// account update make the result unsuccessful. Everything else is
    /// logged and retried on the next run.
    pub async fn sync_account<S>(&self, session: &mut S, account: &Account) -> SyncResult
    where
        S: MailSession + ?Sized,
    {
        let span = tracing::info_span!("sync", account = %account.id);
        self.run(session, account).instrument(span).await
    }

    async fn run<S>(&self, session: &mut S, account: &Account) -> SyncResult
    where
        S: MailSession + ?Sized,
    {
        tracing::info!("Connecting to {}:{}", account.host, account.port);

        if let Err(e) = with_retry(&self.settings.connect_retry, session, connect_session).await {
            let err = SyncError::Connection(e);
            tracing::error!("{}", err);
            return SyncResult::failure(err.to_string());
        }

        let mut result = self.sync_connected(session, account).await;

        if let Err(e) = session.logout().await {
            let err = SyncError::Logout(e);
            if result.success {
                tracing::warn!("{}", err);
            } else {
                result.error = Some(match result.error.take() {
                    Some(previous) => format!("{}; {}", previous, err),
                    None => err.to_string(),
                });
            }
        }

        if result.success {
            tracing::info!(
                "Sync finished: {} new messages in {} folders",
                result.new_count,
                result.folders.len()
            );
        }

        result
    }

    async fn sync_connected<S>(&self, session: &mut S, account: &Account) -> SyncResult
    where
        S: MailSession + ?Sized,
    {
        if self.settings.sync_quota
            && let Some(figures) = quota::inspect_quota(session, QUOTA_FOLDER).await
            && let Err(e) = self
                .store
                .update_account_quota(&account.id, figures.used_kb, figures.total_kb)
                .await
        {
            tracing::warn!("{}", SyncError::Storage(e));
        }

        let folders = match session.list_folders().await {
            Ok(folders) => folders,
            Err(e) => {
                let err = SyncError::Connection(e.context("LIST failed"));
                tracing::error!("{}", err);
                return SyncResult::failure(err.to_string());
            }
        };
        tracing::debug!("Server has {} selectable folders", folders.len());

        let mut result = SyncResult {
            success: true,
            ..Default::default()
        };
        let mut max_inbox_uid: Option<u32> = None;
        for (descriptor, canonical) in assign_canonical_names(&folders) {
            let span = tracing::info_span!(
                "folder",
                path = %descriptor.path,
                canonical = %canonical
            );
            let Some(report) = self
                .sync_folder(session, account, descriptor, &canonical)
                .instrument(span)
                .await
            else {
                continue;
            };

            if canonical.is_inbox() {
                max_inbox_uid = max_inbox_uid.max(report.max_uid);
            }
            result.new_count += report.new_messages;
            result.folders.push(report);
        }

        // A None max UID keeps the stored value
        let now = chrono::Utc::now().timestamp();
        if let Err(e) = self
            .store
            .update_account_sync_state(&account.id, max_inbox_uid, now)
            .await
        {
            let err = SyncError::Storage(e);
            tracing::error!("{}", err);
            return SyncResult {
                success: false,
                error: Some(err.to_string()),
                ..result
            };
        }

        match self.store.aggregate_unread_count().await {
            Ok(unread) => {
                result.unread_total = Some(unread);
                self.notifier.sync_finished(account, result.new_count, unread);
            }
            Err(e) => tracing::warn!("Could not count unread messages: {:#}", e),
        }

        result
    }

    /// Lock, sync and release one folder. Returns `None` if the folder was
    /// skipped.
    async fn sync_folder<S>(
        &self,
        session: &mut S,
        account: &Account,
        descriptor: &FolderDescriptor,
        canonical: &CanonicalFolder,
    ) -> Option<FolderReport>
    where
        S: MailSession + ?Sized,
    {
        let lock = match session.lock_folder(&descriptor.path).await {
            Ok(lock) => lock,
            Err(error) => {
                let err = SyncError::FolderLock {
                    folder: descriptor.path.clone(),
                    error,
                };
                tracing::warn!("{}, skipping", err);
                return None;
            }
        };

        let outcome = self
            .sync_locked_folder(session, account, canonical, lock.exists)
            .await;

        if let Err(e) = session.release_folder(lock).await {
            tracing::warn!("Failed to close {}: {:#}", descriptor.path, e);
        }

        match outcome {
            Ok(report) => {
                tracing::info!(
                    "{}: {} observed, {} new, {} placeholders, {} removed",
                    canonical,
                    report.observed,
                    report.new_messages,
                    report.placeholders,
                    report.orphans_removed
                );
                Some(report)
            }
            Err(e) => {
                tracing::warn!("{}, abandoning {}", SyncError::Storage(e), descriptor.path);
                None
            }
        }
    }

    async fn sync_locked_folder<S>(
        &self,
        session: &mut S,
        account: &Account,
        canonical: &CanonicalFolder,
        exists: u32,
    ) -> Result<FolderReport>
    where
        S: MailSession + ?Sized,
    {
        let mut report = FolderReport {
            folder: canonical.to_string(),
            ..Default::default()
        };

        if exists == 0 {
            tracing::debug!("Folder is empty");
            return Ok(report);
        }

        let local_uids = self.store.local_uids(&account.id, canonical).await?;
        let mut state = ScanState::new(&local_uids);
        let scanner = RangeScanner::new(self.settings.scan_window);
        let downloader = Downloader::new(self.store, self.parser, self.settings.download_chunk);

        for range in scanner.windows(exists) {
            let candidates = scanner.scan_window(session, range, &mut state).await;
            if candidates.is_empty() {
                continue;
            }

            let downloaded = downloader
                .download(session, &account.id, canonical, &candidates)
                .await?;
            report.new_messages += downloaded.parsed;
            report.placeholders += downloaded.placeholders;
            report.failed_chunks += downloaded.failed_chunks;
        }

        report.observed = state.observed().len();
        report.failed_windows = state.failed_windows();
        report.max_uid = state.max_observed();

        if report.failed_windows > 0 && !self.settings.reconcile_after_failed_window {
            tracing::warn!(
                "Skipping orphan removal, {} identifier windows failed",
                report.failed_windows
            );
        } else {
            report.orphans_removed = reconciler::reconcile(
                self.store,
                &account.id,
                canonical,
                &local_uids,
                state.observed(),
            )
            .await?;
        }

        Ok(report)
    }
}

fn connect_session<S>(session: &mut S) -> BoxFuture<'_, Result<()>>
where
    S: MailSession + ?Sized,
{
    session.connect()
}
