//! Full-message download for newly discovered UIDs.

use anyhow::Result;
use futures::TryStreamExt;

use super::session::{FetchedMessage, MailSession};
use super::store::MailStore;
use crate::error::SyncError;
use crate::mail::folder::CanonicalFolder;
use crate::mail::parser::MimeParser;
use crate::mail::types::{MessageKey, MessageRecord};

/// What one `download` call persisted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DownloadReport {
    /// Successfully parsed records saved; placeholders are not counted
    pub parsed: usize,
    pub placeholders: usize,
    pub failed_chunks: usize,
}

impl DownloadReport {
    fn merge(&mut self, other: DownloadReport) {
        self.parsed += other.parsed;
        self.placeholders += other.placeholders;
        self.failed_chunks += other.failed_chunks;
    }
}

pub struct Downloader<'a> {
    store: &'a dyn MailStore,
    parser: &'a dyn MimeParser,
    chunk_size: usize,
}

impl<'a> Downloader<'a> {
    pub fn new(store: &'a dyn MailStore, parser: &'a dyn MimeParser, chunk_size: usize) -> Self {
        Self {
            store,
            parser,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Fetch, parse and store `uids` of the locked folder in chunks.
    ///
    /// A chunk whose fetch fails is logged and skipped. Storage errors are
    /// returned; records saved before the error stay saved.
    pub async fn download<S>(
        &self,
        session: &mut S,
        account_id: &str,
        folder: &CanonicalFolder,
        uids: &[u32],
    ) -> Result<DownloadReport>
    where
        S: MailSession + ?Sized,
    {
        let mut uids = uids.to_vec();
        uids.sort_unstable();
        uids.dedup();

        let mut report = DownloadReport::default();
        for chunk in uids.chunks(self.chunk_size) {
            let chunk_report = self.download_chunk(session, account_id, folder, chunk).await?;
            report.merge(chunk_report);
        }

        Ok(report)
    }

    async fn download_chunk<S>(
        &self,
        session: &mut S,
        account_id: &str,
        folder: &CanonicalFolder,
        chunk: &[u32],
    ) -> Result<DownloadReport>
    where
        S: MailSession + ?Sized,
    {
        let mut report = DownloadReport::default();

        let fetched = match fetch_chunk(session, chunk).await {
            Ok(fetched) => fetched,
            Err(error) => {
                let err = SyncError::ChunkDownload {
                    first: chunk[0],
                    count: chunk.len(),
                    error,
                };
                tracing::warn!("{}", err);
                report.failed_chunks = 1;
                return Ok(report);
            }
        };

        let now = chrono::Utc::now().timestamp();
        for message in fetched {
            // Servers may answer with messages we did not ask for
            if chunk.binary_search(&message.uid).is_err() {
                tracing::debug!("Ignoring unrequested UID {}", message.uid);
                continue;
            }

            let record = self.build_record(account_id, folder, message, now);
            self.store.upsert_message(&record).await?;

            if record.is_placeholder {
                report.placeholders += 1;
            } else {
                report.parsed += 1;
            }
        }

        tracing::debug!(
            "Chunk at UID {}: {} parsed, {} placeholders",
            chunk[0],
            report.parsed,
            report.placeholders
        );

        Ok(report)
    }

    fn build_record(
        &self,
        account_id: &str,
        folder: &CanonicalFolder,
        message: FetchedMessage,
        now: i64,
    ) -> MessageRecord {
        let key = MessageKey::new(account_id, folder, message.uid);

        let raw = match message.raw {
            Some(raw) if !raw.is_empty() => raw,
            _ => {
                tracing::warn!("UID {} returned no body", message.uid);
                return MessageRecord::empty_body(key, now);
            }
        };

        match self.parser.parse(&raw) {
            Ok(parsed) => MessageRecord::from_parsed(key, message.flags, parsed, now),
            Err(e) => {
                tracing::warn!("Failed to parse UID {}: {}", message.uid, e);
                MessageRecord::parse_failure(key, &e.to_string(), now)
            }
        }
    }
}

async fn fetch_chunk<S>(session: &mut S, uids: &[u32]) -> Result<Vec<FetchedMessage>>
where
    S: MailSession + ?Sized,
{
    let stream = session.fetch_full_messages(uids).await?;
    stream.try_collect().await
}
