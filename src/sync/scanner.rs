//! Range scanning: walk a folder's sequence space in fixed windows, fetching
//! only identifiers and flags, and work out which UIDs are new.

use futures::TryStreamExt;
use std::collections::HashSet;

use super::session::{MailSession, RemoteEntry, SeqRange};
use crate::error::SyncError;

/// Per-folder scan bookkeeping, discarded once the folder is done.
#[derive(Debug, Default)]
pub struct ScanState {
    /// UIDs stored locally before the run started
    local: HashSet<u32>,
    /// UIDs seen on the server during this run
    observed: HashSet<u32>,
    failed_windows: usize,
}

impl ScanState {
    pub fn new(local_uids: &[u32]) -> Self {
        Self {
            local: local_uids.iter().copied().collect(),
            observed: HashSet::new(),
            failed_windows: 0,
        }
    }

    pub fn observed(&self) -> &HashSet<u32> {
        &self.observed
    }

    pub fn failed_windows(&self) -> usize {
        self.failed_windows
    }

    pub fn max_observed(&self) -> Option<u32> {
        self.observed.iter().copied().max()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RangeScanner {
    window: u32,
}

impl RangeScanner {
    pub fn new(window: u32) -> Self {
        Self {
            window: window.max(1),
        }
    }

    /// Consecutive 1-based windows covering `1..=total`.
    pub fn windows(&self, total: u32) -> impl Iterator<Item = SeqRange> {
        let window = u64::from(self.window);
        let total = u64::from(total);
        (0..total.div_ceil(window)).map(move |i| SeqRange {
            start: (i * window + 1) as u32,
            end: ((i + 1) * window).min(total) as u32,
        })
    }

    /// Fetch one window and return the UIDs that are neither stored locally
    /// nor already seen in an earlier window, ascending.
    ///
    /// A failed fetch is logged and counts as a window with no identifiers.
    pub async fn scan_window<S>(
        &self,
        session: &mut S,
        range: SeqRange,
        state: &mut ScanState,
    ) -> Vec<u32>
    where
        S: MailSession + ?Sized,
    {
        let entries = match fetch_window(session, range).await {
            Ok(entries) => entries,
            Err(error) => {
                let err = SyncError::RangeFetch { range, error };
                tracing::warn!("{}", err);
                state.failed_windows += 1;
                return Vec::new();
            }
        };

        let mut candidates = Vec::new();
        for entry in &entries {
            if state.observed.insert(entry.uid) && !state.local.contains(&entry.uid) {
                candidates.push(entry.uid);
            }
        }
        candidates.sort_unstable();

        tracing::debug!(
            "Window {} ({} sequence numbers): {} identifiers, {} new",
            range,
            range.count(),
            entries.len(),
            candidates.len()
        );

        candidates
    }
}

async fn fetch_window<S>(session: &mut S, range: SeqRange) -> anyhow::Result<Vec<RemoteEntry>>
where
    S: MailSession + ?Sized,
{
    let stream = session.fetch_identifiers_and_flags(range).await?;
    stream.try_collect().await
}
