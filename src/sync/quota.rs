//! Best-effort storage quota lookup.

use super::session::MailSession;
use crate::error::SyncError;

/// Quota figures normalized to kilobytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaFigures {
    pub used_kb: u64,
    pub total_kb: u64,
}

/// Query the quota root of `folder`. Never fails: unsupported servers,
/// errors and a zero limit all yield `None`.
pub async fn inspect_quota<S>(session: &mut S, folder: &str) -> Option<QuotaFigures>
where
    S: MailSession + ?Sized,
{
    let usage = match session.query_quota(folder).await {
        Ok(Some(usage)) => usage,
        Ok(None) => {
            tracing::debug!("Server reported no storage quota");
            return None;
        }
        Err(e) => {
            tracing::warn!("{}", SyncError::Quota(e));
            return None;
        }
    };

    if usage.limit == 0 {
        tracing::debug!("Quota limit is zero, treating as unavailable");
        return None;
    }

    let figures = QuotaFigures {
        used_kb: usage.unit.to_kb(usage.used),
        total_kb: usage.unit.to_kb(usage.limit),
    };
    tracing::debug!(
        "Quota: {} KB of {} KB used",
        figures.used_kb,
        figures.total_kb
    );
    Some(figures)
}
