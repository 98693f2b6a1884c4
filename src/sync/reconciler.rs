//! Removal of local messages that no longer exist on the server.

use anyhow::Result;
use std::collections::HashSet;

use super::store::MailStore;
use crate::mail::folder::CanonicalFolder;

/// Local UIDs that were not observed remotely, in the order given.
pub fn find_orphans(local_uids: &[u32], observed: &HashSet<u32>) -> Vec<u32> {
    local_uids
        .iter()
        .copied()
        .filter(|uid| !observed.contains(uid))
        .collect()
}

/// Delete the orphans of a folder in one batch and return how many records
/// were removed.
pub async fn reconcile(
    store: &dyn MailStore,
    account_id: &str,
    folder: &CanonicalFolder,
    local_uids: &[u32],
    observed: &HashSet<u32>,
) -> Result<usize> {
    let orphans = find_orphans(local_uids, observed);
    if orphans.is_empty() {
        return Ok(0);
    }

    let deleted = store
        .delete_messages_by_uids(account_id, folder, &orphans)
        .await?;
    tracing::info!("Removed {} messages no longer on the server", deleted);
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Cache;
    use crate::mail::types::MessageKey;
    use crate::sync::testing::local_record;

    #[test]
    fn test_find_orphans() {
        let observed: HashSet<u32> = [1, 2, 4].into_iter().collect();
        assert_eq!(find_orphans(&[1, 2, 3, 4, 5], &observed), vec![3, 5]);
        assert!(find_orphans(&[], &observed).is_empty());
        assert_eq!(find_orphans(&[7], &HashSet::new()), vec![7]);
    }

    #[tokio::test]
    async fn test_reconcile_deletes_only_orphans() {
        let cache = Cache::open_in_memory().await.unwrap();
        let folder = CanonicalFolder::Sent;
        for uid in 1..=3 {
            cache
                .upsert_message(&local_record("acct", &folder, uid))
                .await
                .unwrap();
        }
        // Same UID in another folder must survive
        cache
            .upsert_message(&local_record("acct", &CanonicalFolder::Inbox, 2))
            .await
            .unwrap();

        let observed: HashSet<u32> = [1, 3].into_iter().collect();
        let deleted = reconcile(&cache, "acct", &folder, &[1, 2, 3], &observed)
            .await
            .unwrap();

        assert_eq!(deleted, 1);
        assert_eq!(cache.local_uids("acct", &folder).await.unwrap(), vec![1, 3]);
        assert!(
            cache
                .get_message(&MessageKey::new("acct", &CanonicalFolder::Inbox, 2))
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_reconcile_without_orphans_is_noop() {
        let cache = Cache::open_in_memory().await.unwrap();
        let observed: HashSet<u32> = [1].into_iter().collect();
        let deleted = reconcile(&cache, "acct", &CanonicalFolder::Inbox, &[1], &observed)
            .await
            .unwrap();
        assert_eq!(deleted, 0);
    }
}
