//! Desktop notification support for new mail alerts

use crate::config::{AccountConfig, Config};
use crate::mail::types::Account;
use crate::sync::SyncNotifier;

/// Shows a desktop notification when a run brought new mail.
pub struct DesktopNotifier {
    enabled: bool,
    show_unread: bool,
}

impl DesktopNotifier {
    pub fn for_account(config: &Config, account: &AccountConfig) -> Self {
        Self {
            enabled: config.notifications_enabled_for(account),
            show_unread: config.notifications.show_unread,
        }
    }

    fn message(&self, email: &str, new_count: usize, unread_total: usize) -> (String, Option<String>) {
        let summary = if new_count == 1 {
            format!("New mail - {}", email)
        } else {
            format!("{} new emails - {}", new_count, email)
        };

        let body = self
            .show_unread
            .then(|| format!("{} unread in total", unread_total));

        (summary, body)
    }
}

impl SyncNotifier for DesktopNotifier {
    fn sync_finished(&self, account: &Account, new_count: usize, unread_total: usize) {
        if !self.enabled || new_count == 0 {
            return;
        }

        let (summary, body) = self.message(&account.email, new_count, unread_total);

        // Fire and forget, a missing notification daemon is not an error
        if let Err(e) = send_notification(&summary, body.as_deref()) {
            tracing::warn!("Failed to send desktop notification: {}", e);
        }
    }
}

/// Low-level notification sending
fn send_notification(summary: &str, body: Option<&str>) -> Result<(), notify_rust::error::Error> {
    use notify_rust::Notification;

    let mut notification = Notification::new();
    notification
        .summary(summary)
        .appname("mailsync")
        .timeout(notify_rust::Timeout::Milliseconds(5000));

    if let Some(body) = body {
        notification.body(body);
    }

    notification.icon("mail-unread");

    notification.show()?;
    Ok(())
}
