use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::folder::CanonicalFolder;
use super::parser::ParsedMessage;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct EmailFlags: u32 {
        const SEEN = 0b00000001;
        const ANSWERED = 0b00000010;
        const FLAGGED = 0b00000100;
        const DELETED = 0b00001000;
        const DRAFT = 0b00010000;
    }
}

/// Sender name used for records that stand in for unparseable messages.
pub const PLACEHOLDER_SENDER: &str = "System Error";

/// Subject used for records whose body the server did not return.
pub const EMPTY_BODY_SUBJECT: &str = "Empty Body";

/// A locally known account and the sync metadata this crate maintains for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub host: String,
    pub port: u16,
    /// Highest UID observed in the inbox during the last run
    pub max_inbox_uid: Option<u32>,
    /// Unix timestamp of the last completed run
    pub last_sync: Option<i64>,
    pub quota_used_kb: Option<u64>,
    pub quota_total_kb: Option<u64>,
}

/// Identity of a stored message: the same UID in two folders never collides.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageKey {
    pub account_id: String,
    pub folder: String,
    pub uid: u32,
}

impl MessageKey {
    pub fn new(account_id: &str, folder: &CanonicalFolder, uid: u32) -> Self {
        Self {
            account_id: account_id.to_string(),
            folder: folder.as_str().to_string(),
            uid,
        }
    }

    /// Stable text id, format "account/folder/uid"
    pub fn id(&self) -> String {
        format!("{}/{}/{}", self.account_id, self.folder, self.uid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub size: usize,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub key: MessageKey,
    pub from_name: String,
    pub from_addr: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
    pub date: i64,
    pub is_read: bool,
    pub is_flagged: bool,
    /// True for records synthesized when the real content was unusable
    pub is_placeholder: bool,
    pub attachments: Vec<Attachment>,
    /// Filled in later by an external classifier; never written by sync
    pub classification: Option<String>,
}

impl MessageRecord {
    /// Build a record from parser output. `now` stands in for a missing Date.
    pub fn from_parsed(key: MessageKey, flags: EmailFlags, parsed: ParsedMessage, now: i64) -> Self {
        Self {
            key,
            from_name: parsed.from_name,
            from_addr: parsed.from_addr,
            subject: parsed.subject,
            text_body: parsed.text_body,
            html_body: parsed.html_body,
            date: parsed.date.unwrap_or(now),
            is_read: flags.contains(EmailFlags::SEEN),
            is_flagged: flags.contains(EmailFlags::FLAGGED),
            is_placeholder: false,
            attachments: parsed.attachments,
            classification: None,
        }
    }

    /// Stand-in for a message the parser rejected. Marked read and flagged so
    /// the UID counts as known locally while the failure stays visible.
    pub fn parse_failure(key: MessageKey, error: &str, now: i64) -> Self {
        let uid = key.uid;
        Self {
            key,
            from_name: PLACEHOLDER_SENDER.to_string(),
            from_addr: String::new(),
            subject: format!("Failed to parse message UID {}", uid),
            text_body: format!("This message could not be parsed.\n\nError: {}", error),
            html_body: None,
            date: now,
            is_read: true,
            is_flagged: true,
            is_placeholder: true,
            attachments: Vec::new(),
            classification: None,
        }
    }

    /// Stand-in for a message fetched without any body content.
    pub fn empty_body(key: MessageKey, now: i64) -> Self {
        let uid = key.uid;
        Self {
            key,
            from_name: PLACEHOLDER_SENDER.to_string(),
            from_addr: String::new(),
            subject: EMPTY_BODY_SUBJECT.to_string(),
            text_body: format!("The server returned no content for message UID {}.", uid),
            html_body: None,
            date: now,
            is_read: true,
            is_flagged: false,
            is_placeholder: true,
            attachments: Vec::new(),
            classification: None,
        }
    }
}

/// Per-folder counters collected during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderReport {
    pub folder: String,
    pub observed: usize,
    pub new_messages: usize,
    pub placeholders: usize,
    pub orphans_removed: usize,
    pub failed_windows: usize,
    pub failed_chunks: usize,
    /// Highest UID seen on the server this run
    pub max_uid: Option<u32>,
}

/// Outcome of one account run. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncResult {
    pub success: bool,
    /// Newly persisted, successfully parsed messages (placeholders excluded)
    pub new_count: usize,
    pub error: Option<String>,
    pub folders: Vec<FolderReport>,
    /// Aggregate unread count across all accounts, for badges
    pub unread_total: Option<usize>,
}

impl SyncResult {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}
