//! IMAP transport for sync runs.
//!
//! This module is split into:
//! - `mod.rs` - Client state, authentication and attribute helpers
//! - `client.rs` - `MailSession` implementation over an async-imap session

mod client;

use anyhow::Result;
use async_imap::types::NameAttribute;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_util::compat::Compat;
use utf7_imap::decode_utf7_imap as decode_utf7;

use crate::config::AuthMethod;
use crate::mail::folder::FolderDescriptor;

pub(crate) type ImapSession = async_imap::Session<Compat<TlsStream<TcpStream>>>;

/// XOAUTH2 authenticator for IMAP
pub(crate) struct XOAuth2Authenticator {
    pub user: String,
    pub access_token: String,
}

impl async_imap::Authenticator for XOAuth2Authenticator {
    type Response = String;

    fn process(&mut self, _challenge: &[u8]) -> Self::Response {
        format!(
            "user={}\x01auth=Bearer {}\x01\x01",
            self.user, self.access_token
        )
    }
}

/// One account's connection. Connects lazily through `MailSession::connect`.
pub struct ImapClient {
    session: Option<ImapSession>,
    server: String,
    port: u16,
    username: String,
    /// Password, or access token for OAuth2
    secret: String,
    auth_method: AuthMethod,
    has_quota: bool,
}

impl ImapClient {
    pub fn new(
        server: &str,
        port: u16,
        username: &str,
        secret: String,
        auth_method: AuthMethod,
    ) -> Self {
        Self {
            session: None,
            server: server.to_string(),
            port,
            username: username.to_string(),
            secret,
            auth_method,
            has_quota: false,
        }
    }
}

/// UID set for a UID FETCH, collapsing consecutive runs: `1:3,7,9:10`.
pub(crate) fn uid_set(uids: &[u32]) -> String {
    let mut sorted = uids.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut parts = Vec::new();
    let mut iter = sorted.into_iter();
    let Some(mut start) = iter.next() else {
        return String::new();
    };
    let mut end = start;

    for uid in iter {
        if uid == end + 1 {
            end = uid;
            continue;
        }
        parts.push(format_run(start, end));
        start = uid;
        end = uid;
    }
    parts.push(format_run(start, end));

    parts.join(",")
}

fn format_run(start: u32, end: u32) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{}:{}", start, end)
    }
}

/// Special-use attribute of a LIST entry, as the raw flag text.
pub(crate) fn special_use(attributes: &[NameAttribute<'_>]) -> Option<String> {
    attributes.iter().find_map(|attr| match attr {
        NameAttribute::Sent => Some("\\Sent".to_string()),
        NameAttribute::Trash => Some("\\Trash".to_string()),
        NameAttribute::Junk => Some("\\Junk".to_string()),
        NameAttribute::Extension(name) => {
            let lower = name.to_lowercase();
            ["sent", "trash", "junk", "spam"]
                .iter()
                .any(|word| lower.contains(word))
                .then(|| name.to_string())
        }
        _ => None,
    })
}

/// Descriptor for a LIST entry. Mailbox names arrive in modified UTF-7
/// (RFC 3501 5.1.3); the decoded form is used for naming only.
pub(crate) fn descriptor_from_list(
    path: &str,
    delimiter: Option<&str>,
    special_use: Option<&str>,
) -> Result<FolderDescriptor> {
    let decoded = decode_utf7(path.to_string());
    Ok(FolderDescriptor::new(path, delimiter, special_use)?.with_display_path(&decoded))
}

pub(crate) fn is_selectable(attributes: &[NameAttribute<'_>]) -> bool {
    !attributes
        .iter()
        .any(|attr| matches!(attr, NameAttribute::NoSelect))
}
