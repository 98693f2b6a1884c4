//! Scripted in-memory mail server for exercising sync components.

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use std::collections::{BTreeMap, HashSet};

use super::session::{
    FetchStream, FetchedMessage, FolderLock, MailSession, QuotaUsage, RemoteEntry, SeqRange,
};
use crate::mail::folder::{CanonicalFolder, FolderDescriptor};
use crate::mail::parser::{MailParser, MimeParser, ParseError, ParsedMessage};
use crate::mail::types::{EmailFlags, MessageKey, MessageRecord};

const BROKEN_MARKER: &[u8] = b"X-Broken: yes";

struct FakeMessage {
    flags: EmailFlags,
    raw: Option<Vec<u8>>,
}

struct FakeFolder {
    path: String,
    delimiter: String,
    special_use: Option<String>,
    messages: BTreeMap<u32, FakeMessage>,
}

/// In-memory `MailSession`. Sequence numbers are assigned by ascending UID,
/// like a real server after expunges.
#[derive(Default)]
pub struct FakeServer {
    folders: Vec<FakeFolder>,
    connected: bool,
    selected: Option<String>,
    connect_failures: u32,
    fail_logout: bool,
    fail_list: bool,
    fail_quota: bool,
    failing_locks: HashSet<String>,
    failing_windows: HashSet<(String, u32)>,
    failing_chunk_uids: HashSet<u32>,
    quota: Option<QuotaUsage>,
    commands: Vec<String>,
    chunk_requests: Vec<usize>,
    locks_taken: usize,
    locks_released: usize,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a folder using "." as hierarchy delimiter.
    pub fn add_folder(&mut self, path: &str, special_use: Option<&str>) {
        self.add_folder_with_delimiter(path, ".", special_use);
    }

    pub fn add_folder_with_delimiter(
        &mut self,
        path: &str,
        delimiter: &str,
        special_use: Option<&str>,
    ) {
        self.folders.push(FakeFolder {
            path: path.to_string(),
            delimiter: delimiter.to_string(),
            special_use: special_use.map(|s| s.to_string()),
            messages: BTreeMap::new(),
        });
    }

    pub fn add_message(&mut self, path: &str, uid: u32, flags: EmailFlags, raw: Vec<u8>) {
        self.folder_mut(path)
            .messages
            .insert(uid, FakeMessage { flags, raw: Some(raw) });
    }

    /// Add a message whose body section comes back empty.
    pub fn add_bodiless_message(&mut self, path: &str, uid: u32, flags: EmailFlags) {
        self.folder_mut(path)
            .messages
            .insert(uid, FakeMessage { flags, raw: None });
    }

    pub fn remove_message(&mut self, path: &str, uid: u32) {
        self.folder_mut(path).messages.remove(&uid);
    }

    /// Pretend `path` is selected without going through `lock_folder`.
    pub fn select_for_test(&mut self, path: &str) {
        self.connected = true;
        self.selected = Some(path.to_string());
    }

    pub fn fail_connect(&mut self, times: u32) {
        self.connect_failures = times;
    }

    pub fn fail_logout(&mut self) {
        self.fail_logout = true;
    }

    pub fn fail_list(&mut self) {
        self.fail_list = true;
    }

    pub fn fail_lock(&mut self, path: &str) {
        self.failing_locks.insert(path.to_string());
    }

    /// Fail the identifier fetch of the window starting at sequence `start`.
    pub fn fail_window(&mut self, path: &str, start: u32) {
        self.failing_windows.insert((path.to_string(), start));
    }

    /// Fail every full fetch that requests `uid`.
    pub fn fail_chunk_containing(&mut self, uid: u32) {
        self.failing_chunk_uids.insert(uid);
    }

    pub fn fail_quota(&mut self) {
        self.fail_quota = true;
    }

    pub fn set_quota(&mut self, quota: Option<QuotaUsage>) {
        self.quota = quota;
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Sizes of the full-message fetches issued so far.
    pub fn chunk_requests(&self) -> Vec<usize> {
        self.chunk_requests.clone()
    }

    pub fn locks_taken(&self) -> usize {
        self.locks_taken
    }

    pub fn locks_released(&self) -> usize {
        self.locks_released
    }

    fn folder_mut(&mut self, path: &str) -> &mut FakeFolder {
        match self.folders.iter_mut().position(|f| f.path == path) {
            Some(index) => &mut self.folders[index],
            None => panic!("unknown folder {}", path),
        }
    }

    fn selected_folder(&self) -> Result<&FakeFolder> {
        let path = self
            .selected
            .as_deref()
            .ok_or_else(|| anyhow!("BAD no folder selected"))?;
        self.folders
            .iter()
            .find(|f| f.path == path)
            .ok_or_else(|| anyhow!("NO folder {} vanished", path))
    }

    fn ensure_connected(&self) -> Result<()> {
        if !self.connected {
            bail!("not connected");
        }
        Ok(())
    }
}

#[async_trait]
impl MailSession for FakeServer {
    async fn connect(&mut self) -> Result<()> {
        self.commands.push("CONNECT".to_string());
        if self.connect_failures > 0 {
            self.connect_failures -= 1;
            bail!("connection refused");
        }
        self.connected = true;
        Ok(())
    }

    async fn logout(&mut self) -> Result<()> {
        self.commands.push("LOGOUT".to_string());
        self.connected = false;
        self.selected = None;
        if self.fail_logout {
            bail!("BYE connection dropped");
        }
        Ok(())
    }

    async fn list_folders(&mut self) -> Result<Vec<FolderDescriptor>> {
        self.commands.push("LIST".to_string());
        self.ensure_connected()?;
        if self.fail_list {
            bail!("NO LIST failed");
        }
        self.folders
            .iter()
            .map(|f| {
                FolderDescriptor::new(&f.path, Some(f.delimiter.as_str()), f.special_use.as_deref())
            })
            .collect()
    }

    async fn lock_folder(&mut self, path: &str) -> Result<FolderLock> {
        self.commands.push(format!("EXAMINE {}", path));
        self.ensure_connected()?;
        if let Some(current) = &self.selected {
            bail!("{} is still selected", current);
        }
        if self.failing_locks.contains(path) {
            bail!("NO Mailbox does not exist");
        }
        let exists = match self.folders.iter().find(|f| f.path == path) {
            Some(folder) => folder.messages.len() as u32,
            None => bail!("NO Mailbox does not exist"),
        };

        self.selected = Some(path.to_string());
        self.locks_taken += 1;
        Ok(FolderLock {
            path: path.to_string(),
            exists,
        })
    }

    async fn release_folder(&mut self, lock: FolderLock) -> Result<()> {
        self.commands.push(format!("CLOSE {}", lock.path));
        if self.selected.as_deref() != Some(lock.path.as_str()) {
            bail!("{} is not selected", lock.path);
        }
        self.selected = None;
        self.locks_released += 1;
        Ok(())
    }

    async fn fetch_identifiers_and_flags<'a>(
        &'a mut self,
        range: SeqRange,
    ) -> Result<FetchStream<'a, RemoteEntry>> {
        self.commands.push(format!("FETCH {}", range));
        let folder = self.selected_folder()?;
        if self
            .failing_windows
            .contains(&(folder.path.clone(), range.start))
        {
            bail!("connection reset during FETCH");
        }

        let entries: Vec<RemoteEntry> = folder
            .messages
            .iter()
            .enumerate()
            .filter(|(index, _)| range.contains(*index as u32 + 1))
            .map(|(_, (uid, message))| RemoteEntry {
                uid: *uid,
                flags: message.flags,
            })
            .collect();

        Ok(stream::iter(entries.into_iter().map(Ok::<_, anyhow::Error>)).boxed())
    }

    async fn fetch_full_messages<'a>(
        &'a mut self,
        uids: &[u32],
    ) -> Result<FetchStream<'a, FetchedMessage>> {
        self.commands.push(format!("UID FETCH {}", uids.len()));
        self.chunk_requests.push(uids.len());
        let folder = self.selected_folder()?;
        if uids.iter().any(|uid| self.failing_chunk_uids.contains(uid)) {
            bail!("connection reset during UID FETCH");
        }

        let fetched: Vec<FetchedMessage> = uids
            .iter()
            .filter_map(|uid| {
                folder.messages.get(uid).map(|message| FetchedMessage {
                    uid: *uid,
                    flags: message.flags,
                    raw: message.raw.clone(),
                })
            })
            .collect();

        Ok(stream::iter(fetched.into_iter().map(Ok::<_, anyhow::Error>)).boxed())
    }

    async fn query_quota(&mut self, _folder: &str) -> Result<Option<QuotaUsage>> {
        self.commands.push("GETQUOTAROOT".to_string());
        if self.fail_quota {
            bail!("BAD unknown command");
        }
        Ok(self.quota)
    }
}

/// A well-formed message whose subject is "Message <uid>".
pub fn raw_message(uid: u32) -> Vec<u8> {
    format!(
        "From: Sender {uid} <sender{uid}@example.com>\r\n\
         To: me@example.com\r\n\
         Subject: Message {uid}\r\n\
         Date: Mon, 1 Jan 2024 12:00:00 +0000\r\n\
         Message-ID: <{uid}@example.com>\r\n\
         \r\n\
         Body of message {uid}.\r\n"
    )
    .into_bytes()
}

/// A message `RejectingParser` refuses to parse.
pub fn broken_message(uid: u32) -> Vec<u8> {
    let mut raw = String::from_utf8_lossy(BROKEN_MARKER).into_owned();
    raw.push_str("\r\n");
    raw.push_str(&String::from_utf8_lossy(&raw_message(uid)));
    raw.into_bytes()
}

/// Parses like `MailParser` but rejects messages built by `broken_message`.
pub struct RejectingParser;

impl MimeParser for RejectingParser {
    fn parse(&self, raw: &[u8]) -> Result<ParsedMessage, ParseError> {
        if raw
            .windows(BROKEN_MARKER.len())
            .any(|window| window == BROKEN_MARKER)
        {
            return Err(ParseError::Malformed("unterminated header block".to_string()));
        }
        MailParser.parse(raw)
    }
}

/// A stored record for seeding local state.
pub fn local_record(account_id: &str, folder: &CanonicalFolder, uid: u32) -> MessageRecord {
    MessageRecord::empty_body(MessageKey::new(account_id, folder, uid), 0)
}
