//! Remote folder descriptors and their mapping onto canonical local names.

use anyhow::Result;
use std::collections::HashSet;
use std::fmt;

/// Leaf names recognized as the sent folder. Exact matches only: a name that
/// means "sent" in one language must not mean something else in another.
const SENT_NAMES: &[&str] = &[
    "sent",
    "sent items",
    "sent mail",
    "sent messages",
    "sent objects",
    "gesendet",
    "gesendete objekte",
    "envoyés",
    "enviados",
    "inviati",
];

const TRASH_NAMES: &[&str] = &[
    "trash",
    "deleted",
    "deleted items",
    "deleted messages",
    "bin",
    "papierkorb",
    "corbeille",
    "papelera",
    "cestino",
];

const SPAM_NAMES: &[&str] = &["junk", "spam", "junk e-mail", "junk email", "bulk mail"];

/// A mailbox as advertised by the server for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderDescriptor {
    /// Full server path as sent on the wire, e.g. "INBOX.Archive"
    pub path: String,
    /// Human-readable path used for naming; equals `path` unless the server
    /// encodes mailbox names
    pub display_path: String,
    /// Last segment of `display_path`
    pub name: String,
    /// Hierarchy delimiter, if the server reported one
    pub delimiter: Option<String>,
    /// RFC 6154 special-use attribute, e.g. "\Sent"
    pub special_use: Option<String>,
}

impl FolderDescriptor {
    pub fn new(path: &str, delimiter: Option<&str>, special_use: Option<&str>) -> Result<Self> {
        if path.is_empty() {
            anyhow::bail!("Folder path must not be empty");
        }
        let delimiter = delimiter.filter(|d| !d.is_empty()).map(String::from);
        let name = leaf(path, delimiter.as_deref());

        Ok(Self {
            path: path.to_string(),
            display_path: path.to_string(),
            name,
            delimiter,
            special_use: special_use.map(String::from),
        })
    }

    /// Name the folder by a decoded form of its path. The wire path is kept
    /// for opening the folder.
    pub fn with_display_path(mut self, display_path: &str) -> Self {
        self.name = leaf(display_path, self.delimiter.as_deref());
        self.display_path = display_path.to_string();
        self
    }

    fn segments(&self) -> Vec<&str> {
        match self.delimiter.as_deref() {
            Some(delim) => self.display_path.split(delim).collect(),
            None => vec![self.display_path.as_str()],
        }
    }
}

fn leaf(path: &str, delimiter: Option<&str>) -> String {
    match delimiter {
        Some(delim) => path.rsplit(delim).next().unwrap_or(path),
        None => path,
    }
    .to_string()
}

/// Local folder name a remote folder is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CanonicalFolder {
    Inbox,
    Sent,
    Trash,
    Spam,
    /// Slash-joined hierarchical name, e.g. "Inbox/Archive" or "Work/2024"
    Other(String),
}

impl CanonicalFolder {
    pub fn as_str(&self) -> &str {
        match self {
            CanonicalFolder::Inbox => "Inbox",
            CanonicalFolder::Sent => "Sent",
            CanonicalFolder::Trash => "Trash",
            CanonicalFolder::Spam => "Spam",
            CanonicalFolder::Other(path) => path,
        }
    }

    pub fn is_inbox(&self) -> bool {
        matches!(self, CanonicalFolder::Inbox)
    }
}

impl fmt::Display for CanonicalFolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a remote folder onto its canonical name. Pure function of the
/// descriptor; special-use wins, then the leaf name, then the path.
pub fn canonical_folder(descriptor: &FolderDescriptor) -> CanonicalFolder {
    if let Some(folder) = descriptor
        .special_use
        .as_deref()
        .and_then(from_special_use)
    {
        return folder;
    }

    if let Some(folder) = from_leaf_name(&descriptor.name) {
        return folder;
    }

    path_folder(descriptor)
}

/// Name derived from the path alone, ignoring special-use and well-known
/// leaf names.
pub fn path_folder(descriptor: &FolderDescriptor) -> CanonicalFolder {
    let segments = descriptor.segments();
    match segments.split_first() {
        Some((first, rest)) if first.eq_ignore_ascii_case("INBOX") => {
            let mut parts = vec![CanonicalFolder::Inbox.as_str()];
            parts.extend(rest.iter().copied());
            CanonicalFolder::Other(parts.join("/"))
        }
        _ => CanonicalFolder::Other(segments.join("/")),
    }
}

/// Give every folder of an account a distinct canonical name.
///
/// UIDs are only unique within one remote folder, so two folders must never
/// share a local name. When several folders claim the same name, it goes to
/// the one claiming it through its special-use attribute, then to the one
/// with the shortest path (listing order breaks ties). The others fall back to
/// their path-derived name, or are left out if that is taken too.
pub fn assign_canonical_names(
    folders: &[FolderDescriptor],
) -> Vec<(&FolderDescriptor, CanonicalFolder)> {
    let claims: Vec<(CanonicalFolder, bool)> = folders
        .iter()
        .map(|descriptor| {
            let canonical = canonical_folder(descriptor);
            let by_special_use = descriptor
                .special_use
                .as_deref()
                .and_then(from_special_use)
                .is_some_and(|folder| folder == canonical);
            (canonical, by_special_use)
        })
        .collect();

    let mut order: Vec<usize> = (0..folders.len()).collect();
    order.sort_by_key(|&i| (!claims[i].1, folders[i].segments().len(), i));

    let mut taken: HashSet<String> = HashSet::new();
    let mut assigned: Vec<Option<CanonicalFolder>> = vec![None; folders.len()];
    for i in order {
        let (canonical, _) = &claims[i];
        if taken.insert(canonical.as_str().to_string()) {
            assigned[i] = Some(canonical.clone());
            continue;
        }

        let fallback = path_folder(&folders[i]);
        if taken.insert(fallback.as_str().to_string()) {
            tracing::warn!(
                "Folder {} also maps to {}, storing it as {}",
                folders[i].path,
                canonical,
                fallback
            );
            assigned[i] = Some(fallback);
        } else {
            tracing::warn!(
                "Folder {} maps to {} which is already in use, skipping it",
                folders[i].path,
                canonical
            );
        }
    }

    folders
        .iter()
        .zip(assigned)
        .filter_map(|(descriptor, canonical)| canonical.map(|c| (descriptor, c)))
        .collect()
}

fn from_special_use(special_use: &str) -> Option<CanonicalFolder> {
    let lower = special_use.to_lowercase();
    if lower.contains("sent") {
        Some(CanonicalFolder::Sent)
    } else if lower.contains("trash") {
        Some(CanonicalFolder::Trash)
    } else if lower.contains("junk") || lower.contains("spam") {
        Some(CanonicalFolder::Spam)
    } else {
        None
    }
}

fn from_leaf_name(name: &str) -> Option<CanonicalFolder> {
    let lower = name.trim().to_lowercase();
    if SENT_NAMES.contains(&lower.as_str()) {
        Some(CanonicalFolder::Sent)
    } else if TRASH_NAMES.contains(&lower.as_str()) {
        Some(CanonicalFolder::Trash)
    } else if SPAM_NAMES.contains(&lower.as_str()) {
        Some(CanonicalFolder::Spam)
    } else if lower == "inbox" {
        Some(CanonicalFolder::Inbox)
    } else {
        None
    }
}
