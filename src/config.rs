use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::constants::{
    DEFAULT_CONNECT_RETRIES, DEFAULT_DOWNLOAD_CHUNK, DEFAULT_SCAN_WINDOW,
};
use crate::mail::types::Account;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
    #[serde(default)]
    pub sync: SyncConfig,
    /// Desktop notification settings
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Notify when a sync brought new mail
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Include the unread total in the notification
    #[serde(default = "default_true")]
    pub show_unread: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            show_unread: true,
        }
    }
}

/// Tuning for sync runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Sequence numbers per identifier fetch
    #[serde(default = "default_scan_window")]
    pub scan_window: u32,
    /// Messages per full-body fetch
    #[serde(default = "default_download_chunk")]
    pub download_chunk: usize,
    /// Remove vanished messages even if part of the folder could not be scanned
    #[serde(default)]
    pub reconcile_after_failed_window: bool,
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,
    #[serde(default = "default_true")]
    pub sync_quota: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            scan_window: default_scan_window(),
            download_chunk: default_download_chunk(),
            reconcile_after_failed_window: false,
            connect_retries: default_connect_retries(),
            sync_quota: true,
        }
    }
}

/// Authentication method for an email account
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthMethod {
    /// Plain LOGIN with a stored password
    #[default]
    Password,
    /// XOAUTH2 with a stored access token
    OAuth2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Stable account id used in the local store (defaults to the email)
    #[serde(default)]
    pub id: Option<String>,
    pub email: String,
    /// Login name if it differs from the email
    #[serde(default)]
    pub username: Option<String>,
    pub imap: ImapConfig,
    /// Per-account notification override (None = use global setting)
    #[serde(default)]
    pub notifications: Option<bool>,
    /// Authentication method (default: password)
    #[serde(default)]
    pub auth: AuthMethod,
}

impl AccountConfig {
    pub fn account_id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.email)
    }

    pub fn login_name(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.email)
    }

    /// Local account row for this configuration, without sync metadata.
    pub fn to_account(&self) -> Account {
        Account {
            id: self.account_id().to_string(),
            email: self.email.clone(),
            host: self.imap.server.clone(),
            port: self.imap.port,
            max_inbox_uid: None,
            last_sync: None,
            quota_used_kb: None,
            quota_total_kb: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImapConfig {
    pub server: String,
    #[serde(default = "default_imap_port")]
    pub port: u16,
}

fn default_imap_port() -> u16 {
    993
}

fn default_true() -> bool {
    true
}

fn default_scan_window() -> u32 {
    DEFAULT_SCAN_WINDOW
}

fn default_download_chunk() -> usize {
    DEFAULT_DOWNLOAD_CHUNK
}

fn default_connect_retries() -> u32 {
    DEFAULT_CONNECT_RETRIES
}

impl Config {
    pub fn config_dir() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .context("Could not find config directory")?
            .join("mailsync");
        Ok(dir)
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn data_dir() -> Result<PathBuf> {
        let dir = dirs::data_local_dir()
            .context("Could not find data directory")?
            .join("mailsync");
        Ok(dir)
    }

    pub fn database_path() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("mail.db"))
    }

    /// Get an account by its id (or email when no id is set)
    pub fn account_by_id(&self, id: &str) -> Option<&AccountConfig> {
        self.accounts.iter().find(|a| a.account_id() == id)
    }

    /// Check if notifications are enabled for an account
    pub fn notifications_enabled_for(&self, account: &AccountConfig) -> bool {
        // Per-account setting overrides global
        account.notifications.unwrap_or(self.notifications.enabled)
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            anyhow::bail!(
                "Configuration file not found at {}\n\
                 Please create a config file. Example:\n\n\
                 [[accounts]]\n\
                 email = \"you@example.com\"\n\n\
                 [accounts.imap]\n\
                 server = \"imap.example.com\"\n\n\
                 [sync]\n\
                 scan_window = 5000",
                path.display()
            );
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        if config.accounts.is_empty() {
            anyhow::bail!("No accounts configured");
        }
        Ok(config)
    }

    pub fn ensure_dirs() -> Result<()> {
        fs::create_dir_all(Self::config_dir()?)?;
        fs::create_dir_all(Self::data_dir()?)?;
        Ok(())
    }
}
