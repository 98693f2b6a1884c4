mod cache;
mod config;
mod constants;
mod credentials;
mod error;
mod mail;
#[cfg(feature = "notifications")]
mod notification;
mod retry;
mod sync;

use anyhow::{Context, Result};
use std::env;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cache::Cache;
use crate::config::{AccountConfig, Config};
use crate::credentials::CredentialStore;
use crate::mail::ImapClient;
use crate::mail::parser::MailParser;
use crate::mail::types::SyncResult;
use crate::sync::{NoopNotifier, SyncNotifier, SyncSettings, Syncer};

fn setup_logging() {
    use std::fs::OpenOptions;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,mailsync=debug"));

    let log_file = Config::config_dir()
        .ok()
        .map(|dir| dir.join("mailsync.log"))
        .and_then(|path| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .ok()
        });

    if let Some(file) = log_file {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false),
            )
            .init();
    } else {
        // Fallback to stderr if file logging fails
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_usage() {
    eprintln!(
        r#"mailsync - Mirror IMAP mailboxes into a local store

Usage: mailsync [command]

Commands:
    (none)                  Sync every configured account
    sync [account]          Sync all accounts, or only the given one
    status [account]        Show stored sync state and message counts
    set-password <account>  Store the password (or OAuth2 token) read from stdin
    help                    Show this help message

Configuration file: ~/.config/mailsync/config.toml
"#
    );
}

fn set_password(config: &Config, account_id: &str) -> Result<()> {
    use std::io::{self, BufRead, Write};

    let account = config
        .account_by_id(account_id)
        .with_context(|| format!("Unknown account: {}", account_id))?;

    print!("Secret for {}: ", account.email);
    io::stdout().flush()?;
    let mut secret = String::new();
    io::stdin().lock().read_line(&mut secret)?;
    let secret = secret.trim();
    if secret.is_empty() {
        anyhow::bail!("Empty secret, nothing stored");
    }

    CredentialStore::new(account.account_id(), &account.email)
        .set_secret(&account.auth, secret)?;
    println!("Stored credentials for {}.", account.email);
    Ok(())
}

fn notifier_for(config: &Config, account: &AccountConfig) -> Box<dyn SyncNotifier> {
    if !config.notifications_enabled_for(account) {
        return Box::new(NoopNotifier);
    }

    #[cfg(feature = "notifications")]
    {
        Box::new(notification::DesktopNotifier::for_account(config, account))
    }

    #[cfg(not(feature = "notifications"))]
    {
        Box::new(NoopNotifier)
    }
}

async fn sync_one(cache: &Cache, config: &Config, account_config: &AccountConfig) -> SyncResult {
    let account = account_config.to_account();
    if let Err(e) = cache.register_account(&account).await {
        return SyncResult::failure(format!("could not register account: {:#}", e));
    }

    let store = CredentialStore::new(&account.id, &account.email);
    let secret = match store.get_secret(&account_config.auth) {
        Ok(secret) => secret,
        Err(e) => return SyncResult::failure(format!("{:#}", e)),
    };

    let mut client = ImapClient::new(
        &account_config.imap.server,
        account_config.imap.port,
        account_config.login_name(),
        secret,
        account_config.auth.clone(),
    );

    let notifier = notifier_for(config, account_config);
    let syncer = Syncer::new(
        cache,
        &MailParser,
        notifier.as_ref(),
        SyncSettings::from(&config.sync),
    );

    syncer.sync_account(&mut client, &account).await
}

fn print_summary(account_id: &str, result: &SyncResult) {
    if let Some(error) = &result.error {
        println!("{}: failed: {}", account_id, error);
        return;
    }

    let placeholders: usize = result.folders.iter().map(|f| f.placeholders).sum();
    let removed: usize = result.folders.iter().map(|f| f.orphans_removed).sum();
    println!(
        "{}: {} new, {} placeholders, {} removed across {} folders",
        account_id,
        result.new_count,
        placeholders,
        removed,
        result.folders.len()
    );
    if let Some(unread) = result.unread_total {
        println!("  {} unread in total", unread);
    }
}

fn select_accounts<'c>(config: &'c Config, only: Option<&str>) -> Result<Vec<&'c AccountConfig>> {
    match only {
        Some(id) => Ok(vec![
            config
                .account_by_id(id)
                .with_context(|| format!("Unknown account: {}", id))?,
        ]),
        None => Ok(config.accounts.iter().collect()),
    }
}

/// Returns whether every selected account synced successfully.
async fn run_sync(config: &Config, only: Option<&str>) -> Result<bool> {
    let accounts = select_accounts(config, only)?;

    let cache = Cache::open(&Config::database_path()?).await?;

    let mut all_ok = true;
    for account in accounts {
        let result = sync_one(&cache, config, account).await;
        if !result.success {
            tracing::error!("Sync of {} failed: {:?}", account.account_id(), result.error);
            all_ok = false;
        }
        print_summary(account.account_id(), &result);
    }

    Ok(all_ok)
}

fn format_timestamp(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

async fn show_status(config: &Config, only: Option<&str>) -> Result<()> {
    let accounts = select_accounts(config, only)?;
    let cache = Cache::open(&Config::database_path()?).await?;

    for account_config in accounts {
        let id = account_config.account_id();
        println!("{} <{}>", id, account_config.email);

        let Some(account) = cache.get_account(id).await? else {
            println!("  never synced");
            continue;
        };

        let last_sync = account
            .last_sync
            .map(format_timestamp)
            .unwrap_or_else(|| "never".to_string());
        println!("  last sync: {}", last_sync);
        if let Some(uid) = account.max_inbox_uid {
            println!("  highest inbox UID: {}", uid);
        }
        if let (Some(used), Some(total)) = (account.quota_used_kb, account.quota_total_kb) {
            println!("  quota: {} KB of {} KB", used, total);
        }

        let total = cache.get_message_count(id, None).await?;
        let unread = cache.get_unread_count(id).await?;
        println!("  messages: {} ({} unread)", total, unread);
        for (folder, count, unread) in cache.get_folder_counts(id).await? {
            println!("    {:<24} {:>6} {:>6} unread", folder, count, unread);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("help") | Some("--help") | Some("-h") => {
            print_usage();
            Ok(())
        }
        Some("set-password") => {
            let Some(account_id) = args.get(2) else {
                print_usage();
                std::process::exit(1);
            };
            Config::ensure_dirs()?;
            let config = Config::load()?;
            set_password(&config, account_id)
        }
        None | Some("sync") => {
            Config::ensure_dirs()?;
            setup_logging();

            let config = Config::load()?;
            let ok = run_sync(&config, args.get(2).map(|s| s.as_str())).await?;
            if !ok {
                std::process::exit(1);
            }
            Ok(())
        }
        Some("status") => {
            Config::ensure_dirs()?;
            let config = Config::load()?;
            show_status(&config, args.get(2).map(|s| s.as_str())).await
        }
        Some(cmd) => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            std::process::exit(1);
        }
    }
}
