use anyhow::Result;
use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

use crate::config::AuthMethod;

const KEYRING_SERVICE: &str = "mailsync";
const ENV_PASSWORD: &str = "MAILSYNC_PASSWORD";

/// Looks up the secret used to log in to an account: the environment
/// first, then the system keyring, then a permission-restricted file.
pub struct CredentialStore {
    account_id: String,
    email: String,
    password_file: PathBuf,
}

impl CredentialStore {
    pub fn new(account_id: &str, email: &str) -> Self {
        let safe_email = email.replace(['@', '.', '/', '\\', ':'], "_");
        let password_file = crate::config::Config::config_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(format!(".password_{}", safe_email));

        Self {
            account_id: account_id.to_string(),
            email: email.to_string(),
            password_file,
        }
    }

    fn key(&self, auth: &AuthMethod) -> String {
        match auth {
            AuthMethod::Password => format!("imap:{}", self.email),
            AuthMethod::OAuth2 => format!("oauth2:{}", self.email),
        }
    }

    fn env_password() -> Option<String> {
        env::var(ENV_PASSWORD).ok().filter(|s| !s.is_empty())
    }

    fn keyring_get(&self, key: &str) -> Option<String> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, key).ok()?;
        entry.get_password().ok()
    }

    fn keyring_set(&self, key: &str, secret: &str) -> bool {
        match keyring::Entry::new(KEYRING_SERVICE, key) {
            Ok(entry) => entry.set_password(secret).is_ok(),
            Err(_) => false,
        }
    }

    fn file_get(&self) -> Option<String> {
        fs::read_to_string(&self.password_file)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn file_set(&self, secret: &str) -> Result<()> {
        if let Some(parent) = self.password_file.parent() {
            fs::create_dir_all(parent)?;
        }

        #[cfg(unix)]
        {
            let mut file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&self.password_file)?;
            file.write_all(secret.as_bytes())?;
        }

        #[cfg(not(unix))]
        {
            let mut file = fs::File::create(&self.password_file)?;
            file.write_all(secret.as_bytes())?;
        }

        Ok(())
    }

    /// Password, or access token for OAuth2 accounts.
    pub fn get_secret(&self, auth: &AuthMethod) -> Result<String> {
        if let Some(secret) = Self::env_password() {
            return Ok(secret);
        }

        if let Some(secret) = self.keyring_get(&self.key(auth)) {
            return Ok(secret);
        }

        if let Some(secret) = self.file_get() {
            return Ok(secret);
        }

        anyhow::bail!(self.missing_hint())
    }

    fn missing_hint(&self) -> String {
        format!(
            "No credentials for {}. Set {} or run 'mailsync set-password {}'.",
            self.email, ENV_PASSWORD, self.account_id
        )
    }

    pub fn set_secret(&self, auth: &AuthMethod, secret: &str) -> Result<()> {
        let key = self.key(auth);
        if self.keyring_set(&key, secret) && self.keyring_get(&key).is_some() {
            return Ok(());
        }

        tracing::warn!("Keyring unavailable, storing credentials in a file");
        eprintln!("Note: Keyring unavailable, using file-based storage.");
        self.file_set(secret)
    }
}
