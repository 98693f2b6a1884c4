//! `MailSession` over IMAP: connection, folder listing, locking and fetches.

use anyhow::{Context, Result};
use async_imap::types::{Fetch, QuotaResourceName};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::Duration;

use super::{
    ImapClient, ImapSession, XOAuth2Authenticator, descriptor_from_list, is_selectable,
    special_use, uid_set,
};
use crate::config::AuthMethod;
use crate::constants::CONNECT_TIMEOUT_SECS;
use crate::mail::folder::FolderDescriptor;
use crate::mail::parser::parse_flags_from_imap;
use crate::mail::types::EmailFlags;
use crate::sync::{
    FetchStream, FetchedMessage, FolderLock, MailSession, QuotaUnit, QuotaUsage, RemoteEntry,
    SeqRange,
};

impl ImapClient {
    //
    // Connection Management
    //

    async fn open_session(&self) -> Result<ImapSession> {
        use rustls::pki_types::ServerName;
        use tokio::net::TcpStream;
        use tokio_rustls::TlsConnector;
        use tokio_util::compat::TokioAsyncReadCompatExt;

        let addr = format!("{}:{}", self.server, self.port);

        let tcp = TcpStream::connect(&addr)
            .await
            .with_context(|| format!("Failed to connect to {}", addr))?;

        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();

        let server_name = ServerName::try_from(self.server.clone())
            .with_context(|| format!("Invalid server name: {}", self.server))?;
        let tls_stream = TlsConnector::from(Arc::new(tls_config))
            .connect(server_name, tcp)
            .await
            .context("TLS handshake failed")?;

        // async-imap speaks futures-io
        let client = async_imap::Client::new(tls_stream.compat());

        let session = match &self.auth_method {
            AuthMethod::Password => client
                .login(&self.username, &self.secret)
                .await
                .map_err(|e| anyhow::anyhow!("Login failed: {}", e.0))?,
            AuthMethod::OAuth2 => {
                let authenticator = XOAuth2Authenticator {
                    user: self.username.clone(),
                    access_token: self.secret.clone(),
                };
                client
                    .authenticate("XOAUTH2", authenticator)
                    .await
                    .map_err(|e| anyhow::anyhow!("XOAUTH2 authentication failed: {}", e.0))?
            }
        };

        Ok(session)
    }

    fn session(&mut self) -> Result<&mut ImapSession> {
        self.session
            .as_mut()
            .context("Not connected to IMAP server")
    }
}

fn entry_flags(fetch: &Fetch) -> EmailFlags {
    let flags: Vec<_> = fetch.flags().collect();
    parse_flags_from_imap(&flags)
}

#[async_trait]
impl MailSession for ImapClient {
    async fn connect(&mut self) -> Result<()> {
        // A retried connect must not leak the previous session
        self.session = None;

        let timeout = Duration::from_secs(CONNECT_TIMEOUT_SECS);
        let mut session = tokio::time::timeout(timeout, self.open_session())
            .await
            .with_context(|| format!("Timed out connecting to {}", self.server))??;

        // RFC 2087
        if let Ok(caps) = session.capabilities().await {
            self.has_quota = caps.has(&async_imap::types::Capability::Atom("QUOTA".into()));
            if self.has_quota {
                tracing::debug!("Server supports QUOTA extension");
            }
        }

        self.session = Some(session);
        tracing::info!("Connected to IMAP server {}", self.server);

        Ok(())
    }

    async fn logout(&mut self) -> Result<()> {
        if let Some(mut session) = self.session.take() {
            session.logout().await.context("LOGOUT failed")?;
        }
        Ok(())
    }

    //
    // Folder Operations
    //

    async fn list_folders(&mut self) -> Result<Vec<FolderDescriptor>> {
        let session = self.session()?;
        let names: Vec<_> = session
            .list(Some(""), Some("*"))
            .await
            .context("LIST failed")?
            .try_collect()
            .await
            .context("LIST failed")?;

        let mut folders = Vec::with_capacity(names.len());
        for name in &names {
            if !is_selectable(name.attributes()) {
                tracing::debug!("Skipping non-selectable folder {}", name.name());
                continue;
            }
            let special = special_use(name.attributes());
            folders.push(descriptor_from_list(
                name.name(),
                name.delimiter(),
                special.as_deref(),
            )?);
        }

        tracing::debug!("Server lists {} selectable folders", folders.len());
        Ok(folders)
    }

    async fn lock_folder(&mut self, path: &str) -> Result<FolderLock> {
        let mailbox = self
            .session()?
            .examine(path)
            .await
            .with_context(|| format!("EXAMINE {} failed", path))?;

        Ok(FolderLock {
            path: path.to_string(),
            exists: mailbox.exists,
        })
    }

    // Read-only, so CLOSE expunges nothing (RFC 3501 6.4.2)
    async fn release_folder(&mut self, lock: FolderLock) -> Result<()> {
        self.session()?
            .close()
            .await
            .with_context(|| format!("CLOSE {} failed", lock.path))
    }

    //
    // Fetch Operations
    //

    async fn fetch_identifiers_and_flags<'a>(
        &'a mut self,
        range: SeqRange,
    ) -> Result<FetchStream<'a, RemoteEntry>> {
        let stream = self
            .session()?
            .fetch(range.to_string(), "(UID FLAGS)")
            .await
            .with_context(|| format!("FETCH {} failed", range))?;

        Ok(stream
            .filter_map(|item| async move {
                match item {
                    // Unsolicited FETCH responses may lack a UID
                    Ok(fetch) => fetch.uid.map(|uid| {
                        Ok(RemoteEntry {
                            uid,
                            flags: entry_flags(&fetch),
                        })
                    }),
                    Err(e) => Some(Err(anyhow::Error::from(e))),
                }
            })
            .boxed())
    }

    async fn fetch_full_messages<'a>(
        &'a mut self,
        uids: &[u32],
    ) -> Result<FetchStream<'a, FetchedMessage>> {
        let set = uid_set(uids);
        let stream = self
            .session()?
            .uid_fetch(&set, "(UID FLAGS BODY.PEEK[])")
            .await
            .with_context(|| format!("UID FETCH {} failed", set))?;

        Ok(stream
            .filter_map(|item| async move {
                match item {
                    Ok(fetch) => fetch.uid.map(|uid| {
                        Ok(FetchedMessage {
                            uid,
                            flags: entry_flags(&fetch),
                            raw: fetch.body().map(|body| body.to_vec()),
                        })
                    }),
                    Err(e) => Some(Err(anyhow::Error::from(e))),
                }
            })
            .boxed())
    }

    async fn query_quota(&mut self, folder: &str) -> Result<Option<QuotaUsage>> {
        if !self.has_quota {
            return Ok(None);
        }

        let (_roots, quotas) = self
            .session()?
            .get_quota_root(folder)
            .await
            .context("GETQUOTAROOT failed")?;

        // STORAGE is counted in units of 1024 octets
        let usage = quotas
            .iter()
            .flat_map(|quota| quota.resources.iter())
            .find(|resource| matches!(resource.name, QuotaResourceName::Storage))
            .map(|resource| QuotaUsage {
                used: resource.usage,
                limit: resource.limit,
                unit: QuotaUnit::Kilobytes,
            });

        Ok(usage)
    }
}
