//! Application-wide constants for tuning and configuration
//!
//! Centralizes magic numbers to make them discoverable and configurable.

/// Sequence numbers covered by one identifier/flag fetch.
/// Keeps a single FETCH response bounded on very large folders.
pub const DEFAULT_SCAN_WINDOW: u32 = 5000;

/// Messages fetched with full bodies per UID FETCH.
pub const DEFAULT_DOWNLOAD_CHUNK: usize = 50;

/// Initial delay in milliseconds before retrying a failed connection.
pub const INITIAL_RETRY_DELAY_MS: u64 = 500;

/// Maximum retry delay in seconds for connection attempts.
pub const MAX_RETRY_DELAY_SECS: u64 = 30;

/// Default number of connection retry attempts.
pub const DEFAULT_CONNECT_RETRIES: u32 = 3;

/// Timeout in seconds for the TCP connect and TLS handshake.
pub const CONNECT_TIMEOUT_SECS: u64 = 30;
