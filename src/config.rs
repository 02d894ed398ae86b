//! # Configuration Module
//!
//! Connection settings for the Centrifugo server API client.
//!
//! A [`Config`] is built once, is immutable afterwards, and is shared by
//! the client and the broadcasting adapter. Any field left untouched
//! keeps its documented default.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the server API client.
///
/// ## Defaults
///
/// - **url**: `http://localhost:8000`
/// - **secret** / **api_key**: empty (signing and API calls refuse to run
///   until they are set)
/// - **tls_verify**: `true`
/// - **ssl_key**: none
/// - **namespace**: none
/// - **timeout**: 30 seconds per attempt
/// - **max_tries**: 1 (no retries)
///
/// ## Example
///
/// ```rust
/// use centrifugo_broadcast::config::Config;
/// use std::time::Duration;
///
/// let config = Config::new()
///     .with_url("https://centrifugo.example.com")
///     .with_secret("token-hmac-secret")
///     .with_api_key("api-key")
///     .with_namespace("chat")
///     .with_timeout(Duration::from_secs(3))
///     .with_max_tries(3);
///
/// assert_eq!(config.url, "https://centrifugo.example.com");
/// assert_eq!(config.max_tries, 3);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Base address of the Centrifugo server. The `/api` suffix is
    /// appended automatically if not already present.
    pub url: String,

    /// HMAC secret used to sign connection and subscription tokens.
    ///
    /// Must match the `token_hmac_secret_key` the server validates with.
    pub secret: String,

    /// API key sent as `Authorization: apikey <key>` on every call.
    pub api_key: String,

    /// Whether to verify the server certificate on `https` URLs.
    pub tls_verify: bool,

    /// Optional client key material (PEM) presented on `https` URLs.
    pub ssl_key: Option<PathBuf>,

    /// Optional channel namespace, stripped and re-added transparently
    /// by the channel name model.
    pub namespace: Option<String>,

    /// Timeout applied to each HTTP attempt.
    pub timeout: Duration,

    /// Total number of attempts for connect/timeout failures.
    ///
    /// `1` means a single attempt and no retries. All API methods used
    /// here are treated as at-least-once by the server, so retrying a
    /// lost request is safe.
    pub max_tries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            url: String::from("http://localhost:8000"),
            secret: String::new(),
            api_key: String::new(),
            tls_verify: true,
            ssl_key: None,
            namespace: None,
            timeout: Duration::from_secs(30),
            max_tries: 1,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server base URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Sets the token HMAC secret.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = secret.into();
        self
    }

    /// Sets the server API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Enables or disables certificate verification for `https` URLs.
    pub fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Sets a client key (PEM file) presented on `https` URLs.
    pub fn with_ssl_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.ssl_key = Some(path.into());
        self
    }

    /// Sets the channel namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Sets the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the total number of attempts for unreachable-server failures.
    pub fn with_max_tries(mut self, max_tries: u32) -> Self {
        self.max_tries = max_tries;
        self
    }
}
