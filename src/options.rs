//! Configuration for the chat transport and the streaming client.

use std::collections::HashMap;
use std::time::Duration;

/// Base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8181";

/// Environment variable overriding the backend base URL.
pub const BASE_URL_ENV: &str = "CHAT_API_BASE_URL";

/// Environment variable holding the bearer credential.
pub const TOKEN_ENV: &str = "CHAT_API_TOKEN";

/// A secret string type for sensitive data like bearer tokens.
/// Prevents accidental logging or display of secrets.
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    /// Create a new secret string.
    pub fn new(s: String) -> Self {
        Self(s)
    }

    /// Get the underlying secret value.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

/// Generic transport options: fields shared by every transport plus the
/// transport-specific configuration.
///
/// # Example
/// ```rust
/// use streamchat::options::{HttpTransport, TransportOptions};
/// use std::time::Duration;
///
/// let options = TransportOptions::new(
///     HttpTransport::new("http://localhost:8181").with_credential("token"),
/// )
/// .with_timeout(Duration::from_secs(30));
/// assert_eq!(options.timeout, Some(Duration::from_secs(30)));
/// ```
#[derive(Debug, Clone)]
pub struct TransportOptions<T> {
    /// Request timeout (applies to all transports)
    pub timeout: Option<Duration>,

    /// Transport-specific options
    pub provider: T,
}

impl<T> TransportOptions<T> {
    /// Create new transport options with transport-specific configuration.
    pub fn new(provider: T) -> Self {
        Self {
            timeout: None,
            provider,
        }
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// HTTP-specific transport options.
/// Used as the provider field in `TransportOptions<HttpTransport>`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// Base URL of the chat backend, without the `/api` suffix
    pub base_url: String,

    /// Bearer credential attached as `Authorization` when present
    pub credential: Option<SecretString>,

    /// HTTP proxy URL
    pub proxy: Option<String>,

    /// Additional HTTP headers to include in requests
    pub extra_headers: Option<HashMap<String, String>>,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl HttpTransport {
    /// Create new HTTP transport options pointing at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            credential: None,
            proxy: None,
            extra_headers: None,
        }
    }

    /// Build options from `CHAT_API_BASE_URL` and `CHAT_API_TOKEN`.
    ///
    /// Missing variables fall back to the default base URL and no credential.
    pub fn from_env() -> Self {
        let base_url = std::env::var(BASE_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let mut transport = Self::new(base_url);
        if let Some(token) = std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty()) {
            transport.credential = Some(SecretString::new(token));
        }
        transport
    }

    /// Set the bearer credential.
    pub fn with_credential(mut self, credential: impl Into<SecretString>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Set the proxy URL.
    pub fn with_proxy(mut self, proxy: String) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Set extra headers.
    pub fn with_extra_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.extra_headers = Some(headers);
        self
    }

    /// Add a single extra header.
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.extra_headers
            .get_or_insert_with(HashMap::new)
            .insert(key, value);
        self
    }

    /// Join `path` onto the `/api` root of the backend.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/api/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// What `send_message` does when a previous call is still streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InFlightPolicy {
    /// Abort the running request, then start the new one.
    #[default]
    CancelPrevious,
    /// Fail the new call with `ClientError::AlreadyInFlight`.
    Reject,
}

/// Behavior options for `StreamingChatClient`.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub in_flight: InFlightPolicy,
}

impl ClientOptions {
    pub fn with_in_flight(mut self, policy: InFlightPolicy) -> Self {
        self.in_flight = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_api_root() {
        let transport = HttpTransport::new("http://example.com/");
        assert_eq!(
            transport.endpoint("/chat/stream"),
            "http://example.com/api/chat/stream"
        );
        assert_eq!(transport.endpoint("agents"), "http://example.com/api/agents");
    }

    #[test]
    fn test_secret_is_redacted() {
        let transport = HttpTransport::default().with_credential("sk-123");
        let debug = format!("{:?}", transport);
        assert!(!debug.contains("sk-123"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_default_policy_cancels_previous() {
        assert_eq!(ClientOptions::default().in_flight, InFlightPolicy::CancelPrevious);
    }
}
