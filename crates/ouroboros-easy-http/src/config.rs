//! Per-client configuration read by every request

use std::fmt;
use std::time::Duration;

/// Authentication selector used by [`crate::HttpClient::set_auth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AuthType {
    #[default]
    None,
    /// Basic only
    Basic,
    /// Let the transport pick among the mechanisms it supports
    Negotiate,
}

/// Authentication applied to each request.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    None,
    /// Send Basic credentials up front
    Basic { username: String, password: String },
    /// Send credentials with whichever supported mechanism the server asks for
    Any { username: String, password: String },
}

impl AuthMode {
    /// Resolve a selector plus credentials into a mode.
    ///
    /// Every credentialed selector other than `Basic` becomes `Any`.
    pub fn new(auth_type: AuthType, username: impl Into<String>, password: impl Into<String>) -> Self {
        match auth_type {
            AuthType::None => Self::None,
            AuthType::Basic => Self::Basic {
                username: username.into(),
                password: password.into(),
            },
            AuthType::Negotiate => Self::Any {
                username: username.into(),
                password: password.into(),
            },
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            Self::None => None,
            Self::Basic { username, .. } | Self::Any { username, .. } => Some(username),
        }
    }
}

impl fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            Self::Any { username, .. } => f
                .debug_struct("Any")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
        }
    }
}

/// Configuration for an [`crate::HttpClient`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    /// Prepend the status line and response headers to the returned body
    pub return_headers: bool,

    /// Log the request and response heads
    pub verbose: bool,

    /// Let the transport itself fail on statuses >= 400
    pub fail_on_http_error: bool,

    /// Whole-request timeout in seconds; unset or <= 0 means none
    pub timeout_secs: Option<i64>,

    /// Name servers to use instead of the system resolver, `host[:port],...`
    pub dns_servers: Option<String>,

    pub auth: AuthMode,
}

impl ClientConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether the status line and headers precede the body
    pub fn return_headers(mut self, enabled: bool) -> Self {
        self.return_headers = enabled;
        self
    }

    /// Set verbose wire logging
    pub fn verbose(mut self, enabled: bool) -> Self {
        self.verbose = enabled;
        self
    }

    /// Set whether the transport fails on statuses >= 400
    pub fn fail_on_http_error(mut self, enabled: bool) -> Self {
        self.fail_on_http_error = enabled;
        self
    }

    /// Set the whole-request timeout in seconds
    pub fn timeout_secs(mut self, secs: i64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Set the name servers used instead of the system resolver
    pub fn dns_servers(mut self, servers: impl Into<String>) -> Self {
        self.dns_servers = Some(servers.into());
        self
    }

    /// Set the authentication mode
    pub fn auth(mut self, auth: AuthMode) -> Self {
        self.auth = auth;
        self
    }

    /// The effective timeout, if one is configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|secs| *secs > 0)
            .map(|secs| Duration::from_secs(secs as u64))
    }

    /// The DNS override list, if a non-blank one is configured.
    pub fn dns_override(&self) -> Option<&str> {
        self.dns_servers
            .as_deref()
            .map(str::trim)
            .filter(|list| !list.is_empty())
    }
}
